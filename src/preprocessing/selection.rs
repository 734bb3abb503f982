//! Feature selection: multicollinearity pruning and tree importances

use crate::data::DataTable;
use crate::error::{LoanEvalError, Result};
use crate::training::linear_models::least_squares_r2;
use crate::training::RandomForest;
use ndarray::{Array1, Array2, Axis};
use tracing::debug;

/// R² at or above which a column counts as an exact combination of others
const EXACT_FIT: f64 = 1.0 - 1e-10;

/// Variance inflation factor of each column in `columns`.
///
/// Each column is regressed on the others without an intercept;
/// VIF = 1 / (1 − R²), infinite when the column is an exact combination of
/// the others. Collinearity among the other columns alone does not make a
/// VIF infinite. A single column has VIF 1.
pub fn calculate_vif(table: &DataTable, columns: &[String]) -> Result<Vec<(String, f64)>> {
    if columns.is_empty() {
        return Err(LoanEvalError::InvalidInput("no columns given for VIF".to_string()));
    }
    let x = table.numeric_matrix(columns)?;
    if columns.len() == 1 {
        return Ok(vec![(columns[0].clone(), 1.0)]);
    }

    let vifs = (0..columns.len())
        .map(|i| {
            let others: Vec<usize> = (0..columns.len()).filter(|&j| j != i).collect();
            let rest = x.select(Axis(1), &others);
            let target = x.column(i).to_owned();
            let r2 = least_squares_r2(&rest, &target);
            let vif = if r2 >= EXACT_FIT { f64::INFINITY } else { 1.0 / (1.0 - r2) };
            (columns[i].clone(), vif)
        })
        .collect();
    Ok(vifs)
}

/// Drop the highest-VIF column until every VIF is below `cap` or only two
/// columns remain. Returns the kept columns in their original order.
pub fn vif_prune(table: &DataTable, columns: &[String], cap: f64) -> Result<Vec<String>> {
    if cap.is_nan() || cap <= 1.0 {
        return Err(LoanEvalError::invalid_param("cap", cap, "must be greater than 1"));
    }
    let mut kept = columns.to_vec();

    while kept.len() > 2 {
        let vifs = calculate_vif(table, &kept)?;
        let (worst, max_vif) = vifs
            .iter()
            .enumerate()
            .fold((0, f64::NEG_INFINITY), |(bi, bv), (i, (_, v))| {
                if *v > bv {
                    (i, *v)
                } else {
                    (bi, bv)
                }
            });
        if max_vif < cap {
            break;
        }
        debug!("Dropping '{}' (VIF {:.2})", kept[worst], max_vif);
        kept.remove(worst);
    }
    Ok(kept)
}

/// Names of the `top` features ranked by random-forest impurity importance
pub fn tree_feature_selector(
    x: &Array2<f64>,
    y: &Array1<f64>,
    names: &[String],
    n_estimators: usize,
    top: usize,
) -> Result<Vec<String>> {
    if names.len() != x.ncols() {
        return Err(LoanEvalError::ShapeError {
            expected: format!("{} feature names", x.ncols()),
            actual: format!("{} feature names", names.len()),
        });
    }

    let mut forest = RandomForest::new(n_estimators).with_random_state(0);
    forest.fit(x, y)?;
    let importances = forest.feature_importances().ok_or(LoanEvalError::ModelNotFitted)?;

    let mut order: Vec<usize> = (0..names.len()).collect();
    order.sort_by(|&a, &b| {
        importances[b]
            .partial_cmp(&importances[a])
            .unwrap_or(std::cmp::Ordering::Equal)
    });
    Ok(order.into_iter().take(top).map(|i| names[i].clone()).collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::ColumnData;
    use ndarray::array;

    fn numeric_table(columns: Vec<(&str, Vec<f64>)>) -> DataTable {
        DataTable::new(
            columns
                .into_iter()
                .map(|(n, v)| (n.to_string(), ColumnData::Numeric(v)))
                .collect(),
        )
        .unwrap()
    }

    fn names(values: &[&str]) -> Vec<String> {
        values.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_vif_keeps_column_order() {
        let table = numeric_table(vec![
            ("a", vec![1.0, 2.0, 3.0, 4.0]),
            ("b", vec![2.0, 1.0, 4.0, 3.0]),
        ]);
        let vifs = calculate_vif(&table, &names(&["a", "b"])).unwrap();
        assert_eq!(vifs[0].0, "a");
        assert_eq!(vifs[1].0, "b");
        assert!(vifs.iter().all(|(_, v)| *v >= 1.0 && v.is_finite()));
    }

    #[test]
    fn test_vif_duplicate_columns_are_infinite() {
        let table = numeric_table(vec![
            ("a", vec![1.0, 2.0, 3.0]),
            ("b", vec![1.0, 2.0, 3.0]),
        ]);
        let vifs = calculate_vif(&table, &names(&["a", "b"])).unwrap();
        assert!(vifs.iter().all(|(_, v)| v.is_infinite()));
    }

    #[test]
    fn test_vif_independent_column_beside_duplicate_pair() {
        let a = vec![1.0, -2.0, 3.5, 0.5, -1.0, 2.0, 4.0, -3.0];
        let b = vec![2.0, 1.0, -1.0, 3.0, 0.0, -2.0, 1.5, 0.5];
        let table = numeric_table(vec![("a", a), ("b", b.clone()), ("c", b)]);
        let columns = names(&["a", "b", "c"]);

        let vifs = calculate_vif(&table, &columns).unwrap();
        assert!(vifs[0].1.is_finite() && vifs[0].1 >= 1.0);
        assert!(vifs[1].1.is_infinite());
        assert!(vifs[2].1.is_infinite());

        let kept = vif_prune(&table, &columns, 10.0).unwrap();
        assert_eq!(kept.len(), 2);
        assert_eq!(kept[0], "a");
        assert!(kept[1] == "b" || kept[1] == "c");
    }

    #[test]
    fn test_vif_single_column() {
        let table = numeric_table(vec![("a", vec![1.0, 2.0])]);
        assert_eq!(calculate_vif(&table, &names(&["a"])).unwrap(), vec![("a".to_string(), 1.0)]);
    }

    #[test]
    fn test_vif_prune_drops_collinear_column() {
        let a = vec![1.0, 2.0, 3.0, 4.0, 5.0, 6.0];
        let b = vec![3.0, 1.0, 4.0, 1.0, 5.0, 9.0];
        let c: Vec<f64> = a.iter().zip(&b).map(|(x, y)| x + y).collect();
        let d = vec![2.0, 7.0, 1.0, 8.0, 2.0, 8.0];
        let table = numeric_table(vec![("a", a), ("b", b), ("c", c), ("d", d)]);

        // a, b and c are all infinite, the first one goes
        let kept = vif_prune(&table, &names(&["a", "b", "c", "d"]), 10.0).unwrap();
        assert!(kept.len() < 4 && kept.len() >= 2);
        assert!(!kept.contains(&"a".to_string()));
    }

    #[test]
    fn test_vif_prune_stops_at_two_columns() {
        let table = numeric_table(vec![
            ("a", vec![1.0, 2.0, 3.0]),
            ("b", vec![1.0, 2.0, 3.0]),
            ("c", vec![1.0, 2.0, 3.0]),
        ]);
        let kept = vif_prune(&table, &names(&["a", "b", "c"]), 5.0).unwrap();
        assert_eq!(kept.len(), 2);
        assert!(vif_prune(&table, &names(&["a"]), 0.5).is_err());
    }

    #[test]
    fn test_tree_selector_picks_informative_feature() {
        let x = array![
            [0.0, 5.0],
            [0.1, 3.0],
            [0.2, 5.0],
            [0.3, 3.0],
            [1.0, 5.0],
            [1.1, 3.0],
            [1.2, 5.0],
            [1.3, 3.0]
        ];
        let y = array![0.0, 0.0, 0.0, 0.0, 1.0, 1.0, 1.0, 1.0];
        let top = tree_feature_selector(&x, &y, &names(&["signal", "noise"]), 20, 1).unwrap();
        assert_eq!(top, vec!["signal".to_string()]);
        assert!(tree_feature_selector(&x, &y, &names(&["signal"]), 5, 1).is_err());
    }
}
