//! Data preprocessing
//!
//! - [`StandardScaler`] for numeric columns
//! - [`OneHotEncoder`] for categorical columns, unseen categories encode as zeros
//! - [`ColumnTransformer`] combining both over a [`DataTable`](crate::data::DataTable)
//! - VIF pruning and tree-importance feature selection

mod column_transformer;
mod encoder;
mod scaler;
pub mod selection;

pub use column_transformer::ColumnTransformer;
pub use encoder::OneHotEncoder;
pub use scaler::{ScalerParams, StandardScaler};
pub use selection::{calculate_vif, tree_feature_selector, vif_prune};
