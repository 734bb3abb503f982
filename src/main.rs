//! loan-eval - Main Entry Point

use clap::Parser;
use loan_eval::cli::Cli;

fn main() -> anyhow::Result<()> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "loan_eval=info".into()),
        )
        .init();

    Cli::parse().run()
}
