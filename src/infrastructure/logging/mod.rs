//! Logging bootstrap.

use anyhow::{Context, Result};
use tracing_subscriber::EnvFilter;

use crate::domain::models::LoggingConfig;

/// Install the global tracing subscriber. `RUST_LOG` wins over the
/// configured level when set.
pub fn init_logging(config: &LoggingConfig) -> Result<()> {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&config.level))
        .context("invalid log filter")?;

    match config.format.as_str() {
        "json" => {
            tracing_subscriber::fmt()
                .with_env_filter(filter)
                .json()
                .with_current_span(false)
                .init();
        }
        _ => {
            tracing_subscriber::fmt().with_env_filter(filter).init();
        }
    }

    Ok(())
}
