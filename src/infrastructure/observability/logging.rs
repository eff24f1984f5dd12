use crate::config::{LogFormat, ObservabilityEnvConfig};
use anyhow::Result;
use tracing::Level;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::prelude::*;

/// Installs the global tracing subscriber.
///
/// `RUST_LOG` refines the filter; INFO is always enabled. Calling it twice
/// (e.g. from tests) returns an error instead of panicking.
pub fn init(config: &ObservabilityEnvConfig) -> Result<()> {
    let filter = EnvFilter::from_default_env().add_directive(Level::INFO.into());

    match config.log_format {
        LogFormat::Pretty => tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer().with_target(false).pretty())
            .try_init()?,
        LogFormat::Json => tracing_subscriber::registry()
            .with(filter)
            .with(
                tracing_subscriber::fmt::layer()
                    .json()
                    .with_current_span(false)
                    .with_target(false),
            )
            .try_init()?,
    }

    Ok(())
}
