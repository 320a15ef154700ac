//! Logging setup using tracing
//!
//! Log output goes to stderr so command output on stdout stays clean.

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::error::{SweepError, SweepResult};

/// Initialize logging; `RUST_LOG` wins over `level`
pub fn init(level: &str) -> SweepResult<()> {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(level))
        .unwrap_or_else(|_| EnvFilter::new("warn"));

    tracing_subscriber::registry()
        .with(filter)
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(std::io::stderr)
                .with_target(false),
        )
        .try_init()
        .map_err(|e| SweepError::Config(format!("Failed to initialize logging: {}", e)))
}
