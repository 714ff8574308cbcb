use tracing::Level;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::{DatasourceError, Result};

/// Sets up the logging subscriber for the adapter.
///
/// `RUST_LOG` takes precedence; otherwise the crate logs at `INFO`.
pub fn init_logger() -> Result<()> {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        EnvFilter::new(format!("{}={}", env!("CARGO_CRATE_NAME"), Level::INFO))
    });

    let fmt_layer = fmt::layer()
        .with_target(false)
        .with_thread_ids(true)
        .with_file(true)
        .with_line_number(true)
        .with_level(true)
        .with_ansi(true)
        .compact();

    tracing_subscriber::registry()
        .with(env_filter)
        .with(fmt_layer)
        .try_init()
        .map_err(|e| DatasourceError::Internal(format!("Failed to initialize logger: {}", e)))
}
