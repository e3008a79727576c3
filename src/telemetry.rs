use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::configuration::{LogFormat, LogSettings};

/// Initialise structured logging
///
/// `RUST_LOG` takes precedence over the configured level. Records emitted
/// through the `log` facade are forwarded into the same subscriber.
/// Safe to call more than once; later calls are ignored.
pub fn init_telemetry(settings: &LogSettings) {
    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&settings.level));

    let registry = tracing_subscriber::registry().with(env_filter);
    let result = match settings.format {
        LogFormat::Json => registry
            .with(tracing_subscriber::fmt::layer().with_writer(std::io::stdout).json())
            .try_init(),
        LogFormat::Pretty => registry
            .with(tracing_subscriber::fmt::layer().with_writer(std::io::stdout).compact())
            .try_init(),
    };

    if let Err(e) = result {
        tracing::debug!(error = %e, "Telemetry already initialised");
    }
}
