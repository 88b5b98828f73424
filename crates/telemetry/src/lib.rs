//! Logging bootstrap shared by the server and the CLI.

use bookscout_kernel::settings::{LogFormat, TelemetrySettings};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Install the global tracing subscriber.
///
/// Logs go to stderr so CLI output on stdout stays machine-readable.
/// `RUST_LOG` wins over `telemetry.filter`. Calling this twice is harmless:
/// the second install fails and is reported at debug level.
pub fn init(settings: &TelemetrySettings) {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&settings.filter))
        .unwrap_or_else(|_| EnvFilter::new("info"));

    let registry = tracing_subscriber::registry().with(filter);

    let result = match settings.log_format {
        LogFormat::Pretty => registry
            .with(fmt::layer().with_target(true).with_writer(std::io::stderr))
            .try_init(),
        LogFormat::Json => registry
            .with(
                fmt::layer()
                    .json()
                    .with_current_span(true)
                    .with_writer(std::io::stderr),
            )
            .try_init(),
    };

    match result {
        Ok(()) => tracing::info!(
            target: "bookscout-telemetry",
            format = ?settings.log_format,
            "telemetry initialized"
        ),
        Err(err) => tracing::debug!(
            target: "bookscout-telemetry",
            error = %err,
            "tracing subscriber already installed"
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn init_twice_does_not_panic() {
        let settings = TelemetrySettings {
            log_format: LogFormat::Json,
            filter: "debug".to_string(),
        };
        init(&settings);
        init(&TelemetrySettings::default());
    }
}
