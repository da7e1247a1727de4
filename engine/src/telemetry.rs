//! Telemetry
//!
//! Sets up `tracing-subscriber` for structured logging. `RUST_LOG` wins over
//! the configured level. Debug builds log in a readable form, release builds
//! emit JSON with the current span so project ids stay attached to events.

use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    Pretty,
    Json,
}

impl Default for LogFormat {
    fn default() -> Self {
        if cfg!(debug_assertions) {
            Self::Pretty
        } else {
            Self::Json
        }
    }
}

fn filter_for(log_level: &str) -> EnvFilter {
    let default_filter = format!("{},tripsquad_engine={}", log_level, log_level);
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter))
}

/// Initialize the tracing subscriber. Later calls are ignored.
pub fn init_telemetry_with(log_level: &str, format: LogFormat) {
    let registry = tracing_subscriber::registry().with(filter_for(log_level));

    match format {
        LogFormat::Pretty => registry
            .with(fmt::layer().pretty().with_target(false).with_writer(std::io::stderr))
            .try_init()
            .ok(),
        LogFormat::Json => registry
            .with(
                fmt::layer()
                    .json()
                    .with_current_span(true)
                    .with_writer(std::io::stderr),
            )
            .try_init()
            .ok(),
    };
}

/// Initialize with the build's default format.
pub fn init_telemetry_with_level(log_level: &str) {
    init_telemetry_with(log_level, LogFormat::default());
}

/// Initialize at "info" before configuration is available.
pub fn init_telemetry() {
    init_telemetry_with_level("info");
}
