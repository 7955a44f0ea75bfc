//! Logging setup for the binary. Library code only emits `tracing` events.

use std::io::IsTerminal;
use std::sync::Once;
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

static INIT: Once = Once::new();

/// Log output format.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, clap::ValueEnum)]
pub enum LogFormat {
    /// JSON structured logs.
    Json,
    /// Human readable logs.
    #[default]
    Pretty,
}

/// Installs the global subscriber, writing to stderr so stdout stays machine readable.
///
/// Filtering follows `RUST_LOG` and defaults to `info`. Later calls are no-ops.
pub fn init_logging(format: LogFormat) {
    INIT.call_once(|| {
        let env_filter =
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
        let ansi = std::io::stderr().is_terminal();

        match format {
            LogFormat::Json => {
                tracing_subscriber::registry()
                    .with(env_filter)
                    .with(fmt::layer().json().with_ansi(false).with_writer(std::io::stderr))
                    .init();
            }
            LogFormat::Pretty => {
                tracing_subscriber::registry()
                    .with(env_filter)
                    .with(fmt::layer().with_ansi(ansi).with_writer(std::io::stderr))
                    .init();
            }
        }
    });
}
