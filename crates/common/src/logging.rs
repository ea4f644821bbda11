//! Logging and tracing initialization.

use std::fs::OpenOptions;
use std::sync::Mutex;

use crate::config::LoggingConfig;

/// Environment variable consulted before the configured level filter.
const LOG_ENV: &str = "CLIPCAST_LOG";

/// Initialize the tracing subscriber with the given configuration.
///
/// `CLIPCAST_LOG` in the environment overrides the configured level.
/// When a log file is configured, structured JSON lines go there instead
/// of stderr. Repeated initialization is a no-op.
pub fn init_logging(config: &LoggingConfig) {
    use tracing_subscriber::{fmt, EnvFilter};

    let filter =
        EnvFilter::try_from_env(LOG_ENV).unwrap_or_else(|_| EnvFilter::new(&config.level));

    if let Some(path) = &config.file {
        let Ok(file) = OpenOptions::new().create(true).append(true).open(path) else {
            eprintln!("clipcast: cannot open log file {}", path.display());
            return;
        };
        let subscriber = fmt::Subscriber::builder()
            .with_env_filter(filter)
            .with_writer(Mutex::new(file))
            .with_ansi(false)
            .json()
            .finish();
        tracing::subscriber::set_global_default(subscriber).ok();
    } else if config.json {
        let subscriber = fmt::Subscriber::builder()
            .with_env_filter(filter)
            .json()
            .finish();
        tracing::subscriber::set_global_default(subscriber).ok();
    } else {
        let subscriber = fmt::Subscriber::builder()
            .with_env_filter(filter)
            .with_writer(std::io::stderr)
            .with_target(true)
            .finish();
        tracing::subscriber::set_global_default(subscriber).ok();
    }
}

/// Initialize logging with defaults (useful for tests and quick scripts).
pub fn init_default_logging() {
    init_logging(&LoggingConfig::default());
}
