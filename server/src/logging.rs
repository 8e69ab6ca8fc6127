//! Structured logging initialization.
//!
//! Configures the tracing subscriber. The RUST_LOG environment variable
//! takes precedence over the configuration file level.

use tracing_subscriber::prelude::*;
use tracing_subscriber::{EnvFilter, fmt};

use crate::config::{LogFormat, LoggingConfig};

/// Initialize the logging subsystem.
///
/// Safe to call once per process; later calls are ignored because a global
/// subscriber is already installed (tests construct several servers).
pub fn init(config: &LoggingConfig) {
    let filter = if std::env::var("RUST_LOG").is_ok() {
        EnvFilter::from_default_env()
    } else {
        EnvFilter::new(config.level.as_str())
    };

    let registry = tracing_subscriber::registry().with(filter);

    let result = match (config.format, config.timestamps) {
        (LogFormat::Pretty, true) => registry
            .with(fmt::layer().with_ansi(true).with_target(config.target))
            .try_init(),
        (LogFormat::Pretty, false) => registry
            .with(
                fmt::layer()
                    .with_ansi(true)
                    .with_target(config.target)
                    .without_time(),
            )
            .try_init(),
        (LogFormat::Compact, true) => registry
            .with(
                fmt::layer()
                    .compact()
                    .with_ansi(true)
                    .with_target(config.target),
            )
            .try_init(),
        (LogFormat::Compact, false) => registry
            .with(
                fmt::layer()
                    .compact()
                    .with_ansi(true)
                    .with_target(config.target)
                    .without_time(),
            )
            .try_init(),
        (LogFormat::Json, true) => registry
            .with(fmt::layer().json().with_target(config.target))
            .try_init(),
        (LogFormat::Json, false) => registry
            .with(fmt::layer().json().with_target(config.target).without_time())
            .try_init(),
    };

    if result.is_err() {
        tracing::debug!("logging already initialized, keeping existing subscriber");
    }
}
