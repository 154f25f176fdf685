//! Tracing Setup
//!
//! Initializes the `tracing` subscriber from the `logging` config section.
//!
//! # Configuration
//!
//! - `RUST_LOG`: Full filter override. When unset, `logging.level` applies to
//!   every target and to `trade_reconciler` explicitly.
//! - `logging.format`: `pretty` for development, `compact` otherwise.
//!
//! # Usage
//!
//! ```rust,ignore
//! use trade_reconciler::telemetry::init_telemetry;
//!
//! let config = trade_reconciler::config::load_config(None)?;
//! init_telemetry(&config.logging);
//! ```

use tracing_subscriber::EnvFilter;

use crate::config::{LogFormat, LoggingConfig};

/// Build the filter: `RUST_LOG` wins, otherwise the configured level.
fn build_filter(config: &LoggingConfig) -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        let level = config.level.trim();
        EnvFilter::try_new(format!("{level},trade_reconciler={level}")).unwrap_or_else(|e| {
            eprintln!("Invalid log level {:?} ({e}), falling back to info", config.level);
            EnvFilter::new("info")
        })
    })
}

/// Initialize the global tracing subscriber.
///
/// Calling this twice is harmless; the second call is ignored.
pub fn init_telemetry(config: &LoggingConfig) {
    let filter = build_filter(config);

    let result = match config.format {
        LogFormat::Pretty => tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_target(false)
            .pretty()
            .try_init(),
        LogFormat::Compact => tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_target(true)
            .with_ansi(false)
            .compact()
            .try_init(),
    };

    if result.is_err() {
        tracing::debug!("Tracing subscriber already installed");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn configured_level_is_used_without_rust_log() {
        if std::env::var_os("RUST_LOG").is_some() {
            return;
        }
        let config = LoggingConfig {
            level: "debug".to_string(),
            format: LogFormat::Compact,
        };
        assert_eq!(
            build_filter(&config).max_level_hint(),
            Some(tracing_subscriber::filter::LevelFilter::DEBUG)
        );
    }

    #[test]
    fn init_twice_does_not_panic() {
        let config = LoggingConfig::default();
        init_telemetry(&config);
        init_telemetry(&config);
    }
}
