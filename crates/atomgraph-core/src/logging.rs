//! Tracing subscriber setup.
//!
//! `RUST_LOG` takes precedence over `LoggingConfig::level`. Calling
//! [`init_logging`] more than once is a no-op; so is calling it after some
//! other global subscriber has been installed (tests, embedding hosts).

use std::sync::atomic::{AtomicBool, Ordering};

use tracing_subscriber::EnvFilter;

use crate::config::LoggingConfig;
use crate::error::{CoreError, CoreResult};

static INSTALLED: AtomicBool = AtomicBool::new(false);

/// Install the global fmt subscriber described by `config`.
///
/// Returns `Ok(true)` when this call installed the subscriber and
/// `Ok(false)` when one was already present.
///
/// # Errors
///
/// `CoreError::ConfigError` when the level directive or format is invalid.
pub fn init_logging(config: &LoggingConfig) -> CoreResult<bool> {
    if INSTALLED.load(Ordering::Acquire) {
        return Ok(false);
    }

    let filter = match EnvFilter::try_from_default_env() {
        Ok(filter) => filter,
        Err(_) => EnvFilter::try_new(&config.level).map_err(|e| {
            CoreError::ConfigError(format!(
                "Invalid logging.level {:?}: {}",
                config.level, e
            ))
        })?,
    };

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_file(config.include_location)
        .with_line_number(config.include_location)
        .with_target(true);

    let result = match config.format.as_str() {
        "pretty" => builder.pretty().try_init(),
        "compact" => builder.compact().try_init(),
        "json" => builder.json().try_init(),
        other => {
            return Err(CoreError::ConfigError(format!(
                "Unknown logging.format {:?}",
                other
            )))
        }
    };

    // try_init fails only when a global default already exists.
    let installed = result.is_ok();
    INSTALLED.store(true, Ordering::Release);
    Ok(installed)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_second_init_is_noop() {
        let config = LoggingConfig {
            level: "debug".to_string(),
            format: "compact".to_string(),
            include_location: false,
        };
        let _ = init_logging(&config).expect("first init must not error");
        let second = init_logging(&config).expect("second init must not error");
        assert!(!second, "second call must not install another subscriber");
    }
}
