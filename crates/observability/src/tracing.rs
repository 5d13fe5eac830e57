//! Tracing/logging initialization.
//!
//! `RUST_LOG` wins over the configured level when it is set.

use serde::Deserialize;
use tracing_subscriber::EnvFilter;

fn default_level() -> String {
    "info".to_string()
}

fn default_json() -> bool {
    true
}

/// Log output settings (the `log` section of the ledger config).
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct LogConfig {
    /// Default filter directive, e.g. `info` or `stockledger_infra=debug`.
    #[serde(default = "default_level")]
    pub level: String,
    /// JSON lines when true, human-readable output otherwise.
    #[serde(default = "default_json")]
    pub json: bool,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: default_level(),
            json: default_json(),
        }
    }
}

impl LogConfig {
    fn filter(&self) -> EnvFilter {
        EnvFilter::try_from_default_env()
            .or_else(|_| EnvFilter::try_new(&self.level))
            .unwrap_or_else(|_| EnvFilter::new("info"))
    }
}

/// Initialize tracing/logging for the process.
///
/// Safe to call multiple times (subsequent calls are no-ops).
pub fn init(config: &LogConfig) {
    let builder = tracing_subscriber::fmt()
        .with_env_filter(config.filter())
        .with_target(false);

    let _ = if config.json {
        builder
            .json()
            .with_timer(tracing_subscriber::fmt::time::SystemTime)
            .try_init()
    } else {
        builder.try_init()
    };
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_fields_take_defaults() {
        let config: LogConfig = serde_json::from_str("{}").unwrap();
        assert_eq!(config, LogConfig::default());
        assert_eq!(config.level, "info");
        assert!(config.json);
    }

    #[test]
    fn init_twice_is_a_no_op() {
        let config = LogConfig {
            level: "debug".into(),
            json: false,
        };
        init(&config);
        init(&config);
    }
}
