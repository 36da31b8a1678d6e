//! Logging setup
//!
//! Installs a `tracing` subscriber configured from the environment:
//!
//! | Variable | Values | Default |
//! |---|---|---|
//! | `TENANTRY_DEBUG` | `1` / `true` | off |
//! | `TENANTRY_LOG_LEVEL` | `trace`, `debug`, `info`, `warn`, `error`, `off` | `info` (`debug` with `TENANTRY_DEBUG`) |
//! | `TENANTRY_LOG_FORMAT` | `json`, `pretty`, `compact` | `json` |
//! | `TENANTRY_LOG_COLOR` | `1` / `true` | on when `TERM` is set and `NO_COLOR` is not |
//!
//! `RUST_LOG`, when set, replaces the level filter.

use std::env;
use tracing_subscriber::prelude::*;
use tracing_subscriber::{EnvFilter, Layer, Registry, fmt};

/// Output format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Format {
    #[default]
    Json,
    Pretty,
    Compact,
}

impl Format {
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "json" => Some(Format::Json),
            "pretty" => Some(Format::Pretty),
            "compact" | "plain" => Some(Format::Compact),
            _ => None,
        }
    }
}

/// Logging configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogConfig {
    pub debug: bool,
    /// Level directive handed to the filter
    pub level: String,
    pub format: Format,
    pub color: bool,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            debug: false,
            level: "info".to_string(),
            format: Format::Json,
            color: false,
        }
    }
}

const LEVELS: [&str; 6] = ["trace", "debug", "info", "warn", "error", "off"];

impl LogConfig {
    /// Read `TENANTRY_*` variables from the process environment.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Build from any variable lookup.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let flag = |key: &str| {
            lookup(key).map(|v| v == "1" || v.eq_ignore_ascii_case("true"))
        };

        let debug = flag("TENANTRY_DEBUG").unwrap_or(false);

        let level = lookup("TENANTRY_LOG_LEVEL")
            .map(|s| s.trim().to_ascii_lowercase())
            .filter(|s| LEVELS.contains(&s.as_str()))
            .unwrap_or_else(|| if debug { "debug" } else { "info" }.to_string());

        let format = lookup("TENANTRY_LOG_FORMAT")
            .and_then(|s| Format::parse(&s))
            .unwrap_or_default();

        let color = flag("TENANTRY_LOG_COLOR")
            .unwrap_or_else(|| lookup("NO_COLOR").is_none() && lookup("TERM").is_some());

        Self {
            debug,
            level,
            format,
            color,
        }
    }
}

/// Install the global subscriber from the environment.
///
/// Returns `false` if a subscriber was already installed.
pub fn init() -> bool {
    init_with(&LogConfig::from_env())
}

/// Install the global subscriber with an explicit configuration.
pub fn init_with(config: &LogConfig) -> bool {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.level));

    let layer: Box<dyn Layer<Registry> + Send + Sync> = match config.format {
        Format::Json => fmt::layer().json().with_current_span(true).boxed(),
        Format::Pretty => fmt::layer().pretty().with_ansi(config.color).boxed(),
        Format::Compact => fmt::layer().compact().with_ansi(config.color).boxed(),
    };

    let installed = tracing_subscriber::registry()
        .with(layer)
        .with(filter)
        .try_init()
        .is_ok();
    if installed {
        tracing::debug!(level = %config.level, format = ?config.format, "Logging initialized");
    }
    installed
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn config(vars: &[(&str, &str)]) -> LogConfig {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        LogConfig::from_lookup(|key| vars.get(key).cloned())
    }

    #[test]
    fn test_defaults() {
        let config = config(&[]);
        assert_eq!(config.level, "info");
        assert_eq!(config.format, Format::Json);
        assert!(!config.color);
    }

    #[test]
    fn test_debug_flag_lowers_level() {
        assert_eq!(config(&[("TENANTRY_DEBUG", "true")]).level, "debug");
        assert_eq!(
            config(&[("TENANTRY_DEBUG", "1"), ("TENANTRY_LOG_LEVEL", "WARN")]).level,
            "warn"
        );
        assert_eq!(config(&[("TENANTRY_LOG_LEVEL", "loud")]).level, "info");
    }

    #[test]
    fn test_format_and_color() {
        let config = config(&[("TENANTRY_LOG_FORMAT", "pretty"), ("TERM", "xterm")]);
        assert_eq!(config.format, Format::Pretty);
        assert!(config.color);

        assert_eq!(Format::parse("plain"), Some(Format::Compact));
        assert_eq!(Format::parse("xml"), None);
    }

    #[test]
    fn test_init_is_idempotent() {
        init_with(&LogConfig::default());
        assert!(!init_with(&LogConfig::default()));
    }
}
