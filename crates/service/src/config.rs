//! Service configuration loaded from environment variables.

use std::time::Duration;

/// Output format of the tracing subscriber.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogFormat {
    #[default]
    Text,
    Json,
}

impl LogFormat {
    fn parse(value: &str) -> Self {
        if value.eq_ignore_ascii_case("json") {
            LogFormat::Json
        } else {
            LogFormat::Text
        }
    }
}

/// Service configuration with sensible defaults.
///
/// Reads from environment variables:
/// - `EVENT_DISPATCH_TIMEOUT_MS`: deadline for one event dispatch (default: `10000`)
/// - `MAX_DISPATCH_DEPTH`: how deep handler-produced events cascade (default: `8`)
/// - `RUST_LOG`: tracing filter directive (default: `"info"`)
/// - `LOG_FORMAT`: `text` or `json` (default: `text`)
#[derive(Debug, Clone)]
pub struct Config {
    pub dispatch_timeout: Duration,
    pub max_dispatch_depth: usize,
    pub log_level: String,
    pub log_format: LogFormat,
}

impl Config {
    /// Loads configuration from environment variables, falling back to defaults.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let defaults = Self::default();
        Self {
            dispatch_timeout: lookup("EVENT_DISPATCH_TIMEOUT_MS")
                .and_then(|ms| ms.parse().ok())
                .map(Duration::from_millis)
                .unwrap_or(defaults.dispatch_timeout),
            max_dispatch_depth: lookup("MAX_DISPATCH_DEPTH")
                .and_then(|depth| depth.parse().ok())
                .unwrap_or(defaults.max_dispatch_depth),
            log_level: lookup("RUST_LOG").unwrap_or(defaults.log_level),
            log_format: lookup("LOG_FORMAT")
                .map(|format| LogFormat::parse(&format))
                .unwrap_or(defaults.log_format),
        }
    }

    /// Sets the dispatch deadline.
    pub fn with_dispatch_timeout(mut self, timeout: Duration) -> Self {
        self.dispatch_timeout = timeout;
        self
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            dispatch_timeout: Duration::from_secs(10),
            max_dispatch_depth: 8,
            log_level: "info".to_string(),
            log_format: LogFormat::Text,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| vars.get(key).cloned()
    }

    #[test]
    fn test_default_values() {
        let config = Config::default();
        assert_eq!(config.dispatch_timeout, Duration::from_millis(10_000));
        assert_eq!(config.max_dispatch_depth, 8);
        assert_eq!(config.log_level, "info");
        assert_eq!(config.log_format, LogFormat::Text);
    }

    #[test]
    fn test_values_from_environment() {
        let config = Config::from_lookup(lookup(&[
            ("EVENT_DISPATCH_TIMEOUT_MS", "250"),
            ("MAX_DISPATCH_DEPTH", "3"),
            ("RUST_LOG", "service=debug"),
            ("LOG_FORMAT", "JSON"),
        ]));
        assert_eq!(config.dispatch_timeout, Duration::from_millis(250));
        assert_eq!(config.max_dispatch_depth, 3);
        assert_eq!(config.log_level, "service=debug");
        assert_eq!(config.log_format, LogFormat::Json);
    }

    #[test]
    fn test_unparsable_values_fall_back() {
        let config = Config::from_lookup(lookup(&[
            ("EVENT_DISPATCH_TIMEOUT_MS", "soon"),
            ("LOG_FORMAT", "xml"),
        ]));
        assert_eq!(config.dispatch_timeout, Duration::from_secs(10));
        assert_eq!(config.log_format, LogFormat::Text);
    }
}
