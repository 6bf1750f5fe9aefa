//! Structured logging setup.
//!
//! Dual-mode output on stderr: human-readable console format for
//! interactive use, JSON lines for service deployments. stdout stays
//! reserved for command payloads. Level and format respect `RUST_LOG`,
//! `TW_LOG`, and `TW_LOG_FORMAT`.

use std::io::IsTerminal;

use tracing_subscriber::{fmt, EnvFilter};

/// Output format for log lines.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogFormat {
    #[default]
    Human,
    Json,
}

/// Logging configuration resolved from flags and environment.
#[derive(Debug, Clone, Default)]
pub struct LogConfig {
    pub format: LogFormat,
    /// Default filter directive when no environment filter is set.
    pub level: String,
}

impl LogConfig {
    /// Resolve from environment: `TW_LOG_FORMAT=json|human`, `TW_LOG` for
    /// the level directive, with an optional explicit format override.
    pub fn from_env(format_override: Option<LogFormat>) -> Self {
        let format = format_override.unwrap_or_else(|| {
            match std::env::var("TW_LOG_FORMAT").as_deref() {
                Ok("json") => LogFormat::Json,
                _ => LogFormat::Human,
            }
        });
        let level = std::env::var("TW_LOG").unwrap_or_else(|_| "info".to_string());
        LogConfig { format, level }
    }
}

/// Initialize the global subscriber. Call once at startup; a second call
/// is a silent no-op so tests can initialize freely.
pub fn init_logging(config: &LogConfig) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("tw_core={}", config.level)));

    let result = match config.format {
        LogFormat::Human => fmt()
            .with_env_filter(filter)
            .with_writer(std::io::stderr)
            .with_target(false)
            .with_ansi(std::io::stderr().is_terminal())
            .try_init(),
        LogFormat::Json => fmt()
            .json()
            .with_env_filter(filter)
            .with_writer(std::io::stderr)
            .with_current_span(false)
            .try_init(),
    };
    // Already-initialized is fine; keep whatever the first caller set up.
    let _ = result;
}

/// Unique id for one monitor invocation, used to correlate log lines.
pub fn generate_run_id() -> String {
    format!("run-{}", &uuid::Uuid::new_v4().to_string()[..12])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_run_ids_unique_and_prefixed() {
        let a = generate_run_id();
        let b = generate_run_id();
        assert!(a.starts_with("run-"));
        assert_eq!(a.len(), 16);
        assert_ne!(a, b);
    }

    #[test]
    fn test_init_twice_is_harmless() {
        let config = LogConfig {
            format: LogFormat::Human,
            level: "debug".to_string(),
        };
        init_logging(&config);
        init_logging(&config);
    }
}
