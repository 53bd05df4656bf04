//! Crate-wide configuration loaded from the environment.

use std::path::PathBuf;
use std::time::Duration;

/// Database connection pool configuration.
///
/// Mirrors the pool sizing knobs a Postgres-backed deployment needs;
/// read from the environment with sane defaults so tests and local
/// development work without a `.env` file.
#[derive(Debug, Clone)]
#[cfg(feature = "database")]
pub struct DatabaseConfig {
    pub database_url: String,
    pub max_connections: u32,
    pub connection_timeout: Duration,
    pub idle_timeout: Option<Duration>,
    pub max_lifetime: Option<Duration>,
}

#[cfg(feature = "database")]
impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            database_url: std::env::var("DATABASE_URL")
                .unwrap_or_else(|_| "postgresql://localhost/ghillie".to_string()),
            max_connections: std::env::var("DATABASE_POOL_SIZE")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(10),
            connection_timeout: Duration::from_secs(30),
            idle_timeout: Some(Duration::from_secs(600)),
            max_lifetime: Some(Duration::from_secs(1800)),
        }
    }
}

/// Top-level crate configuration, assembled from environment variables.
#[derive(Debug, Clone)]
pub struct GhillieConfig {
    pub reporting_window_days: u32,
    pub report_sink_path: Option<PathBuf>,
    pub validation_max_attempts: u32,
    /// Development-only flag carried for configuration-surface parity
    /// with the ingestion broker; unused by the cores in this crate.
    pub allow_stub_broker: bool,
}

impl GhillieConfig {
    /// Load configuration from environment variables, falling back to
    /// defaults for anything unset or unparsable.
    pub fn from_env() -> Self {
        Self {
            reporting_window_days: parse_positive_u32("GHILLIE_REPORTING_WINDOW_DAYS", 7),
            report_sink_path: std::env::var("GHILLIE_REPORT_SINK_PATH")
                .ok()
                .map(PathBuf::from),
            validation_max_attempts: parse_positive_u32("GHILLIE_VALIDATION_MAX_ATTEMPTS", 2),
            allow_stub_broker: std::env::var("GHILLIE_ALLOW_STUB_BROKER")
                .ok()
                .map(|v| v == "1" || v.eq_ignore_ascii_case("true"))
                .unwrap_or(false),
        }
    }
}

fn parse_positive_u32(var: &str, default: u32) -> u32 {
    std::env::var(var)
        .ok()
        .and_then(|s| s.parse::<u32>().ok())
        .filter(|v| *v > 0)
        .unwrap_or(default)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_without_env() {
        // Not touching the environment here: assert on an explicit
        // fallback value rather than relying on process env state.
        assert_eq!(parse_positive_u32("GHILLIE_DOES_NOT_EXIST", 7), 7);
    }

    #[test]
    fn rejects_zero_and_negative() {
        std::env::set_var("GHILLIE_TEST_ZERO", "0");
        assert_eq!(parse_positive_u32("GHILLIE_TEST_ZERO", 7), 7);
        std::env::remove_var("GHILLIE_TEST_ZERO");
    }
}
