//! Configuration scoped to the reporting orchestrator (C7), narrower
//! than [`crate::config::GhillieConfig`] but assembled from it so the
//! window/retry knobs are read from the environment in one place.

use std::path::PathBuf;

use crate::config::GhillieConfig;

/// Knobs `ReportingService` needs, with the concurrency bound
/// `GhillieConfig` doesn't carry.
#[derive(Debug, Clone)]
pub struct ReportingConfig {
    pub window_days: i64,
    pub validation_max_attempts: u32,
    pub max_concurrent_reports: usize,
    pub sink_path: Option<PathBuf>,
}

impl ReportingConfig {
    /// Load from the environment via [`GhillieConfig::from_env`], plus
    /// `GHILLIE_MAX_CONCURRENT_REPORTS` (positive `usize`, default 10).
    pub fn from_env() -> Self {
        Self::from_ghillie_config(&GhillieConfig::from_env())
    }

    pub fn from_ghillie_config(config: &GhillieConfig) -> Self {
        Self {
            window_days: config.reporting_window_days as i64,
            validation_max_attempts: config.validation_max_attempts,
            max_concurrent_reports: parse_positive_usize("GHILLIE_MAX_CONCURRENT_REPORTS", 10),
            sink_path: config.report_sink_path.clone(),
        }
    }
}

fn parse_positive_usize(var: &str, default: usize) -> usize {
    std::env::var(var)
        .ok()
        .and_then(|s| s.parse::<usize>().ok())
        .filter(|v| *v > 0)
        .unwrap_or(default)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_without_env() {
        assert_eq!(parse_positive_usize("GHILLIE_DOES_NOT_EXIST", 10), 10);
    }

    #[test]
    fn rejects_zero() {
        std::env::set_var("GHILLIE_TEST_CONCURRENCY_ZERO", "0");
        assert_eq!(parse_positive_usize("GHILLIE_TEST_CONCURRENCY_ZERO", 10), 10);
        std::env::remove_var("GHILLIE_TEST_CONCURRENCY_ZERO");
    }

    #[test]
    fn derives_window_and_attempts_from_ghillie_config() {
        let base = GhillieConfig {
            reporting_window_days: 14,
            report_sink_path: None,
            validation_max_attempts: 3,
            allow_stub_broker: false,
        };
        let config = ReportingConfig::from_ghillie_config(&base);
        assert_eq!(config.window_days, 14);
        assert_eq!(config.validation_max_attempts, 3);
    }
}
