// src/config.rs
// =============================================================================
// Crawl configuration.
//
// One struct carries every knob the engine reads: worker pool sizing, the
// fetcher's timeouts and the session deadline. The CLI fills it from flags;
// library users start from `CrawlConfig::default()` and override fields.
// =============================================================================

use std::time::Duration;

use crate::error::ConfigError;

/// Warm workers kept alive between bursts
pub const DEFAULT_CORE_WORKERS: usize = 5;
/// Burst ceiling: never more fetches than this at once
pub const DEFAULT_MAX_WORKERS: usize = 8;

pub const DEFAULT_KEEP_ALIVE: Duration = Duration::from_secs(1);
pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(5);
pub const DEFAULT_READ_TIMEOUT: Duration = Duration::from_secs(5);
/// Hard cap on one root crawl, measured from `start`
pub const DEFAULT_MAX_DURATION: Duration = Duration::from_secs(60);

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CrawlConfig {
    pub core_workers: usize,
    pub max_workers: usize,
    /// How long a worker above `core_workers` may sit idle before it exits
    pub keep_alive: Duration,
    pub connect_timeout: Duration,
    pub read_timeout: Duration,
    pub max_duration: Duration,
    /// Sent as User-Agent when set; by default requests carry no custom headers
    pub user_agent: Option<String>,
}

impl Default for CrawlConfig {
    fn default() -> Self {
        Self {
            core_workers: DEFAULT_CORE_WORKERS,
            max_workers: DEFAULT_MAX_WORKERS,
            keep_alive: DEFAULT_KEEP_ALIVE,
            connect_timeout: DEFAULT_CONNECT_TIMEOUT,
            read_timeout: DEFAULT_READ_TIMEOUT,
            max_duration: DEFAULT_MAX_DURATION,
            user_agent: None,
        }
    }
}

impl CrawlConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.max_workers == 0 {
            return Err(ConfigError::NoWorkers);
        }
        if self.core_workers > self.max_workers {
            return Err(ConfigError::CoreAboveMax {
                core: self.core_workers,
                max: self.max_workers,
            });
        }

        let durations = [
            ("keep_alive", self.keep_alive),
            ("connect_timeout", self.connect_timeout),
            ("read_timeout", self.read_timeout),
            ("max_duration", self.max_duration),
        ];
        for (name, value) in durations {
            if value.is_zero() {
                return Err(ConfigError::ZeroDuration(name));
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_is_valid() {
        let config = CrawlConfig::default();
        assert_eq!(config.core_workers, 5);
        assert_eq!(config.max_workers, 8);
        assert_eq!(config.max_duration, Duration::from_secs(60));
        assert_eq!(config.user_agent, None);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_rejects_zero_workers() {
        let config = CrawlConfig {
            core_workers: 0,
            max_workers: 0,
            ..CrawlConfig::default()
        };
        assert_eq!(config.validate(), Err(ConfigError::NoWorkers));
    }

    #[test]
    fn test_rejects_core_above_max() {
        let config = CrawlConfig {
            core_workers: 9,
            ..CrawlConfig::default()
        };
        assert_eq!(
            config.validate(),
            Err(ConfigError::CoreAboveMax { core: 9, max: 8 })
        );
    }

    #[test]
    fn test_rejects_zero_deadline() {
        let config = CrawlConfig {
            max_duration: Duration::ZERO,
            ..CrawlConfig::default()
        };
        assert_eq!(
            config.validate(),
            Err(ConfigError::ZeroDuration("max_duration"))
        );
    }
}
