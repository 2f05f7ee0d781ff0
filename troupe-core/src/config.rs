//! Configuration types

use crate::{ConfigError, TroupeError, TroupeResult};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Default per-agent concurrent task bound.
pub const DEFAULT_MAX_CONCURRENT_TASKS: usize = 3;
/// Default staleness bound for an active task, in seconds.
pub const DEFAULT_MAX_TASK_DURATION_SECS: u64 = 300;
/// Default per-agent memory capacity (entries).
pub const DEFAULT_MEMORY_SIZE: usize = 100;
/// Default worker pool size for task execution.
pub const DEFAULT_WORKER_THREADS: usize = 4;
/// Default dequeue timeout for one dispatcher cycle, in milliseconds.
pub const DEFAULT_DISPATCH_INTERVAL_MS: u64 = 1_000;
/// Default back-off after a dispatch cycle that found no capable agent, in milliseconds.
pub const DEFAULT_DISPATCH_BACKOFF_MS: u64 = 5_000;
/// Default health monitor interval, in seconds.
pub const DEFAULT_MONITOR_INTERVAL_SECS: u64 = 30;
/// Default message bus history cap.
pub const DEFAULT_MESSAGE_HISTORY_LIMIT: usize = 10_000;
/// Default window within which an agent counts as recently active, in seconds.
pub const DEFAULT_ACTIVITY_WINDOW_SECS: u64 = 300;

/// Master configuration for the orchestration runtime.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TroupeConfig {
    /// How many tasks a single agent may hold concurrently
    pub max_concurrent_tasks: usize,
    /// How long an active task may run before the agent counts as unhealthy
    pub max_task_duration: Duration,
    /// Per-agent memory capacity in entries
    pub memory_size: usize,
    /// When set, `think` returns a fixed placeholder instead of calling the
    /// reasoning provider; used for deterministic testing
    pub stub_responses: bool,

    /// Worker pool size for executing dispatched tasks
    pub worker_threads: usize,
    /// Dequeue timeout for one dispatcher cycle
    pub dispatch_interval: Duration,
    /// Back-off after a cycle that found no capable agent
    pub dispatch_backoff: Duration,
    /// How often the health monitor sweeps registered agents
    pub monitor_interval: Duration,

    /// Message bus history cap (oldest trimmed first)
    pub message_history_limit: usize,
    /// Window within which an agent counts as recently active
    pub activity_window: Duration,
}

impl Default for TroupeConfig {
    fn default() -> Self {
        Self {
            max_concurrent_tasks: DEFAULT_MAX_CONCURRENT_TASKS,
            max_task_duration: Duration::from_secs(DEFAULT_MAX_TASK_DURATION_SECS),
            memory_size: DEFAULT_MEMORY_SIZE,
            stub_responses: false,
            worker_threads: DEFAULT_WORKER_THREADS,
            dispatch_interval: Duration::from_millis(DEFAULT_DISPATCH_INTERVAL_MS),
            dispatch_backoff: Duration::from_millis(DEFAULT_DISPATCH_BACKOFF_MS),
            monitor_interval: Duration::from_secs(DEFAULT_MONITOR_INTERVAL_SECS),
            message_history_limit: DEFAULT_MESSAGE_HISTORY_LIMIT,
            activity_window: Duration::from_secs(DEFAULT_ACTIVITY_WINDOW_SECS),
        }
    }
}

impl TroupeConfig {
    /// Create a configuration from environment variables, falling back to
    /// defaults for anything unset or unparsable.
    ///
    /// Environment variables:
    /// - `TROUPE_MAX_CONCURRENT_TASKS`: per-agent concurrency bound (default: 3)
    /// - `TROUPE_MAX_TASK_DURATION_SECS`: task staleness bound (default: 300)
    /// - `TROUPE_MEMORY_SIZE`: per-agent memory capacity (default: 100)
    /// - `TROUPE_STUB_RESPONSES`: use placeholder reasoning responses (default: false)
    /// - `TROUPE_WORKER_THREADS`: worker pool size (default: 4)
    /// - `TROUPE_DISPATCH_INTERVAL_MS`: dispatcher dequeue timeout (default: 1000)
    /// - `TROUPE_DISPATCH_BACKOFF_MS`: no-agent back-off (default: 5000)
    /// - `TROUPE_MONITOR_INTERVAL_SECS`: health monitor interval (default: 30)
    /// - `TROUPE_MESSAGE_HISTORY_LIMIT`: bus history cap (default: 10000)
    /// - `TROUPE_ACTIVITY_WINDOW_SECS`: recent-activity window (default: 300)
    pub fn from_env() -> Self {
        let defaults = Self::default();

        fn env_parse<T: std::str::FromStr>(key: &str, fallback: T) -> T {
            std::env::var(key)
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(fallback)
        }

        Self {
            max_concurrent_tasks: env_parse(
                "TROUPE_MAX_CONCURRENT_TASKS",
                defaults.max_concurrent_tasks,
            ),
            max_task_duration: Duration::from_secs(env_parse(
                "TROUPE_MAX_TASK_DURATION_SECS",
                defaults.max_task_duration.as_secs(),
            )),
            memory_size: env_parse("TROUPE_MEMORY_SIZE", defaults.memory_size),
            stub_responses: std::env::var("TROUPE_STUB_RESPONSES")
                .ok()
                .map(|s| s.to_lowercase() == "true" || s == "1")
                .unwrap_or(false),
            worker_threads: env_parse("TROUPE_WORKER_THREADS", defaults.worker_threads),
            dispatch_interval: Duration::from_millis(env_parse(
                "TROUPE_DISPATCH_INTERVAL_MS",
                defaults.dispatch_interval.as_millis() as u64,
            )),
            dispatch_backoff: Duration::from_millis(env_parse(
                "TROUPE_DISPATCH_BACKOFF_MS",
                defaults.dispatch_backoff.as_millis() as u64,
            )),
            monitor_interval: Duration::from_secs(env_parse(
                "TROUPE_MONITOR_INTERVAL_SECS",
                defaults.monitor_interval.as_secs(),
            )),
            message_history_limit: env_parse(
                "TROUPE_MESSAGE_HISTORY_LIMIT",
                defaults.message_history_limit,
            ),
            activity_window: Duration::from_secs(env_parse(
                "TROUPE_ACTIVITY_WINDOW_SECS",
                defaults.activity_window.as_secs(),
            )),
        }
    }

    /// Configuration for development and testing: stubbed reasoning and
    /// short intervals so tests converge quickly.
    pub fn development() -> Self {
        Self {
            stub_responses: true,
            worker_threads: 2,
            dispatch_interval: Duration::from_millis(50),
            dispatch_backoff: Duration::from_millis(100),
            monitor_interval: Duration::from_millis(500),
            ..Self::default()
        }
    }

    /// Validate the configuration.
    /// Returns Ok(()) if valid, Err(TroupeError::Config) if invalid.
    pub fn validate(&self) -> TroupeResult<()> {
        if self.max_concurrent_tasks == 0 {
            return Err(TroupeError::Config(ConfigError::InvalidValue {
                field: "max_concurrent_tasks".to_string(),
                value: self.max_concurrent_tasks.to_string(),
                reason: "must be at least 1".to_string(),
            }));
        }

        if self.memory_size == 0 {
            return Err(TroupeError::Config(ConfigError::InvalidValue {
                field: "memory_size".to_string(),
                value: self.memory_size.to_string(),
                reason: "must be at least 1".to_string(),
            }));
        }

        if self.worker_threads == 0 {
            return Err(TroupeError::Config(ConfigError::InvalidValue {
                field: "worker_threads".to_string(),
                value: self.worker_threads.to_string(),
                reason: "must be at least 1".to_string(),
            }));
        }

        if self.max_task_duration.is_zero() {
            return Err(TroupeError::Config(ConfigError::InvalidValue {
                field: "max_task_duration".to_string(),
                value: format!("{:?}", self.max_task_duration),
                reason: "must be positive".to_string(),
            }));
        }

        if self.dispatch_interval.is_zero() {
            return Err(TroupeError::Config(ConfigError::InvalidValue {
                field: "dispatch_interval".to_string(),
                value: format!("{:?}", self.dispatch_interval),
                reason: "must be positive".to_string(),
            }));
        }

        if self.monitor_interval.is_zero() {
            return Err(TroupeError::Config(ConfigError::InvalidValue {
                field: "monitor_interval".to_string(),
                value: format!("{:?}", self.monitor_interval),
                reason: "must be positive".to_string(),
            }));
        }

        if self.message_history_limit == 0 {
            return Err(TroupeError::Config(ConfigError::InvalidValue {
                field: "message_history_limit".to_string(),
                value: self.message_history_limit.to_string(),
                reason: "must be at least 1".to_string(),
            }));
        }

        Ok(())
    }
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        assert!(TroupeConfig::default().validate().is_ok());
    }

    #[test]
    fn test_development_config_is_valid_and_stubbed() {
        let config = TroupeConfig::development();
        assert!(config.validate().is_ok());
        assert!(config.stub_responses);
        assert!(config.dispatch_interval < Duration::from_secs(1));
    }

    #[test]
    fn test_validate_rejects_zero_workers() {
        let config = TroupeConfig {
            worker_threads: 0,
            ..TroupeConfig::default()
        };
        let err = config.validate().unwrap_err();
        assert!(format!("{}", err).contains("worker_threads"));
    }

    #[test]
    fn test_validate_rejects_zero_memory() {
        let config = TroupeConfig {
            memory_size: 0,
            ..TroupeConfig::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_rejects_zero_task_duration() {
        let config = TroupeConfig {
            max_task_duration: Duration::ZERO,
            ..TroupeConfig::default()
        };
        assert!(config.validate().is_err());
    }
}
