//! Unified health check types
//!
//! Health reports are produced per-agent by the runtime and aggregated by
//! the manager's monitor loop for consistent reporting.

use crate::Timestamp;
use serde::{Deserialize, Serialize};

/// Health status for a component or the system as a whole.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HealthStatus {
    /// Fully operational
    Healthy,
    /// Operational but degraded
    Degraded,
    /// Not operational
    Unhealthy,
}

/// Health report for a single agent.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AgentHealth {
    /// Agent name
    pub agent: String,
    /// Memory usage is below the 90% watermark
    pub memory_ok: bool,
    /// Current memory usage percentage
    pub memory_usage_pct: f64,
    /// No active task has been running longer than the staleness bound
    pub no_stale_tasks: bool,
    /// The agent showed activity within the recent-activity window
    pub last_activity_recent: bool,
    /// Last recorded activity timestamp
    pub last_activity: Timestamp,
    /// All checks passed
    pub healthy: bool,
}

impl AgentHealth {
    /// Collapse the report into a status.
    /// A stale task or exhausted memory degrades the agent; only an agent
    /// failing every check is unhealthy.
    pub fn status(&self) -> HealthStatus {
        if self.healthy {
            HealthStatus::Healthy
        } else if self.memory_ok || self.no_stale_tasks || self.last_activity_recent {
            HealthStatus::Degraded
        } else {
            HealthStatus::Unhealthy
        }
    }
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn report(memory_ok: bool, no_stale: bool, recent: bool) -> AgentHealth {
        AgentHealth {
            agent: "atlas".to_string(),
            memory_ok,
            memory_usage_pct: 10.0,
            no_stale_tasks: no_stale,
            last_activity_recent: recent,
            last_activity: Utc::now(),
            healthy: memory_ok && no_stale && recent,
        }
    }

    #[test]
    fn test_all_checks_passing_is_healthy() {
        assert_eq!(report(true, true, true).status(), HealthStatus::Healthy);
    }

    #[test]
    fn test_partial_failure_is_degraded() {
        assert_eq!(report(true, true, false).status(), HealthStatus::Degraded);
        assert_eq!(report(false, true, true).status(), HealthStatus::Degraded);
    }

    #[test]
    fn test_total_failure_is_unhealthy() {
        assert_eq!(report(false, false, false).status(), HealthStatus::Unhealthy);
    }
}
