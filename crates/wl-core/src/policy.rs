//! Tunable timing policy for the tracker.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Invalid combinations of policy values.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum PolicyError {
    #[error("{field} must be positive, got {value}")]
    NotPositive { field: &'static str, value: i64 },

    /// The idle watcher would poll too rarely to honour the threshold.
    #[error("idle_poll_ms ({poll}) must be at most half of idle_threshold_ms ({threshold})")]
    IdlePollTooSlow { poll: i64, threshold: i64 },
}

/// Timing constants for idle detection and synchronization.
///
/// All values are milliseconds.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TrackerPolicy {
    /// Inactivity after which the open slice is closed.
    /// Default: 120000 (2 minutes).
    pub idle_threshold_ms: i64,

    /// How often the idle watcher runs.
    /// Default: 30000 (30 seconds).
    pub idle_poll_ms: i64,

    /// Heartbeat interval of the sync scheduler.
    /// Default: 60000 (1 minute).
    pub heartbeat_ms: i64,

    /// Unsynced time below this is not worth a remote write.
    /// Default: 10000 (10 seconds).
    pub min_sync_ms: i64,

    /// How often the day-boundary watcher checks the local date.
    /// Default: 60000 (1 minute).
    pub day_poll_ms: i64,

    /// Activity events closer together than this are collapsed.
    /// Default: 1000 (1 second).
    pub debounce_ms: i64,
}

impl Default for TrackerPolicy {
    fn default() -> Self {
        Self {
            idle_threshold_ms: 120_000, // 2 minutes
            idle_poll_ms: 30_000,       // 30 seconds
            heartbeat_ms: 60_000,       // 1 minute
            min_sync_ms: 10_000,        // 10 seconds
            day_poll_ms: 60_000,        // 1 minute
            debounce_ms: 1_000,         // 1 second
        }
    }
}

impl TrackerPolicy {
    /// Checks that every interval is usable.
    pub fn validate(&self) -> Result<(), PolicyError> {
        for (field, value) in [
            ("idle_threshold_ms", self.idle_threshold_ms),
            ("idle_poll_ms", self.idle_poll_ms),
            ("heartbeat_ms", self.heartbeat_ms),
            ("day_poll_ms", self.day_poll_ms),
        ] {
            if value <= 0 {
                return Err(PolicyError::NotPositive { field, value });
            }
        }
        if self.min_sync_ms < 0 {
            return Err(PolicyError::NotPositive {
                field: "min_sync_ms",
                value: self.min_sync_ms,
            });
        }
        if self.idle_poll_ms * 2 > self.idle_threshold_ms {
            return Err(PolicyError::IdlePollTooSlow {
                poll: self.idle_poll_ms,
                threshold: self.idle_threshold_ms,
            });
        }
        Ok(())
    }

    pub fn heartbeat(&self) -> Duration {
        millis(self.heartbeat_ms)
    }

    pub fn idle_poll(&self) -> Duration {
        millis(self.idle_poll_ms)
    }

    pub fn day_poll(&self) -> Duration {
        millis(self.day_poll_ms)
    }
}

fn millis(ms: i64) -> Duration {
    Duration::from_millis(u64::try_from(ms).unwrap_or(0))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_policy_is_valid() {
        let policy = TrackerPolicy::default();
        assert_eq!(policy.validate(), Ok(()));
        assert_eq!(policy.heartbeat(), Duration::from_secs(60));
    }

    #[test]
    fn idle_poll_must_be_at_most_half_the_threshold() {
        let policy = TrackerPolicy {
            idle_threshold_ms: 60_000,
            idle_poll_ms: 45_000,
            ..TrackerPolicy::default()
        };
        assert_eq!(
            policy.validate(),
            Err(PolicyError::IdlePollTooSlow {
                poll: 45_000,
                threshold: 60_000
            })
        );
    }

    #[test]
    fn zero_heartbeat_is_rejected() {
        let policy = TrackerPolicy {
            heartbeat_ms: 0,
            ..TrackerPolicy::default()
        };
        assert!(matches!(
            policy.validate(),
            Err(PolicyError::NotPositive {
                field: "heartbeat_ms",
                ..
            })
        ));
    }

    #[test]
    fn partial_config_keeps_defaults() {
        let policy: TrackerPolicy = serde_json::from_str(r#"{"idle_threshold_ms": 300000}"#).unwrap();
        assert_eq!(policy.idle_threshold_ms, 300_000);
        assert_eq!(policy.heartbeat_ms, 60_000);
    }
}
