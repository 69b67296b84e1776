//! Closed spans of measured activity.

use chrono::{DateTime, Utc};

use crate::types::ProjectKey;

/// Why an active slice ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CloseReason {
    /// No activity for the idle threshold.
    Idle,
    /// The host window lost focus.
    FocusLost,
    /// The workspace now maps to a different project.
    ProjectSwitch,
    /// The tracker is shutting down.
    Shutdown,
    /// The local calendar date advanced.
    DayRollover,
}

impl CloseReason {
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::FocusLost => "focus_lost",
            Self::ProjectSwitch => "project_switch",
            Self::Shutdown => "shutdown",
            Self::DayRollover => "day_rollover",
        }
    }
}

impl std::fmt::Display for CloseReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One contiguous span of measured activity for a single project.
///
/// Produced when an active period ends; `ended_at >= started_at` always holds.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TimeSlice {
    pub project: ProjectKey,
    pub started_at: DateTime<Utc>,
    pub ended_at: DateTime<Utc>,
    pub reason: CloseReason,
}

impl TimeSlice {
    /// Builds a slice, clamping an end that precedes the start.
    pub(crate) fn close(
        project: ProjectKey,
        started_at: DateTime<Utc>,
        ended_at: DateTime<Utc>,
        reason: CloseReason,
    ) -> Self {
        Self {
            project,
            started_at,
            ended_at: ended_at.max(started_at),
            reason,
        }
    }

    pub fn duration_ms(&self) -> i64 {
        (self.ended_at - self.started_at).num_milliseconds()
    }

    pub fn is_empty(&self) -> bool {
        self.ended_at == self.started_at
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn at(ms: i64) -> DateTime<Utc> {
        DateTime::from_timestamp_millis(ms).unwrap()
    }

    #[test]
    fn close_never_ends_before_start() {
        let slice = TimeSlice::close(ProjectKey::Unassigned, at(5_000), at(1_000), CloseReason::Idle);
        assert_eq!(slice.ended_at, at(5_000));
        assert_eq!(slice.duration_ms(), 0);
        assert!(slice.is_empty());
    }

    #[test]
    fn duration_is_end_minus_start() {
        let slice = TimeSlice::close(
            ProjectKey::Unassigned,
            at(1_000),
            at(61_000),
            CloseReason::Shutdown,
        );
        assert_eq!(slice.duration_ms(), 60_000);
        assert_eq!(slice.reason.to_string(), "shutdown");
    }
}
