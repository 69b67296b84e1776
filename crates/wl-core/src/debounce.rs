//! Collapses bursts of activity signals at the ingestion boundary.

use chrono::{DateTime, Utc};

/// Lets through at most one activity signal per window.
///
/// Editors emit a signal per keystroke or cursor move; the engine only needs
/// to know that activity happened recently.
#[derive(Debug, Clone)]
pub struct ActivityDebouncer {
    window_ms: i64,
    last_accepted: Option<DateTime<Utc>>,
}

impl ActivityDebouncer {
    pub const fn new(window_ms: i64) -> Self {
        Self {
            window_ms,
            last_accepted: None,
        }
    }

    /// Returns `true` if the signal at `now` should reach the engine.
    pub fn accept(&mut self, now: DateTime<Utc>) -> bool {
        let within_window = self
            .last_accepted
            .is_some_and(|last| (now - last).num_milliseconds() < self.window_ms);
        if within_window {
            return false;
        }
        self.last_accepted = Some(now);
        true
    }

    /// Forgets the last accepted signal, so the next one always passes.
    ///
    /// Used after focus changes, where the first keystroke must reopen a slice.
    pub fn reset(&mut self) {
        self.last_accepted = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn at(ms: i64) -> DateTime<Utc> {
        DateTime::from_timestamp_millis(ms).unwrap()
    }

    #[test]
    fn burst_collapses_to_one_signal() {
        let mut debouncer = ActivityDebouncer::new(1_000);
        let accepted = [0, 100, 200, 999]
            .into_iter()
            .filter(|&ms| debouncer.accept(at(ms)))
            .count();
        assert_eq!(accepted, 1);
    }

    #[test]
    fn signal_after_window_passes() {
        let mut debouncer = ActivityDebouncer::new(1_000);
        assert!(debouncer.accept(at(0)));
        assert!(!debouncer.accept(at(500)));
        assert!(debouncer.accept(at(1_000)));
    }

    #[test]
    fn reset_lets_next_signal_through() {
        let mut debouncer = ActivityDebouncer::new(1_000);
        assert!(debouncer.accept(at(0)));
        debouncer.reset();
        assert!(debouncer.accept(at(10)));
    }
}
