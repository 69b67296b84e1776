//! Live accounting state for one tracker process.
//!
//! A [`Session`] is a pure state machine: every method takes the current
//! instant and, where attribution matters, the freshly resolved project key.
//! It never talks to the ledger; slices it closes are handed back to the
//! caller for the final remote write.
//!
//! # States
//!
//! - **Active**: a slice is open for exactly one project.
//! - **Idle**: no slice is open (inactive, unfocused, or not yet touched).
//!
//! Focus alone never opens a slice. Activity opens one only while the host is
//! focused. Idle timeout, focus loss, project switch, day rollover and
//! shutdown close it.

use std::collections::{BTreeMap, HashMap};

use chrono::{DateTime, NaiveDate, Utc};

use crate::format::format_duration;
use crate::slice::{CloseReason, TimeSlice};
use crate::types::ProjectKey;

/// The currently open slice.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActiveSlice {
    pub project: ProjectKey,
    /// True start of the slice; the remote entry starts here.
    pub started_at: DateTime<Utc>,
    /// Start of the time not yet folded into the accumulated totals.
    /// Reconciliation moves this forward when the remote baseline already
    /// covers the elapsed part.
    pub counted_from: DateTime<Utc>,
    /// Last successful remote write for this slice.
    pub synced_at: Option<DateTime<Utc>>,
}

impl ActiveSlice {
    fn open(project: ProjectKey, now: DateTime<Utc>) -> Self {
        Self {
            project,
            started_at: now,
            counted_from: now,
            synced_at: None,
        }
    }

    fn uncounted_ms(&self, now: DateTime<Utc>) -> i64 {
        (now - self.counted_from).num_milliseconds().max(0)
    }
}

/// Human-readable accounting snapshot for the presentation sink.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatusSummary {
    pub project: ProjectKey,
    pub total_ms: i64,
    pub active: bool,
    pub text: String,
}

#[derive(Debug, Clone)]
pub struct Session {
    session_start: DateTime<Utc>,
    current_project: ProjectKey,
    accumulated: HashMap<ProjectKey, i64>,
    active: Option<ActiveSlice>,
    last_activity_at: DateTime<Utc>,
    focused: bool,
    /// Local date the totals belong to.
    day: Option<NaiveDate>,
    /// Local date of the last successful reconciliation.
    reconciled_day: Option<NaiveDate>,
}

impl Session {
    /// Starts a session. A focused host begins active.
    pub fn new(now: DateTime<Utc>, focused: bool, project: ProjectKey) -> Self {
        let active = focused.then(|| ActiveSlice::open(project.clone(), now));
        Self {
            session_start: now,
            current_project: project,
            accumulated: HashMap::new(),
            active,
            last_activity_at: now,
            focused,
            day: None,
            reconciled_day: None,
        }
    }

    pub const fn session_start(&self) -> DateTime<Utc> {
        self.session_start
    }

    pub const fn current_project(&self) -> &ProjectKey {
        &self.current_project
    }

    pub const fn active_slice(&self) -> Option<&ActiveSlice> {
        self.active.as_ref()
    }

    pub const fn is_active(&self) -> bool {
        self.active.is_some()
    }

    pub const fn is_focused(&self) -> bool {
        self.focused
    }

    pub const fn last_activity_at(&self) -> DateTime<Utc> {
        self.last_activity_at
    }

    pub const fn day(&self) -> Option<NaiveDate> {
        self.day
    }

    pub const fn reconciled_day(&self) -> Option<NaiveDate> {
        self.reconciled_day
    }

    /// Records an activity signal.
    ///
    /// Opens a slice when idle and focused. When active under a different
    /// project than `project`, the slice is split at `now`.
    pub fn on_activity(&mut self, now: DateTime<Utc>, project: ProjectKey) -> Option<TimeSlice> {
        self.last_activity_at = now;
        if self.active.is_some() {
            return self.switch_project(now, project);
        }
        self.current_project = project;
        if self.focused {
            self.active = Some(ActiveSlice::open(self.current_project.clone(), now));
        }
        None
    }

    /// Applies a focus transition. Losing focus closes the open slice;
    /// gaining focus only updates attribution, splitting a slice that is
    /// still open under another project.
    pub fn on_focus_changed(
        &mut self,
        now: DateTime<Utc>,
        focused: bool,
        project: ProjectKey,
    ) -> Option<TimeSlice> {
        self.focused = focused;
        if focused {
            return self.switch_project(now, project);
        }
        let closed = self.close(now, CloseReason::FocusLost);
        self.current_project = project;
        closed
    }

    /// Attributes time from `now` on to `project`.
    ///
    /// Returns the old slice when the open slice belonged to another project.
    /// The new slice opens at exactly the instant the old one closes.
    pub fn switch_project(&mut self, now: DateTime<Utc>, project: ProjectKey) -> Option<TimeSlice> {
        let unchanged = self
            .active
            .as_ref()
            .is_none_or(|slice| slice.project == project);
        self.current_project = project;
        if unchanged {
            return None;
        }
        let closed = self.close(now, CloseReason::ProjectSwitch);
        self.active = Some(ActiveSlice::open(self.current_project.clone(), now));
        closed
    }

    /// Idle watcher step: closes the slice once `idle_threshold_ms` passed
    /// without activity.
    pub fn check_idle(&mut self, now: DateTime<Utc>, idle_threshold_ms: i64) -> Option<TimeSlice> {
        self.active.as_ref()?;
        let quiet_ms = (now - self.last_activity_at).num_milliseconds();
        if quiet_ms < idle_threshold_ms {
            return None;
        }
        self.close(now, CloseReason::Idle)
    }

    /// Closes the open slice, folding its uncounted time into the totals.
    pub fn close(&mut self, now: DateTime<Utc>, reason: CloseReason) -> Option<TimeSlice> {
        let slice = self.active.take()?;
        *self.accumulated.entry(slice.project.clone()).or_insert(0) += slice.uncounted_ms(now);
        Some(TimeSlice::close(slice.project, slice.started_at, now, reason))
    }

    /// Starts a new accounting day when `date` is past the current one.
    ///
    /// The first call only records `date`. Later, totals are cleared and an
    /// open slice is split at `now` so that no slice spans two days. Returns
    /// the closed half, if any.
    pub fn roll_day(&mut self, now: DateTime<Utc>, date: NaiveDate) -> Option<TimeSlice> {
        match self.day {
            None => {
                self.day = Some(date);
                return None;
            }
            Some(day) if day == date => return None,
            Some(_) => {}
        }
        let closed = self.close(now, CloseReason::DayRollover);
        if let Some(slice) = &closed {
            self.active = Some(ActiveSlice::open(slice.project.clone(), now));
        }
        self.accumulated.clear();
        self.day = Some(date);
        closed
    }

    /// Replaces local totals with remote ones that are at least as large.
    ///
    /// A total is never lowered, so a stale fetch cannot erase time that was
    /// measured locally and not yet synced. When the open slice's project is
    /// replaced, its uncounted time restarts at `now`.
    pub fn apply_remote_totals(
        &mut self,
        now: DateTime<Utc>,
        date: NaiveDate,
        remote: &HashMap<ProjectKey, i64>,
    ) {
        for (key, &remote_ms) in remote {
            if remote_ms < self.total_ms(key, now) {
                continue;
            }
            self.accumulated.insert(key.clone(), remote_ms);
            if let Some(slice) = self.active.as_mut().filter(|s| &s.project == key) {
                slice.counted_from = now;
            }
        }
        self.day = Some(date);
        self.reconciled_day = Some(date);
    }

    /// Sets the baseline for a project, or the current one when `None`.
    pub fn set_initial_accumulated(&mut self, ms: i64, project: Option<ProjectKey>) {
        let key = project.unwrap_or_else(|| self.current_project.clone());
        self.accumulated.insert(key, ms.max(0));
    }

    /// Records a successful remote write for the slice that started at
    /// `started_at`. Ignored if that slice is no longer open.
    pub fn mark_synced(&mut self, started_at: DateTime<Utc>, now: DateTime<Utc>) {
        if let Some(slice) = self.active.as_mut().filter(|s| s.started_at == started_at) {
            slice.synced_at = Some(now);
        }
    }

    /// Open-slice time not yet written to the ledger.
    pub fn unsynced_ms(&self, now: DateTime<Utc>) -> Option<i64> {
        self.active.as_ref().map(|slice| {
            let since = slice.synced_at.unwrap_or(slice.started_at);
            (now - since).num_milliseconds().max(0)
        })
    }

    /// Total for `key`, including the open slice when it belongs to `key`.
    pub fn total_ms(&self, key: &ProjectKey, now: DateTime<Utc>) -> i64 {
        let base = self.accumulated.get(key).copied().unwrap_or(0);
        let open = self
            .active
            .as_ref()
            .filter(|slice| &slice.project == key)
            .map_or(0, |slice| slice.uncounted_ms(now));
        base + open
    }

    /// Totals for every known project, ordered by key.
    pub fn totals(&self, now: DateTime<Utc>) -> BTreeMap<ProjectKey, i64> {
        let mut keys: Vec<&ProjectKey> = self.accumulated.keys().collect();
        if let Some(slice) = &self.active {
            keys.push(&slice.project);
        }
        keys.into_iter()
            .map(|key| (key.clone(), self.total_ms(key, now)))
            .collect()
    }

    pub fn summary(&self, now: DateTime<Utc>) -> StatusSummary {
        let total_ms = self.total_ms(&self.current_project, now);
        StatusSummary {
            project: self.current_project.clone(),
            total_ms,
            active: self.is_active(),
            text: format_duration(total_ms),
        }
    }
}
