//! Drives a [`Session`] against the remote ledger.
//!
//! The [`Tracker`] is the handle the host talks to. Event methods
//! (`on_activity`, `on_focus_changed`, idle and day checks) are synchronous
//! and only touch local state; they return a [`Followup`] telling the caller
//! which asynchronous step to run next. Asynchronous methods talk to the
//! ledger.
//!
//! # Remote writes
//!
//! Every open slice is mirrored by one remote entry: the first write creates
//! it, later writes extend its end. Closed slices are queued and written by
//! the next flush before the open slice is handled, so a close always clears
//! the binding it belongs to before a new slice for the same project can
//! bind again.
//!
//! # Concurrency
//!
//! At most one flush runs at a time. A flush that finds another in flight is
//! dropped, never queued. Session state sits behind a mutex that is never
//! held across an `.await`, so activity keeps being recorded while a write is
//! suspended.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};

use chrono::{DateTime, Utc};
use tracing::{debug, info, warn};

use crate::ledger::{EntryPatch, Ledger, LedgerError, NewEntry};
use crate::policy::TrackerPolicy;
use crate::reconcile::{DayWindow, totals_by_project};
use crate::session::{Session, StatusSummary};
use crate::slice::{CloseReason, TimeSlice};
use crate::types::{EntryId, MemberId, ProjectId, ProjectKey};

/// Receives human-readable summaries. Must not block.
pub trait StatusSink: Send + Sync {
    fn publish(&self, summary: &StatusSummary);
}

/// Maps the host's current workspace to a project key.
///
/// Called at every attribution point, so implementations should re-read
/// their backing store rather than cache.
pub trait ProjectResolver: Send + Sync {
    fn resolve(&self) -> ProjectKey;
}

/// Fixed fields stamped on every created entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EntryTemplate {
    pub description: String,
    pub billable: bool,
    pub tags: Vec<String>,
}

impl Default for EntryTemplate {
    fn default() -> Self {
        Self {
            description: "Coding".to_string(),
            billable: false,
            tags: Vec::new(),
        }
    }
}

/// Why a flush did not write the open slice.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    /// No slice is open.
    Idle,
    /// Another flush is still waiting on the ledger.
    InFlight,
    /// Too little unsynced time to be worth a write.
    BelowGranularity,
}

/// Result of one flush, as seen for the open slice.
#[derive(Debug)]
pub enum SyncOutcome {
    Created(EntryId),
    Updated(EntryId),
    Skipped(SkipReason),
    /// The ledger call failed; local state is unchanged.
    Failed(LedgerError),
}

/// Asynchronous step the caller should run after an event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Followup {
    None,
    /// A slice closed; flush so its remote entry gets its real end.
    Flush,
    /// Fetch today's remote totals.
    Reconcile,
    /// Flush the closed slice, then reconcile.
    FlushThenReconcile,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SyncMode {
    Heartbeat,
    Forced,
}

/// The remote entry mirroring an open slice.
#[derive(Debug, Clone)]
struct EntryBinding {
    entry_id: EntryId,
    /// Start of the slice the entry was created for.
    started_at: DateTime<Utc>,
}

/// Marks a flush as running; cleared on drop.
struct InFlight<'a>(&'a AtomicBool);

impl<'a> InFlight<'a> {
    fn acquire(flag: &'a AtomicBool) -> Option<Self> {
        flag.compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| Self(flag))
    }
}

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Session accounting engine bound to a ledger.
pub struct Tracker<L> {
    ledger: L,
    resolver: Box<dyn ProjectResolver>,
    sink: Box<dyn StatusSink>,
    policy: TrackerPolicy,
    template: EntryTemplate,
    session: Mutex<Session>,
    closed: Mutex<Vec<TimeSlice>>,
    bindings: Mutex<HashMap<ProjectKey, EntryBinding>>,
    member: Mutex<Option<MemberId>>,
    in_flight: AtomicBool,
}

impl<L: Ledger> Tracker<L> {
    /// Creates a tracker whose session starts at `now`.
    pub fn new(
        ledger: L,
        resolver: Box<dyn ProjectResolver>,
        sink: Box<dyn StatusSink>,
        policy: TrackerPolicy,
        now: DateTime<Utc>,
        focused: bool,
    ) -> Self {
        let session = Session::new(now, focused, resolver.resolve());
        Self {
            ledger,
            resolver,
            sink,
            policy,
            template: EntryTemplate::default(),
            session: Mutex::new(session),
            closed: Mutex::new(Vec::new()),
            bindings: Mutex::new(HashMap::new()),
            member: Mutex::new(None),
            in_flight: AtomicBool::new(false),
        }
    }

    #[must_use]
    pub fn with_template(mut self, template: EntryTemplate) -> Self {
        self.template = template;
        self
    }

    /// Uses a known member id instead of resolving it on start.
    #[must_use]
    pub fn with_member(self, member: Option<MemberId>) -> Self {
        *lock(&self.member) = member;
        self
    }

    pub const fn ledger(&self) -> &L {
        &self.ledger
    }

    pub const fn policy(&self) -> &TrackerPolicy {
        &self.policy
    }

    pub fn member(&self) -> Option<MemberId> {
        lock(&self.member).clone()
    }

    /// Runs `f` against the current session state.
    pub fn with_session<T>(&self, f: impl FnOnce(&Session) -> T) -> T {
        f(&lock(&self.session))
    }

    pub fn summary(&self, now: DateTime<Utc>) -> StatusSummary {
        lock(&self.session).summary(now)
    }

    /// Pushes the current summary to the sink.
    pub fn publish(&self, now: DateTime<Utc>) {
        let summary = self.summary(now);
        self.sink.publish(&summary);
    }

    /// Resolves identity if needed and reconciles with today's ledger.
    pub async fn start(&self, now: DateTime<Utc>, window: DayWindow) {
        let project = lock(&self.session).current_project().clone();
        info!(project = %project, "tracker started");
        if lock(&self.member).is_none() {
            // Failure is logged; writes fail with MissingMember until a refresh succeeds.
            let _ = self.resolve_member().await;
        }
        if let Err(err) = self.reconcile(now, window).await {
            warn!(error = %err, "startup reconciliation failed");
        }
        self.publish(now);
    }

    /// Closes the open slice and makes one last flush.
    ///
    /// Returns [`SkipReason::InFlight`] when another write is still running;
    /// callers may retry [`Tracker::force_sync`] within their shutdown budget.
    pub async fn stop(&self, now: DateTime<Utc>) -> SyncOutcome {
        let closed = lock(&self.session).close(now, CloseReason::Shutdown);
        self.queue_closed(closed);
        let outcome = self.flush(now, SyncMode::Forced).await;
        self.publish(now);
        info!("tracker stopped");
        outcome
    }

    /// Closes the open slice without touching the ledger.
    ///
    /// For runs where remote sync is off; queued slices are discarded.
    pub fn stop_local(&self, now: DateTime<Utc>) {
        lock(&self.session).close(now, CloseReason::Shutdown);
        lock(&self.closed).clear();
        self.publish(now);
        info!("tracker stopped without syncing");
    }

    pub fn on_activity(&self, now: DateTime<Utc>) -> Followup {
        let project = self.resolver.resolve();
        let closed = lock(&self.session).on_activity(now, project);
        self.queue_closed(closed)
    }

    /// Focus loss closes the slice and asks for an immediate flush. Focus
    /// gain asks for reconciliation; only the next activity reopens a slice.
    pub fn on_focus_changed(&self, now: DateTime<Utc>, focused: bool) -> Followup {
        let project = self.resolver.resolve();
        let closed = lock(&self.session).on_focus_changed(now, focused, project);
        let flush = self.queue_closed(closed) == Followup::Flush;
        match (focused, flush) {
            (true, true) => Followup::FlushThenReconcile,
            (true, false) => Followup::Reconcile,
            (false, _) => Followup::Flush,
        }
    }

    /// Re-resolves the project, splitting the open slice if it changed.
    pub fn on_workspace_changed(&self, now: DateTime<Utc>) -> Followup {
        let project = self.resolver.resolve();
        let closed = lock(&self.session).switch_project(now, project);
        self.queue_closed(closed)
    }

    /// Idle watcher step.
    pub fn check_idle(&self, now: DateTime<Utc>) -> Followup {
        let closed = lock(&self.session).check_idle(now, self.policy.idle_threshold_ms);
        self.queue_closed(closed)
    }

    /// Day-boundary watcher step.
    ///
    /// Resets the totals when the local date moved on, whether or not the
    /// ledger is reachable. Asks for reconciliation until one succeeds for
    /// the current date.
    pub fn check_day(&self, now: DateTime<Utc>, window: &DayWindow) -> Followup {
        let (previous, closed, reconciled) = {
            let mut session = lock(&self.session);
            let previous = session.day();
            let closed = session.roll_day(now, window.date);
            (previous, closed, session.reconciled_day())
        };
        if let Some(day) = previous.filter(|day| *day != window.date) {
            info!(from = %day, to = %window.date, "local date changed, starting a new day");
        }
        let flush = self.queue_closed(closed) == Followup::Flush;
        let reconcile = reconciled != Some(window.date);
        match (flush, reconcile) {
            (true, true) => Followup::FlushThenReconcile,
            (true, false) => Followup::Flush,
            (false, true) => Followup::Reconcile,
            (false, false) => Followup::None,
        }
    }

    pub fn set_initial_accumulated(&self, now: DateTime<Utc>, ms: i64, project: Option<ProjectKey>) {
        lock(&self.session).set_initial_accumulated(ms, project);
        self.publish(now);
    }

    /// Replaces the member id used for new entries.
    pub fn update_credentials(&self, member: MemberId) {
        *lock(&self.member) = Some(member);
    }

    /// Looks up the member id. On failure the previous id is kept.
    pub async fn resolve_member(&self) -> Result<MemberId, LedgerError> {
        match self.ledger.resolve_member().await {
            Ok(member) => {
                debug!(member = %member, "resolved member");
                *lock(&self.member) = Some(member.clone());
                Ok(member)
            }
            Err(err) => {
                warn!(error = %err, "member lookup failed, keeping previous member id");
                Err(err)
            }
        }
    }

    /// Heartbeat step: re-resolves attribution, then flushes if enough
    /// unsynced time accrued.
    pub async fn heartbeat(&self, now: DateTime<Utc>) -> SyncOutcome {
        self.on_workspace_changed(now);
        self.flush(now, SyncMode::Heartbeat).await
    }

    /// Flushes regardless of the sync granularity. Still dropped if another
    /// flush is in flight.
    pub async fn force_sync(&self, now: DateTime<Utc>) -> SyncOutcome {
        self.flush(now, SyncMode::Forced).await
    }

    /// Fetches today's entries and applies them to the local totals.
    pub async fn reconcile(&self, now: DateTime<Utc>, window: DayWindow) -> Result<(), LedgerError> {
        let member = self.member();
        let entries = self
            .ledger
            .list_entries(window.start, window.end, member.as_ref())
            .await?;
        let totals = totals_by_project(&entries, &window, now);
        let (closed, summary) = {
            let mut session = lock(&self.session);
            let closed = session.roll_day(now, window.date);
            session.apply_remote_totals(now, window.date, &totals);
            (closed, session.summary(now))
        };
        self.queue_closed(closed);
        info!(
            entries = entries.len(),
            projects = totals.len(),
            date = %window.date,
            "reconciled with ledger"
        );
        self.sink.publish(&summary);
        Ok(())
    }

    fn queue_closed(&self, closed: Option<TimeSlice>) -> Followup {
        let Some(slice) = closed else {
            return Followup::None;
        };
        debug!(
            project = %slice.project,
            reason = %slice.reason,
            duration_ms = slice.duration_ms(),
            "slice closed"
        );
        lock(&self.closed).push(slice);
        Followup::Flush
    }

    async fn flush(&self, now: DateTime<Utc>, mode: SyncMode) -> SyncOutcome {
        let Some(_guard) = InFlight::acquire(&self.in_flight) else {
            debug!("sync already in flight, dropping");
            return SyncOutcome::Skipped(SkipReason::InFlight);
        };
        self.write_closed_slices().await;
        self.sync_open_slice(now, mode).await
    }

    async fn write_closed_slices(&self) {
        let closed = std::mem::take(&mut *lock(&self.closed));
        for slice in &closed {
            self.write_closed(slice).await;
        }
    }

    /// Final write for a closed slice. Best effort: the binding is cleared
    /// whatever the outcome.
    async fn write_closed(&self, slice: &TimeSlice) {
        let binding = self.take_binding(&slice.project, slice.started_at);
        let result = match binding {
            Some(entry_id) => {
                self.ledger
                    .update_entry(&entry_id, &EntryPatch::extend_to(slice.ended_at))
                    .await
            }
            None if slice.is_empty() => return,
            None => self
                .create(slice.project.project_id(), slice.started_at, slice.ended_at)
                .await
                .map(|_| ()),
        };
        match result {
            Ok(()) => debug!(
                project = %slice.project,
                reason = %slice.reason,
                ended_at = %slice.ended_at,
                "wrote closed slice"
            ),
            Err(err) => warn!(
                project = %slice.project,
                reason = %slice.reason,
                error = %err,
                "final write for closed slice failed"
            ),
        }
    }

    fn take_binding(&self, project: &ProjectKey, started_at: DateTime<Utc>) -> Option<EntryId> {
        let mut bindings = lock(&self.bindings);
        if bindings
            .get(project)
            .is_some_and(|binding| binding.started_at == started_at)
        {
            bindings.remove(project).map(|binding| binding.entry_id)
        } else {
            None
        }
    }

    async fn sync_open_slice(&self, now: DateTime<Utc>, mode: SyncMode) -> SyncOutcome {
        let (project, started_at) = {
            let session = lock(&self.session);
            let Some(slice) = session.active_slice() else {
                return SyncOutcome::Skipped(SkipReason::Idle);
            };
            let unsynced = session.unsynced_ms(now).unwrap_or(0);
            if mode == SyncMode::Heartbeat && unsynced < self.policy.min_sync_ms {
                debug!(unsynced_ms = unsynced, "below sync granularity, skipping");
                return SyncOutcome::Skipped(SkipReason::BelowGranularity);
            }
            (slice.project.clone(), slice.started_at)
        };

        let bound = lock(&self.bindings)
            .get(&project)
            .filter(|binding| binding.started_at == started_at)
            .map(|binding| binding.entry_id.clone());

        let result = match bound {
            Some(entry_id) => self
                .ledger
                .update_entry(&entry_id, &EntryPatch::extend_to(now))
                .await
                .map(|()| SyncOutcome::Updated(entry_id)),
            None => self
                .create(project.project_id(), started_at, now)
                .await
                .map(|entry_id| {
                    let binding = EntryBinding {
                        entry_id: entry_id.clone(),
                        started_at,
                    };
                    lock(&self.bindings).insert(project.clone(), binding);
                    SyncOutcome::Created(entry_id)
                }),
        };

        match result {
            Ok(outcome) => {
                let summary = {
                    let mut session = lock(&self.session);
                    session.mark_synced(started_at, now);
                    session.summary(now)
                };
                debug!(project = %project, outcome = ?outcome, total = %summary.text, "synced");
                self.sink.publish(&summary);
                outcome
            }
            Err(err) => {
                warn!(project = %project, error = %err, "sync failed, will retry on next heartbeat");
                SyncOutcome::Failed(err)
            }
        }
    }

    async fn create(
        &self,
        project_id: Option<&ProjectId>,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<EntryId, LedgerError> {
        let member_id = self.member().ok_or(LedgerError::MissingMember)?;
        let entry = NewEntry {
            member_id,
            start,
            end: Some(end),
            project_id: project_id.cloned(),
            billable: self.template.billable,
            description: self.template.description.clone(),
            tags: self.template.tags.clone(),
        };
        self.ledger.create_entry(&entry).await
    }
}
