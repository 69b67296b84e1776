//! Drives a [`Tracker`] from host events and timers.
//!
//! One task owns the loop: host events, the heartbeat, the idle watcher and
//! the day watcher are multiplexed with `select!`. Remote work is spawned so
//! the loop never waits on the network; overlapping flushes are dropped by
//! the tracker itself.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Local, Utc};
use tokio::sync::mpsc;
use tokio::time::{Instant, Interval, MissedTickBehavior};
use tracing::{debug, info, warn};

use wl_client::Client;
use wl_core::{
    ActivityDebouncer, DayWindow, EntryId, EntryPatch, Followup, Ledger, LedgerError, MemberId,
    NewEntry, RemoteEntry, RemoteProject, SkipReason, SyncOutcome, Tracker,
};

use crate::host::{HostEvent, initial_project};
use crate::workspace_map::MappedResolver;

/// Pause between shutdown flush attempts while another write is running.
const SHUTDOWN_RETRY: Duration = Duration::from_millis(50);

/// Ledgers whose token can be replaced while the tracker runs.
pub trait Reauthenticate {
    fn set_token(&self, token: &str) -> Result<(), String>;
}

impl Reauthenticate for Client {
    fn set_token(&self, token: &str) -> Result<(), String> {
        Self::set_token(self, token).map_err(|err| err.to_string())
    }
}

/// Stand-in ledger used when credentials are missing.
///
/// The scheduler never syncs in that mode; every call fails regardless.
#[derive(Debug, Default, Clone, Copy)]
pub struct OfflineLedger;

fn offline() -> LedgerError {
    LedgerError::Transport("remote sync is disabled".to_string())
}

impl Ledger for OfflineLedger {
    async fn create_entry(&self, _entry: &NewEntry) -> Result<EntryId, LedgerError> {
        Err(offline())
    }

    async fn update_entry(&self, _id: &EntryId, _patch: &EntryPatch) -> Result<(), LedgerError> {
        Err(offline())
    }

    async fn list_entries(
        &self,
        _start: DateTime<Utc>,
        _end: DateTime<Utc>,
        _member: Option<&MemberId>,
    ) -> Result<Vec<RemoteEntry>, LedgerError> {
        Err(offline())
    }

    async fn resolve_member(&self) -> Result<MemberId, LedgerError> {
        Err(offline())
    }

    async fn list_projects(&self) -> Result<Vec<RemoteProject>, LedgerError> {
        Err(offline())
    }

    async fn create_project(&self, _name: &str) -> Result<RemoteProject, LedgerError> {
        Err(offline())
    }
}

impl Reauthenticate for OfflineLedger {
    fn set_token(&self, _token: &str) -> Result<(), String> {
        Err("organization is not configured".to_string())
    }
}

#[derive(Debug, Clone, Copy)]
pub struct SchedulerOptions {
    /// When false the tracker only keeps local totals.
    pub sync_enabled: bool,
    /// Upper bound on the final flush.
    pub shutdown_timeout: Duration,
}

/// The day window around `now` in the machine's local time zone.
pub fn today(now: DateTime<Utc>) -> DayWindow {
    DayWindow::containing(now, &Local)
}

fn ticker(period: Duration) -> Interval {
    let mut interval = tokio::time::interval_at(Instant::now() + period, period);
    interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
    interval
}

fn log_outcome(context: &str, outcome: &SyncOutcome) {
    match outcome {
        SyncOutcome::Created(id) => debug!(entry = %id, "{context}: created entry"),
        SyncOutcome::Updated(id) => debug!(entry = %id, "{context}: updated entry"),
        SyncOutcome::Skipped(reason) => debug!(?reason, "{context}: skipped"),
        SyncOutcome::Failed(err) => warn!(error = %err, "{context}: sync failed"),
    }
}

pub struct Scheduler<L> {
    tracker: Arc<Tracker<L>>,
    resolver: MappedResolver,
    debouncer: ActivityDebouncer,
    options: SchedulerOptions,
}

impl<L> Scheduler<L>
where
    L: Ledger + Reauthenticate + 'static,
{
    pub fn new(tracker: Tracker<L>, resolver: MappedResolver, options: SchedulerOptions) -> Self {
        let debouncer = ActivityDebouncer::new(tracker.policy().debounce_ms);
        Self {
            tracker: Arc::new(tracker),
            resolver,
            debouncer,
            options,
        }
    }

    pub fn tracker(&self) -> &Tracker<L> {
        &self.tracker
    }

    /// Runs until the host stops, closes stdin, or ctrl-c arrives, then
    /// flushes once within the shutdown budget.
    pub async fn run(&mut self, mut events: mpsc::Receiver<HostEvent>) {
        let policy = self.tracker.policy().clone();
        let mut heartbeat = ticker(policy.heartbeat());
        let mut idle = ticker(policy.idle_poll());
        let mut day = ticker(policy.day_poll());

        let now = Utc::now();
        let window = today(now);
        // Startup reconciliation covers the followup.
        let _ = self.tracker.check_day(now, &window);
        if self.options.sync_enabled {
            self.tracker.start(now, window).await;
        } else {
            self.tracker.publish(now);
        }

        loop {
            tokio::select! {
                event = events.recv() => {
                    let Some(event) = event else {
                        info!("host closed the event stream");
                        break;
                    };
                    if event == HostEvent::Stop {
                        info!("host requested stop");
                        break;
                    }
                    self.handle_event(event);
                }
                _ = heartbeat.tick(), if self.options.sync_enabled => {
                    let tracker = Arc::clone(&self.tracker);
                    tokio::spawn(async move {
                        let outcome = tracker.heartbeat(Utc::now()).await;
                        log_outcome("heartbeat", &outcome);
                    });
                }
                _ = idle.tick() => {
                    let now = Utc::now();
                    let followup = self.tracker.check_idle(now);
                    self.dispatch(followup);
                    self.tracker.publish(now);
                }
                _ = day.tick() => {
                    let now = Utc::now();
                    let followup = self.tracker.check_day(now, &today(now));
                    self.dispatch(followup);
                }
                _ = tokio::signal::ctrl_c() => {
                    info!("interrupted");
                    break;
                }
            }
        }

        self.shutdown().await;
    }

    /// Applies one host event. Remote followups are spawned.
    pub fn handle_event(&mut self, event: HostEvent) {
        let now = Utc::now();
        debug!(kind = event.kind(), "host event");
        match event {
            HostEvent::Activity => {
                if self.debouncer.accept(now) {
                    let followup = self.tracker.on_activity(now);
                    self.dispatch(followup);
                }
            }
            HostEvent::Focus { focused } => {
                self.debouncer.reset();
                let followup = self.tracker.on_focus_changed(now, focused);
                self.dispatch(followup);
                self.tracker.publish(now);
            }
            HostEvent::Workspace { uri } => {
                self.resolver.set_workspace(&uri);
                let followup = self.tracker.on_workspace_changed(now);
                self.dispatch(followup);
                self.tracker.publish(now);
            }
            HostEvent::Sync => {
                if self.options.sync_enabled {
                    self.dispatch(Followup::Flush);
                } else {
                    warn!("sync requested but remote sync is disabled");
                }
            }
            HostEvent::Credentials { token, member_id } => self.refresh_credentials(&token, member_id),
            HostEvent::Initial { ms, project } => {
                let project = initial_project(project.as_deref());
                self.tracker.set_initial_accumulated(now, ms, project);
            }
            HostEvent::Stop => {}
        }
    }

    fn refresh_credentials(&self, token: &str, member_id: Option<String>) {
        if let Err(err) = self.tracker.ledger().set_token(token) {
            warn!(error = %err, "ignoring credentials");
            return;
        }
        info!("credentials updated");
        match member_id.map(MemberId::new) {
            Some(Ok(member)) => self.tracker.update_credentials(member),
            Some(Err(err)) => warn!(error = %err, "ignoring member id"),
            None if self.options.sync_enabled => {
                let tracker = Arc::clone(&self.tracker);
                tokio::spawn(async move {
                    // Failure is logged by the tracker and the old member kept.
                    let _ = tracker.resolve_member().await;
                });
            }
            None => {}
        }
    }

    fn dispatch(&self, followup: Followup) {
        if !self.options.sync_enabled || followup == Followup::None {
            return;
        }
        let tracker = Arc::clone(&self.tracker);
        tokio::spawn(async move {
            if matches!(followup, Followup::Flush | Followup::FlushThenReconcile) {
                let outcome = tracker.force_sync(Utc::now()).await;
                log_outcome("flush", &outcome);
            }
            if matches!(followup, Followup::Reconcile | Followup::FlushThenReconcile) {
                let now = Utc::now();
                if let Err(err) = tracker.reconcile(now, today(now)).await {
                    warn!(error = %err, "reconciliation failed");
                }
            }
        });
    }

    async fn shutdown(&self) {
        let now = Utc::now();
        if !self.options.sync_enabled {
            self.tracker.stop_local(now);
            return;
        }

        let tracker = &self.tracker;
        let flush = async {
            let mut outcome = tracker.stop(now).await;
            while matches!(outcome, SyncOutcome::Skipped(SkipReason::InFlight)) {
                tokio::time::sleep(SHUTDOWN_RETRY).await;
                outcome = tracker.force_sync(now).await;
            }
            outcome
        };
        match tokio::time::timeout(self.options.shutdown_timeout, flush).await {
            Ok(outcome) => log_outcome("shutdown", &outcome),
            Err(_) => warn!(
                timeout_ms = self.options.shutdown_timeout.as_millis(),
                "final flush did not finish in time"
            ),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use std::sync::Mutex;

    use wl_core::{ProjectId, ProjectKey, Session, StatusSink, StatusSummary, TrackerPolicy};

    use crate::workspace_map::WorkspaceMap;

    #[derive(Clone, Default)]
    struct RecordingSink(Arc<Mutex<Vec<StatusSummary>>>);

    impl StatusSink for RecordingSink {
        fn publish(&self, summary: &StatusSummary) {
            self.0.lock().unwrap().push(summary.clone());
        }
    }

    fn offline_scheduler(
        resolver: &MappedResolver,
        sink: &RecordingSink,
    ) -> Scheduler<OfflineLedger> {
        let tracker = Tracker::new(
            OfflineLedger,
            Box::new(resolver.clone()),
            Box::new(sink.clone()),
            TrackerPolicy::default(),
            Utc::now(),
            true,
        );
        Scheduler::new(
            tracker,
            resolver.clone(),
            SchedulerOptions {
                sync_enabled: false,
                shutdown_timeout: Duration::from_millis(200),
            },
        )
    }

    #[tokio::test]
    async fn offline_run_tracks_locally_until_stdin_closes() {
        let temp = tempfile::tempdir().unwrap();
        let resolver = MappedResolver::new(temp.path().join("projects.json"), "file:///repo");
        let sink = RecordingSink::default();
        let mut scheduler = offline_scheduler(&resolver, &sink);

        let (tx, rx) = mpsc::channel(8);
        tx.send(HostEvent::Initial {
            ms: 60_000,
            project: None,
        })
        .await
        .unwrap();
        tx.send(HostEvent::Activity).await.unwrap();
        drop(tx);
        scheduler.run(rx).await;

        let published = sink.0.lock().unwrap();
        assert!(published.len() >= 2);
        let last = published.last().unwrap();
        assert_eq!(last.project, ProjectKey::Unassigned);
        assert!(last.total_ms >= 60_000);
        assert!(!last.active);
        assert!(!scheduler.tracker().with_session(Session::is_active));
        assert!(scheduler.tracker().with_session(Session::day).is_some());
    }

    #[tokio::test]
    async fn workspace_event_switches_attribution() {
        let temp = tempfile::tempdir().unwrap();
        let path = temp.path().join("projects.json");
        let mut map = WorkspaceMap::default();
        map.link("file:///other", &ProjectId::new("p2").unwrap());
        map.save(&path).unwrap();

        let resolver = MappedResolver::new(path, "file:///repo");
        let sink = RecordingSink::default();
        let mut scheduler = offline_scheduler(&resolver, &sink);

        scheduler.handle_event(HostEvent::Activity);
        scheduler.handle_event(HostEvent::Workspace {
            uri: "file:///other".to_string(),
        });

        let current = scheduler
            .tracker()
            .with_session(|session| session.current_project().clone());
        assert_eq!(current, ProjectKey::Project(ProjectId::new("p2").unwrap()));
        assert_eq!(resolver.workspace(), "file:///other");
    }

    #[tokio::test]
    async fn offline_credentials_are_ignored() {
        let temp = tempfile::tempdir().unwrap();
        let resolver = MappedResolver::new(temp.path().join("projects.json"), "file:///repo");
        let sink = RecordingSink::default();
        let mut scheduler = offline_scheduler(&resolver, &sink);

        scheduler.handle_event(HostEvent::Credentials {
            token: "token".to_string(),
            member_id: Some("member-1".to_string()),
        });
        assert_eq!(scheduler.tracker().member(), None);
    }
}
