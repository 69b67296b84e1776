//! Session accounting engine for the coding-time tracker.
//!
//! This crate decides what counts as active coding time and mirrors it into
//! a remote time-entry ledger:
//! - Session: the idle/active state machine and per-project totals
//! - Tracker: remote writes, reconciliation and the single in-flight rule
//! - Ledger: the remote operations the tracker depends on

mod debounce;
mod format;
pub mod ledger;
pub mod policy;
pub mod reconcile;
pub mod session;
mod slice;
pub mod tracker;
pub mod types;

pub use debounce::ActivityDebouncer;
pub use format::format_duration;
pub use ledger::{EntryPatch, Ledger, LedgerError, NewEntry, RemoteEntry, RemoteProject};
pub use policy::{PolicyError, TrackerPolicy};
pub use reconcile::{DayWindow, totals_by_project};
pub use session::{ActiveSlice, Session, StatusSummary};
pub use slice::{CloseReason, TimeSlice};
pub use tracker::{
    EntryTemplate, Followup, ProjectResolver, SkipReason, StatusSink, SyncOutcome, Tracker,
};
pub use types::{EntryId, MemberId, ProjectId, ProjectKey, ValidationError};
