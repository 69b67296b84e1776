//! The remote time-entry ledger the tracker mirrors into.
//!
//! The ledger is the system of record: the tracker creates one entry per
//! open slice, extends it while the slice stays open, and reads today's
//! entries back to reconcile its local totals.

use std::future::Future;

use chrono::{DateTime, Utc};
use thiserror::Error;

use crate::types::{EntryId, MemberId, ProjectId};

/// Ledger call failures.
///
/// Every variant is treated as transient by the tracker: it is logged and
/// the write is retried on the next heartbeat.
#[derive(Debug, Error)]
pub enum LedgerError {
    /// The request never produced a response (connect, timeout, TLS).
    #[error("request failed: {0}")]
    Transport(String),
    /// The ledger answered with a non-success status.
    #[error("ledger returned status {status}: {message}")]
    Api { status: u16, message: String },
    /// The response body could not be understood.
    #[error("invalid response: {0}")]
    InvalidResponse(String),
    /// No membership exists for the configured organization.
    #[error("no membership found for organization {organization}")]
    NoMembership { organization: String },
    /// A write was attempted before the member id was resolved.
    #[error("member id is not resolved yet")]
    MissingMember,
}

/// A time entry to create.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewEntry {
    pub member_id: MemberId,
    pub start: DateTime<Utc>,
    pub end: Option<DateTime<Utc>>,
    pub project_id: Option<ProjectId>,
    pub billable: bool,
    pub description: String,
    pub tags: Vec<String>,
}

/// Fields to change on an existing entry.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EntryPatch {
    pub start: Option<DateTime<Utc>>,
    pub end: Option<DateTime<Utc>>,
}

impl EntryPatch {
    pub const fn extend_to(end: DateTime<Utc>) -> Self {
        Self {
            start: None,
            end: Some(end),
        }
    }
}

/// A time entry as listed by the ledger.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteEntry {
    pub id: EntryId,
    pub start: DateTime<Utc>,
    /// `None` while the entry is still running.
    pub end: Option<DateTime<Utc>>,
    /// Recorded duration in seconds, when the ledger reports one.
    pub duration_secs: Option<i64>,
    pub project_id: Option<ProjectId>,
}

/// A project known to the ledger.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteProject {
    pub id: ProjectId,
    pub name: String,
}

/// Operations the tracker needs from the remote ledger.
///
/// Implementations are bound to a single organization at construction.
pub trait Ledger: Send + Sync {
    fn create_entry(
        &self,
        entry: &NewEntry,
    ) -> impl Future<Output = Result<EntryId, LedgerError>> + Send;

    fn update_entry(
        &self,
        id: &EntryId,
        patch: &EntryPatch,
    ) -> impl Future<Output = Result<(), LedgerError>> + Send;

    /// Lists entries starting inside `[start, end)`, optionally for one member.
    fn list_entries(
        &self,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
        member: Option<&MemberId>,
    ) -> impl Future<Output = Result<Vec<RemoteEntry>, LedgerError>> + Send;

    fn resolve_member(&self) -> impl Future<Output = Result<MemberId, LedgerError>> + Send;

    fn list_projects(&self) -> impl Future<Output = Result<Vec<RemoteProject>, LedgerError>> + Send;

    fn create_project(
        &self,
        name: &str,
    ) -> impl Future<Output = Result<RemoteProject, LedgerError>> + Send;
}
