//! JSON shapes exchanged with the time-tracking API.

use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};

use wl_core::{EntryId, LedgerError, MemberId, NewEntry, ProjectId, RemoteEntry, RemoteProject};

/// Formats a timestamp the way the API expects (`2025-01-01T09:30:00Z`).
pub(crate) fn format_timestamp(ts: DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Secs, true)
}

fn parse_timestamp(raw: &str) -> Result<DateTime<Utc>, LedgerError> {
    DateTime::parse_from_rfc3339(raw)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|err| LedgerError::InvalidResponse(format!("bad timestamp {raw:?}: {err}")))
}

fn invalid(err: impl std::fmt::Display) -> LedgerError {
    LedgerError::InvalidResponse(err.to_string())
}

/// Every response body wraps its payload in `data`.
#[derive(Debug, Deserialize)]
pub(crate) struct Envelope<T> {
    pub data: T,
}

#[derive(Debug, Serialize)]
pub(crate) struct CreateEntryBody<'a> {
    member_id: &'a str,
    start: String,
    end: Option<String>,
    project_id: Option<&'a str>,
    billable: bool,
    description: &'a str,
    tags: &'a [String],
}

impl<'a> From<&'a NewEntry> for CreateEntryBody<'a> {
    fn from(entry: &'a NewEntry) -> Self {
        Self {
            member_id: entry.member_id.as_str(),
            start: format_timestamp(entry.start),
            end: entry.end.map(format_timestamp),
            project_id: entry.project_id.as_ref().map(ProjectId::as_str),
            billable: entry.billable,
            description: &entry.description,
            tags: &entry.tags,
        }
    }
}

#[derive(Debug, Serialize)]
pub(crate) struct UpdateEntryBody {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub start: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub end: Option<String>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct IdRecord {
    pub id: String,
}

impl IdRecord {
    pub fn into_entry_id(self) -> Result<EntryId, LedgerError> {
        EntryId::new(self.id).map_err(invalid)
    }
}

#[derive(Debug, Deserialize)]
pub(crate) struct EntryRecord {
    id: String,
    start: String,
    end: Option<String>,
    /// Seconds; absent while the entry is running.
    duration: Option<i64>,
    project_id: Option<String>,
}

impl TryFrom<EntryRecord> for RemoteEntry {
    type Error = LedgerError;

    fn try_from(record: EntryRecord) -> Result<Self, Self::Error> {
        Ok(Self {
            id: EntryId::new(record.id).map_err(invalid)?,
            start: parse_timestamp(&record.start)?,
            end: record.end.as_deref().map(parse_timestamp).transpose()?,
            duration_secs: record.duration,
            project_id: record
                .project_id
                .filter(|id| !id.is_empty())
                .map(ProjectId::new)
                .transpose()
                .map_err(invalid)?,
        })
    }
}

#[derive(Debug, Deserialize)]
pub(crate) struct Membership {
    id: String,
    organization: OrganizationRef,
}

#[derive(Debug, Deserialize)]
struct OrganizationRef {
    id: String,
}

/// Picks the membership belonging to `organization`.
pub(crate) fn member_for_organization(
    memberships: Vec<Membership>,
    organization: &str,
) -> Result<MemberId, LedgerError> {
    memberships
        .into_iter()
        .find(|membership| membership.organization.id == organization)
        .ok_or_else(|| LedgerError::NoMembership {
            organization: organization.to_string(),
        })
        .and_then(|membership| MemberId::new(membership.id).map_err(invalid))
}

#[derive(Debug, Deserialize)]
pub(crate) struct ProjectRecord {
    id: String,
    name: String,
}

impl TryFrom<ProjectRecord> for RemoteProject {
    type Error = LedgerError;

    fn try_from(record: ProjectRecord) -> Result<Self, Self::Error> {
        Ok(Self {
            id: ProjectId::new(record.id).map_err(invalid)?,
            name: record.name,
        })
    }
}

#[derive(Debug, Serialize)]
pub(crate) struct CreateProjectBody<'a> {
    pub name: &'a str,
    pub color: &'a str,
    pub is_billable: bool,
}

/// Extracts the `message` of an error body, if it has one.
pub(crate) fn parse_api_error(status: u16, body: &str) -> LedgerError {
    #[derive(Deserialize)]
    struct ErrorPayload {
        message: String,
    }

    let message = serde_json::from_str::<ErrorPayload>(body)
        .map_or_else(|_| body.trim().to_string(), |payload| payload.message);
    LedgerError::Api { status, message }
}
