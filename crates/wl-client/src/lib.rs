//! REST client for the remote time-entry ledger.
//!
//! Implements [`wl_core::Ledger`] against a Solidtime-style `/api/v1` API:
//! - time entries are created, extended and listed per organization
//! - the member id is looked up from the token owner's memberships
//! - projects can be listed and created for the mapping commands

mod wire;

use std::fmt;
use std::sync::{PoisonError, RwLock};
use std::time::Duration;

use chrono::{DateTime, Utc};
use reqwest::RequestBuilder;
use serde::de::DeserializeOwned;
use thiserror::Error;
use tracing::debug;

use wl_core::{
    EntryId, EntryPatch, Ledger, LedgerError, MemberId, NewEntry, RemoteEntry, RemoteProject,
};

use crate::wire::{
    CreateEntryBody, CreateProjectBody, EntryRecord, Envelope, IdRecord, Membership,
    ProjectRecord, UpdateEntryBody, format_timestamp, member_for_organization, parse_api_error,
};

/// Default request timeout for API calls.
const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);
/// Upper bound on entries fetched for one day.
const LIST_LIMIT: &str = "500";
const NEW_PROJECT_COLOR: &str = "#607d8b";

/// Errors building a client.
#[derive(Debug, Error)]
pub enum ClientError {
    /// The provided API token was invalid.
    #[error("invalid API token: {reason}")]
    InvalidToken { reason: &'static str },
    /// A required setting was empty.
    #[error("{field} cannot be empty")]
    MissingSetting { field: &'static str },
    /// Failed to build HTTP client.
    #[error("failed to build HTTP client: {0}")]
    ClientBuild(#[source] reqwest::Error),
}

/// Ledger client bound to one organization.
///
/// # Thread Safety
///
/// The client is safe to share across tasks. The token can be swapped in
/// place with [`Client::set_token`]; in-flight requests keep the old one.
pub struct Client {
    http: reqwest::Client,
    base_url: String,
    organization: String,
    token: RwLock<String>,
}

impl fmt::Debug for Client {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Client")
            .field("base_url", &self.base_url)
            .field("organization", &self.organization)
            .field("token", &"[REDACTED]")
            .finish_non_exhaustive()
    }
}

fn validate_token(token: &str) -> Result<(), ClientError> {
    if token.is_empty() {
        return Err(ClientError::InvalidToken {
            reason: "API token cannot be empty",
        });
    }
    if token.trim().is_empty() {
        return Err(ClientError::InvalidToken {
            reason: "API token cannot be whitespace-only",
        });
    }
    Ok(())
}

fn transport(err: reqwest::Error) -> LedgerError {
    LedgerError::Transport(err.to_string())
}

impl Client {
    /// Creates a client for `organization` on the API at `base_url`.
    pub fn new(
        base_url: &str,
        organization: impl Into<String>,
        token: impl Into<String>,
    ) -> Result<Self, ClientError> {
        let base_url = base_url.trim().trim_end_matches('/');
        if base_url.is_empty() {
            return Err(ClientError::MissingSetting { field: "base_url" });
        }
        let organization = organization.into();
        if organization.trim().is_empty() {
            return Err(ClientError::MissingSetting {
                field: "organization_id",
            });
        }
        let token = token.into();
        validate_token(&token)?;

        let http = reqwest::Client::builder()
            .timeout(DEFAULT_TIMEOUT)
            .build()
            .map_err(ClientError::ClientBuild)?;

        Ok(Self {
            http,
            base_url: base_url.to_string(),
            organization,
            token: RwLock::new(token),
        })
    }

    pub fn organization(&self) -> &str {
        &self.organization
    }

    /// Replaces the API token used for subsequent requests.
    pub fn set_token(&self, token: impl Into<String>) -> Result<(), ClientError> {
        let token = token.into();
        validate_token(&token)?;
        *self.token.write().unwrap_or_else(PoisonError::into_inner) = token;
        Ok(())
    }

    fn token(&self) -> String {
        self.token
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    fn url(&self, path: &str) -> String {
        format!("{}/api/v1{path}", self.base_url)
    }

    fn org_url(&self, path: &str) -> String {
        self.url(&format!("/organizations/{}{path}", self.organization))
    }

    /// Sends `request` with auth and decodes the `data` envelope.
    async fn send<T: DeserializeOwned>(&self, request: RequestBuilder) -> Result<T, LedgerError> {
        let response = request
            .bearer_auth(self.token())
            .header(reqwest::header::ACCEPT, "application/json")
            .send()
            .await
            .map_err(transport)?;

        let status = response.status();
        let body = response.text().await.map_err(transport)?;
        if !status.is_success() {
            return Err(parse_api_error(status.as_u16(), &body));
        }

        let envelope: Envelope<T> = serde_json::from_str(&body)
            .map_err(|err| LedgerError::InvalidResponse(err.to_string()))?;
        Ok(envelope.data)
    }

    /// Like [`Client::send`] for endpoints whose body is irrelevant.
    async fn send_discarding(&self, request: RequestBuilder) -> Result<(), LedgerError> {
        let response = request
            .bearer_auth(self.token())
            .header(reqwest::header::ACCEPT, "application/json")
            .send()
            .await
            .map_err(transport)?;

        let status = response.status();
        if status.is_success() {
            return Ok(());
        }
        let body = response.text().await.map_err(transport)?;
        Err(parse_api_error(status.as_u16(), &body))
    }
}

impl Ledger for Client {
    async fn create_entry(&self, entry: &NewEntry) -> Result<EntryId, LedgerError> {
        debug!(start = %entry.start, end = ?entry.end, "creating time entry");
        let request = self
            .http
            .post(self.org_url("/time-entries"))
            .json(&CreateEntryBody::from(entry));
        let record: IdRecord = self.send(request).await?;
        record.into_entry_id()
    }

    async fn update_entry(&self, id: &EntryId, patch: &EntryPatch) -> Result<(), LedgerError> {
        debug!(entry = %id, end = ?patch.end, "updating time entry");
        let body = UpdateEntryBody {
            start: patch.start.map(format_timestamp),
            end: patch.end.map(format_timestamp),
        };
        let request = self
            .http
            .put(self.org_url(&format!("/time-entries/{id}")))
            .json(&body);
        self.send_discarding(request).await
    }

    async fn list_entries(
        &self,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
        member: Option<&MemberId>,
    ) -> Result<Vec<RemoteEntry>, LedgerError> {
        let mut query = vec![
            ("start", format_timestamp(start)),
            ("end", format_timestamp(end)),
            ("limit", LIST_LIMIT.to_string()),
        ];
        if let Some(member) = member {
            query.push(("member_id", member.to_string()));
        }
        let request = self.http.get(self.org_url("/time-entries")).query(&query);
        let records: Vec<EntryRecord> = self.send(request).await?;
        records.into_iter().map(RemoteEntry::try_from).collect()
    }

    async fn resolve_member(&self) -> Result<MemberId, LedgerError> {
        let request = self.http.get(self.url("/users/me/memberships"));
        let memberships: Vec<Membership> = self.send(request).await?;
        member_for_organization(memberships, &self.organization)
    }

    async fn list_projects(&self) -> Result<Vec<RemoteProject>, LedgerError> {
        let request = self.http.get(self.org_url("/projects"));
        let records: Vec<ProjectRecord> = self.send(request).await?;
        records.into_iter().map(RemoteProject::try_from).collect()
    }

    async fn create_project(&self, name: &str) -> Result<RemoteProject, LedgerError> {
        let body = CreateProjectBody {
            name,
            color: NEW_PROJECT_COLOR,
            is_billable: false,
        };
        let request = self.http.post(self.org_url("/projects")).json(&body);
        let record: ProjectRecord = self.send(request).await?;
        RemoteProject::try_from(record)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn client() -> Client {
        Client::new("https://time.example.com/", "org-1", "token-abc").unwrap()
    }

    #[test]
    fn client_rejects_empty_token() {
        assert!(matches!(
            Client::new("https://time.example.com", "org-1", ""),
            Err(ClientError::InvalidToken { .. })
        ));
    }

    #[test]
    fn client_rejects_whitespace_token() {
        assert!(matches!(
            Client::new("https://time.example.com", "org-1", "   "),
            Err(ClientError::InvalidToken { .. })
        ));
    }

    #[test]
    fn client_requires_organization_and_base_url() {
        assert!(matches!(
            Client::new("https://time.example.com", " ", "token"),
            Err(ClientError::MissingSetting {
                field: "organization_id"
            })
        ));
        assert!(matches!(
            Client::new("", "org-1", "token"),
            Err(ClientError::MissingSetting { field: "base_url" })
        ));
    }

    #[test]
    fn client_debug_redacts_token() {
        let debug = format!("{:?}", client());
        assert!(!debug.contains("token-abc"));
        assert!(debug.contains("[REDACTED]"));
        assert!(debug.contains("org-1"));
    }

    #[test]
    fn urls_are_scoped_to_the_organization() {
        let client = client();
        assert_eq!(
            client.org_url("/time-entries"),
            "https://time.example.com/api/v1/organizations/org-1/time-entries"
        );
        assert_eq!(
            client.url("/users/me/memberships"),
            "https://time.example.com/api/v1/users/me/memberships"
        );
    }

    #[test]
    fn set_token_replaces_and_validates() {
        let client = client();
        client.set_token("token-new").unwrap();
        assert_eq!(client.token(), "token-new");
        assert!(client.set_token("").is_err());
        assert_eq!(client.token(), "token-new");
    }
}
