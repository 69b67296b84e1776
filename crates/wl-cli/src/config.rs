//! Configuration loading and management.

use std::fmt;
use std::path::{Path, PathBuf};
use std::time::Duration;

use figment::Figment;
use figment::providers::{Env, Format, Serialized, Toml};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use wl_client::{Client, ClientError};
use wl_core::{EntryTemplate, MemberId, PolicyError, TrackerPolicy};

/// Settings that prevent talking to the ledger.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("{field} is not set (config.toml or WL_{env})")]
    Missing { field: &'static str, env: &'static str },
    #[error(transparent)]
    Client(#[from] ClientError),
    #[error("invalid [policy]: {0}")]
    Policy(#[from] PolicyError),
}

/// Application configuration.
#[derive(Clone, Serialize, Deserialize)]
pub struct Config {
    /// Base URL of the time-tracking service.
    pub base_url: String,
    /// API token; never logged.
    pub api_token: Option<String>,
    /// Organization that receives the time entries.
    pub organization_id: Option<String>,
    /// Member id to write entries as. Looked up from the token when unset.
    pub member_id: Option<String>,
    /// Description stamped on created entries.
    pub description: String,
    pub billable: bool,
    pub tags: Vec<String>,
    /// Path to the workspace-to-project mapping file.
    pub mapping_path: PathBuf,
    /// Upper bound on the final flush at shutdown.
    pub shutdown_timeout_ms: u64,
    pub policy: TrackerPolicy,
}

impl fmt::Debug for Config {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Config")
            .field("base_url", &self.base_url)
            .field("api_token", &self.api_token.as_ref().map(|_| "[REDACTED]"))
            .field("organization_id", &self.organization_id)
            .field("member_id", &self.member_id)
            .field("mapping_path", &self.mapping_path)
            .field("policy", &self.policy)
            .finish_non_exhaustive()
    }
}

impl Default for Config {
    fn default() -> Self {
        let data_dir = dirs_data_path().unwrap_or_else(|| PathBuf::from("."));
        let template = EntryTemplate::default();
        Self {
            base_url: "https://app.solidtime.io".to_string(),
            api_token: None,
            organization_id: None,
            member_id: None,
            description: template.description,
            billable: template.billable,
            tags: template.tags,
            mapping_path: data_dir.join("projects.json"),
            shutdown_timeout_ms: 3_000,
            policy: TrackerPolicy::default(),
        }
    }
}

impl Config {
    /// Loads configuration, optionally from a specific file.
    #[expect(
        clippy::result_large_err,
        reason = "figment::Error is large but only returned at startup"
    )]
    pub fn load_from(config_path: Option<&Path>) -> Result<Self, figment::Error> {
        let mut figment = Figment::from(Serialized::defaults(Self::default()));

        // Load from default config location
        if let Some(config_dir) = dirs_config_path() {
            figment = figment.merge(Toml::file(config_dir.join("config.toml")));
        }

        // Load from specified config file
        if let Some(path) = config_path {
            figment = figment.merge(Toml::file(path));
        }

        // Load from environment variables (WL_*, nested with WL_POLICY__*)
        figment = figment.merge(Env::prefixed("WL_").split("__"));

        figment.extract()
    }

    /// Builds the ledger client, failing on the first missing setting.
    pub fn ledger_client(&self) -> Result<Client, ConfigError> {
        let organization = non_empty(self.organization_id.as_deref()).ok_or(ConfigError::Missing {
            field: "organization_id",
            env: "ORGANIZATION_ID",
        })?;
        let token = non_empty(self.api_token.as_deref()).ok_or(ConfigError::Missing {
            field: "api_token",
            env: "API_TOKEN",
        })?;
        Ok(Client::new(&self.base_url, organization, token)?)
    }

    /// The configured member id, if set and valid.
    pub fn member_id(&self) -> Option<MemberId> {
        self.member_id
            .as_deref()
            .and_then(|id| MemberId::new(id).ok())
    }

    pub fn entry_template(&self) -> EntryTemplate {
        EntryTemplate {
            description: self.description.clone(),
            billable: self.billable,
            tags: self.tags.clone(),
        }
    }

    pub fn validated_policy(&self) -> Result<TrackerPolicy, ConfigError> {
        self.policy.validate()?;
        Ok(self.policy.clone())
    }

    pub const fn shutdown_timeout(&self) -> Duration {
        Duration::from_millis(self.shutdown_timeout_ms)
    }
}

fn non_empty(value: Option<&str>) -> Option<&str> {
    value.filter(|v| !v.trim().is_empty())
}

/// Returns the platform-specific config directory for wl.
fn dirs_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|p| p.join("wl"))
}

/// Returns the platform-specific data directory for wl.
///
/// On Linux: `~/.local/share/wl`
pub fn dirs_data_path() -> Option<PathBuf> {
    dirs::data_dir().map(|p| p.join("wl"))
}
