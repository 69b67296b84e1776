//! Workspace-to-project links, persisted as JSON.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Arc, PoisonError, RwLock};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use tracing::warn;

use wl_core::{ProjectId, ProjectKey, ProjectResolver};

/// Strips whitespace and trailing slashes so `file:///repo/` and
/// `file:///repo` link to the same project.
pub fn normalize_workspace(uri: &str) -> String {
    let trimmed = uri.trim();
    let stripped = trimmed.trim_end_matches('/');
    if stripped.is_empty() {
        trimmed.to_string()
    } else {
        stripped.to_string()
    }
}

#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkspaceMap {
    #[serde(default)]
    workspaces: BTreeMap<String, String>,
}

impl WorkspaceMap {
    /// Loads the map, treating a missing file as empty.
    pub fn load(path: &Path) -> Result<Self> {
        match fs::read_to_string(path) {
            Ok(contents) => serde_json::from_str(&contents)
                .with_context(|| format!("failed to parse {}", path.display())),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(Self::default()),
            Err(err) => Err(err).with_context(|| format!("failed to read {}", path.display())),
        }
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("failed to create {}", parent.display()))?;
        }
        let contents = serde_json::to_string_pretty(self).context("failed to encode links")?;
        fs::write(path, contents).with_context(|| format!("failed to write {}", path.display()))?;
        Ok(())
    }

    /// Links `workspace` to `project`, returning the previous project.
    pub fn link(&mut self, workspace: &str, project: &ProjectId) -> Option<String> {
        self.workspaces
            .insert(normalize_workspace(workspace), project.as_str().to_string())
    }

    pub fn unlink(&mut self, workspace: &str) -> Option<String> {
        self.workspaces.remove(&normalize_workspace(workspace))
    }

    /// Unknown workspaces and malformed ids are unassigned.
    pub fn project_for(&self, workspace: &str) -> ProjectKey {
        self.workspaces
            .get(&normalize_workspace(workspace))
            .and_then(|id| ProjectId::new(id.as_str()).ok())
            .map_or(ProjectKey::Unassigned, ProjectKey::Project)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.workspaces
            .iter()
            .map(|(workspace, project)| (workspace.as_str(), project.as_str()))
    }

    pub fn is_empty(&self) -> bool {
        self.workspaces.is_empty()
    }
}

/// Resolves the current workspace through the link file.
///
/// The file is re-read on every call so `wl link` takes effect in a running
/// tracker at the next attribution point. Clones share the current workspace.
#[derive(Debug, Clone)]
pub struct MappedResolver {
    path: PathBuf,
    workspace: Arc<RwLock<String>>,
}

impl MappedResolver {
    pub fn new(path: PathBuf, workspace: &str) -> Self {
        Self {
            path,
            workspace: Arc::new(RwLock::new(normalize_workspace(workspace))),
        }
    }

    pub fn set_workspace(&self, workspace: &str) {
        *self.workspace.write().unwrap_or_else(PoisonError::into_inner) =
            normalize_workspace(workspace);
    }

    pub fn workspace(&self) -> String {
        self.workspace
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

impl ProjectResolver for MappedResolver {
    fn resolve(&self) -> ProjectKey {
        match WorkspaceMap::load(&self.path) {
            Ok(map) => map.project_for(&self.workspace()),
            Err(err) => {
                warn!(error = %err, "failed to read workspace links, time is unassigned");
                ProjectKey::Unassigned
            }
        }
    }
}
