//! `wl link` and `wl unlink`: edit the workspace-to-project map.

use std::io::Write;

use anyhow::{Context, Result};

use wl_core::ProjectId;

use crate::Config;
use crate::workspace_map::{WorkspaceMap, normalize_workspace};

pub fn link<W: Write>(writer: &mut W, config: &Config, workspace: &str, project: &str) -> Result<()> {
    let project = ProjectId::new(project).context("invalid project id")?;
    let workspace = normalize_workspace(workspace);
    anyhow::ensure!(!workspace.is_empty(), "workspace cannot be empty");

    let mut map = WorkspaceMap::load(&config.mapping_path)?;
    let previous = map.link(&workspace, &project);
    map.save(&config.mapping_path)?;

    match previous {
        Some(previous) if previous != project.as_str() => {
            writeln!(writer, "Linked {workspace} to {project} (was {previous})")?;
        }
        _ => writeln!(writer, "Linked {workspace} to {project}")?,
    }
    Ok(())
}

pub fn unlink<W: Write>(writer: &mut W, config: &Config, workspace: &str) -> Result<()> {
    let workspace = normalize_workspace(workspace);
    let mut map = WorkspaceMap::load(&config.mapping_path)?;
    match map.unlink(&workspace) {
        Some(project) => {
            map.save(&config.mapping_path)?;
            writeln!(writer, "Unlinked {workspace} from {project}")?;
        }
        None => writeln!(writer, "{workspace} was not linked")?,
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    use insta::assert_snapshot;

    fn config_in(dir: &std::path::Path) -> Config {
        Config {
            mapping_path: dir.join("projects.json"),
            ..Config::default()
        }
    }

    #[test]
    fn link_relink_and_unlink() {
        let temp = tempfile::tempdir().unwrap();
        let config = config_in(temp.path());
        let mut output = Vec::new();

        link(&mut output, &config, "file:///repo/", "p1").unwrap();
        link(&mut output, &config, "file:///repo", "p1").unwrap();
        link(&mut output, &config, "file:///repo", "p2").unwrap();
        unlink(&mut output, &config, "file:///repo").unwrap();
        unlink(&mut output, &config, "file:///repo").unwrap();

        assert_snapshot!(String::from_utf8(output).unwrap(), @r"
        Linked file:///repo to p1
        Linked file:///repo to p1
        Linked file:///repo to p2 (was p1)
        Unlinked file:///repo from p2
        file:///repo was not linked
        ");
    }

    #[test]
    fn link_rejects_blank_project() {
        let temp = tempfile::tempdir().unwrap();
        let config = config_in(temp.path());
        let mut output = Vec::new();
        assert!(link(&mut output, &config, "file:///repo", " ").is_err());
        assert!(!config.mapping_path.exists());
    }
}
