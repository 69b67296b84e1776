//! `wl projects`: list and create remote projects.

use std::io::Write;

use anyhow::{Context, Result};

use wl_core::{Ledger, RemoteProject};

use crate::Config;
use crate::commands::link;

pub async fn list<W: Write>(writer: &mut W, config: &Config) -> Result<()> {
    let client = config.ledger_client()?;
    let mut projects = client
        .list_projects()
        .await
        .context("failed to list projects")?;
    projects.sort_by(|a, b| a.name.to_lowercase().cmp(&b.name.to_lowercase()));
    render(writer, &projects)
}

pub async fn create<W: Write>(
    writer: &mut W,
    config: &Config,
    name: &str,
    link_workspace: Option<&str>,
) -> Result<()> {
    let name = name.trim();
    anyhow::ensure!(!name.is_empty(), "project name cannot be empty");

    let client = config.ledger_client()?;
    let project = client
        .create_project(name)
        .await
        .with_context(|| format!("failed to create project {name:?}"))?;
    writeln!(writer, "Created {} ({})", project.name, project.id)?;

    if let Some(workspace) = link_workspace {
        link::link(writer, config, workspace, project.id.as_str())?;
    }
    Ok(())
}

pub fn render<W: Write>(writer: &mut W, projects: &[RemoteProject]) -> Result<()> {
    if projects.is_empty() {
        writeln!(writer, "No projects.")?;
        return Ok(());
    }
    for project in projects {
        writeln!(writer, "{}\t{}", project.id, project.name)?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    use wl_core::ProjectId;

    #[test]
    fn render_lists_id_and_name() {
        let projects = vec![
            RemoteProject {
                id: ProjectId::new("p1").unwrap(),
                name: "API".to_string(),
            },
            RemoteProject {
                id: ProjectId::new("p2").unwrap(),
                name: "Web client".to_string(),
            },
        ];
        let mut output = Vec::new();
        render(&mut output, &projects).unwrap();
        assert_eq!(
            String::from_utf8(output).unwrap(),
            "p1\tAPI\np2\tWeb client\n"
        );
    }

    #[test]
    fn render_empty() {
        let mut output = Vec::new();
        render(&mut output, &[]).unwrap();
        assert_eq!(String::from_utf8(output).unwrap(), "No projects.\n");
    }

    #[tokio::test]
    async fn commands_need_credentials() {
        let mut output = Vec::new();
        let err = list(&mut output, &Config::default()).await.unwrap_err();
        assert!(err.to_string().contains("organization_id"));
        let err = create(&mut output, &Config::default(), " ", None)
            .await
            .unwrap_err();
        assert!(err.to_string().contains("name cannot be empty"));
    }
}
