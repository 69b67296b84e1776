//! Status command for showing configuration and linked workspaces.

use std::io::Write;

use anyhow::Result;

use crate::Config;
use crate::workspace_map::WorkspaceMap;

fn or_unset(value: Option<&str>) -> &str {
    value.filter(|v| !v.trim().is_empty()).unwrap_or("(not set)")
}

pub fn run<W: Write>(writer: &mut W, config: &Config) -> Result<()> {
    let map = WorkspaceMap::load(&config.mapping_path)?;
    let token = if config
        .api_token
        .as_deref()
        .is_some_and(|token| !token.trim().is_empty())
    {
        "set"
    } else {
        "(not set)"
    };

    writeln!(writer, "Coding-time tracker status")?;
    writeln!(writer, "Server: {}", config.base_url)?;
    writeln!(
        writer,
        "Organization: {}",
        or_unset(config.organization_id.as_deref())
    )?;
    writeln!(writer, "Member: {}", or_unset(config.member_id.as_deref()))?;
    writeln!(writer, "API token: {token}")?;
    writeln!(writer, "Links: {}", config.mapping_path.display())?;

    let policy = &config.policy;
    writeln!(
        writer,
        "Policy: idle after {}ms, heartbeat every {}ms, min sync {}ms",
        policy.idle_threshold_ms, policy.heartbeat_ms, policy.min_sync_ms
    )?;

    if map.is_empty() {
        writeln!(writer, "No linked workspaces.")?;
        return Ok(());
    }

    writeln!(writer, "Linked workspaces:")?;
    for (workspace, project) in map.iter() {
        writeln!(writer, "- {workspace} -> {project}")?;
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    use wl_core::ProjectId;

    use insta::assert_snapshot;

    #[test]
    fn status_command_outputs_settings_and_links() {
        let temp = tempfile::tempdir().unwrap();
        let mapping_path = temp.path().join("projects.json");

        let mut map = WorkspaceMap::default();
        map.link("file:///work/api", &ProjectId::new("proj-api").unwrap());
        map.link("file:///work/web", &ProjectId::new("proj-web").unwrap());
        map.save(&mapping_path).unwrap();

        let config = Config {
            base_url: "https://time.example.com".to_string(),
            api_token: Some("secret".to_string()),
            organization_id: Some("org-1".to_string()),
            mapping_path: mapping_path.clone(),
            ..Config::default()
        };
        let mut output = Vec::new();
        run(&mut output, &config).unwrap();

        let output = String::from_utf8(output).unwrap();
        let output = output.replace(&mapping_path.display().to_string(), "[LINKS]");
        assert!(!output.contains("secret"));
        assert_snapshot!(output, @r"
        Coding-time tracker status
        Server: https://time.example.com
        Organization: org-1
        Member: (not set)
        API token: set
        Links: [LINKS]
        Policy: idle after 120000ms, heartbeat every 60000ms, min sync 10000ms
        Linked workspaces:
        - file:///work/api -> proj-api
        - file:///work/web -> proj-web
        ");
    }

    #[test]
    fn status_without_links() {
        let temp = tempfile::tempdir().unwrap();
        let config = Config {
            mapping_path: temp.path().join("projects.json"),
            ..Config::default()
        };
        let mut output = Vec::new();
        run(&mut output, &config).unwrap();

        let output = String::from_utf8(output).unwrap();
        assert!(output.contains("API token: (not set)"));
        assert!(output.ends_with("No linked workspaces.\n"));
    }
}
