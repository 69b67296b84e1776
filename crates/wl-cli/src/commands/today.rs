//! `wl today`: today's ledger totals per project.

use std::collections::HashMap;
use std::io::Write;

use anyhow::{Context, Result};
use chrono::{NaiveDate, Utc};
use tracing::warn;

use wl_core::{Ledger, ProjectId, ProjectKey, format_duration, totals_by_project};

use crate::Config;
use crate::scheduler::today;

pub async fn run<W: Write>(writer: &mut W, config: &Config) -> Result<()> {
    let client = config.ledger_client()?;
    let member = match config.member_id() {
        Some(member) => member,
        None => client
            .resolve_member()
            .await
            .context("failed to look up member id")?,
    };

    let now = Utc::now();
    let window = today(now);
    let entries = client
        .list_entries(window.start, window.end, Some(&member))
        .await
        .context("failed to list today's entries")?;
    let totals = totals_by_project(&entries, &window, now);

    let names: HashMap<ProjectId, String> = match client.list_projects().await {
        Ok(projects) => projects.into_iter().map(|p| (p.id, p.name)).collect(),
        Err(err) => {
            warn!(error = %err, "failed to list projects, showing ids");
            HashMap::new()
        }
    };

    render(writer, window.date, &totals, &names)
}

/// Writes totals, largest first.
pub fn render<W: Write>(
    writer: &mut W,
    date: NaiveDate,
    totals: &HashMap<ProjectKey, i64>,
    names: &HashMap<ProjectId, String>,
) -> Result<()> {
    let total: i64 = totals.values().sum();
    writeln!(writer, "Today ({date}): {}", format_duration(total))?;

    let mut rows: Vec<(&ProjectKey, i64)> = totals.iter().map(|(key, ms)| (key, *ms)).collect();
    rows.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(b.0)));

    for (key, ms) in rows {
        let label = match key {
            ProjectKey::Unassigned => key.to_string(),
            ProjectKey::Project(id) => names
                .get(id)
                .map_or_else(|| id.to_string(), |name| format!("{name} ({id})")),
        };
        writeln!(writer, "{:>8}  {label}", format_duration(ms))?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    use insta::assert_snapshot;

    fn project(id: &str) -> ProjectKey {
        ProjectKey::Project(ProjectId::new(id).unwrap())
    }

    #[test]
    fn renders_largest_first_with_names() {
        let totals = HashMap::from([
            (project("p-api"), 3_900_000),
            (project("p-web"), 600_000),
            (ProjectKey::Unassigned, 1_800_000),
        ]);
        let names = HashMap::from([(ProjectId::new("p-api").unwrap(), "API".to_string())]);
        let date = NaiveDate::from_ymd_opt(2025, 1, 6).unwrap();

        let mut output = Vec::new();
        render(&mut output, date, &totals, &names).unwrap();

        assert_snapshot!(String::from_utf8(output).unwrap(), @r"
        Today (2025-01-06): 1h 45m
          1h 05m  API (p-api)
             30m  (no project)
             10m  p-web
        ");
    }

    #[test]
    fn renders_empty_day() {
        let date = NaiveDate::from_ymd_opt(2025, 1, 6).unwrap();
        let mut output = Vec::new();
        render(&mut output, date, &HashMap::new(), &HashMap::new()).unwrap();
        assert_eq!(String::from_utf8(output).unwrap(), "Today (2025-01-06): 0m\n");
    }
}
