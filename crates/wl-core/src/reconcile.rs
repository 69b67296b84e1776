//! Day windows and remote totals used to reconcile local accounting.

use std::collections::HashMap;

use chrono::{DateTime, NaiveDate, NaiveTime, TimeZone, Utc};

use crate::ledger::RemoteEntry;
use crate::types::ProjectKey;

/// One local calendar day expressed as UTC bounds, `[start, end)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DayWindow {
    pub date: NaiveDate,
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

impl DayWindow {
    /// The local day in `tz` that contains `now`.
    pub fn containing<Tz: TimeZone>(now: DateTime<Utc>, tz: &Tz) -> Self {
        let date = now.with_timezone(tz).date_naive();
        let next = date.succ_opt().unwrap_or(date);
        Self {
            date,
            start: local_midnight(tz, date),
            end: local_midnight(tz, next),
        }
    }
}

/// Midnight of `date` in `tz`. Zones that skip midnight fall back to the
/// same wall-clock time read as UTC.
fn local_midnight<Tz: TimeZone>(tz: &Tz, date: NaiveDate) -> DateTime<Utc> {
    let naive = date.and_time(NaiveTime::MIN);
    tz.from_local_datetime(&naive)
        .earliest()
        .map_or_else(|| naive.and_utc(), |dt| dt.with_timezone(&Utc))
}

/// Milliseconds an entry contributes to today's total.
///
/// Running entries count up to `now`, clamped to the window end.
fn entry_ms(entry: &RemoteEntry, window: &DayWindow, now: DateTime<Utc>) -> i64 {
    if let Some(secs) = entry.duration_secs {
        return secs.max(0) * 1000;
    }
    let end = entry.end.unwrap_or_else(|| now.min(window.end));
    (end - entry.start).num_milliseconds().max(0)
}

/// Sums entry durations per project.
pub fn totals_by_project(
    entries: &[RemoteEntry],
    window: &DayWindow,
    now: DateTime<Utc>,
) -> HashMap<ProjectKey, i64> {
    let mut totals = HashMap::new();
    for entry in entries {
        let key = ProjectKey::from_project_id(entry.project_id.clone());
        *totals.entry(key).or_insert(0) += entry_ms(entry, window, now);
    }
    totals
}
