//! Duration formatting for status display.

/// Formats milliseconds as `"{h}h {mm}m"`, or `"{m}m"` under an hour.
///
/// Seconds are truncated; negative input is shown as zero.
pub fn format_duration(ms: i64) -> String {
    let minutes = ms.max(0) / 60_000;
    let hours = minutes / 60;
    let minutes = minutes % 60;
    if hours > 0 {
        format!("{hours}h {minutes:02}m")
    } else {
        format!("{minutes}m")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn under_an_hour_shows_minutes_only() {
        assert_eq!(format_duration(0), "0m");
        assert_eq!(format_duration(59_999), "0m");
        assert_eq!(format_duration(42 * 60_000), "42m");
    }

    #[test]
    fn hours_pad_minutes() {
        assert_eq!(format_duration(3_600_000), "1h 00m");
        assert_eq!(format_duration(3_600_000 + 7 * 60_000), "1h 07m");
        assert_eq!(format_duration(26 * 3_600_000), "26h 00m");
    }

    #[test]
    fn negative_is_zero() {
        assert_eq!(format_duration(-5_000), "0m");
    }
}
