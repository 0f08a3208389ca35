use anyhow::{Context, Result};
use chrono::{DateTime, Utc};

/// Format of timeline timestamps, e.g. "Wed Aug 27 13:08:45 +0000 2008"
const TWITTER_TIMESTAMP: &str = "%a %b %d %H:%M:%S %z %Y";

/// Date-only format used as the date frequency key: "2024-01-20"
const DISPLAY_DATE: &str = "%Y-%m-%d";

/// Parse a timeline timestamp string into a UTC datetime
pub fn parse_twitter_timestamp(timestamp: &str) -> Result<DateTime<Utc>> {
    DateTime::parse_from_str(timestamp, TWITTER_TIMESTAMP)
        .map(|dt| dt.with_timezone(&Utc))
        .with_context(|| format!("Failed to parse Twitter timestamp: {timestamp}"))
}

/// Format a date (without time) for display
pub fn format_date_only(datetime: &DateTime<Utc>) -> String {
    datetime.format(DISPLAY_DATE).to_string()
}

/// Approximate human-readable duration from now until the given instant,
/// e.g. "12 minutes". Past instants render as "a moment".
pub fn format_duration_until(target: DateTime<Utc>) -> String {
    let seconds = (target - Utc::now()).num_seconds();
    if seconds < 1 {
        return "a moment".to_string();
    }
    if seconds < 60 {
        return plural(seconds, "second");
    }
    let minutes = seconds / 60;
    if minutes < 60 {
        return plural(minutes, "minute");
    }
    plural(minutes / 60, "hour")
}

fn plural(n: i64, unit: &str) -> String {
    if n == 1 {
        format!("1 {unit}")
    } else {
        format!("{n} {unit}s")
    }
}
