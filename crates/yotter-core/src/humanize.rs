//! Display helpers for derived, read-only entity views.
//!
//! Everything here is computed from already-materialized canonical fields on
//! each call and never cached.

use chrono::{DateTime, TimeDelta, Utc};

/// Human phrasing of an elapsed time ("3 days", "an hour", "a moment").
pub fn natural_delta(delta: TimeDelta) -> String {
    let secs = delta.num_seconds().unsigned_abs();
    let days = secs / 86_400;

    if days == 0 {
        return match secs {
            0 => "a moment".to_string(),
            1 => "a second".to_string(),
            2..=59 => format!("{} seconds", secs),
            60..=119 => "a minute".to_string(),
            120..=3_599 => format!("{} minutes", secs / 60),
            3_600..=7_199 => "an hour".to_string(),
            _ => format!("{} hours", secs / 3_600),
        };
    }

    let years = days / 365;
    let months = (days % 365) / 30;
    match (years, days) {
        (0, 1) => "a day".to_string(),
        (0, 2..=29) => format!("{} days", days),
        (0, _) if months <= 1 => "a month".to_string(),
        (0, _) => format!("{} months", months),
        (1, _) if months == 0 => "a year".to_string(),
        (1, _) if months == 1 => "1 year, 1 month".to_string(),
        (1, _) => format!("1 year, {} months", months),
        _ => format!("{} years", years),
    }
}

/// "<delta> ago" relative to `now`.
pub fn time_ago(published: DateTime<Utc>, now: DateTime<Utc>) -> String {
    format!("{} ago", natural_delta(now - published))
}

/// Compact count ("950", "1.2K", "3.4M", "2B").
pub fn compact_count(n: u64) -> String {
    const UNITS: [(u64, &str); 3] = [(1_000_000_000, "B"), (1_000_000, "M"), (1_000, "K")];

    for (scale, suffix) in UNITS {
        if n >= scale {
            let whole = n / scale;
            let tenth = (n % scale) * 10 / scale;
            return if whole >= 100 || tenth == 0 {
                format!("{}{}", whole, suffix)
            } else {
                format!("{}.{}{}", whole, tenth, suffix)
            };
        }
    }
    n.to_string()
}

/// Count with thousands separators ("1,234,567").
pub fn grouped_count(n: u64) -> String {
    let digits = n.to_string();
    let mut out = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, c) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            out.push(',');
        }
        out.push(c);
    }
    out
}

/// Clock-style duration ("4:05", "1:02:03").
pub fn format_duration(seconds: u64) -> String {
    let (h, m, s) = (seconds / 3_600, (seconds % 3_600) / 60, seconds % 60);
    if h > 0 {
        format!("{}:{:02}:{:02}", h, m, s)
    } else {
        format!("{}:{:02}", m, s)
    }
}
