//! Relative, human-readable timestamps.

use chrono::{DateTime, Utc};

const DATE_FORMAT: &str = "%-m/%-d/%Y";

/// Presence line for a user last seen at `last_seen`.
///
/// Buckets: under a minute, under an hour, under a day, exactly one day,
/// under a week, then the absolute date. Missing timestamps mean offline.
pub fn format_last_seen(last_seen: Option<DateTime<Utc>>, now: DateTime<Utc>) -> String {
    let Some(last_seen) = last_seen else {
        return "Offline".to_string();
    };

    let elapsed = now.signed_duration_since(last_seen);
    let minutes = elapsed.num_minutes();
    let hours = elapsed.num_hours();
    let days = elapsed.num_days();

    if minutes < 1 {
        "Active now".to_string()
    } else if minutes < 60 {
        format!("Active {minutes}m ago")
    } else if hours < 24 {
        format!("Active {hours}h ago")
    } else if days == 1 {
        "Active yesterday".to_string()
    } else if days < 7 {
        format!("Active {days}d ago")
    } else {
        format!("Last seen {}", last_seen.format(DATE_FORMAT))
    }
}

/// Short timestamp for list rows and message bubbles.
pub fn format_time(at: DateTime<Utc>, now: DateTime<Utc>) -> String {
    let elapsed = now.signed_duration_since(at);
    let minutes = elapsed.num_minutes();
    let hours = elapsed.num_hours();
    let days = elapsed.num_days();

    if minutes < 1 {
        "Just now".to_string()
    } else if minutes < 60 {
        format!("{minutes}m ago")
    } else if hours < 24 {
        format!("{hours}h ago")
    } else if days < 7 {
        format!("{days}d ago")
    } else {
        at.format(DATE_FORMAT).to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 5, 20, 12, 0, 0).unwrap()
    }

    fn seen(ago: Duration) -> String {
        format_last_seen(Some(now() - ago), now())
    }

    #[test]
    fn last_seen_boundaries() {
        assert_eq!(seen(Duration::seconds(45)), "Active now");
        assert_eq!(seen(Duration::seconds(60)), "Active 1m ago");
        assert_eq!(seen(Duration::minutes(59)), "Active 59m ago");
        assert_eq!(seen(Duration::minutes(60)), "Active 1h ago");
        assert_eq!(seen(Duration::hours(23)), "Active 23h ago");
        assert_eq!(seen(Duration::hours(25)), "Active yesterday");
        assert_eq!(seen(Duration::hours(47)), "Active yesterday");
        assert_eq!(seen(Duration::days(2)), "Active 2d ago");
        assert_eq!(seen(Duration::days(6)), "Active 6d ago");
        assert_eq!(seen(Duration::days(7)), "Last seen 5/13/2024");
    }

    #[test]
    fn last_seen_edge_inputs() {
        assert_eq!(format_last_seen(None, now()), "Offline");
        // Clock skew: a timestamp slightly in the future is still "now".
        assert_eq!(seen(Duration::seconds(-5)), "Active now");
    }

    #[test]
    fn list_time_buckets() {
        let t = |ago: Duration| format_time(now() - ago, now());
        assert_eq!(t(Duration::seconds(10)), "Just now");
        assert_eq!(t(Duration::minutes(5)), "5m ago");
        assert_eq!(t(Duration::hours(3)), "3h ago");
        assert_eq!(t(Duration::hours(30)), "1d ago");
        assert_eq!(t(Duration::days(10)), "5/10/2024");
    }
}
