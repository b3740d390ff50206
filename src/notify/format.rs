//! Human-readable rendering of durations and counts.

use chrono::Duration;

/// Placeholder shown for values nobody knows.
pub const UNKNOWN: &str = "Unknown";

/// Renders a duration using its two most significant units.
///
/// ```text
/// 2d 3h    3h 5m    14m    45s    Unknown
/// ```
///
/// Negative durations (clock skew) render as `0s`.
pub fn format_duration(duration: Option<Duration>) -> String {
    let Some(duration) = duration else {
        return UNKNOWN.to_string();
    };

    let secs = duration.num_seconds().max(0);
    let days = secs / 86_400;
    let hours = (secs % 86_400) / 3_600;
    let minutes = (secs % 3_600) / 60;
    let seconds = secs % 60;

    if days > 0 {
        format!("{days}d {hours}h")
    } else if hours > 0 {
        format!("{hours}h {minutes}m")
    } else if minutes > 0 {
        format!("{minutes}m")
    } else {
        format!("{seconds}s")
    }
}

/// Renders a count with its noun, pluralized.
pub fn plural(count: u64, noun: &str) -> String {
    if count == 1 {
        format!("{count} {noun}")
    } else {
        format!("{count} {noun}s")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn durations() {
        assert_eq!(format_duration(None), "Unknown");
        assert_eq!(format_duration(Some(Duration::seconds(45))), "45s");
        assert_eq!(format_duration(Some(Duration::minutes(14) + Duration::seconds(59))), "14m");
        assert_eq!(format_duration(Some(Duration::hours(3) + Duration::minutes(5))), "3h 5m");
        assert_eq!(format_duration(Some(Duration::days(2) + Duration::hours(3))), "2d 3h");
        assert_eq!(format_duration(Some(Duration::seconds(-5))), "0s");
    }

    #[test]
    fn plurals() {
        assert_eq!(plural(1, "invite"), "1 invite");
        assert_eq!(plural(0, "invite"), "0 invites");
        assert_eq!(plural(12, "invite"), "12 invites");
    }
}
