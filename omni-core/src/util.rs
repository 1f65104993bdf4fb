use std::time::Duration;

/// Convert a number of seconds to a string in the format "HH:MM:SS".
/// If the number of hours is 0, it will be omitted.
pub fn seconds_to_hms_string(seconds: u64) -> String {
    let hours = seconds / 3600;
    let minutes = (seconds % 3600) / 60;
    let seconds = seconds % 60;

    if hours > 0 {
        format!("{}:{:02}:{:02}", hours, minutes, seconds)
    } else {
        format!("{}:{:02}", minutes, seconds)
    }
}

/// Formats a track length or position for display.
pub fn duration_to_hms_string(duration: Duration) -> String {
    seconds_to_hms_string(duration.as_secs())
}

/// Truncates `s` to at most `max` characters, respecting char boundaries.
pub fn truncate_chars(s: &str, max: usize) -> &str {
    match s.char_indices().nth(max) {
        Some((index, _)) => &s[..index],
        None => s,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_seconds_to_hms_string() {
        // Test with hours
        assert_eq!(seconds_to_hms_string(3661), "1:01:01");
        assert_eq!(seconds_to_hms_string(7323), "2:02:03");
        assert_eq!(seconds_to_hms_string(3600), "1:00:00");

        // Test without hours
        assert_eq!(seconds_to_hms_string(61), "1:01");
        assert_eq!(seconds_to_hms_string(123), "2:03");
        assert_eq!(seconds_to_hms_string(60), "1:00");

        // Test edge cases
        assert_eq!(seconds_to_hms_string(0), "0:00");
        assert_eq!(seconds_to_hms_string(59), "0:59");
    }

    #[test]
    fn test_duration_to_hms_string() {
        assert_eq!(duration_to_hms_string(Duration::from_millis(224_900)), "3:44");
    }

    #[test]
    fn test_truncate_chars() {
        assert_eq!(truncate_chars("hello", 3), "hel");
        assert_eq!(truncate_chars("hé", 5), "hé");
        assert_eq!(truncate_chars("ééé", 2), "éé");
    }
}
