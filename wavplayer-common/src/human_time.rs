//! Human-readable position formatting
//!
//! Positions inside audio files are reported to operators as `H:MM:SS`
//! (hours unpadded, minutes and seconds zero padded).

const SECONDS_PER_HOUR: u64 = 60 * 60;

/// Format a position in milliseconds as `H:MM:SS`.
///
/// The sign is dropped: callers that accept negative offsets ("start in the
/// future") describe the direction separately. Sub-second remainders are
/// truncated.
///
/// # Examples
///
/// ```
/// use wavplayer_common::human_time::format_position_hms;
///
/// assert_eq!(format_position_hms(0), "0:00:00");
/// assert_eq!(format_position_hms(61_999), "0:01:01");
/// assert_eq!(format_position_hms(3_723_000), "1:02:03");
/// assert_eq!(format_position_hms(-3_000), "0:00:03");
/// ```
pub fn format_position_hms(position_ms: i64) -> String {
    let total_seconds = position_ms.unsigned_abs() / 1000;
    let hours = total_seconds / SECONDS_PER_HOUR;
    let minutes = (total_seconds % SECONDS_PER_HOUR) / 60;
    let seconds = total_seconds % 60;
    format!("{}:{:02}:{:02}", hours, minutes, seconds)
}

/// Format a duration in milliseconds as `M:SS` (minutes unbounded).
///
/// Used when logging file durations.
pub fn format_minutes_seconds(duration_ms: u64) -> String {
    let total_seconds = duration_ms / 1000;
    format!("{}:{:02}", total_seconds / 60, total_seconds % 60)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_zero() {
        assert_eq!(format_position_hms(0), "0:00:00");
    }

    #[test]
    fn test_sub_second_truncated() {
        assert_eq!(format_position_hms(999), "0:00:00");
        assert_eq!(format_position_hms(2_000), "0:00:02");
    }

    #[test]
    fn test_minutes_and_hours() {
        assert_eq!(format_position_hms(59_000), "0:00:59");
        assert_eq!(format_position_hms(60_000), "0:01:00");
        assert_eq!(format_position_hms(3_599_000), "0:59:59");
        assert_eq!(format_position_hms(3_600_000), "1:00:00");
        assert_eq!(format_position_hms(36_000_000 + 5_000), "10:00:05");
    }

    #[test]
    fn test_negative_uses_magnitude() {
        assert_eq!(format_position_hms(-3_000), "0:00:03");
        assert_eq!(format_position_hms(-3_661_000), "1:01:01");
        assert_eq!(format_position_hms(i64::MIN), format_position_hms(i64::MAX));
    }

    #[test]
    fn test_minutes_seconds() {
        assert_eq!(format_minutes_seconds(0), "0:00");
        assert_eq!(format_minutes_seconds(5_000), "0:05");
        assert_eq!(format_minutes_seconds(185_500), "3:05");
        assert_eq!(format_minutes_seconds(7_200_000), "120:00");
    }
}
