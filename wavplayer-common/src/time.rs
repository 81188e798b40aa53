//! Timestamp utilities

use chrono::Utc;

/// Current wall-clock time in milliseconds since the Unix epoch
pub fn now_millis_since_epoch() -> i64 {
    Utc::now().timestamp_millis()
}

/// Convert a frame count at `frame_rate` to milliseconds (truncating).
///
/// Negative frame counts map to negative milliseconds; a zero frame rate
/// yields 0. Exact over the whole `i64` range of frame counts.
pub fn frames_to_millis(frames: i64, frame_rate: u32) -> i64 {
    if frame_rate == 0 {
        return 0;
    }
    let millis = frames as i128 * 1000 / frame_rate as i128;
    millis.clamp(i64::MIN as i128, i64::MAX as i128) as i64
}
