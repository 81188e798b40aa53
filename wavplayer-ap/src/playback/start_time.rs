//! Wall-clock start-time estimation from hardware buffer delay
//!
//! The start time of a file is the epoch instant at which its frame 0 was (or
//! will be) physically played: `now - (cursor - delay)` converted to
//! milliseconds. Two guards keep the estimate quiet:
//!
//! - **Deadband:** delay readings below `deadband_frames` are ignored. They
//!   only occur near end of stream and are too noisy to trust.
//! - **Hysteresis:** a new estimate within `jitter_tolerance_ms` of the last
//!   published one is suppressed.

use wavplayer_common::time::frames_to_millis;

/// Anti-jitter start-time estimator for one playback session
#[derive(Debug, Clone)]
pub struct StartTimeEstimator {
    deadband_frames: i64,
    jitter_tolerance_ms: i64,
    last_published: Option<i64>,
}

impl StartTimeEstimator {
    pub fn new(deadband_frames: i64, jitter_tolerance_ms: i64) -> Self {
        Self {
            deadband_frames,
            jitter_tolerance_ms,
            last_published: None,
        }
    }

    /// Feed one delay observation.
    ///
    /// # Arguments
    /// - `cursor`: frames submitted so far (negative while silence for a
    ///   future start is still owed)
    /// - `delay`: frames queued in the device but not yet played
    /// - `sample_rate`: frames per second
    /// - `now_ms`: current epoch time in milliseconds
    ///
    /// # Returns
    /// The new estimate when it should be published, `None` when the
    /// observation was skipped or suppressed.
    pub fn observe(&mut self, cursor: i64, delay: i64, sample_rate: u32, now_ms: i64) -> Option<i64> {
        if delay < self.deadband_frames {
            return None;
        }

        let played_frames = cursor.saturating_sub(delay);
        let estimate = now_ms.saturating_sub(frames_to_millis(played_frames, sample_rate));

        if let Some(last) = self.last_published {
            if (estimate - last).abs() <= self.jitter_tolerance_ms {
                return None;
            }
        }

        self.last_published = Some(estimate);
        Some(estimate)
    }

    pub fn last_published(&self) -> Option<i64> {
        self.last_published
    }
}
