//! Session to controller messages
//!
//! A playback session never calls into its owner. Everything it has to say
//! travels as a [`SessionEvent`] over an unbounded channel that the controller
//! drains on its own executor.

use tokio::sync::mpsc;

/// Lifecycle / position report from a playback session
#[derive(Debug, Clone, PartialEq)]
pub enum SessionEvent {
    /// New wall-clock start-time estimate for the playing file
    NowPlaying {
        file_id: String,
        play_seq_id: u32,
        start_time_millis_since_epoch: i64,
        speed: f64,
    },

    /// Session is no longer producing audio (ended, stopped or failed).
    ///
    /// Sent exactly once, as the last message of every session that got as
    /// far as starting its worker thread.
    NoSongPlaying { file_id: String, play_seq_id: u32 },
}

impl SessionEvent {
    /// Sequence id of the session that produced this event
    pub fn play_seq_id(&self) -> u32 {
        match self {
            SessionEvent::NowPlaying { play_seq_id, .. } => *play_seq_id,
            SessionEvent::NoSongPlaying { play_seq_id, .. } => *play_seq_id,
        }
    }

    pub fn file_id(&self) -> &str {
        match self {
            SessionEvent::NowPlaying { file_id, .. } => file_id,
            SessionEvent::NoSongPlaying { file_id, .. } => file_id,
        }
    }
}

pub type SessionEventSender = mpsc::UnboundedSender<SessionEvent>;
pub type SessionEventReceiver = mpsc::UnboundedReceiver<SessionEvent>;
