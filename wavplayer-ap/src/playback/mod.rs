//! Playback sessions: streaming one file into the audio device

pub mod events;
pub mod session;
pub mod start_time;

pub use events::{SessionEvent, SessionEventReceiver, SessionEventSender};
pub use session::{start_cursor, PlaybackSession, SessionState};
pub use start_time::StartTimeEstimator;
