//! Session controller: single active playback session, request sequencing,
//! status merging
//!
//! The controller lives on the player service's executor. It is the only
//! owner of the active [`PlaybackSession`]; replacement is take-and-drop, so
//! an old session is fully stopped (worker joined) before a new one is
//! constructed.
//!
//! Every `new_song_request` allocates the next sequence id, even when it
//! fails. A failed request leaves no session active: the previous one was
//! already stopped and is not restored.

use crate::audio::sink::AudioBackend;
use crate::config::PlaybackTuning;
use crate::controller::broadcaster::StatusBroadcaster;
use crate::error::Result;
use crate::files;
use crate::playback::events::{SessionEvent, SessionEventSender};
use crate::playback::session::PlaybackSession;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::broadcast;
use tracing::{debug, info, warn};
use wavplayer_common::human_time::format_position_hms;
use wavplayer_common::{PlayerStatus, StatusSnapshot};

/// Snapshots buffered per lagging status subscriber
const STATUS_CHANNEL_CAPACITY: usize = 64;

/// Result of a play or stop request, as reported to the transport
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestOutcome {
    pub success: bool,
    pub message: String,
    pub play_seq_id: u32,
}

impl RequestOutcome {
    fn success(message: String, play_seq_id: u32) -> Self {
        Self {
            success: true,
            message,
            play_seq_id,
        }
    }

    fn failure(message: String, play_seq_id: u32) -> Self {
        Self {
            success: false,
            message,
            play_seq_id,
        }
    }
}

/// Owner of the active playback session
pub struct SessionController {
    backend: Arc<dyn AudioBackend>,
    wav_dir: PathBuf,
    audio_device: String,
    tuning: PlaybackTuning,
    player_uuid: String,
    play_seq_id: u32,
    active: Option<PlaybackSession>,
    events_tx: SessionEventSender,
    broadcaster: StatusBroadcaster,
}

impl SessionController {
    /// # Arguments
    /// - `wav_dir`: audio root; canonicalized here
    /// - `events_tx`: channel sessions report into; the receiving end must be
    ///   drained into [`on_session_event`](Self::on_session_event)
    ///
    /// # Errors
    /// `Config` if `wav_dir` is not an existing directory.
    pub fn new(
        backend: Arc<dyn AudioBackend>,
        wav_dir: PathBuf,
        audio_device: String,
        tuning: PlaybackTuning,
        player_uuid: String,
        events_tx: SessionEventSender,
    ) -> Result<Self> {
        let wav_dir = files::canonical_root(&wav_dir)?;

        Ok(Self {
            backend,
            wav_dir,
            audio_device,
            tuning,
            player_uuid,
            play_seq_id: 0,
            active: None,
            events_tx,
            broadcaster: StatusBroadcaster::new(STATUS_CHANNEL_CAPACITY),
        })
    }

    /// Record the start-up status (nothing playing, sequence id 0).
    ///
    /// Returns whether the throttle timer must be armed.
    pub fn initialize(&mut self) -> bool {
        let snapshot = StatusSnapshot::new(PlayerStatus::Idle, self.player_uuid.clone(), 0);
        self.broadcaster.offer(snapshot)
    }

    /// Play `file_id` from `start_offset_ms`, replacing whatever is active.
    pub fn new_song_request(&mut self, file_id: &str, start_offset_ms: i64) -> RequestOutcome {
        let (prev_file_id, prev_was_playing) = match self.active.take() {
            Some(mut session) => {
                let prev_file_id = session.file_id().to_string();
                let was_playing = session.stop();
                (Some(prev_file_id), was_playing)
            }
            None => (None, false),
        };

        self.play_seq_id = self.play_seq_id.wrapping_add(1).max(1);
        let play_seq_id = self.play_seq_id;

        let mut session = match self.open_session(file_id, play_seq_id) {
            Ok(session) => session,
            Err(e) => {
                warn!(play_seq_id, "Failed loading '{}': {}", file_id, e);
                return RequestOutcome::failure(
                    format!(
                        "failed loading new audio file '{}'. currently no audio file is loaded in the player and it is not playing. reason for failure: {}",
                        file_id, e
                    ),
                    play_seq_id,
                );
            }
        };

        let message = if prev_file_id.as_deref() == Some(file_id) {
            format!(
                "changed position of the current file '{}'. new position in ms is: {}",
                file_id, start_offset_ms
            )
        } else {
            let lead = match prev_file_id.as_deref() {
                Some(prev) if prev_was_playing && !prev.is_empty() => format!(
                    "audio file successfully changed from '{}' to '{}' and will be played",
                    prev, file_id
                ),
                _ => format!("will play audio file '{}'", file_id),
            };
            let future_note = if start_offset_ms < 0 { " in the future" } else { "" };
            format!(
                "{} starting at position {} ms ({}{})",
                lead,
                start_offset_ms,
                format_position_hms(start_offset_ms),
                future_note
            )
        };

        if let Err(e) = session.play(start_offset_ms) {
            warn!(play_seq_id, "Failed playing '{}': {}", file_id, e);
            return RequestOutcome::failure(
                format!(
                    "playing new audio file '{}' failed. currently player is not playing. reason for failure: {}",
                    file_id, e
                ),
                play_seq_id,
            );
        }

        info!(play_seq_id, "{}", message);
        self.active = Some(session);
        RequestOutcome::success(message, play_seq_id)
    }

    /// Stop the active session, if any. Never allocates a sequence id.
    pub fn stop_play_request(&mut self) -> RequestOutcome {
        let (current_file_id, was_playing) = match self.active.take() {
            Some(mut session) => {
                let file_id = session.file_id().to_string();
                (file_id, session.stop())
            }
            None => (String::new(), false),
        };

        let message = if current_file_id.is_empty() || !was_playing {
            "no audio file is being played, so stop had no effect".to_string()
        } else {
            format!("current audio file '{}' stopped playing", current_file_id)
        };

        info!(play_seq_id = self.play_seq_id, "{}", message);
        RequestOutcome::success(message, self.play_seq_id)
    }

    /// Merge a session event into a status snapshot.
    ///
    /// Returns whether the throttle timer must be armed.
    pub fn on_session_event(&mut self, event: SessionEvent) -> bool {
        let play_seq_id = event.play_seq_id();
        let status = match event {
            SessionEvent::NowPlaying {
                file_id,
                start_time_millis_since_epoch,
                speed,
                ..
            } => PlayerStatus::Playing {
                file_id,
                start_time_millis_since_epoch,
                speed,
            },
            SessionEvent::NoSongPlaying { file_id, .. } => PlayerStatus::Stopped {
                stopped_file_id: file_id,
            },
        };

        let snapshot = StatusSnapshot::new(status, self.player_uuid.clone(), play_seq_id);
        self.broadcaster.offer(snapshot)
    }

    /// Throttle window elapsed: broadcast the latest distinct status
    pub fn flush_status(&mut self) -> Option<StatusSnapshot> {
        self.broadcaster.fire()
    }

    /// Status for clients that ask instead of subscribing: the last
    /// broadcast, or the pending one before the first broadcast
    pub fn current_status(&self) -> Option<StatusSnapshot> {
        self.broadcaster
            .last_broadcast()
            .or_else(|| self.broadcaster.last_known())
            .cloned()
    }

    pub fn subscribe_status(&self) -> broadcast::Receiver<StatusSnapshot> {
        self.broadcaster.subscribe()
    }

    pub fn play_seq_id(&self) -> u32 {
        self.play_seq_id
    }

    pub fn player_uuid(&self) -> &str {
        &self.player_uuid
    }

    /// File id of the session in the active slot, if any
    pub fn active_file_id(&self) -> Option<&str> {
        self.active.as_ref().map(|s| s.file_id())
    }

    /// Stop the active session before the service exits
    pub fn shutdown(&mut self) {
        if let Some(mut session) = self.active.take() {
            let was_playing = session.stop();
            debug!(
                play_seq_id = session.play_seq_id(),
                "Stopped '{}' on shutdown (was playing: {})",
                session.file_id(),
                was_playing
            );
        }
    }

    fn open_session(&self, file_id: &str, play_seq_id: u32) -> Result<PlaybackSession> {
        let path = files::resolve(&self.wav_dir, file_id)?;
        PlaybackSession::new(
            Arc::clone(&self.backend),
            &path,
            file_id,
            play_seq_id,
            &self.audio_device,
            self.tuning,
            self.events_tx.clone(),
        )
    }
}

impl Drop for SessionController {
    fn drop(&mut self) {
        self.shutdown();
    }
}
