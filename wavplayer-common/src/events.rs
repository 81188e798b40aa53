//! Status snapshot types broadcast by the player
//!
//! A [`StatusSnapshot`] is the merged, outward-facing view of what the player
//! is doing. Transports (HTTP/SSE, MQTT, WebSocket) push its JSON form to
//! their clients verbatim, so the wire field names are part of the contract:
//!
//! ```json
//! {"song_is_playing":true,"file_id":"a.wav","start_time_millis_since_epoch":1700000000000,
//!  "speed":1.0,"uuid":"...","play_seq_id":3}
//! {"song_is_playing":false,"stopped_file_id":"a.wav","uuid":"...","play_seq_id":3}
//! ```

use crate::Result;
use serde::{Deserialize, Serialize};

/// What the player is doing, without the identity stamp
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(into = "WireStatus", try_from = "WireStatus")]
pub enum PlayerStatus {
    /// Nothing has been played since start-up
    Idle,

    /// A file is playing; `start_time_millis_since_epoch` is the wall-clock
    /// instant at which frame 0 of the file was (or will be) emitted
    Playing {
        file_id: String,
        start_time_millis_since_epoch: i64,
        speed: f64,
    },

    /// Playback of `stopped_file_id` ended, failed or was stopped
    Stopped { stopped_file_id: String },
}

/// Player status stamped with the static player identity and the sequence id
/// of the play request that produced it
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StatusSnapshot {
    #[serde(flatten)]
    pub status: PlayerStatus,

    /// Static player identity
    pub uuid: String,

    /// Sequence id of the request this status belongs to
    pub play_seq_id: u32,
}

impl StatusSnapshot {
    pub fn new(status: PlayerStatus, uuid: impl Into<String>, play_seq_id: u32) -> Self {
        Self {
            status,
            uuid: uuid.into(),
            play_seq_id,
        }
    }

    /// Serialized form used for change detection and for transports
    pub fn to_json_string(&self) -> Result<String> {
        Ok(serde_json::to_string(self)?)
    }

    pub fn is_playing(&self) -> bool {
        matches!(self.status, PlayerStatus::Playing { .. })
    }
}

#[derive(Serialize, Deserialize)]
struct WireStatus {
    song_is_playing: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    file_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    start_time_millis_since_epoch: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    speed: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    stopped_file_id: Option<String>,
}

impl From<PlayerStatus> for WireStatus {
    fn from(status: PlayerStatus) -> Self {
        match status {
            PlayerStatus::Idle => WireStatus {
                song_is_playing: false,
                file_id: None,
                start_time_millis_since_epoch: None,
                speed: None,
                stopped_file_id: None,
            },
            PlayerStatus::Playing {
                file_id,
                start_time_millis_since_epoch,
                speed,
            } => WireStatus {
                song_is_playing: true,
                file_id: Some(file_id),
                start_time_millis_since_epoch: Some(start_time_millis_since_epoch),
                speed: Some(speed),
                stopped_file_id: None,
            },
            PlayerStatus::Stopped { stopped_file_id } => WireStatus {
                song_is_playing: false,
                file_id: None,
                start_time_millis_since_epoch: None,
                speed: None,
                stopped_file_id: Some(stopped_file_id),
            },
        }
    }
}

impl TryFrom<WireStatus> for PlayerStatus {
    type Error = String;

    fn try_from(wire: WireStatus) -> std::result::Result<Self, Self::Error> {
        if wire.song_is_playing {
            let file_id = wire
                .file_id
                .ok_or_else(|| "playing status without 'file_id'".to_string())?;
            let start_time_millis_since_epoch = wire
                .start_time_millis_since_epoch
                .ok_or_else(|| "playing status without 'start_time_millis_since_epoch'".to_string())?;
            Ok(PlayerStatus::Playing {
                file_id,
                start_time_millis_since_epoch,
                speed: wire.speed.unwrap_or(1.0),
            })
        } else {
            Ok(match wire.stopped_file_id {
                Some(stopped_file_id) => PlayerStatus::Stopped { stopped_file_id },
                None => PlayerStatus::Idle,
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::{json, Value};

    fn to_value(snapshot: &StatusSnapshot) -> Value {
        serde_json::from_str(&snapshot.to_json_string().unwrap()).unwrap()
    }

    #[test]
    fn test_playing_wire_format() {
        let snapshot = StatusSnapshot::new(
            PlayerStatus::Playing {
                file_id: "track1.wav".to_string(),
                start_time_millis_since_epoch: 1_700_000_000_123,
                speed: 1.0,
            },
            "player-1",
            7,
        );

        assert_eq!(
            to_value(&snapshot),
            json!({
                "song_is_playing": true,
                "file_id": "track1.wav",
                "start_time_millis_since_epoch": 1_700_000_000_123i64,
                "speed": 1.0,
                "uuid": "player-1",
                "play_seq_id": 7
            })
        );
    }

    #[test]
    fn test_stopped_wire_format() {
        let snapshot = StatusSnapshot::new(
            PlayerStatus::Stopped {
                stopped_file_id: "track1.wav".to_string(),
            },
            "player-1",
            2,
        );

        assert_eq!(
            to_value(&snapshot),
            json!({
                "song_is_playing": false,
                "stopped_file_id": "track1.wav",
                "uuid": "player-1",
                "play_seq_id": 2
            })
        );
    }

    #[test]
    fn test_idle_has_no_file_fields() {
        let snapshot = StatusSnapshot::new(PlayerStatus::Idle, "player-1", 0);
        assert_eq!(
            to_value(&snapshot),
            json!({"song_is_playing": false, "uuid": "player-1", "play_seq_id": 0})
        );
        assert!(!snapshot.is_playing());
    }

    #[test]
    fn test_parse_back_from_transport_json() {
        let parsed: StatusSnapshot = serde_json::from_value(json!({
            "song_is_playing": false,
            "stopped_file_id": "b.wav",
            "uuid": "u",
            "play_seq_id": 4
        }))
        .unwrap();

        assert_eq!(
            parsed.status,
            PlayerStatus::Stopped {
                stopped_file_id: "b.wav".to_string()
            }
        );
        assert_eq!(parsed.play_seq_id, 4);
    }

    #[test]
    fn test_playing_without_file_id_rejected() {
        let parsed = serde_json::from_value::<StatusSnapshot>(json!({
            "song_is_playing": true,
            "uuid": "u",
            "play_seq_id": 1
        }));
        assert!(parsed.is_err());
    }

    #[test]
    fn test_serialized_form_distinguishes_sequence_ids() {
        let a = StatusSnapshot::new(PlayerStatus::Idle, "u", 1);
        let b = StatusSnapshot::new(PlayerStatus::Idle, "u", 2);
        assert_ne!(a.to_json_string().unwrap(), b.to_json_string().unwrap());
        assert_eq!(a.to_json_string().unwrap(), a.clone().to_json_string().unwrap());
    }
}
