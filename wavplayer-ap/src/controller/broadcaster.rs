//! Coalescing status broadcaster
//!
//! Two-field state machine: `pending` and the last known snapshot.
//!
//! - [`offer`](StatusBroadcaster::offer) drops a snapshot whose serialized
//!   form equals the last recorded one, otherwise records it as last known.
//!   It reports `true` only on the `pending: false -> true` edge, which is
//!   the caller's cue to arm the throttle timer.
//! - [`fire`](StatusBroadcaster::fire) runs when the timer expires: clears
//!   `pending` and broadcasts whatever is last known at that moment, so
//!   distinct values offered within one window are coalesced.

use tokio::sync::broadcast;
use tracing::{debug, warn};
use wavplayer_common::StatusSnapshot;

/// Rate-limited, deduplicating status fan-out
pub struct StatusBroadcaster {
    tx: broadcast::Sender<StatusSnapshot>,
    last_json: Option<String>,
    last_known: Option<StatusSnapshot>,
    last_broadcast: Option<StatusSnapshot>,
    pending: bool,
}

impl StatusBroadcaster {
    /// # Arguments
    ///
    /// * `capacity` - Snapshots buffered per lagging subscriber
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity);
        Self {
            tx,
            last_json: None,
            last_known: None,
            last_broadcast: None,
            pending: false,
        }
    }

    /// Record a merged snapshot.
    ///
    /// Returns `true` when a broadcast must be scheduled (none was pending).
    pub fn offer(&mut self, snapshot: StatusSnapshot) -> bool {
        let json = match snapshot.to_json_string() {
            Ok(json) => json,
            Err(e) => {
                warn!("Dropping status that cannot be serialized: {}", e);
                return false;
            }
        };

        if self.last_json.as_deref() == Some(json.as_str()) {
            return false;
        }
        debug!("Status changed: {}", json);
        self.last_json = Some(json);
        self.last_known = Some(snapshot);

        if self.pending {
            return false;
        }
        self.pending = true;
        true
    }

    /// Throttle window elapsed: broadcast the last known snapshot
    pub fn fire(&mut self) -> Option<StatusSnapshot> {
        self.pending = false;
        let snapshot = self.last_known.clone()?;

        match self.tx.send(snapshot.clone()) {
            Ok(count) => debug!("Broadcast status to {} subscribers", count),
            Err(_) => debug!("Status broadcast with no subscribers"),
        }
        self.last_broadcast = Some(snapshot.clone());
        Some(snapshot)
    }

    pub fn subscribe(&self) -> broadcast::Receiver<StatusSnapshot> {
        self.tx.subscribe()
    }

    pub fn is_pending(&self) -> bool {
        self.pending
    }

    /// Most recent distinct snapshot, broadcast or not
    pub fn last_known(&self) -> Option<&StatusSnapshot> {
        self.last_known.as_ref()
    }

    /// Snapshot delivered by the most recent broadcast
    pub fn last_broadcast(&self) -> Option<&StatusSnapshot> {
        self.last_broadcast.as_ref()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wavplayer_common::PlayerStatus;

    fn playing(file_id: &str, start: i64, seq: u32) -> StatusSnapshot {
        StatusSnapshot::new(
            PlayerStatus::Playing {
                file_id: file_id.to_string(),
                start_time_millis_since_epoch: start,
                speed: 1.0,
            },
            "player-1",
            seq,
        )
    }

    #[test]
    fn test_first_offer_arms_timer() {
        let mut broadcaster = StatusBroadcaster::new(16);
        assert!(broadcaster.offer(playing("a.wav", 1_000, 1)));
        assert!(broadcaster.is_pending());
    }

    #[test]
    fn test_identical_snapshot_dropped() {
        let mut broadcaster = StatusBroadcaster::new(16);
        let mut rx = broadcaster.subscribe();

        assert!(broadcaster.offer(playing("a.wav", 1_000, 1)));
        broadcaster.fire();
        assert!(!broadcaster.offer(playing("a.wav", 1_000, 1)));
        assert!(!broadcaster.is_pending());

        assert_eq!(rx.try_recv().unwrap(), playing("a.wav", 1_000, 1));
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn test_window_coalesces_to_latest() {
        let mut broadcaster = StatusBroadcaster::new(16);
        let mut rx = broadcaster.subscribe();

        assert!(broadcaster.offer(playing("a.wav", 1_000, 1)));
        // Already pending: recorded, no second timer
        assert!(!broadcaster.offer(playing("a.wav", 1_005, 1)));
        assert_eq!(broadcaster.last_known(), Some(&playing("a.wav", 1_005, 1)));

        let fired = broadcaster.fire();
        assert_eq!(fired, Some(playing("a.wav", 1_005, 1)));
        assert_eq!(rx.try_recv().unwrap(), playing("a.wav", 1_005, 1));
        assert!(rx.try_recv().is_err());
        assert!(!broadcaster.is_pending());
    }

    #[test]
    fn test_rearms_after_fire() {
        let mut broadcaster = StatusBroadcaster::new(16);
        assert!(broadcaster.offer(playing("a.wav", 1_000, 1)));
        broadcaster.fire();
        assert!(broadcaster.offer(playing("a.wav", 1_010, 1)));
        assert_eq!(broadcaster.last_broadcast(), Some(&playing("a.wav", 1_000, 1)));
    }

    #[test]
    fn test_fire_without_snapshot() {
        let mut broadcaster = StatusBroadcaster::new(16);
        assert_eq!(broadcaster.fire(), None);
        assert!(broadcaster.last_broadcast().is_none());
    }
}
