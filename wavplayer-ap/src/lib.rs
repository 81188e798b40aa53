//! # WavPlayer Audio Player Library (wavplayer-ap)
//!
//! Streams PCM audio files into an output device in real time and reports
//! wall-clock playback start times.
//!
//! **Architecture:**
//! - `audio`: frame sources (symphonia) and hardware sinks (cpal + ringbuf)
//! - `playback`: one session per play attempt, each on its own worker thread
//! - `controller`: single active session, request sequencing, coalesced
//!   status broadcast, hosted by the player service thread
//! - `api`: HTTP control and SSE status (axum)

pub mod api;
pub mod audio;
pub mod config;
pub mod controller;
pub mod error;
pub mod files;
pub mod playback;

pub use controller::{PlayerHandle, PlayerService, RequestOutcome};
pub use error::{Error, Result};
