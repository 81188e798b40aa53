//! Hardware sink contract and the backend factory that opens sinks and sources
//!
//! A [`HardwareSink`] mirrors the small slice of a PCM device API the
//! playback session relies on: free space, interleaved writes, queued delay,
//! running state, and dropping queued frames. Closing is `Drop`.
//!
//! Sinks are opened on the thread that will drive them and never move
//! between threads, so the trait does not require `Send`.

use crate::audio::format::StreamFormat;
use crate::audio::source::FrameSource;
use crate::error::Result;
use std::path::Path;

/// Playback side of an audio device, configured for one stream format.
///
/// Playback starts as soon as any frame is queued (start threshold 0).
pub trait HardwareSink {
    /// Frames that can be written right now without blocking.
    ///
    /// # Errors
    /// - `Error::Underrun` if the device starved since playback started
    /// - `Error::AudioOutput` for any other device failure
    fn avail(&mut self) -> Result<usize>;

    /// Queue up to `frame_count` interleaved frames from `frames`.
    ///
    /// Returns the number of frames accepted, which may be fewer than
    /// requested.
    fn write(&mut self, frames: &[u8], frame_count: usize) -> Result<usize>;

    /// Frames queued but not yet physically played
    fn delay(&mut self) -> Result<i64>;

    /// Whether the device is still actively playing queued frames
    fn is_running(&mut self) -> Result<bool>;

    /// Discard all queued frames and stop output
    fn drop_pending(&mut self) -> Result<()>;
}

/// Factory for the two collaborators a playback session needs.
///
/// One production implementation ([`crate::audio::output::CpalBackend`]);
/// tests substitute a simulated device.
pub trait AudioBackend: Send + Sync {
    /// Open and probe an audio file
    fn open_source(&self, path: &Path) -> Result<Box<dyn FrameSource>>;

    /// Open `device` for playback of `format`.
    ///
    /// Called on the session worker thread.
    fn open_sink(&self, device: &str, format: &StreamFormat) -> Result<Box<dyn HardwareSink>>;
}
