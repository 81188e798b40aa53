//! Playback session: one play attempt of one file
//!
//! A session owns a frame source and, once playing, a hardware sink that lives
//! on the session's own worker thread. The worker runs a private
//! single-threaded tokio runtime hosting the transfer loop:
//!
//! ```text
//! Created ──play()──> Playing ──EOF──> Draining ──device idle──> Ended
//!    │                   │                 │
//!    └───────────────────┴─────────────────┴──stop() / fatal error──> Stopped
//! ```
//!
//! The loop suspends only when the device buffer is full (backoff) and while
//! draining (poll). Cancellation is cooperative: [`PlaybackSession::stop`]
//! cancels the token observed at the top of every iteration and at every
//! suspension, then joins the worker. The worker always reports
//! [`SessionEvent::NoSongPlaying`] as its final message, so no event from a
//! session can arrive after `stop()` returns.

use crate::audio::format::StreamFormat;
use crate::audio::sink::{AudioBackend, HardwareSink};
use crate::audio::source::FrameSource;
use crate::config::PlaybackTuning;
use crate::error::{Error, Result};
use crate::playback::events::{SessionEvent, SessionEventSender};
use crate::playback::start_time::StartTimeEstimator;
use std::path::Path;
use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::mpsc as std_mpsc;
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};
use wavplayer_common::time::{frames_to_millis, now_millis_since_epoch};

/// Lifecycle state of a playback session
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum SessionState {
    Created = 0,
    Playing = 1,
    Draining = 2,
    Ended = 3,
    Stopped = 4,
}

impl SessionState {
    fn from_u8(value: u8) -> Self {
        match value {
            0 => SessionState::Created,
            1 => SessionState::Playing,
            2 => SessionState::Draining,
            3 => SessionState::Ended,
            _ => SessionState::Stopped,
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, SessionState::Ended | SessionState::Stopped)
    }

    /// Still transferring or draining frames
    pub fn is_active(&self) -> bool {
        matches!(self, SessionState::Playing | SessionState::Draining)
    }
}

/// Lifecycle cell shared by the session handle and its worker.
///
/// Terminal states are sticky.
#[derive(Debug)]
struct StateCell(AtomicU8);

impl StateCell {
    fn new() -> Self {
        Self(AtomicU8::new(SessionState::Created as u8))
    }

    fn get(&self) -> SessionState {
        SessionState::from_u8(self.0.load(Ordering::Acquire))
    }

    /// Move to `next` unless already terminal. Returns whether it moved.
    fn transition(&self, next: SessionState) -> bool {
        self.0
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |current| {
                if SessionState::from_u8(current).is_terminal() {
                    None
                } else {
                    Some(next as u8)
                }
            })
            .is_ok()
    }
}

/// Frame cursor a session starts from for `start_offset_ms`.
///
/// Truncates toward zero, clamps to `total_frames` at the top, and keeps
/// negative values (future start) unclamped.
pub fn start_cursor(start_offset_ms: i64, sample_rate: u32, total_frames: u64) -> i64 {
    let frames = (start_offset_ms as f64 / 1000.0 * sample_rate as f64) as i64;
    frames.min(total_frames as i64)
}

/// One play attempt of one file.
///
/// Single-use: once [`play`](Self::play) has been called the session can only
/// be stopped and dropped. Dropping a running session stops it.
pub struct PlaybackSession {
    backend: Arc<dyn AudioBackend>,
    source: Option<Box<dyn FrameSource>>,
    format: StreamFormat,
    file_id: String,
    play_seq_id: u32,
    device: String,
    tuning: PlaybackTuning,
    events_tx: SessionEventSender,
    state: Arc<StateCell>,
    cancel: CancellationToken,
    worker: Option<JoinHandle<()>>,
}

impl PlaybackSession {
    /// Open the file at `path` and prepare a session for it.
    ///
    /// # Errors
    /// Whatever the backend reports when opening the frame source
    /// (`Io`, `UnsupportedFormat`, ...).
    pub fn new(
        backend: Arc<dyn AudioBackend>,
        path: &Path,
        file_id: &str,
        play_seq_id: u32,
        device: &str,
        tuning: PlaybackTuning,
        events_tx: SessionEventSender,
    ) -> Result<Self> {
        let source = backend.open_source(path)?;
        let format = *source.format();

        Ok(Self {
            backend,
            source: Some(source),
            format,
            file_id: file_id.to_string(),
            play_seq_id,
            device: device.to_string(),
            tuning,
            events_tx,
            state: Arc::new(StateCell::new()),
            cancel: CancellationToken::new(),
            worker: None,
        })
    }

    pub fn file_id(&self) -> &str {
        &self.file_id
    }

    pub fn play_seq_id(&self) -> u32 {
        self.play_seq_id
    }

    pub fn format(&self) -> &StreamFormat {
        &self.format
    }

    pub fn state(&self) -> SessionState {
        self.state.get()
    }

    /// Start playback at `start_offset_ms` (negative: that many ms in the
    /// future).
    ///
    /// Returns once the worker thread has opened the device and begun the
    /// transfer loop.
    ///
    /// # Errors
    /// - `InvalidState` if the session was already used
    /// - `Decode` if the source cannot seek to the start position
    /// - `AudioOutput` if the device cannot be opened or negotiated
    pub fn play(&mut self, start_offset_ms: i64) -> Result<()> {
        if self.state.get() != SessionState::Created {
            return Err(Error::InvalidState(format!(
                "playback session for '{}' was already used",
                self.file_id
            )));
        }
        let mut source = self.source.take().ok_or_else(|| {
            Error::InvalidState(format!("playback session for '{}' has no source", self.file_id))
        })?;

        let cursor = start_cursor(start_offset_ms, self.format.sample_rate, self.format.total_frames);
        if cursor >= 0 {
            if let Err(e) = source.seek(cursor as u64) {
                self.state.transition(SessionState::Stopped);
                return Err(e);
            }
        }
        debug!(
            play_seq_id = self.play_seq_id,
            "Starting '{}' at offset {} ms (frame {})", self.file_id, start_offset_ms, cursor
        );

        let (ready_tx, ready_rx) = std_mpsc::sync_channel::<Result<()>>(1);
        let worker = SessionWorker {
            backend: Arc::clone(&self.backend),
            device: self.device.clone(),
            source,
            format: self.format,
            file_id: self.file_id.clone(),
            play_seq_id: self.play_seq_id,
            cursor,
            tuning: self.tuning,
            state: Arc::clone(&self.state),
            cancel: self.cancel.clone(),
            events_tx: self.events_tx.clone(),
        };

        let handle = std::thread::Builder::new()
            .name(format!("playback-{}", self.play_seq_id))
            .spawn(move || worker.run(ready_tx))?;

        match ready_rx.recv() {
            Ok(Ok(())) => {
                self.worker = Some(handle);
                Ok(())
            }
            Ok(Err(e)) => {
                let _ = handle.join();
                self.state.transition(SessionState::Stopped);
                Err(e)
            }
            Err(_) => {
                let _ = handle.join();
                self.state.transition(SessionState::Stopped);
                Err(Error::Internal(
                    "playback thread exited before reporting start-up".to_string(),
                ))
            }
        }
    }

    /// Stop playback and wait for the worker thread to exit.
    ///
    /// Returns whether the session was still playing or draining when called.
    /// Every event of this session has been sent when this returns.
    pub fn stop(&mut self) -> bool {
        let was_active = self.state.get().is_active();

        self.cancel.cancel();
        if let Some(handle) = self.worker.take() {
            if handle.join().is_err() {
                error!(play_seq_id = self.play_seq_id, "Playback thread panicked");
            }
        }
        self.state.transition(SessionState::Stopped);

        was_active
    }
}

impl Drop for PlaybackSession {
    fn drop(&mut self) {
        if self.worker.is_some() {
            self.stop();
        }
    }
}

/// Everything the worker thread takes ownership of
struct SessionWorker {
    backend: Arc<dyn AudioBackend>,
    device: String,
    source: Box<dyn FrameSource>,
    format: StreamFormat,
    file_id: String,
    play_seq_id: u32,
    cursor: i64,
    tuning: PlaybackTuning,
    state: Arc<StateCell>,
    cancel: CancellationToken,
    events_tx: SessionEventSender,
}

impl SessionWorker {
    /// Worker thread body: open the device, report start-up on `ready_tx`,
    /// run the loop, always finish with `NoSongPlaying`.
    fn run(self, ready_tx: std_mpsc::SyncSender<Result<()>>) {
        let runtime = match tokio::runtime::Builder::new_current_thread()
            .enable_time()
            .build()
        {
            Ok(runtime) => runtime,
            Err(e) => {
                let _ = ready_tx.send(Err(Error::Internal(format!(
                    "failed to build playback runtime: {}",
                    e
                ))));
                return;
            }
        };

        let sink = match self.backend.open_sink(&self.device, &self.format) {
            Ok(sink) => sink,
            Err(e) => {
                let _ = ready_tx.send(Err(e));
                return;
            }
        };

        let play_seq_id = self.play_seq_id;
        let file_id = self.file_id.clone();
        let state = Arc::clone(&self.state);
        let events_tx = self.events_tx.clone();

        let mut transfer = TransferLoop::new(self, sink);
        state.transition(SessionState::Playing);
        let _ = ready_tx.send(Ok(()));

        if let Err(e) = runtime.block_on(transfer.run()) {
            error!(
                play_seq_id,
                "error while playing current audio file. stopped transferring frames to the device: {}", e
            );
        }
        if let Err(e) = transfer.sink.drop_pending() {
            warn!(play_seq_id, "Failed to drop pending frames: {}", e);
        }
        state.transition(SessionState::Stopped);
        // Close the device before reporting
        drop(transfer);

        info!(play_seq_id, "handling done");
        if events_tx
            .send(SessionEvent::NoSongPlaying { file_id, play_seq_id })
            .is_err()
        {
            debug!(play_seq_id, "Status receiver gone, final event dropped");
        }
    }
}

/// Outcome of one transfer step
enum Step {
    /// Frames were written; continue immediately
    Continue,
    /// Device buffer full; wait one backoff period
    Backoff,
    /// Source exhausted; switch to draining
    EndOfFile,
}

/// Transfer and drain loops, owned by the worker thread
struct TransferLoop {
    source: Box<dyn FrameSource>,
    sink: Box<dyn HardwareSink>,
    format: StreamFormat,
    file_id: String,
    play_seq_id: u32,
    cursor: i64,
    bytes_per_frame: usize,
    frames_per_transfer: usize,
    buffer: Vec<u8>,
    estimator: StartTimeEstimator,
    backoff: Duration,
    state: Arc<StateCell>,
    cancel: CancellationToken,
    events_tx: SessionEventSender,
}

impl TransferLoop {
    fn new(worker: SessionWorker, sink: Box<dyn HardwareSink>) -> Self {
        let bytes_per_frame = worker.format.bytes_per_frame();
        let frames_per_transfer = worker.format.frames_in(worker.tuning.transfer_buffer_bytes).max(1);

        Self {
            source: worker.source,
            sink,
            format: worker.format,
            file_id: worker.file_id,
            play_seq_id: worker.play_seq_id,
            cursor: worker.cursor,
            bytes_per_frame,
            frames_per_transfer,
            buffer: vec![0u8; frames_per_transfer * bytes_per_frame],
            estimator: StartTimeEstimator::new(
                worker.tuning.delay_deadband_frames,
                worker.tuning.jitter_tolerance_ms,
            ),
            backoff: worker.tuning.backoff(),
            state: worker.state,
            cancel: worker.cancel,
            events_tx: worker.events_tx,
        }
    }

    async fn run(&mut self) -> Result<()> {
        loop {
            if self.cancel.is_cancelled() {
                return Ok(());
            }
            match self.transfer_step()? {
                Step::Continue => tokio::task::yield_now().await,
                Step::Backoff => {
                    if !self.pause().await {
                        return Ok(());
                    }
                }
                Step::EndOfFile => break,
            }
        }

        info!(
            play_seq_id = self.play_seq_id,
            "done writing all frames to the device. waiting for it to play the remaining frames"
        );
        self.state.transition(SessionState::Draining);
        self.drain().await
    }

    /// Wait one backoff period. Returns `false` if cancelled meanwhile.
    async fn pause(&self) -> bool {
        tokio::select! {
            _ = self.cancel.cancelled() => false,
            _ = tokio::time::sleep(self.backoff) => true,
        }
    }

    fn transfer_step(&mut self) -> Result<Step> {
        let avail = self.sink.avail()?;
        if avail == 0 {
            return Ok(Step::Backoff);
        }

        let mut frames_to_deliver = avail.min(self.frames_per_transfer);
        let start_in_future = self.cursor < 0;

        if start_in_future {
            // Silence up to the real start point, never past it
            frames_to_deliver = frames_to_deliver.min(self.cursor.unsigned_abs().min(usize::MAX as u64) as usize);
            // Zero bytes for every layout; unsigned samples hear an offset
            self.buffer[..frames_to_deliver * self.bytes_per_frame].fill(0);
        } else {
            let wanted = frames_to_deliver * self.bytes_per_frame;
            let bytes_read = self.source.read_raw(&mut self.buffer[..wanted])?;
            if bytes_read == 0 {
                return Ok(Step::EndOfFile);
            }
            frames_to_deliver = bytes_read / self.bytes_per_frame;
            if frames_to_deliver == 0 {
                return Err(Error::Decode(format!(
                    "source returned {} bytes, less than one frame",
                    bytes_read
                )));
            }
        }

        let frames_written = self.sink.write(
            &self.buffer[..frames_to_deliver * self.bytes_per_frame],
            frames_to_deliver,
        )?;

        self.cursor += frames_written as i64;
        if self.cursor >= 0 && (start_in_future || frames_written != frames_to_deliver) {
            if !start_in_future {
                warn!(
                    play_seq_id = self.play_seq_id,
                    "transferred fewer frames than requested. frames_to_deliver: {}, frames_written: {}",
                    frames_to_deliver,
                    frames_written
                );
            }
            self.source.seek(self.cursor as u64)?;
        }

        self.check_start_time()?;
        Ok(Step::Continue)
    }

    async fn drain(&mut self) -> Result<()> {
        loop {
            if self.cancel.is_cancelled() {
                return Ok(());
            }
            if !self.sink.is_running()? {
                info!(
                    play_seq_id = self.play_seq_id,
                    "playing audio file ended successfully (all frames transferred and played)"
                );
                self.state.transition(SessionState::Ended);
                return Ok(());
            }

            self.check_start_time()?;

            if !self.pause().await {
                return Ok(());
            }
        }
    }

    /// Publish a new start-time estimate if it materially changed
    fn check_start_time(&mut self) -> Result<()> {
        let delay = self.sink.delay()?;
        let previous = self.estimator.last_published();
        let now_ms = now_millis_since_epoch();

        let Some(start_ms) = self.estimator.observe(self.cursor, delay, self.format.sample_rate, now_ms) else {
            return Ok(());
        };

        let position_ms = frames_to_millis(self.cursor.saturating_sub(delay), self.format.sample_rate);
        match previous {
            Some(previous) => info!(
                play_seq_id = self.play_seq_id,
                "calculated a new audio file start time: {} (ms since epoch). change since last calculation: {} ms. device delay {} frames, position in file {} ms",
                start_ms,
                start_ms - previous,
                delay,
                position_ms
            ),
            None => info!(
                play_seq_id = self.play_seq_id,
                "calculated audio file start time: {} (ms since epoch). device delay {} frames, position in file {} ms",
                start_ms,
                delay,
                position_ms
            ),
        }

        let event = SessionEvent::NowPlaying {
            file_id: self.file_id.clone(),
            play_seq_id: self.play_seq_id,
            start_time_millis_since_epoch: start_ms,
            speed: 1.0,
        };
        if self.events_tx.send(event).is_err() {
            debug!(play_seq_id = self.play_seq_id, "Status receiver gone, start time dropped");
        }
        Ok(())
    }
}
