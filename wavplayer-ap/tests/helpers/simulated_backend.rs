//! Simulated audio device
//!
//! [`SimulatedBackend`] opens real files through the symphonia frame source
//! and hands out [`SimulatedSink`]s that consume queued frames in real time at
//! the file's sample rate. Every write is recorded in a shared [`DeviceLog`].
//!
//! Fault injection:
//! - `partial_writes`: each write accepts at most half the offered frames
//! - `underrun_after_avail_calls`: `avail` reports an xrun after N calls
//! - `fail_open`: opening the device fails

use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};
use wavplayer_ap::audio::{AudioBackend, FrameSource, HardwareSink, StreamFormat, SymphoniaFrameSource};
use wavplayer_ap::{Error, Result};

/// Device behaviour knobs
#[derive(Debug, Clone)]
pub struct SimulatedOptions {
    /// Device buffer size in frames
    pub capacity_frames: usize,
    pub partial_writes: bool,
    pub underrun_after_avail_calls: Option<usize>,
    pub fail_open: bool,
}

impl Default for SimulatedOptions {
    fn default() -> Self {
        Self {
            capacity_frames: 800,
            partial_writes: false,
            underrun_after_avail_calls: None,
            fail_open: false,
        }
    }
}

/// One accepted write
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WriteRecord {
    pub frames: usize,
    pub silent: bool,
    pub at: Instant,
}

/// Everything the simulated devices observed, across all sinks
#[derive(Debug, Default)]
pub struct DeviceLog {
    pub sinks_opened: usize,
    pub sinks_closed: usize,
    pub drops: usize,
    pub writes: Vec<WriteRecord>,
    /// First-channel sample of every accepted frame (16-bit files only)
    pub first_channel: Vec<i16>,
}

impl DeviceLog {
    /// Silent frames written before the first non-silent write
    pub fn leading_silence_frames(&self) -> usize {
        self.writes
            .iter()
            .take_while(|w| w.silent)
            .map(|w| w.frames)
            .sum()
    }

    /// Time of the first non-silent write
    pub fn first_audio_at(&self) -> Option<Instant> {
        self.writes.iter().find(|w| !w.silent).map(|w| w.at)
    }

    /// First-channel samples of the non-silent frames
    pub fn audio_samples(&self) -> Vec<i16> {
        self.first_channel.iter().copied().filter(|v| *v != 0).collect()
    }
}

/// Backend double: real frame sources, simulated sinks
#[derive(Clone)]
pub struct SimulatedBackend {
    options: SimulatedOptions,
    log: Arc<Mutex<DeviceLog>>,
}

impl SimulatedBackend {
    pub fn new(options: SimulatedOptions) -> Self {
        Self {
            options,
            log: Arc::new(Mutex::new(DeviceLog::default())),
        }
    }

    pub fn log(&self) -> MutexGuard<'_, DeviceLog> {
        lock(&self.log)
    }
}

impl Default for SimulatedBackend {
    fn default() -> Self {
        Self::new(SimulatedOptions::default())
    }
}

impl AudioBackend for SimulatedBackend {
    fn open_source(&self, path: &Path) -> Result<Box<dyn FrameSource>> {
        Ok(Box::new(SymphoniaFrameSource::open(path)?))
    }

    fn open_sink(&self, device: &str, format: &StreamFormat) -> Result<Box<dyn HardwareSink>> {
        if self.options.fail_open {
            return Err(Error::AudioOutput(format!(
                "cannot open audio device {} (simulated failure)",
                device
            )));
        }
        lock(&self.log).sinks_opened += 1;

        Ok(Box::new(SimulatedSink {
            log: Arc::clone(&self.log),
            options: self.options.clone(),
            sample_rate: format.sample_rate,
            bytes_per_frame: format.bytes_per_frame(),
            sixteen_bit: format.pcm.bytes_per_sample() == 2,
            queued: 0,
            last_tick: None,
            avail_calls: 0,
        }))
    }
}

fn lock(log: &Mutex<DeviceLog>) -> MutexGuard<'_, DeviceLog> {
    log.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Real-time frame consumer
pub struct SimulatedSink {
    log: Arc<Mutex<DeviceLog>>,
    options: SimulatedOptions,
    sample_rate: u32,
    bytes_per_frame: usize,
    sixteen_bit: bool,
    queued: u64,
    /// Consumption clock; `None` until the first write
    last_tick: Option<Instant>,
    avail_calls: usize,
}

impl SimulatedSink {
    /// Consume the frames due since the last tick
    fn advance(&mut self) {
        let Some(last) = self.last_tick else {
            return;
        };
        let now = Instant::now();
        let due = (now.duration_since(last).as_nanos() * self.sample_rate as u128 / 1_000_000_000) as u64;

        if due >= self.queued {
            // Starved: no credit accumulates while empty
            self.queued = 0;
            self.last_tick = Some(now);
        } else {
            self.queued -= due;
            let consumed = Duration::from_nanos((due as u128 * 1_000_000_000 / self.sample_rate as u128) as u64);
            self.last_tick = Some(last + consumed);
        }
    }
}

impl HardwareSink for SimulatedSink {
    fn avail(&mut self) -> Result<usize> {
        self.avail_calls += 1;
        if let Some(limit) = self.options.underrun_after_avail_calls {
            if self.avail_calls > limit {
                return Err(Error::Underrun);
            }
        }
        self.advance();
        Ok(self.options.capacity_frames.saturating_sub(self.queued as usize))
    }

    fn write(&mut self, frames: &[u8], frame_count: usize) -> Result<usize> {
        self.advance();
        let room = self.options.capacity_frames.saturating_sub(self.queued as usize);
        let mut accepted = frame_count.min(room);
        if self.options.partial_writes && accepted > 1 {
            accepted /= 2;
        }
        if accepted == 0 {
            return Ok(0);
        }

        let bytes = &frames[..accepted * self.bytes_per_frame];
        let silent = bytes.iter().all(|b| *b == 0);

        let mut log = lock(&self.log);
        log.writes.push(WriteRecord {
            frames: accepted,
            silent,
            at: Instant::now(),
        });
        if self.sixteen_bit {
            log.first_channel.extend(
                bytes
                    .chunks_exact(self.bytes_per_frame)
                    .map(|frame| i16::from_le_bytes([frame[0], frame[1]])),
            );
        }
        drop(log);

        if self.last_tick.is_none() {
            self.last_tick = Some(Instant::now());
        }
        self.queued += accepted as u64;
        Ok(accepted)
    }

    fn delay(&mut self) -> Result<i64> {
        self.advance();
        Ok(self.queued as i64)
    }

    fn is_running(&mut self) -> Result<bool> {
        self.advance();
        Ok(self.last_tick.is_some() && self.queued > 0)
    }

    fn drop_pending(&mut self) -> Result<()> {
        self.queued = 0;
        lock(&self.log).drops += 1;
        Ok(())
    }
}

impl Drop for SimulatedSink {
    fn drop(&mut self) {
        lock(&self.log).sinks_closed += 1;
    }
}
