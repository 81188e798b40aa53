//! Audio output using cpal
//!
//! [`CpalSink`] gives a cpal output stream the shape of a PCM playback device:
//! the session writes raw file-format frames into a lock-free byte ring, and
//! the device callback pops whole frames, converts them to the device sample
//! format and tracks starvation.
//!
//! cpal streams are not `Send`, so a sink is always created on the session
//! worker thread that drives it.

use crate::audio::format::{PcmFormat, StreamFormat};
use crate::audio::sink::{AudioBackend, HardwareSink};
use crate::audio::source::{FrameSource, SymphoniaFrameSource};
use crate::error::{Error, Result};
use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::{Device, FromSample, Sample, SampleFormat, SizedSample, Stream, StreamConfig};
use ringbuf::{traits::*, HeapCons, HeapProd, HeapRb};
use std::path::Path;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, error, info, warn};

/// Device identifier that selects the host's default output device
pub const DEFAULT_DEVICE: &str = "default";

/// Device sample formats we can render to, in order of preference
const OUTPUT_FORMATS: [SampleFormat; 3] = [SampleFormat::F32, SampleFormat::I16, SampleFormat::U16];

/// Flags shared between the writer thread and the device callback
#[derive(Default)]
struct SinkShared {
    /// First frame was queued and the stream was started
    started: AtomicBool,
    /// Callback found the ring empty after start
    underrun: AtomicBool,
    /// cpal reported a stream error
    stream_error: AtomicBool,
    /// Queued frames are being discarded
    discard: AtomicBool,
    /// Device latency past the ring, in frames, as of the last callback
    latency_frames: AtomicU64,
}

/// Device latency still to be played after the ring emptied.
///
/// The ring running dry is not the end of output: the frames the callback
/// already handed to the device keep playing for the latency measured at
/// that moment.
#[derive(Debug, Default)]
struct DrainTail {
    emptied: Option<(Instant, Duration)>,
}

impl DrainTail {
    fn is_playing(&mut self, queued_frames: usize, latency_frames: u64, sample_rate: u32, now: Instant) -> bool {
        if queued_frames > 0 {
            self.emptied = None;
            return true;
        }
        let (emptied_at, tail) = *self.emptied.get_or_insert_with(|| {
            let micros = latency_frames.saturating_mul(1_000_000) / sample_rate.max(1) as u64;
            (now, Duration::from_micros(micros))
        });
        now.saturating_duration_since(emptied_at) < tail
    }
}

/// Playback device backed by a cpal output stream
pub struct CpalSink {
    stream: Stream,
    producer: HeapProd<u8>,
    shared: Arc<SinkShared>,
    bytes_per_frame: usize,
    sample_rate: u32,
    drain_tail: DrainTail,
    device_name: String,
}

impl CpalSink {
    /// Open `device_name` for `format`.
    ///
    /// # Arguments
    /// - `device_name`: cpal output device name, or `"default"`
    /// - `format`: stream geometry of the file to play
    /// - `buffer_ms`: size of the frame ring between writer and device
    ///
    /// # Errors
    /// `AudioOutput` if the device does not exist, cannot play the file's
    /// rate / channel count, or the stream cannot be built.
    pub fn open(device_name: &str, format: &StreamFormat, buffer_ms: u32) -> Result<Self> {
        let host = cpal::default_host();

        let device = if device_name.is_empty() || device_name == DEFAULT_DEVICE {
            host.default_output_device()
                .ok_or_else(|| Error::AudioOutput("No default output device found".to_string()))?
        } else {
            host.output_devices()
                .map_err(|e| Error::AudioOutput(format!("Failed to enumerate devices: {}", e)))?
                .find(|d| d.name().ok().as_deref() == Some(device_name))
                .ok_or_else(|| {
                    Error::AudioOutput(format!("cannot open audio device {} (not found)", device_name))
                })?
        };
        let actual_name = device.name().unwrap_or_else(|_| "Unknown".to_string());

        let sample_format = Self::negotiate_sample_format(&device, format)?;
        let config = StreamConfig {
            channels: format.channels,
            sample_rate: cpal::SampleRate(format.sample_rate),
            buffer_size: cpal::BufferSize::Default,
        };

        let bytes_per_frame = format.bytes_per_frame();
        let capacity_frames = ((format.sample_rate as u64 * buffer_ms as u64) / 1000).max(1) as usize;
        let (producer, consumer) = HeapRb::<u8>::new(capacity_frames * bytes_per_frame).split();
        let shared = Arc::new(SinkShared::default());

        let stream = match sample_format {
            SampleFormat::F32 => build_stream::<f32>(&device, &config, consumer, format.pcm, Arc::clone(&shared))?,
            SampleFormat::I16 => build_stream::<i16>(&device, &config, consumer, format.pcm, Arc::clone(&shared))?,
            SampleFormat::U16 => build_stream::<u16>(&device, &config, consumer, format.pcm, Arc::clone(&shared))?,
            other => {
                return Err(Error::AudioOutput(format!("Unsupported sample format: {:?}", other)));
            }
        };

        // Start threshold 0: output begins with the first write, not before
        if let Err(e) = stream.pause() {
            debug!("Stream pause before first write not supported: {}", e);
        }

        info!(
            "Opened audio device '{}': {} Hz, {} channels, device format {:?}, ring {} frames",
            actual_name, format.sample_rate, format.channels, sample_format, capacity_frames
        );

        Ok(Self {
            stream,
            producer,
            shared,
            bytes_per_frame,
            sample_rate: format.sample_rate,
            drain_tail: DrainTail::default(),
            device_name: actual_name,
        })
    }

    /// Pick the first preferred device sample format offered for the file's
    /// channel count and rate
    fn negotiate_sample_format(device: &Device, format: &StreamFormat) -> Result<SampleFormat> {
        let offered: Vec<SampleFormat> = device
            .supported_output_configs()
            .map_err(|e| Error::AudioOutput(format!("Failed to get device configs: {}", e)))?
            .filter(|c| {
                c.channels() == format.channels
                    && c.min_sample_rate().0 <= format.sample_rate
                    && c.max_sample_rate().0 >= format.sample_rate
            })
            .map(|c| c.sample_format())
            .collect();

        OUTPUT_FORMATS
            .iter()
            .copied()
            .find(|f| offered.contains(f))
            .ok_or_else(|| {
                Error::AudioOutput(format!(
                    "device does not support {} channels at {} Hz (offered formats: {:?})",
                    format.channels, format.sample_rate, offered
                ))
            })
    }

    fn queued_frames(&self) -> usize {
        self.producer.occupied_len() / self.bytes_per_frame
    }

    fn check_stream(&self) -> Result<()> {
        if self.shared.stream_error.load(Ordering::Acquire) {
            return Err(Error::AudioOutput(format!(
                "audio stream error on device '{}'",
                self.device_name
            )));
        }
        Ok(())
    }
}

impl HardwareSink for CpalSink {
    fn avail(&mut self) -> Result<usize> {
        self.check_stream()?;
        if self.shared.underrun.load(Ordering::Acquire) {
            return Err(Error::Underrun);
        }
        Ok(self.producer.vacant_len() / self.bytes_per_frame)
    }

    fn write(&mut self, frames: &[u8], frame_count: usize) -> Result<usize> {
        self.check_stream()?;

        let room = self.producer.vacant_len() / self.bytes_per_frame;
        let accepted = frame_count.min(room);
        if accepted == 0 {
            return Ok(0);
        }

        let pushed = self.producer.push_slice(&frames[..accepted * self.bytes_per_frame]);
        if pushed != accepted * self.bytes_per_frame {
            return Err(Error::AudioOutput(format!(
                "ring accepted {} of {} bytes",
                pushed,
                accepted * self.bytes_per_frame
            )));
        }

        if !self.shared.started.swap(true, Ordering::AcqRel) {
            self.stream
                .play()
                .map_err(|e| Error::AudioOutput(format!("Failed to start stream: {}", e)))?;
            debug!("Audio stream started on first write");
        }

        Ok(accepted)
    }

    fn delay(&mut self) -> Result<i64> {
        self.check_stream()?;
        let latency = self.shared.latency_frames.load(Ordering::Relaxed);
        Ok(self.queued_frames() as i64 + latency as i64)
    }

    fn is_running(&mut self) -> Result<bool> {
        let shared = &self.shared;
        if !shared.started.load(Ordering::Acquire)
            || shared.stream_error.load(Ordering::Acquire)
            || shared.discard.load(Ordering::Acquire)
        {
            return Ok(false);
        }

        let queued = self.queued_frames();
        // Starved with frames still waiting: a real xrun
        if queued > 0 && shared.underrun.load(Ordering::Acquire) {
            return Ok(false);
        }
        let latency = shared.latency_frames.load(Ordering::Relaxed);
        Ok(self.drain_tail.is_playing(queued, latency, self.sample_rate, Instant::now()))
    }

    fn drop_pending(&mut self) -> Result<()> {
        self.shared.discard.store(true, Ordering::Release);
        self.stream
            .pause()
            .map_err(|e| Error::AudioOutput(format!("Failed to pause stream: {}", e)))
    }
}

impl Drop for CpalSink {
    fn drop(&mut self) {
        debug!("Closing audio device '{}'", self.device_name);
    }
}

/// Build an output stream rendering raw `pcm` frames as `T` samples
fn build_stream<T>(
    device: &Device,
    config: &StreamConfig,
    mut consumer: HeapCons<u8>,
    pcm: PcmFormat,
    shared: Arc<SinkShared>,
) -> Result<Stream>
where
    T: SizedSample + FromSample<f32>,
{
    let channels = config.channels as usize;
    let sample_rate = config.sample_rate.0 as u128;
    let bytes_per_sample = pcm.bytes_per_sample();
    let bytes_per_frame = bytes_per_sample * channels;
    let mut frame_buf = vec![0u8; bytes_per_frame];
    let error_shared = Arc::clone(&shared);

    device
        .build_output_stream(
            config,
            move |data: &mut [T], info: &cpal::OutputCallbackInfo| {
                if shared.discard.load(Ordering::Acquire) {
                    consumer.clear();
                    data.fill(T::EQUILIBRIUM);
                    return;
                }

                let timestamp = info.timestamp();
                if let Some(latency) = timestamp.playback.duration_since(&timestamp.callback) {
                    let frames = latency.as_micros() * sample_rate / 1_000_000;
                    shared.latency_frames.store(frames as u64, Ordering::Relaxed);
                }

                for frame in data.chunks_mut(channels) {
                    if consumer.occupied_len() >= bytes_per_frame {
                        consumer.pop_slice(&mut frame_buf);
                        for (sample, raw) in frame.iter_mut().zip(frame_buf.chunks_exact(bytes_per_sample)) {
                            *sample = T::from_sample(pcm.sample_to_f32(raw));
                        }
                    } else {
                        if shared.started.load(Ordering::Acquire) {
                            shared.underrun.store(true, Ordering::Release);
                        }
                        frame.fill(T::EQUILIBRIUM);
                    }
                }
            },
            move |err| {
                error!("Audio stream error: {}", err);
                error_shared.stream_error.store(true, Ordering::Release);
            },
            None,
        )
        .map_err(|e| Error::AudioOutput(format!("Failed to build stream: {}", e)))
}

/// Production backend: symphonia file sources, cpal device sinks
#[derive(Debug, Clone)]
pub struct CpalBackend {
    sink_buffer_ms: u32,
}

impl CpalBackend {
    pub fn new(sink_buffer_ms: u32) -> Self {
        if sink_buffer_ms < 100 {
            warn!(
                "Device ring of {} ms is below the start-time deadband on most rates",
                sink_buffer_ms
            );
        }
        Self { sink_buffer_ms }
    }
}

impl AudioBackend for CpalBackend {
    fn open_source(&self, path: &Path) -> Result<Box<dyn FrameSource>> {
        Ok(Box::new(SymphoniaFrameSource::open(path)?))
    }

    fn open_sink(&self, device: &str, format: &StreamFormat) -> Result<Box<dyn HardwareSink>> {
        Ok(Box::new(CpalSink::open(device, format, self.sink_buffer_ms)?))
    }
}
