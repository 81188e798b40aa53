//! Frame sources: raw PCM frames read out of an audio file
//!
//! The session never decodes audio. It asks a [`FrameSource`] for raw
//! interleaved bytes in the file's own sample layout and hands them to the
//! device unchanged. The production source uses symphonia only for container
//! parsing (WAV / AIFF) and takes the packet payloads as-is.

use crate::audio::format::{Endianness, PcmFormat, SampleType, StreamFormat};
use crate::error::{Error, Result};
use std::path::Path;
use symphonia::core::codecs::{self, CodecType, CODEC_TYPE_NULL};
use symphonia::core::errors::Error as SymphoniaError;
use symphonia::core::formats::{FormatOptions, FormatReader, SeekMode, SeekTo};
use symphonia::core::io::MediaSourceStream;
use symphonia::core::meta::MetadataOptions;
use symphonia::core::probe::Hint;
use tracing::{debug, info};

/// A seekable supply of raw frames from one audio file.
pub trait FrameSource: Send {
    /// Stream geometry as read from the file header
    fn format(&self) -> &StreamFormat;

    /// Position the source so the next read starts at `frame`.
    ///
    /// Seeking to or past the last frame is allowed; the next read then
    /// reports end of file.
    fn seek(&mut self, frame: u64) -> Result<()>;

    /// Fill `buf` with raw interleaved frame bytes.
    ///
    /// Returns the number of bytes written; `0` means end of file.
    fn read_raw(&mut self, buf: &mut [u8]) -> Result<usize>;
}

/// Frame source over a PCM WAV or AIFF file, parsed with symphonia
pub struct SymphoniaFrameSource {
    reader: Box<dyn FormatReader>,
    track_id: u32,
    format: StreamFormat,
    /// Payload of the last packet not yet handed out
    pending: Vec<u8>,
    pending_pos: usize,
    /// Bytes to discard from upcoming packets after a packet-aligned seek
    skip_bytes: usize,
    at_end: bool,
}

impl SymphoniaFrameSource {
    /// Open and probe `path`.
    ///
    /// # Errors
    /// - `Io` if the file cannot be opened
    /// - `UnsupportedFormat` for non-PCM codecs, unknown geometry, or
    ///   containers symphonia cannot probe
    pub fn open(path: &Path) -> Result<Self> {
        let file = std::fs::File::open(path)?;
        let mss = MediaSourceStream::new(Box::new(file), Default::default());

        let mut hint = Hint::new();
        if let Some(ext) = path.extension().and_then(|e| e.to_str()) {
            hint.with_extension(ext);
        }

        let probed = symphonia::default::get_probe()
            .format(&hint, mss, &FormatOptions::default(), &MetadataOptions::default())
            .map_err(|e| {
                Error::UnsupportedFormat(format!("cannot probe '{}': {}", path.display(), e))
            })?;
        let reader = probed.format;

        let track = reader
            .tracks()
            .iter()
            .find(|t| t.codec_params.codec != CODEC_TYPE_NULL)
            .ok_or_else(|| Error::UnsupportedFormat("no audio track found".to_string()))?;

        let params = &track.codec_params;
        let pcm = pcm_format_for_codec(params.codec)?;
        let sample_rate = params
            .sample_rate
            .ok_or_else(|| Error::UnsupportedFormat("sample rate not found".to_string()))?;
        let channels = params
            .channels
            .map(|c| c.count() as u16)
            .ok_or_else(|| Error::UnsupportedFormat("channel count not found".to_string()))?;
        let total_frames = params
            .n_frames
            .ok_or_else(|| Error::UnsupportedFormat("total frame count not found".to_string()))?;

        let format = StreamFormat::new(sample_rate, channels, pcm, total_frames)?;
        let track_id = track.id;

        info!("Finished reading audio file '{}': {}", path.display(), format);

        Ok(Self {
            reader,
            track_id,
            format,
            pending: Vec::new(),
            pending_pos: 0,
            skip_bytes: 0,
            at_end: false,
        })
    }

    fn next_payload(&mut self) -> Result<bool> {
        loop {
            match self.reader.next_packet() {
                Ok(packet) => {
                    if packet.track_id() != self.track_id {
                        continue;
                    }
                    self.pending.clear();
                    self.pending.extend_from_slice(packet.buf());

                    let skip = self.skip_bytes.min(self.pending.len());
                    self.pending_pos = skip;
                    self.skip_bytes -= skip;
                    return Ok(true);
                }
                Err(SymphoniaError::IoError(ref e))
                    if e.kind() == std::io::ErrorKind::UnexpectedEof =>
                {
                    debug!("Reached end of file");
                    self.at_end = true;
                    return Ok(false);
                }
                Err(e) => {
                    return Err(Error::Decode(format!("Failed reading raw frames: {}", e)));
                }
            }
        }
    }
}

impl FrameSource for SymphoniaFrameSource {
    fn format(&self) -> &StreamFormat {
        &self.format
    }

    fn seek(&mut self, frame: u64) -> Result<()> {
        self.pending.clear();
        self.pending_pos = 0;
        self.skip_bytes = 0;

        if frame >= self.format.total_frames {
            self.at_end = true;
            return Ok(());
        }
        self.at_end = false;

        let seeked = self
            .reader
            .seek(
                SeekMode::Accurate,
                SeekTo::TimeStamp {
                    ts: frame,
                    track_id: self.track_id,
                },
            )
            .map_err(|e| Error::Decode(format!("Failed seeking to frame {}: {}", frame, e)))?;

        // Container seeks land on packet boundaries at or before the target
        let lead_in = seeked.required_ts.saturating_sub(seeked.actual_ts) as usize;
        self.skip_bytes = lead_in * self.format.bytes_per_frame();
        Ok(())
    }

    fn read_raw(&mut self, buf: &mut [u8]) -> Result<usize> {
        let mut written = 0;
        while written < buf.len() {
            if self.pending_pos < self.pending.len() {
                let n = (buf.len() - written).min(self.pending.len() - self.pending_pos);
                buf[written..written + n]
                    .copy_from_slice(&self.pending[self.pending_pos..self.pending_pos + n]);
                written += n;
                self.pending_pos += n;
                continue;
            }
            if self.at_end || !self.next_payload()? {
                break;
            }
        }
        Ok(written)
    }
}

/// Map a symphonia PCM codec to the sample layout it stores
fn pcm_format_for_codec(codec: CodecType) -> Result<PcmFormat> {
    use Endianness::{Big, Little};
    use SampleType::{Float, Signed, Unsigned};

    let (sample_type, bytes, endianness) = match codec {
        codecs::CODEC_TYPE_PCM_S8 => (Signed, 1, Little),
        codecs::CODEC_TYPE_PCM_U8 => (Unsigned, 1, Little),
        codecs::CODEC_TYPE_PCM_S16LE => (Signed, 2, Little),
        codecs::CODEC_TYPE_PCM_S16BE => (Signed, 2, Big),
        codecs::CODEC_TYPE_PCM_U16LE => (Unsigned, 2, Little),
        codecs::CODEC_TYPE_PCM_U16BE => (Unsigned, 2, Big),
        codecs::CODEC_TYPE_PCM_S24LE => (Signed, 3, Little),
        codecs::CODEC_TYPE_PCM_S24BE => (Signed, 3, Big),
        codecs::CODEC_TYPE_PCM_U24LE => (Unsigned, 3, Little),
        codecs::CODEC_TYPE_PCM_U24BE => (Unsigned, 3, Big),
        codecs::CODEC_TYPE_PCM_S32LE => (Signed, 4, Little),
        codecs::CODEC_TYPE_PCM_S32BE => (Signed, 4, Big),
        codecs::CODEC_TYPE_PCM_U32LE => (Unsigned, 4, Little),
        codecs::CODEC_TYPE_PCM_U32BE => (Unsigned, 4, Big),
        codecs::CODEC_TYPE_PCM_F32LE => (Float, 4, Little),
        codecs::CODEC_TYPE_PCM_F32BE => (Float, 4, Big),
        codecs::CODEC_TYPE_PCM_F64LE => (Float, 8, Little),
        codecs::CODEC_TYPE_PCM_F64BE => (Float, 8, Big),
        other => {
            return Err(Error::UnsupportedFormat(format!(
                "codec {} is not interleaved PCM",
                other
            )));
        }
    };
    PcmFormat::new(sample_type, bytes, endianness)
}
