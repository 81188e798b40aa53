//! PCM format descriptors
//!
//! Frames travel from the file to the device in the file's own sample layout,
//! so the stream format is negotiated from what the file says, not resampled
//! or converted on the way.

use crate::error::{Error, Result};
use std::fmt;
use wavplayer_common::human_time::format_minutes_seconds;

/// Numeric interpretation of one sample
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SampleType {
    Signed,
    Unsigned,
    Float,
}

impl SampleType {
    pub fn as_str(&self) -> &'static str {
        match self {
            SampleType::Signed => "signed integer",
            SampleType::Unsigned => "unsigned integer",
            SampleType::Float => "float",
        }
    }
}

/// Byte order of multi-byte samples
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Endianness {
    Little,
    Big,
}

impl Endianness {
    pub fn as_str(&self) -> &'static str {
        match self {
            Endianness::Little => "little",
            Endianness::Big => "big",
        }
    }
}

/// Layout of a single interleaved PCM sample.
///
/// Supported: 8/16/24/32-bit signed or unsigned integers, 32/64-bit floats,
/// either byte order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PcmFormat {
    sample_type: SampleType,
    bytes_per_sample: usize,
    endianness: Endianness,
}

impl PcmFormat {
    /// Validate and build a sample layout
    pub fn new(sample_type: SampleType, bytes_per_sample: usize, endianness: Endianness) -> Result<Self> {
        let supported = match sample_type {
            SampleType::Signed | SampleType::Unsigned => (1..=4).contains(&bytes_per_sample),
            SampleType::Float => bytes_per_sample == 4 || bytes_per_sample == 8,
        };
        if !supported {
            return Err(Error::UnsupportedFormat(format!(
                "{} samples of {} bytes are not supported",
                sample_type.as_str(),
                bytes_per_sample
            )));
        }
        Ok(Self {
            sample_type,
            bytes_per_sample,
            endianness,
        })
    }

    pub fn sample_type(&self) -> SampleType {
        self.sample_type
    }

    pub fn bytes_per_sample(&self) -> usize {
        self.bytes_per_sample
    }

    pub fn endianness(&self) -> Endianness {
        self.endianness
    }

    /// Decode one raw sample to a normalized f32 in [-1.0, 1.0].
    ///
    /// `bytes` must be exactly `bytes_per_sample` long.
    pub fn sample_to_f32(&self, bytes: &[u8]) -> f32 {
        debug_assert_eq!(bytes.len(), self.bytes_per_sample);

        match self.sample_type {
            SampleType::Float => {
                if self.bytes_per_sample == 4 {
                    let raw = [bytes[0], bytes[1], bytes[2], bytes[3]];
                    match self.endianness {
                        Endianness::Little => f32::from_le_bytes(raw),
                        Endianness::Big => f32::from_be_bytes(raw),
                    }
                } else {
                    let mut raw = [0u8; 8];
                    raw.copy_from_slice(&bytes[..8]);
                    let value = match self.endianness {
                        Endianness::Little => f64::from_le_bytes(raw),
                        Endianness::Big => f64::from_be_bytes(raw),
                    };
                    value as f32
                }
            }
            SampleType::Signed | SampleType::Unsigned => {
                let bits = (self.bytes_per_sample * 8) as u32;
                let mut value: u32 = 0;
                match self.endianness {
                    Endianness::Little => {
                        for (i, byte) in bytes.iter().enumerate() {
                            value |= (*byte as u32) << (8 * i);
                        }
                    }
                    Endianness::Big => {
                        for byte in bytes {
                            value = (value << 8) | *byte as u32;
                        }
                    }
                }

                // Left-align so the sign bit lands at bit 31
                let shifted = value << (32 - bits);
                let signed = match self.sample_type {
                    SampleType::Unsigned => (shifted ^ 0x8000_0000) as i32,
                    _ => shifted as i32,
                };
                signed as f32 / 2_147_483_648.0
            }
        }
    }
}

impl fmt::Display for PcmFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}-bit {} ({} endian)",
            self.bytes_per_sample * 8,
            self.sample_type.as_str(),
            self.endianness.as_str()
        )
    }
}

/// Geometry of one audio file: everything the session and the device need
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StreamFormat {
    pub sample_rate: u32,
    pub channels: u16,
    pub pcm: PcmFormat,
    pub total_frames: u64,
}

impl StreamFormat {
    pub fn new(sample_rate: u32, channels: u16, pcm: PcmFormat, total_frames: u64) -> Result<Self> {
        if sample_rate == 0 {
            return Err(Error::UnsupportedFormat("sample rate is 0".to_string()));
        }
        if channels == 0 {
            return Err(Error::UnsupportedFormat("file has no channels".to_string()));
        }
        Ok(Self {
            sample_rate,
            channels,
            pcm,
            total_frames,
        })
    }

    pub fn bytes_per_frame(&self) -> usize {
        self.pcm.bytes_per_sample() * self.channels as usize
    }

    /// Number of whole frames that fit in `buffer_bytes`
    pub fn frames_in(&self, buffer_bytes: usize) -> usize {
        buffer_bytes / self.bytes_per_frame()
    }

    pub fn duration_ms(&self) -> u64 {
        self.total_frames * 1000 / self.sample_rate as u64
    }
}

impl fmt::Display for StreamFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let duration_ms = self.duration_ms();
        write!(
            f,
            "{} Hz, {} channels, {}, {} frames ({} ms, {})",
            self.sample_rate,
            self.channels,
            self.pcm,
            self.total_frames,
            duration_ms,
            format_minutes_seconds(duration_ms)
        )
    }
}
