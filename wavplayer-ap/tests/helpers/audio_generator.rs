//! Audio Test File Generation Utilities
//!
//! Generates PCM files whose samples encode the frame index, so a test can
//! tell exactly which file frames reached the device and in what order. WAV
//! files are written with hound; AIFF files are assembled chunk by chunk.

use hound::{WavSpec, WavWriter};
use std::path::Path;

/// Standard fixture sample rate (8 kHz keeps fixtures small)
pub const TEST_SAMPLE_RATE: u32 = 8_000;

/// Sample value of `frame` in every channel of a ramp fixture.
///
/// Never zero, so real audio is distinguishable from silence.
pub fn ramp_value(frame: u64) -> i16 {
    ((frame % 30_000) + 1) as i16
}

/// Generate a 16-bit ramp WAV file
///
/// # Arguments
/// * `path` - Output file path
/// * `sample_rate` - Frames per second
/// * `channels` - Channel count
/// * `duration_ms` - Duration in milliseconds
///
/// # Returns
/// Number of frames written
pub fn generate_ramp_wav<P: AsRef<Path>>(
    path: P,
    sample_rate: u32,
    channels: u16,
    duration_ms: u64,
) -> Result<u64, hound::Error> {
    let spec = WavSpec {
        channels,
        sample_rate,
        bits_per_sample: 16,
        sample_format: hound::SampleFormat::Int,
    };

    let mut writer = WavWriter::create(path, spec)?;
    let total_frames = (sample_rate as u64 * duration_ms) / 1000;

    for frame in 0..total_frames {
        let value = ramp_value(frame);
        for _ in 0..channels {
            writer.write_sample(value)?;
        }
    }

    writer.finalize()?;
    Ok(total_frames)
}

/// Generate a WAV file with `bits_per_sample`-bit integer samples (8, 16, 24
/// or 32), all at a constant quarter-scale positive level
pub fn generate_constant_wav<P: AsRef<Path>>(
    path: P,
    sample_rate: u32,
    channels: u16,
    bits_per_sample: u16,
    duration_ms: u64,
) -> Result<u64, hound::Error> {
    let spec = WavSpec {
        channels,
        sample_rate,
        bits_per_sample,
        sample_format: hound::SampleFormat::Int,
    };

    let mut writer = WavWriter::create(path, spec)?;
    let total_frames = (sample_rate as u64 * duration_ms) / 1000;
    let value: i32 = 1 << (bits_per_sample - 3);

    for _ in 0..total_frames * channels as u64 {
        match bits_per_sample {
            8 => writer.write_sample(value as i8)?,
            16 => writer.write_sample(value as i16)?,
            _ => writer.write_sample(value)?,
        }
    }

    writer.finalize()?;
    Ok(total_frames)
}

/// Sample value of `frame` in every channel of a float ramp fixture.
///
/// Multiples of 2^-12, so every value is exact in an f32.
pub fn float_ramp_value(frame: u64) -> f32 {
    (frame % 4_096) as f32 / 4_096.0 - 0.5
}

/// Generate a 32-bit float ramp WAV file
///
/// # Returns
/// Number of frames written
pub fn generate_float_ramp_wav<P: AsRef<Path>>(
    path: P,
    sample_rate: u32,
    channels: u16,
    duration_ms: u64,
) -> Result<u64, hound::Error> {
    let spec = WavSpec {
        channels,
        sample_rate,
        bits_per_sample: 32,
        sample_format: hound::SampleFormat::Float,
    };

    let mut writer = WavWriter::create(path, spec)?;
    let total_frames = (sample_rate as u64 * duration_ms) / 1000;

    for frame in 0..total_frames {
        let value = float_ramp_value(frame);
        for _ in 0..channels {
            writer.write_sample(value)?;
        }
    }

    writer.finalize()?;
    Ok(total_frames)
}

/// Generate a 16-bit big-endian ramp AIFF file of `frames` frames
///
/// Chunks: `FORM`/`AIFF` header, `COMM` geometry, `SSND` with zero offset
/// and block size.
pub fn generate_ramp_aiff<P: AsRef<Path>>(
    path: P,
    sample_rate: u32,
    channels: u16,
    frames: u32,
) -> std::io::Result<u64> {
    let sound_len = frames * 2 * channels as u32;
    let comm_len: u32 = 18;
    let ssnd_len = 8 + sound_len;
    let form_len = 4 + (8 + comm_len) + (8 + ssnd_len);

    let mut out = Vec::with_capacity(8 + form_len as usize);
    out.extend_from_slice(b"FORM");
    out.extend_from_slice(&form_len.to_be_bytes());
    out.extend_from_slice(b"AIFF");

    out.extend_from_slice(b"COMM");
    out.extend_from_slice(&comm_len.to_be_bytes());
    out.extend_from_slice(&channels.to_be_bytes());
    out.extend_from_slice(&frames.to_be_bytes());
    out.extend_from_slice(&16u16.to_be_bytes());
    out.extend_from_slice(&extended_sample_rate(sample_rate));

    out.extend_from_slice(b"SSND");
    out.extend_from_slice(&ssnd_len.to_be_bytes());
    out.extend_from_slice(&0u32.to_be_bytes());
    out.extend_from_slice(&0u32.to_be_bytes());
    for frame in 0..frames as u64 {
        let value = ramp_value(frame).to_be_bytes();
        for _ in 0..channels {
            out.extend_from_slice(&value);
        }
    }

    std::fs::write(path, out)?;
    Ok(frames as u64)
}

/// 80-bit extended float encoding of an integer sample rate
fn extended_sample_rate(rate: u32) -> [u8; 10] {
    let mut bytes = [0u8; 10];
    if rate == 0 {
        return bytes;
    }
    let exponent = 31 - rate.leading_zeros();
    let biased = (16_383 + exponent) as u16;
    let mantissa = (rate as u64) << (63 - exponent);
    bytes[..2].copy_from_slice(&biased.to_be_bytes());
    bytes[2..].copy_from_slice(&mantissa.to_be_bytes());
    bytes
}
