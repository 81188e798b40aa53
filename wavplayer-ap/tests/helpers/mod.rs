//! Test helper modules for wavplayer-ap integration tests
//!
//! - `audio_generator`: deterministic WAV (hound) and AIFF fixtures
//! - `simulated_backend`: real-time in-process audio device with fault
//!   injection, standing in for cpal
//! - `TestLibrary`: a temporary audio root with a few known files

#![allow(dead_code)]

pub mod audio_generator;
pub mod simulated_backend;

pub use audio_generator::{generate_ramp_wav, ramp_value, TEST_SAMPLE_RATE};
pub use simulated_backend::{DeviceLog, SimulatedBackend, SimulatedOptions};

use std::path::{Path, PathBuf};
use std::time::Duration;
use tempfile::TempDir;
use wavplayer_ap::config::{Config, PlaybackTuning, StatusConfig};

/// Temporary audio root directory:
///
/// - `track1.wav`, `track2.wav`: 2 s
/// - `short.wav`: 150 ms
/// - `albums/first/song.wav`: 500 ms
/// - `notes.txt`: not audio
pub struct TestLibrary {
    dir: TempDir,
}

impl TestLibrary {
    pub fn new() -> Self {
        let dir = TempDir::new().expect("create temp dir");
        std::fs::create_dir_all(dir.path().join("albums/first")).expect("create album dir");

        generate_ramp_wav(dir.path().join("track1.wav"), TEST_SAMPLE_RATE, 2, 2_000).expect("track1");
        generate_ramp_wav(dir.path().join("track2.wav"), TEST_SAMPLE_RATE, 2, 2_000).expect("track2");
        generate_ramp_wav(dir.path().join("short.wav"), TEST_SAMPLE_RATE, 2, 150).expect("short");
        generate_ramp_wav(dir.path().join("albums/first/song.wav"), TEST_SAMPLE_RATE, 2, 500)
            .expect("song");
        std::fs::write(dir.path().join("notes.txt"), "not audio").expect("notes");

        Self { dir }
    }

    pub fn root(&self) -> &Path {
        self.dir.path()
    }

    pub fn path(&self, file_id: &str) -> PathBuf {
        self.dir.path().join(file_id)
    }

    /// Player configuration over this library with fast test tuning
    pub fn config(&self) -> Config {
        Config {
            wav_dir: self.root().to_path_buf(),
            audio_device: "sim".to_string(),
            http_port: 0,
            player_uuid: "test-player".to_string(),
            log_level: None,
            log_file: None,
            playback: test_tuning(),
            status: StatusConfig { throttle_ms: 50 },
        }
    }
}

/// Tuning sized for the 8 kHz fixtures and the simulated device
pub fn test_tuning() -> PlaybackTuning {
    PlaybackTuning {
        transfer_buffer_bytes: 1024,
        backoff_ms: 5,
        delay_deadband_frames: 100,
        jitter_tolerance_ms: 1,
        sink_buffer_ms: 100,
    }
}

/// Poll `condition` every 5 ms until it holds or `timeout` elapses
pub fn wait_until(timeout: Duration, mut condition: impl FnMut() -> bool) -> bool {
    let deadline = std::time::Instant::now() + timeout;
    while std::time::Instant::now() < deadline {
        if condition() {
            return true;
        }
        std::thread::sleep(Duration::from_millis(5));
    }
    condition()
}
