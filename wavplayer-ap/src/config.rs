//! Configuration management for wavplayer-ap
//!
//! Bootstrap configuration is resolved once at startup and cannot change while
//! running.
//!
//! # Settings Sources Priority
//!
//! 1. Command-line arguments (each with an environment variable fallback)
//! 2. TOML configuration file (`--config`, else the default locations)
//! 3. Built-in defaults (code constants)

use crate::error::{Error, Result};
use clap::Parser;
use serde::Deserialize;
use std::path::PathBuf;
use std::time::Duration;
use tracing::info;
use wavplayer_common::config::{load_toml, resolve_config_path};

/// Log filter used when neither `RUST_LOG` nor a configured level is present
pub const DEFAULT_LOG_FILTER: &str = "wavplayer_ap=info,wavplayer_common=info,tower_http=info";

/// Command-line arguments for wavplayer-ap
#[derive(Parser, Debug, Clone, Default)]
#[command(name = "wavplayer-ap")]
#[command(about = "WAV file player service with HTTP control and status streaming")]
#[command(version)]
pub struct Args {
    /// Path to the TOML configuration file
    #[arg(short, long, env = "WAVPLAYER_CONFIG")]
    pub config: Option<PathBuf>,

    /// Root directory of the playable audio files
    #[arg(short = 'd', long, env = "WAVPLAYER_WAV_DIR")]
    pub wav_dir: Option<PathBuf>,

    /// Output device name ("default" for the host default device)
    #[arg(short, long, env = "WAVPLAYER_AUDIO_DEVICE")]
    pub audio_device: Option<String>,

    /// HTTP port to listen on
    #[arg(short, long, env = "WAVPLAYER_HTTP_PORT")]
    pub port: Option<u16>,

    /// Player identity stamped on every status message
    #[arg(long, env = "WAVPLAYER_PLAYER_UUID")]
    pub player_uuid: Option<String>,

    /// Log level or full filter directive (e.g. "debug", "wavplayer_ap=trace")
    #[arg(long, env = "WAVPLAYER_LOG_LEVEL")]
    pub log_level: Option<String>,
}

/// TOML configuration file contents. Every key is optional.
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct TomlConfig {
    pub wav_dir: Option<PathBuf>,
    pub audio_device: Option<String>,
    pub http_port: Option<u16>,
    pub player_uuid: Option<String>,
    pub logging: LoggingConfig,
    pub playback: PlaybackTuning,
    pub status: StatusConfig,
}

/// Logging configuration
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error) or a filter directive
    pub level: Option<String>,

    /// Log file path (logs to stderr if not specified)
    pub file: Option<PathBuf>,
}

/// Transfer loop and start-time estimation tuning.
///
/// The deadband and jitter tolerance are device-tuned values; the defaults
/// suit ALSA-class hardware.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct PlaybackTuning {
    /// Upper bound of bytes moved per transfer step
    pub transfer_buffer_bytes: usize,

    /// Wait when the device buffer is full, and drain poll period
    pub backoff_ms: u64,

    /// Delay readings below this many frames are not used for start time
    pub delay_deadband_frames: i64,

    /// Start-time changes up to this many ms are not published
    pub jitter_tolerance_ms: i64,

    /// Size of the device-side frame ring
    pub sink_buffer_ms: u32,
}

impl Default for PlaybackTuning {
    fn default() -> Self {
        Self {
            transfer_buffer_bytes: 64 * 1024,
            backoff_ms: 5,
            delay_deadband_frames: 4096,
            jitter_tolerance_ms: 1,
            sink_buffer_ms: 500,
        }
    }
}

impl PlaybackTuning {
    pub fn backoff(&self) -> Duration {
        Duration::from_millis(self.backoff_ms)
    }

    fn validate(&self) -> Result<()> {
        if self.transfer_buffer_bytes == 0 {
            return Err(Error::Config("playback.transfer_buffer_bytes must be > 0".to_string()));
        }
        if self.backoff_ms == 0 {
            return Err(Error::Config("playback.backoff_ms must be > 0".to_string()));
        }
        if self.sink_buffer_ms == 0 {
            return Err(Error::Config("playback.sink_buffer_ms must be > 0".to_string()));
        }
        if self.delay_deadband_frames < 0 || self.jitter_tolerance_ms < 0 {
            return Err(Error::Config(
                "playback.delay_deadband_frames and playback.jitter_tolerance_ms must not be negative"
                    .to_string(),
            ));
        }
        Ok(())
    }
}

/// Status broadcast configuration
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct StatusConfig {
    /// Coalescing window for outward status broadcasts
    pub throttle_ms: u64,
}

impl Default for StatusConfig {
    fn default() -> Self {
        Self { throttle_ms: 50 }
    }
}

impl StatusConfig {
    pub fn throttle(&self) -> Duration {
        Duration::from_millis(self.throttle_ms)
    }
}

fn default_audio_device() -> String {
    "default".to_string()
}

fn default_http_port() -> u16 {
    8080
}

/// Fully resolved configuration
#[derive(Debug, Clone)]
pub struct Config {
    pub wav_dir: PathBuf,
    pub audio_device: String,
    pub http_port: u16,
    pub player_uuid: String,
    pub log_level: Option<String>,
    pub log_file: Option<PathBuf>,
    pub playback: PlaybackTuning,
    pub status: StatusConfig,
}

impl Config {
    /// Load configuration: locate and parse the TOML file, then apply CLI
    /// overrides.
    ///
    /// # Errors
    ///
    /// Returns error if:
    /// - An explicitly named config file does not exist or cannot be parsed
    /// - No audio directory is configured anywhere
    /// - A tuning value is out of range
    pub fn load(args: &Args) -> Result<Self> {
        let toml_config = match resolve_config_path(args.config.as_deref())? {
            Some(path) => {
                let parsed: TomlConfig = load_toml(&path)?;
                info!("Loaded TOML configuration from {}", path.display());
                parsed
            }
            None => {
                info!("No configuration file found, using built-in defaults");
                TomlConfig::default()
            }
        };

        Self::merge(args, toml_config)
    }

    /// Merge command-line arguments over TOML values over defaults
    pub fn merge(args: &Args, toml_config: TomlConfig) -> Result<Self> {
        let wav_dir = args
            .wav_dir
            .clone()
            .or(toml_config.wav_dir)
            .ok_or_else(|| {
                Error::Config(
                    "audio files directory not configured (--wav-dir, WAVPLAYER_WAV_DIR or wav_dir)"
                        .to_string(),
                )
            })?;

        let audio_device = args
            .audio_device
            .clone()
            .or(toml_config.audio_device)
            .unwrap_or_else(default_audio_device);

        let http_port = args
            .port
            .or(toml_config.http_port)
            .unwrap_or_else(default_http_port);

        let player_uuid = match args.player_uuid.clone().or(toml_config.player_uuid) {
            Some(id) if !id.trim().is_empty() => id,
            _ => uuid::Uuid::new_v4().to_string(),
        };

        let log_level = args.log_level.clone().or(toml_config.logging.level);

        toml_config.playback.validate()?;
        if toml_config.status.throttle_ms == 0 {
            return Err(Error::Config("status.throttle_ms must be > 0".to_string()));
        }

        Ok(Self {
            wav_dir,
            audio_device,
            http_port,
            player_uuid,
            log_level,
            log_file: toml_config.logging.file,
            playback: toml_config.playback,
            status: toml_config.status,
        })
    }

    /// Tracing filter directive for the configured level
    ///
    /// A bare level applies to this service's crates and HTTP tracing; a value
    /// containing `=` is used verbatim.
    pub fn log_filter(&self) -> String {
        match self.log_level.as_deref() {
            Some(level) if level.contains('=') => level.to_string(),
            Some(level) => format!(
                "wavplayer_ap={0},wavplayer_common={0},tower_http={0}",
                level
            ),
            None => DEFAULT_LOG_FILTER.to_string(),
        }
    }
}
