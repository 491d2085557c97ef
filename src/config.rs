//! Persistent session configuration model, defaults, and file loading.

use std::path::{Path, PathBuf};

use log::{info, warn};

use crate::error::{AppError, AppResult};

/// Maximum number of input files; one per digit key.
pub const MAX_TRACKS: usize = 10;

/// Root configuration persisted to `config.toml`.
#[derive(Debug, Clone, Default, PartialEq, serde::Deserialize, serde::Serialize)]
pub struct Config {
    #[serde(default)]
    /// Loop, fade, and input timing.
    pub playback: PlaybackConfig,
    #[serde(default)]
    /// Output format preferences.
    pub output: OutputConfig,
}

/// Timing knobs for the playback engine and the control loop.
#[derive(Debug, Clone, PartialEq, serde::Deserialize, serde::Serialize)]
pub struct PlaybackConfig {
    /// Cross-fade window length, also used as the audio block duration.
    #[serde(default = "default_fade_ms")]
    pub fade_ms: u32,
    /// Loop boundary nudge quantum.
    #[serde(default = "default_loop_step_ms")]
    pub loop_step_ms: u32,
    #[serde(default = "default_max_track_secs")]
    pub max_track_secs: u32,
    /// Key poll timeout; bounds how long a cancellation can go unnoticed.
    #[serde(default = "default_input_poll_ms")]
    pub input_poll_ms: u32,
}

/// Output format preferences.
#[derive(Debug, Clone, PartialEq, serde::Deserialize, serde::Serialize)]
pub struct OutputConfig {
    /// Output sample rate in Hz. Zero keeps the rate of the first track.
    #[serde(default)]
    pub sample_rate_hz: u32,
    #[serde(default)]
    pub resampler_quality: ResamplerQuality,
}

/// Resampler quality profile used when sample-rate conversion is required.
#[derive(Debug, Clone, Copy, serde::Deserialize, serde::Serialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum ResamplerQuality {
    /// Good quality with lower CPU usage.
    #[default]
    High,
    /// Highest quality with higher CPU usage.
    #[serde(alias = "very_high")]
    Highest,
}

impl Default for PlaybackConfig {
    fn default() -> Self {
        Self {
            fade_ms: default_fade_ms(),
            loop_step_ms: default_loop_step_ms(),
            max_track_secs: default_max_track_secs(),
            input_poll_ms: default_input_poll_ms(),
        }
    }
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            sample_rate_hz: 0,
            resampler_quality: ResamplerQuality::High,
        }
    }
}

fn default_fade_ms() -> u32 {
    20
}

fn default_loop_step_ms() -> u32 {
    50
}

fn default_max_track_secs() -> u32 {
    600
}

fn default_input_poll_ms() -> u32 {
    100
}

/// Converts a duration in milliseconds to whole frames at `sample_rate`.
pub fn milliseconds_to_frames(milliseconds: u32, sample_rate: u32) -> usize {
    (u64::from(milliseconds) * u64::from(sample_rate) / 1000) as usize
}

/// Clamps loaded values into ranges the engine can work with.
pub fn sanitize_config(config: Config) -> Config {
    let sample_rate_hz = if config.output.sample_rate_hz == 0 {
        0
    } else {
        config.output.sample_rate_hz.clamp(8_000, 384_000)
    };

    Config {
        playback: PlaybackConfig {
            fade_ms: config.playback.fade_ms.clamp(1, 500),
            loop_step_ms: config.playback.loop_step_ms.clamp(1, 10_000),
            max_track_secs: config.playback.max_track_secs.clamp(1, 3_600),
            input_poll_ms: config.playback.input_poll_ms.clamp(10, 1_000),
        },
        output: OutputConfig {
            sample_rate_hz,
            resampler_quality: config.output.resampler_quality,
        },
    }
}

pub fn config_file_path() -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(std::env::temp_dir)
        .join("abxloop")
        .join("config.toml")
}

/// Reads the config file, creating it with defaults on first run.
///
/// A file that exists but does not parse is reported and replaced by defaults
/// for this session only; the file on disk is left untouched.
pub fn load_or_create_config(path: &Path) -> AppResult<Config> {
    if !path.exists() {
        let default_config = Config::default();
        info!(
            "Config file not found. Creating default config. path={}",
            path.display()
        );
        if let Err(err) = write_config(path, &default_config) {
            warn!("Config: could not write default config: {}", err);
        }
        return Ok(default_config);
    }

    let content = std::fs::read_to_string(path).map_err(|err| {
        AppError::Configuration(format!("cannot read config {}: {}", path.display(), err))
    })?;
    let config = match toml::from_str::<Config>(&content) {
        Ok(config) => config,
        Err(err) => {
            warn!(
                "Config: failed parsing {}, using defaults: {}",
                path.display(),
                err
            );
            Config::default()
        }
    };
    Ok(sanitize_config(config))
}

fn write_config(path: &Path, config: &Config) -> AppResult<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).map_err(|err| {
            AppError::Configuration(format!("cannot create {}: {}", parent.display(), err))
        })?;
    }
    let serialized = toml::to_string(config)
        .map_err(|err| AppError::Configuration(format!("cannot serialize config: {}", err)))?;
    std::fs::write(path, serialized).map_err(|err| {
        AppError::Configuration(format!("cannot write config {}: {}", path.display(), err))
    })
}
