use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::device::CaptureMode;

#[derive(Debug, Deserialize)]
pub struct Config {
    pub engine: EngineConfig,
    pub capture: CaptureSettings,
    pub visualizer: VisualizerSettings,
}

#[derive(Debug, Deserialize)]
pub struct EngineConfig {
    pub name: String,
}

#[derive(Debug, Deserialize)]
pub struct CaptureSettings {
    pub recordings_path: String,
    pub sample_rate: u32,
    pub channels: u16,
    pub max_duration_secs: u64,
}

#[derive(Debug, Deserialize)]
pub struct VisualizerSettings {
    pub bars: usize,
    pub frame_rate_hz: u32,
}

impl Config {
    pub fn load(path: &str) -> Result<Self> {
        let settings = config::Config::builder()
            .add_source(config::File::with_name(path))
            .build()?;

        Ok(settings.try_deserialize()?)
    }
}

/// Configuration for a single capture session
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CaptureConfig {
    /// Identifier of the input surface that owns this session
    /// (e.g. "chat-composer", "voice-note-composer")
    pub surface_id: String,

    /// Capture mode, fixed for the session's lifetime
    pub mode: CaptureMode,

    /// Maximum recording duration; the countdown forces a stop at zero
    pub max_duration_secs: u64,

    /// Sample rate for captured audio
    pub sample_rate: u32,

    /// Number of audio channels (1 = mono, 2 = stereo)
    pub channels: u16,

    /// Directory where finished artifacts are materialized
    pub recordings_dir: PathBuf,

    /// Number of visualization bars per frame
    pub visualizer_bars: usize,
}

impl Default for CaptureConfig {
    fn default() -> Self {
        Self {
            surface_id: format!("surface-{}", uuid::Uuid::new_v4()),
            mode: CaptureMode::Audio,
            max_duration_secs: 30,
            sample_rate: 16000,
            channels: 1,
            recordings_dir: std::env::temp_dir().join("notecap"),
            visualizer_bars: 24,
        }
    }
}

impl CaptureConfig {
    /// Build a per-session config from the loaded file config.
    pub fn from_config(config: &Config, surface_id: impl Into<String>, mode: CaptureMode) -> Self {
        Self {
            surface_id: surface_id.into(),
            mode,
            max_duration_secs: config.capture.max_duration_secs,
            sample_rate: config.capture.sample_rate,
            channels: config.capture.channels,
            recordings_dir: PathBuf::from(&config.capture.recordings_path),
            visualizer_bars: config.visualizer.bars,
        }
    }
}
