use tokio::sync::mpsc;

use crate::error::CaptureError;

/// Capture mode selected before recording starts
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CaptureMode {
    /// Microphone only
    Audio,
    /// Camera; the capture pipeline records its audio track
    Video,
}

impl CaptureMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            CaptureMode::Audio => "audio",
            CaptureMode::Video => "video",
        }
    }
}

/// Audio sample data (16-bit PCM, interleaved)
#[derive(Debug, Clone)]
pub struct AudioFrame {
    /// Raw audio samples (i16 PCM, interleaved)
    pub samples: Vec<i16>,
    /// Sample rate in Hz
    pub sample_rate: u32,
    /// Number of channels
    pub channels: u16,
    /// Timestamp in milliseconds since capture started
    pub timestamp_ms: u64,
}

/// Capture device backend trait
///
/// Implementations:
/// - Synthetic: deterministic tone generator with a scripted permission
///   prompt (tests, demos)
/// - File: replay a WAV file as a live stream (tests/batch processing)
#[async_trait::async_trait]
pub trait DeviceBackend: Send + Sync {
    /// Open the device and start producing frames.
    ///
    /// Suspends until the permission prompt resolves; the wall-clock delay
    /// is indeterminate. Returns a channel receiver of live audio frames.
    async fn acquire(&mut self) -> Result<mpsc::Receiver<AudioFrame>, CaptureError>;

    /// Close the device and stop frame production.
    async fn release(&mut self) -> Result<(), CaptureError>;

    /// Check if the device is currently open (hardware indicator active)
    fn is_live(&self) -> bool;

    /// Get backend name for logging
    fn name(&self) -> &str;
}
