use tokio::sync::mpsc;
use tracing::{info, warn};

use super::backend::{AudioFrame, CaptureMode, DeviceBackend};
use super::synthetic::SyntheticDevice;
use crate::config::CaptureConfig;
use crate::error::CaptureError;

/// Device backend factory
pub struct DeviceFactory;

impl DeviceFactory {
    /// Create the default backend for a capture mode.
    ///
    /// Both modes currently map to the synthetic device; video sessions
    /// capture the camera's audio track through the same pipeline.
    pub fn create(_mode: CaptureMode, config: &CaptureConfig) -> Box<dyn DeviceBackend> {
        Box::new(SyntheticDevice::new(config.sample_rate, config.channels))
    }
}

/// An open capture handle with release-exactly-once discipline.
///
/// While a session exists, the underlying hardware indicator is active.
/// `release` consumes the session, so it cannot run twice; every exit path
/// of the capture controller funnels through it.
pub struct DeviceSession {
    backend: Box<dyn DeviceBackend>,
    released: bool,
}

impl DeviceSession {
    /// Acquire the device, suspending until the permission prompt resolves.
    pub async fn open(
        mut backend: Box<dyn DeviceBackend>,
    ) -> Result<(Self, mpsc::Receiver<AudioFrame>), CaptureError> {
        let frames = backend.acquire().await?;

        info!("device acquired: {}", backend.name());

        Ok((
            Self {
                backend,
                released: false,
            },
            frames,
        ))
    }

    /// Close the device. A failed release is logged, never propagated;
    /// the user-visible state transition must not block on teardown.
    pub async fn release(mut self) {
        self.released = true;

        if let Err(e) = self.backend.release().await {
            warn!("device release failed: {}", CaptureError::Teardown(e.to_string()));
        } else {
            info!("device released: {}", self.backend.name());
        }
    }

    pub fn is_live(&self) -> bool {
        self.backend.is_live()
    }
}

impl Drop for DeviceSession {
    fn drop(&mut self) {
        if !self.released {
            warn!(
                "device session dropped without release; {} indicator may stay on",
                self.backend.name()
            );
        }
    }
}
