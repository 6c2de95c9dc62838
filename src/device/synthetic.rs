use std::f32::consts::TAU;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::debug;

use super::backend::{AudioFrame, DeviceBackend};
use crate::error::CaptureError;

/// Frame duration produced by the generator
const BUFFER_DURATION_MS: u64 = 100;

/// Tone frequency for the generated signal
const TONE_HZ: f32 = 440.0;

/// Scripted outcome of the permission prompt
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PermissionScript {
    Grant,
    Deny,
    Unavailable,
}

/// Deterministic capture device that stands in for real hardware.
///
/// The permission prompt is simulated as a scripted outcome behind a
/// configurable delay, so acquisition stays a genuine suspension point
/// that callers can race against cancellation.
pub struct SyntheticDevice {
    name: String,
    sample_rate: u32,
    channels: u16,
    script: PermissionScript,
    grant_delay: Duration,
    live: Arc<AtomicBool>,
    generator: Option<JoinHandle<()>>,
}

impl SyntheticDevice {
    pub fn new(sample_rate: u32, channels: u16) -> Self {
        Self {
            name: "synthetic".to_string(),
            sample_rate,
            channels,
            script: PermissionScript::Grant,
            grant_delay: Duration::ZERO,
            live: Arc::new(AtomicBool::new(false)),
            generator: None,
        }
    }

    /// Set the scripted permission outcome
    pub fn with_script(mut self, script: PermissionScript) -> Self {
        self.script = script;
        self
    }

    /// Set how long the simulated permission prompt stays open
    pub fn with_grant_delay(mut self, delay: Duration) -> Self {
        self.grant_delay = delay;
        self
    }
}

#[async_trait::async_trait]
impl DeviceBackend for SyntheticDevice {
    async fn acquire(&mut self) -> Result<mpsc::Receiver<AudioFrame>, CaptureError> {
        // Permission prompt: indeterminate wall-clock suspension
        tokio::time::sleep(self.grant_delay).await;

        match self.script {
            PermissionScript::Deny => return Err(CaptureError::PermissionDenied),
            PermissionScript::Unavailable => {
                return Err(CaptureError::DeviceUnavailable(
                    "no capture hardware present".to_string(),
                ))
            }
            PermissionScript::Grant => {}
        }

        let (tx, rx) = mpsc::channel(32);
        self.live.store(true, Ordering::SeqCst);

        let live = Arc::clone(&self.live);
        let sample_rate = self.sample_rate;
        let channels = self.channels;
        let samples_per_frame =
            (sample_rate as u64 * BUFFER_DURATION_MS / 1000) as usize * channels as usize;

        let generator = tokio::spawn(async move {
            let mut interval = tokio::time::interval(Duration::from_millis(BUFFER_DURATION_MS));
            let mut timestamp_ms = 0u64;
            let mut phase = 0f32;
            let step = TAU * TONE_HZ / sample_rate as f32;

            loop {
                interval.tick().await;

                if !live.load(Ordering::SeqCst) {
                    break;
                }

                let mut samples = Vec::with_capacity(samples_per_frame);
                for _ in 0..samples_per_frame / channels as usize {
                    let value = (phase.sin() * 8000.0) as i16;
                    for _ in 0..channels {
                        samples.push(value);
                    }
                    phase = (phase + step) % TAU;
                }

                let frame = AudioFrame {
                    samples,
                    sample_rate,
                    channels,
                    timestamp_ms,
                };

                if tx.send(frame).await.is_err() {
                    // Receiver gone; capture is over
                    break;
                }

                timestamp_ms += BUFFER_DURATION_MS;
            }

            debug!("synthetic frame generator stopped at {}ms", timestamp_ms);
        });

        self.generator = Some(generator);

        Ok(rx)
    }

    async fn release(&mut self) -> Result<(), CaptureError> {
        self.live.store(false, Ordering::SeqCst);

        if let Some(generator) = self.generator.take() {
            generator.abort();
            let _ = generator.await;
        }

        Ok(())
    }

    fn is_live(&self) -> bool {
        self.live.load(Ordering::SeqCst)
    }

    fn name(&self) -> &str {
        &self.name
    }
}
