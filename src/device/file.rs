use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::info;

use super::backend::{AudioFrame, DeviceBackend};
use crate::error::CaptureError;

const BUFFER_DURATION_MS: u64 = 100;

/// Replays a WAV file as if it were a live capture device.
pub struct FileDevice {
    path: PathBuf,
    live: Arc<AtomicBool>,
    replay: Option<JoinHandle<()>>,
}

impl FileDevice {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            live: Arc::new(AtomicBool::new(false)),
            replay: None,
        }
    }
}

#[async_trait::async_trait]
impl DeviceBackend for FileDevice {
    async fn acquire(&mut self) -> Result<mpsc::Receiver<AudioFrame>, CaptureError> {
        let reader = hound::WavReader::open(&self.path).map_err(|e| {
            CaptureError::DeviceUnavailable(format!("{}: {}", self.path.display(), e))
        })?;

        let spec = reader.spec();
        let samples: Vec<i16> = reader
            .into_samples::<i16>()
            .collect::<Result<_, _>>()
            .map_err(|e| CaptureError::DeviceUnavailable(format!("bad WAV data: {}", e)))?;

        info!(
            "replaying {} ({} samples at {}Hz)",
            self.path.display(),
            samples.len(),
            spec.sample_rate
        );

        let (tx, rx) = mpsc::channel(32);
        self.live.store(true, Ordering::SeqCst);

        let live = Arc::clone(&self.live);
        let samples_per_frame = (spec.sample_rate as u64 * BUFFER_DURATION_MS / 1000) as usize
            * spec.channels as usize;

        let replay = tokio::spawn(async move {
            let mut interval = tokio::time::interval(Duration::from_millis(BUFFER_DURATION_MS));
            let mut timestamp_ms = 0u64;

            for chunk in samples.chunks(samples_per_frame.max(1)) {
                interval.tick().await;

                if !live.load(Ordering::SeqCst) {
                    break;
                }

                let frame = AudioFrame {
                    samples: chunk.to_vec(),
                    sample_rate: spec.sample_rate,
                    channels: spec.channels,
                    timestamp_ms,
                };

                if tx.send(frame).await.is_err() {
                    break;
                }

                timestamp_ms += BUFFER_DURATION_MS;
            }
        });

        self.replay = Some(replay);

        Ok(rx)
    }

    async fn release(&mut self) -> Result<(), CaptureError> {
        self.live.store(false, Ordering::SeqCst);

        if let Some(replay) = self.replay.take() {
            replay.abort();
            let _ = replay.await;
        }

        Ok(())
    }

    fn is_live(&self) -> bool {
        self.live.load(Ordering::SeqCst)
    }

    fn name(&self) -> &str {
        "file"
    }
}
