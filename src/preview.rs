//! Preview playback of a finished artifact.
//!
//! The buffer holds the artifact while the session is in preview and is the
//! single place its resource leaves from: `delete` releases it exactly
//! once, `hand_off` moves it out without releasing. Playback decodes the
//! WAV bytes and re-feeds samples at real-time pace, so the visualization
//! engine can sample the played-back artifact.

use anyhow::{Context, Result};
use std::io::Cursor;
use std::time::Duration;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tracing::debug;

use crate::artifact::MediaArtifact;

/// Playback chunk pacing (matches the live capture buffer duration)
const CHUNK_DURATION_MS: u64 = 100;

struct PlaybackHandle {
    task: JoinHandle<()>,
    stop_tx: oneshot::Sender<()>,
}

/// Holds the finished artifact and exposes play/pause/delete/hand-off.
pub struct PreviewBuffer {
    artifact: Option<MediaArtifact>,
    playback: Option<PlaybackHandle>,
}

impl PreviewBuffer {
    pub fn hold(artifact: MediaArtifact) -> Self {
        Self {
            artifact: Some(artifact),
            playback: None,
        }
    }

    pub fn artifact(&self) -> Option<&MediaArtifact> {
        self.artifact.as_ref()
    }

    pub fn duration_secs(&self) -> Option<u64> {
        self.artifact.as_ref().map(|a| a.duration_secs())
    }

    pub fn is_playing(&self) -> bool {
        self.playback
            .as_ref()
            .map(|p| !p.task.is_finished())
            .unwrap_or(false)
    }

    /// Start playback. Returns the sample feed for the visualization
    /// engine; samples arrive paced to the artifact's real duration.
    pub fn play(&mut self) -> Result<mpsc::Receiver<Vec<i16>>> {
        let artifact = self
            .artifact
            .as_ref()
            .context("no artifact held for playback")?;

        // Replace a finished pass, refuse to double-start a running one
        if self.is_playing() {
            anyhow::bail!("playback already running");
        }
        self.playback = None;

        let reader = hound::WavReader::new(Cursor::new(artifact.data().to_vec()))
            .context("failed to decode artifact for playback")?;
        let spec = reader.spec();
        let samples: Vec<i16> = reader
            .into_samples::<i16>()
            .collect::<std::result::Result<_, _>>()
            .context("bad sample data in artifact")?;

        let (tx, rx) = mpsc::channel(32);
        let (stop_tx, mut stop_rx) = oneshot::channel();

        let chunk_len = ((spec.sample_rate as u64 * CHUNK_DURATION_MS / 1000) as usize
            * spec.channels as usize)
            .max(1);

        let task = tokio::spawn(async move {
            let mut interval = tokio::time::interval(Duration::from_millis(CHUNK_DURATION_MS));

            for chunk in samples.chunks(chunk_len) {
                tokio::select! {
                    _ = &mut stop_rx => break,
                    _ = interval.tick() => {
                        if tx.send(chunk.to_vec()).await.is_err() {
                            break;
                        }
                    }
                }
            }

            debug!("preview playback finished");
        });

        self.playback = Some(PlaybackHandle { task, stop_tx });

        Ok(rx)
    }

    /// Stop playback, waiting for the pacing task to exit.
    pub async fn pause(&mut self) {
        if let Some(playback) = self.playback.take() {
            let _ = playback.stop_tx.send(());
            let _ = playback.task.await;
        }
    }

    /// Release the held artifact. Idempotent: a second delete is a no-op.
    pub fn delete(&mut self) {
        self.halt_playback();

        if let Some(artifact) = self.artifact.take() {
            artifact.release();
        }
    }

    /// Move the artifact out without releasing it. Ownership transfers to
    /// the caller; the buffer keeps no reference.
    pub fn hand_off(&mut self) -> Option<MediaArtifact> {
        self.halt_playback();
        self.artifact.take()
    }

    fn halt_playback(&mut self) {
        if let Some(playback) = self.playback.take() {
            let _ = playback.stop_tx.send(());
            playback.task.abort();
        }
    }
}

impl Drop for PreviewBuffer {
    fn drop(&mut self) {
        self.halt_playback();

        // A buffer dropped mid-preview still owns the artifact; release it
        // so the session leaves nothing behind.
        if let Some(artifact) = self.artifact.take() {
            artifact.release();
        }
    }
}
