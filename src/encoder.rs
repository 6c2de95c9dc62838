//! Capture encoder: buffers live PCM and finalizes it to WAV bytes.
//!
//! The encoder task is driven by the device channel's own data
//! availability; the controller only observes the finalize/discard result.
//! Samples are teed to the visualization engine without ever blocking on
//! it.

use anyhow::{Context, Result};
use std::io::Cursor;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tracing::debug;

use crate::device::AudioFrame;

/// Finalized capture output, not yet materialized to disk
#[derive(Debug)]
pub struct EncodedMedia {
    pub wav_bytes: Vec<u8>,
    pub sample_count: usize,
    pub sample_rate: u32,
    pub channels: u16,
}

/// Buffers frames from a live device until stopped or the source closes.
pub struct CaptureEncoder {
    sample_rate: u32,
    channels: u16,
    buffer_task: Option<JoinHandle<Vec<i16>>>,
    stop_tx: Option<oneshot::Sender<()>>,
}

impl CaptureEncoder {
    /// Start buffering. Each incoming frame's samples are also forwarded to
    /// `viz_tx` (dropped if the visualizer is behind).
    pub fn spawn(
        mut frames: mpsc::Receiver<AudioFrame>,
        viz_tx: mpsc::Sender<Vec<i16>>,
        sample_rate: u32,
        channels: u16,
    ) -> Self {
        let (stop_tx, mut stop_rx) = oneshot::channel();

        let buffer_task = tokio::spawn(async move {
            let mut samples: Vec<i16> = Vec::new();

            loop {
                tokio::select! {
                    _ = &mut stop_rx => {
                        // Frames the device already delivered belong to the
                        // capture; close the channel and drain it before
                        // finishing.
                        frames.close();
                        while let Some(frame) = frames.recv().await {
                            let _ = viz_tx.try_send(frame.samples.clone());
                            samples.extend(frame.samples);
                        }
                        break;
                    }
                    frame = frames.recv() => match frame {
                        Some(frame) => {
                            let _ = viz_tx.try_send(frame.samples.clone());
                            samples.extend(frame.samples);
                        }
                        None => break,
                    }
                }
            }

            debug!("encoder buffered {} samples", samples.len());
            samples
        });

        Self {
            sample_rate,
            channels,
            buffer_task: Some(buffer_task),
            stop_tx: Some(stop_tx),
        }
    }

    /// Flush and encode. Returns `None` for a zero-length capture, which
    /// the controller treats as a cancellation rather than an artifact.
    pub async fn finalize(mut self) -> Result<Option<EncodedMedia>> {
        let samples = self.collect().await?;

        if samples.is_empty() {
            return Ok(None);
        }

        let sample_count = samples.len();
        let wav_bytes = encode_wav(&samples, self.sample_rate, self.channels)?;

        Ok(Some(EncodedMedia {
            wav_bytes,
            sample_count,
            sample_rate: self.sample_rate,
            channels: self.channels,
        }))
    }

    /// Stop buffering and throw the output away. No artifact is created.
    pub async fn discard(mut self) {
        let _ = self.collect().await;
    }

    async fn collect(&mut self) -> Result<Vec<i16>> {
        if let Some(stop_tx) = self.stop_tx.take() {
            let _ = stop_tx.send(());
        }

        match self.buffer_task.take() {
            Some(task) => task.await.context("encoder buffering task panicked"),
            None => Ok(Vec::new()),
        }
    }
}

impl Drop for CaptureEncoder {
    fn drop(&mut self) {
        if let Some(task) = self.buffer_task.take() {
            task.abort();
        }
    }
}

fn encode_wav(samples: &[i16], sample_rate: u32, channels: u16) -> Result<Vec<u8>> {
    let spec = hound::WavSpec {
        channels,
        sample_rate,
        bits_per_sample: 16,
        sample_format: hound::SampleFormat::Int,
    };

    let mut cursor = Cursor::new(Vec::new());
    {
        let mut writer =
            hound::WavWriter::new(&mut cursor, spec).context("failed to create WAV writer")?;
        for &sample in samples {
            writer
                .write_sample(sample)
                .context("failed to write sample to WAV")?;
        }
        writer.finalize().context("failed to finalize WAV data")?;
    }

    Ok(cursor.into_inner())
}
