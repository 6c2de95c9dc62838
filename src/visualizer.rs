//! Real-time waveform visualization.
//!
//! Samples amplitude data from whichever source is active (the live device
//! tee during recording, the playback task during preview) at ~60 Hz,
//! computes per-bar RMS over a bounded sample window, applies EMA smoothing,
//! and publishes frames over a watch channel. The same engine is restarted
//! across a live pass and later playback passes.

use futures::Stream;
use std::collections::VecDeque;
use std::time::Duration;
use tokio::sync::{mpsc, oneshot, watch};
use tokio::task::JoinHandle;
use tracing::debug;

/// Sampling interval for ~60 frames/second
const FRAME_INTERVAL_MS: u64 = 16;

/// Sample window capacity (~200ms at 48kHz mono)
const WINDOW_CAPACITY: usize = 10_000;

/// EMA smoothing factor (0.3 = 30% new value, 70% previous)
const EMA_ALPHA: f32 = 0.3;

/// An ordered sequence of bar amplitudes in [0.0, 1.0].
///
/// Transient rendering input only; frames are regenerated on every sampling
/// tick and never stored with the artifact.
#[derive(Debug, Clone, PartialEq, serde::Serialize)]
pub struct VisualizationFrame {
    pub bars: Vec<f32>,
}

impl VisualizationFrame {
    pub fn silent(bars: usize) -> Self {
        Self {
            bars: vec![0.0; bars],
        }
    }
}

/// Bounded ring buffer of recent samples
struct SampleWindow {
    samples: VecDeque<i16>,
    capacity: usize,
}

impl SampleWindow {
    fn new(capacity: usize) -> Self {
        Self {
            samples: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    fn push(&mut self, samples: &[i16]) {
        let len = samples.len();

        if len >= self.capacity {
            self.samples.clear();
            self.samples.extend(&samples[len - self.capacity..]);
            return;
        }

        let overflow = (self.samples.len() + len).saturating_sub(self.capacity);
        if overflow > 0 {
            self.samples.drain(0..overflow);
        }

        self.samples.extend(samples);
    }

    /// Per-bar RMS over equal segments of the window, normalized to [0, 1]
    fn compute_bars(&self, bars: usize) -> Vec<f32> {
        let mut out = vec![0.0f32; bars];

        if self.samples.is_empty() {
            return out;
        }

        let per_bar = (self.samples.len() / bars).max(1);

        for (idx, bar) in out.iter_mut().enumerate() {
            let start = idx * per_bar;
            let end = ((idx + 1) * per_bar).min(self.samples.len());
            if start >= end {
                break;
            }

            let sum_squares: f64 = (start..end)
                .map(|i| {
                    let normalized = self.samples[i] as f64 / i16::MAX as f64;
                    normalized * normalized
                })
                .sum();

            let rms = (sum_squares / (end - start) as f64).sqrt();
            *bar = (rms as f32).clamp(0.0, 1.0);
        }

        out
    }

    fn clear(&mut self) {
        self.samples.clear();
    }

    #[cfg(test)]
    fn len(&self) -> usize {
        self.samples.len()
    }
}

/// Exponential moving average over successive frames
struct Ema {
    previous: Vec<f32>,
    initialized: bool,
}

impl Ema {
    fn new(bars: usize) -> Self {
        Self {
            previous: vec![0.0; bars],
            initialized: false,
        }
    }

    fn apply(&mut self, bars: &mut [f32]) {
        if !self.initialized {
            self.previous.copy_from_slice(bars);
            self.initialized = true;
            return;
        }

        for (bar, prev) in bars.iter_mut().zip(self.previous.iter()) {
            *bar = EMA_ALPHA * *bar + (1.0 - EMA_ALPHA) * prev;
        }

        self.previous.copy_from_slice(bars);
    }
}

/// The visualization engine: one per input surface, reused across live
/// recording and preview playback passes.
pub struct VisualizationEngine {
    bars: usize,
    frames_tx: watch::Sender<VisualizationFrame>,
    sampler: Option<JoinHandle<()>>,
    stop_tx: Option<oneshot::Sender<()>>,
}

impl VisualizationEngine {
    pub fn new(bars: usize) -> Self {
        let (frames_tx, _) = watch::channel(VisualizationFrame::silent(bars));
        Self {
            bars,
            frames_tx,
            sampler: None,
            stop_tx: None,
        }
    }

    /// Begin a sampling pass over the given source, replacing any pass
    /// still running.
    pub fn start(&mut self, mut source: mpsc::Receiver<Vec<i16>>) {
        self.halt_sampler();

        let (stop_tx, mut stop_rx) = oneshot::channel();
        let frames_tx = self.frames_tx.clone();
        let bars = self.bars;

        let sampler = tokio::spawn(async move {
            let mut window = SampleWindow::new(WINDOW_CAPACITY);
            let mut ema = Ema::new(bars);
            let mut tick = tokio::time::interval(Duration::from_millis(FRAME_INTERVAL_MS));

            debug!("visualization sampler started");

            loop {
                tokio::select! {
                    _ = &mut stop_rx => {
                        break;
                    }
                    _ = tick.tick() => {
                        while let Ok(samples) = source.try_recv() {
                            window.push(&samples);
                        }

                        let mut frame_bars = window.compute_bars(bars);
                        ema.apply(&mut frame_bars);

                        frames_tx.send_replace(VisualizationFrame { bars: frame_bars });
                    }
                }
            }

            window.clear();
            debug!("visualization sampler stopped");
        });

        self.sampler = Some(sampler);
        self.stop_tx = Some(stop_tx);
    }

    /// Halt the sampling pass. Returns only after the sampler task has
    /// exited and its analysis state is dropped; a leaked sampler is the
    /// leak this engine guards against.
    pub async fn stop(&mut self) {
        if let Some(stop_tx) = self.stop_tx.take() {
            let _ = stop_tx.send(());
        }

        if let Some(sampler) = self.sampler.take() {
            let _ = sampler.await;
        }

        self.frames_tx
            .send_replace(VisualizationFrame::silent(self.bars));
    }

    pub fn is_running(&self) -> bool {
        self.sampler
            .as_ref()
            .map(|task| !task.is_finished())
            .unwrap_or(false)
    }

    /// Latest frame
    pub fn sample(&self) -> VisualizationFrame {
        self.frames_tx.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<VisualizationFrame> {
        self.frames_tx.subscribe()
    }

    /// Lazy, effectively infinite stream of frames, bounded only by the
    /// engine's lifetime. May be taken multiple times; each stream observes
    /// frames from whichever pass is active.
    pub fn frames(&self) -> impl Stream<Item = VisualizationFrame> + Send + 'static {
        let rx = self.frames_tx.subscribe();
        futures::stream::unfold(rx, |mut rx| async move {
            match rx.changed().await {
                Ok(()) => {
                    let frame = rx.borrow_and_update().clone();
                    Some((frame, rx))
                }
                Err(_) => None,
            }
        })
    }

    /// Stand-in bars derived from a seed string, for surfaces that have no
    /// live amplitude data. Deterministic; no statistical contract.
    pub fn placeholder(seed: &str, bars: usize) -> VisualizationFrame {
        let mut hash: u64 = 0xcbf2_9ce4_8422_2325;
        for byte in seed.bytes() {
            hash ^= byte as u64;
            hash = hash.wrapping_mul(0x0000_0100_0000_01b3);
        }

        let bars = (0..bars)
            .map(|i| {
                let mut h = hash ^ (i as u64).wrapping_mul(0x9e37_79b9_7f4a_7c15);
                h ^= h >> 33;
                h = h.wrapping_mul(0xff51_afd7_ed55_8ccd);
                h ^= h >> 33;
                0.15 + (h % 1000) as f32 / 1000.0 * 0.75
            })
            .collect();

        VisualizationFrame { bars }
    }

    fn halt_sampler(&mut self) {
        if let Some(stop_tx) = self.stop_tx.take() {
            let _ = stop_tx.send(());
        }
        if let Some(sampler) = self.sampler.take() {
            sampler.abort();
        }
    }
}

impl Drop for VisualizationEngine {
    fn drop(&mut self) {
        self.halt_sampler();
    }
}
