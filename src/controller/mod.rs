//! Capture controller: the async driver around the pure state machine.
//!
//! The controller owns the resource arena for the live attempt (device
//! session, encoder task, countdown task, visualization engine) and
//! executes the effects the reducer emits. Every exit transition tears the
//! whole arena down in one place, in order: stop countdown, stop
//! visualizer, flush or discard the encoder, release the device. The
//! artifact is materialized and the device released *before* the preview
//! phase is announced.

pub mod machine;

pub use machine::{reduce, Effect, Event, Phase, SessionPhase};

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::artifact::MediaArtifact;
use crate::config::CaptureConfig;
use crate::device::{AudioFrame, CaptureMode, DeviceBackend, DeviceFactory, DeviceSession};
use crate::encoder::CaptureEncoder;
use crate::error::CaptureError;
use crate::preview::PreviewBuffer;
use crate::submit::{SubmissionAdapter, SubmissionMetadata};
use crate::timer::{CountdownSignal, CountdownTimer};
use crate::visualizer::VisualizationEngine;

/// Creates a fresh device backend per acquisition attempt
pub type BackendFactory =
    Arc<dyn Fn(CaptureMode, &CaptureConfig) -> Box<dyn DeviceBackend> + Send + Sync>;

/// Snapshot of the session for surfaces to render
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct CaptureStats {
    pub phase: SessionPhase,
    pub mode: Option<CaptureMode>,
    pub started_at: Option<DateTime<Utc>>,
    pub elapsed_secs: u64,
    pub remaining_secs: u64,
    pub max_duration_secs: u64,
}

/// Events produced by the controller's own background tasks
enum EngineEvent {
    AcquireResolved {
        attempt: Uuid,
        outcome: Result<(DeviceSession, mpsc::Receiver<AudioFrame>), CaptureError>,
    },
    CountdownExpired {
        attempt: Uuid,
    },
}

/// Resource arena for a live recording attempt
struct LiveCapture {
    device: DeviceSession,
    encoder: CaptureEncoder,
    countdown_task: JoinHandle<()>,
}

/// One capture session per input surface.
pub struct CaptureController {
    config: CaptureConfig,
    backend_factory: BackendFactory,
    phase: Phase,
    phase_tx: watch::Sender<SessionPhase>,
    timer: Arc<CountdownTimer>,
    visualizer: VisualizationEngine,
    live: Option<LiveCapture>,
    preview: Option<PreviewBuffer>,
    engine_tx: mpsc::UnboundedSender<EngineEvent>,
    engine_rx: mpsc::UnboundedReceiver<EngineEvent>,
    /// Acquisitions spawned but not yet resolved through the event channel
    pending_acquires: usize,
    started_at: Option<DateTime<Utc>>,
}

impl CaptureController {
    pub fn new(config: CaptureConfig) -> Self {
        Self::with_backend_factory(config, Arc::new(DeviceFactory::create))
    }

    pub fn with_backend_factory(config: CaptureConfig, backend_factory: BackendFactory) -> Self {
        let (phase_tx, _) = watch::channel(SessionPhase::Idle);
        let (engine_tx, engine_rx) = mpsc::unbounded_channel();
        let timer = Arc::new(CountdownTimer::new(config.max_duration_secs));
        let visualizer = VisualizationEngine::new(config.visualizer_bars);

        Self {
            config,
            backend_factory,
            phase: Phase::Idle,
            phase_tx,
            timer,
            visualizer,
            live: None,
            preview: None,
            engine_tx,
            engine_rx,
            pending_acquires: 0,
            started_at: None,
        }
    }

    pub fn phase(&self) -> SessionPhase {
        self.phase.label()
    }

    pub fn subscribe_phase(&self) -> watch::Receiver<SessionPhase> {
        self.phase_tx.subscribe()
    }

    pub fn visualizer(&self) -> &VisualizationEngine {
        &self.visualizer
    }

    pub fn preview(&self) -> Option<&PreviewBuffer> {
        self.preview.as_ref()
    }

    pub fn stats(&self) -> CaptureStats {
        let mode = match &self.phase {
            Phase::RequestingPermission { mode, .. }
            | Phase::Recording { mode, .. }
            | Phase::Finalizing { mode, .. }
            | Phase::Preview { mode, .. } => Some(*mode),
            _ => None,
        };

        let elapsed_secs = match &self.phase {
            Phase::Preview { duration_secs, .. } => *duration_secs,
            _ => self.timer.elapsed(),
        };

        CaptureStats {
            phase: self.phase(),
            mode,
            started_at: self.started_at,
            elapsed_secs,
            remaining_secs: self.timer.remaining(),
            max_duration_secs: self.config.max_duration_secs,
        }
    }

    /// Begin a capture session. Rejected while another session is active on
    /// this surface; acquisition continues in the background and resolves
    /// through `pump`.
    pub fn start(&mut self, mode: CaptureMode) -> Result<()> {
        match self.phase() {
            SessionPhase::Idle | SessionPhase::Sent => {}
            phase => anyhow::bail!("cannot start capture while session is {:?}", phase),
        }

        let effects = self.transition(Event::StartRequested { mode });
        for effect in effects {
            if let Effect::AcquireDevice { attempt, mode } = effect {
                self.spawn_acquire(attempt, mode);
            }
        }

        Ok(())
    }

    /// Process one engine event (acquisition resolution or countdown
    /// expiry). Returns the phase after the event settles, including any
    /// finalization it triggered.
    pub async fn pump(&mut self) -> Result<SessionPhase> {
        let event = self
            .engine_rx
            .recv()
            .await
            .context("engine event channel closed")?;

        match event {
            EngineEvent::AcquireResolved { attempt, outcome } => {
                self.pending_acquires = self.pending_acquires.saturating_sub(1);

                let current = self.phase.attempt() == Some(attempt)
                    && matches!(self.phase, Phase::RequestingPermission { .. });

                match outcome {
                    Ok((device, frames)) => {
                        if current {
                            let effects = self.transition(Event::PermissionGranted { attempt });
                            self.execute(effects, Some((device, frames))).await?;
                        } else {
                            // Cancelled (or superseded) while the prompt was
                            // open: release the handle now that it exists.
                            info!("acquisition resolved after cancel; releasing device");
                            device.release().await;
                        }
                    }
                    Err(e) => {
                        if current {
                            let effects = self.transition(Event::Failed {
                                attempt,
                                message: e.to_string(),
                            });
                            self.execute(effects, None).await?;
                        } else {
                            debug!("stale acquisition failure dropped: {}", e);
                        }
                    }
                }
            }
            EngineEvent::CountdownExpired { attempt } => {
                let effects = self.transition(Event::CountdownExpired { attempt });
                self.execute(effects, None).await?;
            }
        }

        Ok(self.phase())
    }

    /// Pump until the observable phase changes.
    pub async fn next_transition(&mut self) -> Result<SessionPhase> {
        let current = self.phase();
        loop {
            let phase = self.pump().await?;
            if phase != current {
                return Ok(phase);
            }
        }
    }

    /// Manual stop: finalize the encoder, materialize the artifact, release
    /// the device, then enter preview (or idle for a zero-length capture).
    pub async fn stop(&mut self) -> Result<SessionPhase> {
        anyhow::ensure!(
            matches!(self.phase, Phase::Recording { .. }),
            "no active recording to stop"
        );

        let effects = self.transition(Event::StopRequested);
        self.execute(effects, None).await?;

        Ok(self.phase())
    }

    /// Cancel the in-flight acquisition or the live recording. Discards
    /// everything; no artifact is created.
    pub async fn cancel(&mut self) -> Result<()> {
        anyhow::ensure!(
            matches!(
                self.phase,
                Phase::RequestingPermission { .. } | Phase::Recording { .. }
            ),
            "nothing to cancel"
        );

        let effects = self.transition(Event::CancelRequested);
        self.execute(effects, None).await
    }

    /// Delete the preview artifact and return to idle.
    pub async fn delete(&mut self) -> Result<()> {
        anyhow::ensure!(
            matches!(self.phase, Phase::Preview { .. }),
            "no preview to delete"
        );

        self.visualizer.stop().await;

        let effects = self.transition(Event::DeleteRequested);
        self.execute(effects, None).await
    }

    /// Send the preview artifact. Ownership transfers to the adapter; the
    /// controller clears its reference without releasing the resource.
    pub async fn send(
        &mut self,
        adapter: &dyn SubmissionAdapter,
        metadata: SubmissionMetadata,
    ) -> Result<()> {
        anyhow::ensure!(
            matches!(self.phase, Phase::Preview { .. }),
            "no preview to send"
        );

        self.visualizer.stop().await;

        let attempt = self.phase.attempt().context("preview attempt missing")?;
        let artifact = self
            .preview
            .as_mut()
            .and_then(PreviewBuffer::hand_off)
            .context("preview artifact missing")?;
        self.preview = None;
        let path = artifact.url().to_path_buf();

        // The phase commits to Sent only once the adapter has accepted the
        // artifact. On failure the adapter still consumed it; the session
        // surfaces the error and the orphaned file is logged.
        match adapter.submit(artifact, metadata).await {
            Ok(()) => {
                let effects = self.transition(Event::SendRequested);
                debug_assert!(effects.contains(&Effect::TransferArtifact));
                Ok(())
            }
            Err(e) => {
                warn!("submission failed; artifact left at {}", path.display());
                self.apply_simple(Event::Failed {
                    attempt,
                    message: e.to_string(),
                });
                Err(e)
            }
        }
    }

    /// Toggle preview playback; returns whether playback is now running.
    /// While playing, the visualization engine samples the played-back
    /// artifact.
    pub async fn toggle_playback(&mut self) -> Result<bool> {
        anyhow::ensure!(
            matches!(self.phase, Phase::Preview { .. }),
            "no preview to play"
        );

        let preview = self.preview.as_mut().context("preview buffer missing")?;

        if preview.is_playing() {
            preview.pause().await;
            self.visualizer.stop().await;
            Ok(false)
        } else {
            let samples = preview.play()?;
            self.visualizer.start(samples);
            Ok(true)
        }
    }

    /// Dismiss the error message and return to idle.
    pub fn acknowledge_error(&mut self) -> Result<()> {
        anyhow::ensure!(
            matches!(self.phase, Phase::Error { .. }),
            "no error to acknowledge"
        );

        let effects = self.transition(Event::ErrorAcknowledged);
        for effect in effects {
            if let Effect::ResetTimers = effect {
                self.timer.reset();
            }
        }

        Ok(())
    }

    /// Surface teardown. Equivalent to cancel while acquiring/recording and
    /// delete while previewing; releases everything this session holds.
    pub async fn shutdown(&mut self) {
        match self.phase() {
            SessionPhase::RequestingPermission | SessionPhase::Recording => {
                if let Err(e) = self.cancel().await {
                    warn!("teardown cancel failed: {}", e);
                }
            }
            SessionPhase::Preview => {
                if let Err(e) = self.delete().await {
                    warn!("teardown delete failed: {}", e);
                }
            }
            _ => {}
        }

        // An acquisition may still be in flight; teardown must not return
        // while a handle could materialize with nobody left to release it.
        while self.pending_acquires > 0 {
            match self.engine_rx.recv().await {
                Some(EngineEvent::AcquireResolved { outcome, .. }) => {
                    self.pending_acquires -= 1;
                    if let Ok((device, _)) = outcome {
                        device.release().await;
                    }
                }
                Some(EngineEvent::CountdownExpired { .. }) => {}
                None => break,
            }
        }

        self.visualizer.stop().await;
    }

    // ---------------------------------------------------------------
    // Internals
    // ---------------------------------------------------------------

    fn transition(&mut self, event: Event) -> Vec<Effect> {
        let (next, effects) = reduce(&self.phase, event);

        if next != self.phase {
            info!("capture phase: {:?} -> {:?}", self.phase.label(), next.label());
        }

        self.phase = next;
        self.phase_tx.send_replace(self.phase.label());

        effects
    }

    async fn execute(
        &mut self,
        effects: Vec<Effect>,
        mut granted: Option<(DeviceSession, mpsc::Receiver<AudioFrame>)>,
    ) -> Result<()> {
        for effect in effects {
            match effect {
                Effect::AcquireDevice { attempt, mode } => self.spawn_acquire(attempt, mode),
                Effect::StartRecordingTasks { attempt } => {
                    let (device, frames) = granted
                        .take()
                        .context("device handle missing for recording start")?;
                    self.begin_recording(attempt, device, frames);
                }
                Effect::FinalizeCapture { attempt } => self.finalize_capture(attempt).await,
                Effect::AbortCapture { .. } => self.abort_capture().await,
                Effect::CancelAcquire { attempt } => {
                    debug!("acquisition {} flagged cancelled", attempt);
                }
                Effect::ReleaseArtifact => {
                    if let Some(mut preview) = self.preview.take() {
                        preview.delete();
                    }
                }
                // Ownership transfer happens in `send`, where the adapter is
                // in scope.
                Effect::TransferArtifact => {}
                Effect::ResetTimers => self.timer.reset(),
            }
        }

        Ok(())
    }

    fn spawn_acquire(&mut self, attempt: Uuid, mode: CaptureMode) {
        let backend = (self.backend_factory)(mode, &self.config);
        let engine_tx = self.engine_tx.clone();

        tokio::spawn(async move {
            let outcome = DeviceSession::open(backend).await;
            let _ = engine_tx.send(EngineEvent::AcquireResolved { attempt, outcome });
        });

        self.pending_acquires += 1;
    }

    fn begin_recording(
        &mut self,
        attempt: Uuid,
        device: DeviceSession,
        frames: mpsc::Receiver<AudioFrame>,
    ) {
        self.timer.reset();
        self.timer.start();

        let timer = Arc::clone(&self.timer);
        let engine_tx = self.engine_tx.clone();
        let countdown_task = tokio::spawn(async move {
            let mut interval = tokio::time::interval(Duration::from_secs(1));
            // The first tick resolves immediately; the countdown starts one
            // second in.
            interval.tick().await;

            loop {
                interval.tick().await;

                match timer.tick() {
                    CountdownSignal::Running { .. } => {}
                    CountdownSignal::Expired => {
                        let _ = engine_tx.send(EngineEvent::CountdownExpired { attempt });
                        break;
                    }
                    CountdownSignal::Stopped => break,
                }
            }
        });

        let (viz_tx, viz_rx) = mpsc::channel(64);
        self.visualizer.start(viz_rx);

        let encoder = CaptureEncoder::spawn(
            frames,
            viz_tx,
            self.config.sample_rate,
            self.config.channels,
        );

        self.started_at = Some(Utc::now());
        self.live = Some(LiveCapture {
            device,
            encoder,
            countdown_task,
        });

        info!("recording started (attempt {})", attempt);
    }

    /// Ordered teardown into preview: countdown, visualizer, encoder flush,
    /// device release. The artifact exists and the device is closed before
    /// the preview phase is announced.
    async fn finalize_capture(&mut self, attempt: Uuid) {
        let Some(live) = self.live.take() else {
            self.apply_simple(Event::Failed {
                attempt,
                message: "no live capture to finalize".to_string(),
            });
            return;
        };

        let LiveCapture {
            device,
            encoder,
            countdown_task,
        } = live;

        self.timer.stop();
        countdown_task.abort();
        self.visualizer.stop().await;

        let duration_secs = self.timer.elapsed().max(1);
        let mode = match &self.phase {
            Phase::Finalizing { mode, .. } => *mode,
            _ => self.config.mode,
        };

        // Flush and materialize first; only then close the device, and only
        // after that announce the outcome.
        let materialized = match encoder.finalize().await {
            Ok(Some(media)) => MediaArtifact::materialize(
                &self.config.recordings_dir,
                mode,
                media,
                duration_secs,
            )
            .map(Some),
            Ok(None) => Ok(None),
            Err(e) => Err(e),
        };

        device.release().await;

        match materialized {
            Ok(Some(artifact)) => {
                self.preview = Some(PreviewBuffer::hold(artifact));
                self.apply_simple(Event::Finalized {
                    attempt,
                    duration_secs,
                    empty: false,
                });
            }
            Ok(None) => {
                // Zero-length result: same outcome as a cancel
                info!("empty capture discarded (attempt {})", attempt);
                self.apply_simple(Event::Finalized {
                    attempt,
                    duration_secs: 0,
                    empty: true,
                });
            }
            Err(e) => {
                warn!("capture finalization failed: {}", e);
                self.apply_simple(Event::Failed {
                    attempt,
                    message: e.to_string(),
                });
            }
        }
    }

    /// Atomic cancellation: countdown, visualizer, encoder, and device are
    /// all torn down, none left pending, and no artifact is created.
    async fn abort_capture(&mut self) {
        if let Some(live) = self.live.take() {
            let LiveCapture {
                device,
                encoder,
                countdown_task,
            } = live;

            self.timer.stop();
            countdown_task.abort();
            self.visualizer.stop().await;
            encoder.discard().await;
            device.release().await;

            info!("recording cancelled; resources released");
        }
    }

    /// Transition that may only carry resource-free effects (used from
    /// within finalization to avoid re-entering the executor).
    fn apply_simple(&mut self, event: Event) {
        let effects = self.transition(event);
        for effect in effects {
            match effect {
                Effect::ResetTimers => self.timer.reset(),
                other => debug!("deferred effect ignored in finalize path: {:?}", other),
            }
        }
    }
}

impl Drop for CaptureController {
    fn drop(&mut self) {
        self.timer.stop();
        if let Some(live) = self.live.take() {
            live.countdown_task.abort();
        }
    }
}
