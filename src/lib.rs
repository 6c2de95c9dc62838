//! notecap: media capture and preview engine for composer surfaces.
//!
//! The engine drives the full lifecycle of a short audio/video note:
//! permission-gated device acquisition, a countdown-limited recording pass
//! with live waveform visualization, preview playback of the finished
//! artifact, and hand-off to the submission adapter of whichever surface
//! started the capture.

pub mod artifact;
pub mod config;
pub mod controller;
pub mod device;
pub mod encoder;
pub mod error;
pub mod gesture;
pub mod preview;
pub mod submit;
pub mod timer;
pub mod visualizer;

pub use artifact::MediaArtifact;
pub use config::{CaptureConfig, Config};
pub use controller::{CaptureController, CaptureStats, SessionPhase};
pub use device::{AudioFrame, CaptureMode, DeviceBackend, DeviceSession};
pub use error::CaptureError;
pub use gesture::{GestureAction, GestureRecognizer};
pub use preview::PreviewBuffer;
pub use submit::{OutboundMessage, SubmissionAdapter, SubmissionMetadata};
pub use timer::{CountdownSignal, CountdownTimer};
pub use visualizer::{VisualizationEngine, VisualizationFrame};
