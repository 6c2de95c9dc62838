//! Error types for the capture engine

use thiserror::Error;

/// Errors surfaced by device acquisition and capture finalization.
///
/// `PermissionDenied` and `DeviceUnavailable` are terminal for the current
/// attempt and drive the session into the error state. `EmptyCapture` is
/// folded into the cancel path and never shown to the user. `Teardown` is
/// logged and never blocks a state transition.
#[derive(Debug, Error)]
pub enum CaptureError {
    #[error("device access denied by the user")]
    PermissionDenied,

    #[error("capture device unavailable: {0}")]
    DeviceUnavailable(String),

    #[error("capture produced no data")]
    EmptyCapture,

    #[error("resource teardown failed: {0}")]
    Teardown(String),
}
