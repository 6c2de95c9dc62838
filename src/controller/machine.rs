//! Capture state machine.
//!
//! All transitions go through the `reduce()` function, which returns the
//! next phase and a list of effects for the controller to execute. The
//! reducer never performs I/O; resource handles live in the controller's
//! arena and are created/torn down by effect execution.
//!
//! Events carry the attempt ID they belong to; events from a finished
//! attempt are dropped silently, which is what makes cancellation atomic:
//! after an exit transition, no stale tick or encoder result can act.

use uuid::Uuid;

use crate::device::CaptureMode;

/// Observable session phase, published to consumers.
///
/// `Finalizing` is internal; consumers observe it as `Recording` so a
/// preview is never announced before its artifact exists.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionPhase {
    Idle,
    RequestingPermission,
    Recording,
    Preview,
    Sent,
    Error,
}

/// Authoritative machine state.
#[derive(Debug, Clone, PartialEq)]
pub enum Phase {
    Idle,
    RequestingPermission {
        attempt: Uuid,
        mode: CaptureMode,
    },
    Recording {
        attempt: Uuid,
        mode: CaptureMode,
    },
    /// Stop accepted; encoder flushing. Observably still `Recording`.
    Finalizing {
        attempt: Uuid,
        mode: CaptureMode,
    },
    Preview {
        attempt: Uuid,
        mode: CaptureMode,
        duration_secs: u64,
    },
    Sent,
    Error {
        message: String,
    },
}

impl Phase {
    pub fn label(&self) -> SessionPhase {
        match self {
            Phase::Idle => SessionPhase::Idle,
            Phase::RequestingPermission { .. } => SessionPhase::RequestingPermission,
            Phase::Recording { .. } | Phase::Finalizing { .. } => SessionPhase::Recording,
            Phase::Preview { .. } => SessionPhase::Preview,
            Phase::Sent => SessionPhase::Sent,
            Phase::Error { .. } => SessionPhase::Error,
        }
    }

    pub fn attempt(&self) -> Option<Uuid> {
        match self {
            Phase::RequestingPermission { attempt, .. }
            | Phase::Recording { attempt, .. }
            | Phase::Finalizing { attempt, .. }
            | Phase::Preview { attempt, .. } => Some(*attempt),
            _ => None,
        }
    }
}

/// Events that can trigger state transitions.
#[derive(Debug, Clone)]
pub enum Event {
    /// User engaged the capture surface
    StartRequested { mode: CaptureMode },
    /// Device acquisition resolved successfully
    PermissionGranted { attempt: Uuid },
    /// Device acquisition or the live capture failed
    Failed { attempt: Uuid, message: String },
    /// User requested a manual stop
    StopRequested,
    /// Countdown reached zero
    CountdownExpired { attempt: Uuid },
    /// User cancelled, or the surface is going away
    CancelRequested,
    /// Encoder flushed; `empty` means zero-length output
    Finalized {
        attempt: Uuid,
        duration_secs: u64,
        empty: bool,
    },
    /// User deleted the preview artifact
    DeleteRequested,
    /// User sent the preview artifact
    SendRequested,
    /// User dismissed the error message
    ErrorAcknowledged,
}

/// Effects to be executed by the controller after a transition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Effect {
    /// Begin device acquisition for a new attempt
    AcquireDevice { attempt: Uuid, mode: CaptureMode },
    /// Permission granted: start countdown, visualizer, and encoder
    StartRecordingTasks { attempt: Uuid },
    /// Stop tasks, flush the encoder, materialize, release the device
    FinalizeCapture { attempt: Uuid },
    /// Stop tasks, discard encoder output, release the device
    AbortCapture { attempt: Uuid },
    /// Mark an in-flight acquisition cancelled; release on resolution
    CancelAcquire { attempt: Uuid },
    /// Release the preview artifact's resource
    ReleaseArtifact,
    /// Hand the preview artifact to the submission adapter
    TransferArtifact,
    /// Restore the countdown to the full duration
    ResetTimers,
}

/// Reducer: (phase, event) -> (next phase, effects).
///
/// Countdown expiry routes through the same `FinalizeCapture` effect as a
/// manual stop; there is no separate timeout branch. A zero-length
/// finalize folds into the cancel path and never reaches preview.
pub fn reduce(phase: &Phase, event: Event) -> (Phase, Vec<Effect>) {
    use Effect::*;
    use Event::*;
    use Phase::*;

    match (phase, event) {
        // -----------------
        // Idle / Sent: a new session may begin
        // -----------------
        (Idle | Sent, StartRequested { mode }) => {
            let attempt = Uuid::new_v4();
            (
                RequestingPermission { attempt, mode },
                vec![AcquireDevice { attempt, mode }],
            )
        }

        // -----------------
        // RequestingPermission
        // -----------------
        (RequestingPermission { attempt, mode }, PermissionGranted { attempt: id })
            if *attempt == id =>
        {
            (
                Recording {
                    attempt: id,
                    mode: *mode,
                },
                vec![StartRecordingTasks { attempt: id }],
            )
        }
        (RequestingPermission { attempt, .. }, Failed { attempt: id, message })
            if *attempt == id =>
        {
            // No device handle was ever created; nothing to release
            (Error { message }, vec![])
        }
        (RequestingPermission { attempt, .. }, CancelRequested) => (
            Idle,
            vec![CancelAcquire { attempt: *attempt }, ResetTimers],
        ),

        // -----------------
        // Recording
        // -----------------
        (Recording { attempt, mode }, StopRequested) => (
            Finalizing {
                attempt: *attempt,
                mode: *mode,
            },
            vec![FinalizeCapture { attempt: *attempt }],
        ),
        (Recording { attempt, mode }, CountdownExpired { attempt: id }) if *attempt == id => (
            Finalizing {
                attempt: id,
                mode: *mode,
            },
            vec![FinalizeCapture { attempt: id }],
        ),
        (Recording { attempt, .. }, CancelRequested) => (
            Idle,
            vec![AbortCapture { attempt: *attempt }, ResetTimers],
        ),
        (Recording { attempt, .. }, Failed { attempt: id, message }) if *attempt == id => (
            Error { message },
            vec![AbortCapture { attempt: id }],
        ),

        // -----------------
        // Finalizing
        // -----------------
        (
            Finalizing { attempt, mode },
            Finalized {
                attempt: id,
                duration_secs,
                empty,
            },
        ) if *attempt == id => {
            if empty {
                // Zero-length capture: treated as a cancellation
                (Idle, vec![ResetTimers])
            } else {
                (
                    Preview {
                        attempt: id,
                        mode: *mode,
                        duration_secs,
                    },
                    vec![],
                )
            }
        }
        (Finalizing { attempt, .. }, Failed { attempt: id, message }) if *attempt == id => {
            (Error { message }, vec![])
        }

        // -----------------
        // Preview
        // -----------------
        (Preview { .. }, DeleteRequested) => (Idle, vec![ReleaseArtifact, ResetTimers]),
        (Preview { .. }, SendRequested) => (Sent, vec![TransferArtifact]),
        (Preview { attempt, .. }, Failed { attempt: id, message }) if *attempt == id => {
            // Submission failure: the artifact already left the buffer
            (Error { message }, vec![])
        }

        // -----------------
        // Error
        // -----------------
        (Error { .. }, ErrorAcknowledged) => (Idle, vec![ResetTimers]),

        // -----------------
        // Everything else: no transition, stale events dropped silently
        // -----------------
        _ => (phase.clone(), vec![]),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn mode() -> CaptureMode {
        CaptureMode::Audio
    }

    #[test]
    fn idle_start_requests_permission() {
        let (next, effects) = reduce(&Phase::Idle, Event::StartRequested { mode: mode() });
        assert!(matches!(next, Phase::RequestingPermission { .. }));
        assert!(effects
            .iter()
            .any(|e| matches!(e, Effect::AcquireDevice { .. })));
    }

    #[test]
    fn start_while_recording_is_rejected() {
        let state = Phase::Recording {
            attempt: Uuid::new_v4(),
            mode: mode(),
        };
        let (next, effects) = reduce(&state, Event::StartRequested { mode: mode() });
        assert_eq!(next, state);
        assert!(effects.is_empty());
    }

    #[test]
    fn permission_granted_starts_recording() {
        let attempt = Uuid::new_v4();
        let state = Phase::RequestingPermission {
            attempt,
            mode: mode(),
        };
        let (next, effects) = reduce(&state, Event::PermissionGranted { attempt });
        assert!(matches!(next, Phase::Recording { .. }));
        assert_eq!(effects, vec![Effect::StartRecordingTasks { attempt }]);
    }

    #[test]
    fn permission_denied_enters_error_without_teardown() {
        let attempt = Uuid::new_v4();
        let state = Phase::RequestingPermission {
            attempt,
            mode: mode(),
        };
        let (next, effects) = reduce(
            &state,
            Event::Failed {
                attempt,
                message: "device access denied by the user".to_string(),
            },
        );
        assert!(matches!(next, Phase::Error { .. }));
        // No handle ever existed, so no abort/release effect
        assert!(effects.is_empty());
    }

    #[test]
    fn stale_permission_grant_is_dropped() {
        let state = Phase::RequestingPermission {
            attempt: Uuid::new_v4(),
            mode: mode(),
        };
        let (next, effects) = reduce(
            &state,
            Event::PermissionGranted {
                attempt: Uuid::new_v4(),
            },
        );
        assert_eq!(next, state);
        assert!(effects.is_empty());
    }

    #[test]
    fn manual_stop_and_expiry_share_the_finalize_effect() {
        let attempt = Uuid::new_v4();
        let state = Phase::Recording {
            attempt,
            mode: mode(),
        };

        let (next_stop, effects_stop) = reduce(&state, Event::StopRequested);
        let (next_expired, effects_expired) = reduce(&state, Event::CountdownExpired { attempt });

        assert_eq!(next_stop, next_expired);
        assert_eq!(effects_stop, effects_expired);
        assert_eq!(effects_stop, vec![Effect::FinalizeCapture { attempt }]);
    }

    #[test]
    fn expiry_after_finalize_started_is_dropped() {
        let attempt = Uuid::new_v4();
        let state = Phase::Finalizing {
            attempt,
            mode: mode(),
        };
        let (next, effects) = reduce(&state, Event::CountdownExpired { attempt });
        assert_eq!(next, state);
        assert!(effects.is_empty());
    }

    #[test]
    fn cancel_during_recording_aborts_everything() {
        let attempt = Uuid::new_v4();
        let state = Phase::Recording {
            attempt,
            mode: mode(),
        };
        let (next, effects) = reduce(&state, Event::CancelRequested);
        assert_eq!(next, Phase::Idle);
        assert!(effects
            .iter()
            .any(|e| matches!(e, Effect::AbortCapture { .. })));
        assert!(effects.iter().any(|e| matches!(e, Effect::ResetTimers)));
        // No artifact path on cancel
        assert!(!effects
            .iter()
            .any(|e| matches!(e, Effect::FinalizeCapture { .. })));
    }

    #[test]
    fn cancel_while_acquiring_marks_the_attempt() {
        let attempt = Uuid::new_v4();
        let state = Phase::RequestingPermission {
            attempt,
            mode: mode(),
        };
        let (next, effects) = reduce(&state, Event::CancelRequested);
        assert_eq!(next, Phase::Idle);
        assert_eq!(
            effects,
            vec![Effect::CancelAcquire { attempt }, Effect::ResetTimers]
        );
    }

    #[test]
    fn non_empty_finalize_reaches_preview() {
        let attempt = Uuid::new_v4();
        let state = Phase::Finalizing {
            attempt,
            mode: mode(),
        };
        let (next, effects) = reduce(
            &state,
            Event::Finalized {
                attempt,
                duration_secs: 5,
                empty: false,
            },
        );
        assert!(matches!(next, Phase::Preview { duration_secs: 5, .. }));
        assert!(effects.is_empty());
    }

    #[test]
    fn empty_finalize_returns_to_idle() {
        let attempt = Uuid::new_v4();
        let state = Phase::Finalizing {
            attempt,
            mode: mode(),
        };
        let (next, effects) = reduce(
            &state,
            Event::Finalized {
                attempt,
                duration_secs: 0,
                empty: true,
            },
        );
        assert_eq!(next, Phase::Idle);
        assert_eq!(effects, vec![Effect::ResetTimers]);
    }

    #[test]
    fn preview_delete_releases_and_resets() {
        let state = Phase::Preview {
            attempt: Uuid::new_v4(),
            mode: mode(),
            duration_secs: 5,
        };
        let (next, effects) = reduce(&state, Event::DeleteRequested);
        assert_eq!(next, Phase::Idle);
        assert_eq!(
            effects,
            vec![Effect::ReleaseArtifact, Effect::ResetTimers]
        );
    }

    #[test]
    fn preview_send_transfers_ownership() {
        let state = Phase::Preview {
            attempt: Uuid::new_v4(),
            mode: mode(),
            duration_secs: 5,
        };
        let (next, effects) = reduce(&state, Event::SendRequested);
        assert_eq!(next, Phase::Sent);
        assert_eq!(effects, vec![Effect::TransferArtifact]);
        // Never both: transfer excludes release
        assert!(!effects.iter().any(|e| matches!(e, Effect::ReleaseArtifact)));
    }

    #[test]
    fn failed_submission_surfaces_as_error() {
        let attempt = Uuid::new_v4();
        let state = Phase::Preview {
            attempt,
            mode: mode(),
            duration_secs: 5,
        };
        let (next, effects) = reduce(
            &state,
            Event::Failed {
                attempt,
                message: "outbound channel closed".to_string(),
            },
        );
        assert!(matches!(next, Phase::Error { .. }));
        assert!(effects.is_empty());
    }

    #[test]
    fn sent_allows_a_fresh_session() {
        let (next, effects) = reduce(&Phase::Sent, Event::StartRequested { mode: mode() });
        assert!(matches!(next, Phase::RequestingPermission { .. }));
        assert!(effects
            .iter()
            .any(|e| matches!(e, Effect::AcquireDevice { .. })));
    }

    #[test]
    fn error_acknowledge_returns_to_idle() {
        let state = Phase::Error {
            message: "no mic".to_string(),
        };
        let (next, effects) = reduce(&state, Event::ErrorAcknowledged);
        assert_eq!(next, Phase::Idle);
        assert_eq!(effects, vec![Effect::ResetTimers]);
    }

    #[test]
    fn finalizing_is_observed_as_recording() {
        let phase = Phase::Finalizing {
            attempt: Uuid::new_v4(),
            mode: mode(),
        };
        assert_eq!(phase.label(), SessionPhase::Recording);
    }

    #[test]
    fn never_two_states_at_once_over_event_sequences() {
        // Exhaustive-ish walk: any event applied to any phase yields
        // exactly one next phase.
        let attempt = Uuid::new_v4();
        let phases = [
            Phase::Idle,
            Phase::RequestingPermission {
                attempt,
                mode: mode(),
            },
            Phase::Recording {
                attempt,
                mode: mode(),
            },
            Phase::Finalizing {
                attempt,
                mode: mode(),
            },
            Phase::Preview {
                attempt,
                mode: mode(),
                duration_secs: 3,
            },
            Phase::Sent,
            Phase::Error {
                message: "x".to_string(),
            },
        ];
        let events = [
            Event::StartRequested { mode: mode() },
            Event::PermissionGranted { attempt },
            Event::StopRequested,
            Event::CountdownExpired { attempt },
            Event::CancelRequested,
            Event::DeleteRequested,
            Event::SendRequested,
            Event::ErrorAcknowledged,
        ];

        for phase in &phases {
            for event in &events {
                let (next, _) = reduce(phase, event.clone());
                // label() is total: exactly one observable phase
                let _ = next.label();
            }
        }
    }
}
