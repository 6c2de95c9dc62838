//! Tap/hold disambiguation for the primary capture button.
//!
//! A press opens a short hold window. Released inside the window, the
//! gesture is a tap and capture starts immediately in the selected mode;
//! if the window elapses first, the mode selector opens and nothing starts
//! until the button is released. Decisions compare event timestamps, so
//! the outcome is the same regardless of poll/release arrival order.
//!
//! Deliberately decoupled from the capture state machine; the only
//! communication is the emitted action.

use std::time::{Duration, Instant};

use crate::device::CaptureMode;

/// Default hold window before the mode selector opens
pub const HOLD_THRESHOLD: Duration = Duration::from_millis(500);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GestureAction {
    /// Tap recognized: start recording in this mode
    StartCapture(CaptureMode),
    /// Hold recognized: open the audio/video mode selector
    OpenModeSelector,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ButtonState {
    Released,
    Pressed { at: Instant },
    SelectorOpen,
}

pub struct GestureRecognizer {
    hold_threshold: Duration,
    mode: CaptureMode,
    state: ButtonState,
}

impl GestureRecognizer {
    pub fn new(initial_mode: CaptureMode) -> Self {
        Self {
            hold_threshold: HOLD_THRESHOLD,
            mode: initial_mode,
            state: ButtonState::Released,
        }
    }

    pub fn with_threshold(mut self, threshold: Duration) -> Self {
        self.hold_threshold = threshold;
        self
    }

    /// Currently selected capture mode
    pub fn mode(&self) -> CaptureMode {
        self.mode
    }

    /// Switch mode (typically while the selector is open)
    pub fn select_mode(&mut self, mode: CaptureMode) {
        self.mode = mode;
    }

    pub fn press(&mut self, now: Instant) {
        self.state = ButtonState::Pressed { at: now };
    }

    /// Drive the hold window. Fires `OpenModeSelector` once the window
    /// elapses while the button is still down.
    pub fn poll(&mut self, now: Instant) -> Option<GestureAction> {
        match self.state {
            ButtonState::Pressed { at } if now.duration_since(at) >= self.hold_threshold => {
                self.state = ButtonState::SelectorOpen;
                Some(GestureAction::OpenModeSelector)
            }
            _ => None,
        }
    }

    pub fn release(&mut self, now: Instant) -> Option<GestureAction> {
        match self.state {
            ButtonState::Pressed { at } => {
                self.state = ButtonState::Released;
                if now.duration_since(at) < self.hold_threshold {
                    Some(GestureAction::StartCapture(self.mode))
                } else {
                    // The window elapsed before the release even though no
                    // poll observed it; the selector outcome still wins.
                    Some(GestureAction::OpenModeSelector)
                }
            }
            ButtonState::SelectorOpen => {
                self.state = ButtonState::Released;
                None
            }
            ButtonState::Released => None,
        }
    }
}
