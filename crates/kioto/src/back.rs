#![forbid(unsafe_code)]

//! Predictive-back translation.
//!
//! The platform reports discrete and continuous back events. The engine
//! only tracks gesture progress as opaque feedback for the renderer and
//! turns a committed gesture into `navigate_back`; animation frames are the
//! renderer's business.

/// Back input from the platform.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum BackEvent {
    /// A predictive gesture began.
    Started,
    /// Gesture progress in `[0, 1]`; out-of-range values are clamped.
    Progressed(f32),
    /// The gesture was abandoned.
    Cancelled,
    /// Back was committed (button press or released gesture).
    Pressed,
}

/// Gesture feedback published to renderers.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub enum BackGesture {
    #[default]
    Idle,
    Tracking {
        progress: f32,
    },
}

/// What the engine did with a [`BackEvent`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum BackOutcome {
    /// Nothing to go back to, or the event made no sense in this state.
    Ignored,
    /// Gesture is in progress at the given progress.
    Tracking(f32),
    /// Gesture abandoned; the foreground stays.
    Cancelled,
    /// `navigate_back` was issued on the foreground pane.
    Committed,
}

fn clamp(progress: f32) -> f32 {
    if progress.is_nan() {
        0.0
    } else {
        progress.clamp(0.0, 1.0)
    }
}

impl BackGesture {
    /// Apply `event`, returning the next gesture state and the outcome.
    #[must_use]
    pub fn apply(self, event: BackEvent) -> (BackGesture, BackOutcome) {
        match (self, event) {
            (_, BackEvent::Pressed) => (BackGesture::Idle, BackOutcome::Committed),
            (_, BackEvent::Started) => (
                BackGesture::Tracking { progress: 0.0 },
                BackOutcome::Tracking(0.0),
            ),
            (BackGesture::Tracking { .. }, BackEvent::Progressed(p)) => {
                let progress = clamp(p);
                (BackGesture::Tracking { progress }, BackOutcome::Tracking(progress))
            }
            (BackGesture::Tracking { .. }, BackEvent::Cancelled) => {
                (BackGesture::Idle, BackOutcome::Cancelled)
            }
            (BackGesture::Idle, BackEvent::Progressed(_) | BackEvent::Cancelled) => {
                (BackGesture::Idle, BackOutcome::Ignored)
            }
        }
    }

    /// Current progress, `0.0` when idle.
    #[must_use]
    pub fn progress(self) -> f32 {
        match self {
            Self::Idle => 0.0,
            Self::Tracking { progress } => progress,
        }
    }
}
