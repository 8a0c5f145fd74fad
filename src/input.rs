//! Input model shared by the gesture machines.
//!
//! `Modifiers` captures the keys held at the time of a pointer sample.
//! `GesturePhase` is the lifecycle every drag, resize, and rotate gesture
//! moves through: idle, armed on pointer-down, active once the pointer has
//! travelled past a small epsilon, then committed or reverted on release.
//! `FrameThrottle` drops samples that arrive faster than one per frame.

#[cfg(test)]
#[path = "input_test.rs"]
mod input_test;

use std::time::{Duration, Instant};

use crate::geometry::Point;

/// Keyboard modifier keys held during an event.
#[allow(clippy::struct_excessive_bools)]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Modifiers {
    /// Shift key is held. Disables snapping and forces aspect lock.
    pub shift: bool,
    /// Ctrl key is held.
    pub ctrl: bool,
    /// Alt / Option key is held.
    pub alt: bool,
    /// Meta / Command key is held.
    pub meta: bool,
}

impl Modifiers {
    #[must_use]
    pub fn shift() -> Self {
        Self { shift: true, ..Self::default() }
    }
}

/// Lifecycle of a pointer gesture.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum GesturePhase {
    #[default]
    Idle,
    /// Pointer is down; no movement past the epsilon yet.
    Armed,
    Active,
    Committed,
    Reverted,
}

impl GesturePhase {
    /// Whether the gesture has ended.
    #[must_use]
    pub fn is_finished(self) -> bool {
        matches!(self, Self::Committed | Self::Reverted)
    }
}

/// Whether the pointer has moved more than `epsilon_px` screen pixels.
#[must_use]
pub fn moved_past(start: Point, current: Point, epsilon_px: f64) -> bool {
    (current.x - start.x).hypot(current.y - start.y) > epsilon_px
}

/// Admits at most one sample per `interval`.
#[derive(Debug, Clone, Copy)]
pub struct FrameThrottle {
    interval: Duration,
    last: Option<Instant>,
}

impl FrameThrottle {
    #[must_use]
    pub fn new(interval: Duration) -> Self {
        Self { interval, last: None }
    }

    /// Admit a sample taken now.
    pub fn admit(&mut self) -> bool {
        self.admit_at(Instant::now())
    }

    /// Admit a sample taken at `now`; the first sample is always admitted.
    pub fn admit_at(&mut self, now: Instant) -> bool {
        let due = self.last.is_none_or(|last| now.saturating_duration_since(last) >= self.interval);
        if due {
            self.last = Some(now);
        }
        due
    }

    pub fn reset(&mut self) {
        self.last = None;
    }
}

/// Pointer bookkeeping shared by the gesture machines.
///
/// Tracks the phase, the first and latest client positions, and whether the
/// latest sample was held back by the frame throttle.
#[derive(Debug, Clone, Copy)]
pub struct PointerTrack {
    pub start: Point,
    pub last: Point,
    pub phase: GesturePhase,
    throttle: FrameThrottle,
    pending: bool,
}

impl PointerTrack {
    /// A track armed at `start`.
    #[must_use]
    pub fn armed(start: Point, frame_interval: Duration) -> Self {
        Self {
            start,
            last: start,
            phase: GesturePhase::Armed,
            throttle: FrameThrottle::new(frame_interval),
            pending: false,
        }
    }

    /// Record a sample. Returns `true` when the caller should apply it now.
    pub fn sample_at(&mut self, client: Point, epsilon_px: f64, now: Instant) -> bool {
        if self.phase.is_finished() {
            return false;
        }
        self.last = client;
        if self.phase == GesturePhase::Armed {
            if !moved_past(self.start, client, epsilon_px) {
                return false;
            }
            self.phase = GesturePhase::Active;
        }
        let admitted = self.throttle.admit_at(now);
        self.pending = !admitted;
        admitted
    }

    /// Whether a throttled sample still needs applying; clears the flag.
    pub fn take_pending(&mut self) -> bool {
        std::mem::take(&mut self.pending)
    }

    /// Whether the latest position is away from the start.
    #[must_use]
    pub fn moved(&self, epsilon_px: f64) -> bool {
        moved_past(self.start, self.last, epsilon_px)
    }

    pub fn finish(&mut self, committed: bool) {
        self.phase = if committed { GesturePhase::Committed } else { GesturePhase::Reverted };
    }
}
