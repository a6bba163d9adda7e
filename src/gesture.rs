//! Click-vs-drag disambiguation.
//!
//! Pointer-up after a press is either a click (select for editing) or the end
//! of a drag (move a region). The difference is total travel from the initial
//! press position, compared against a single configurable pixel threshold.
//! Kept separate from the interaction controller so it can be tested without
//! any rendering involved.

/// Default travel threshold in pixels. At or below this, a press/release
/// pair counts as a click.
pub const DEFAULT_DRAG_THRESHOLD_PX: f64 = 5.0;

/// What a completed press/release pair turned out to be.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Gesture {
    Click,
    Drag,
}

/// Tracks one press/move/release cycle of the pointer.
#[derive(Debug)]
pub struct GestureTracker {
    threshold: f64,
    origin: Option<(f64, f64)>,
    exceeded: bool,
}

impl Default for GestureTracker {
    fn default() -> Self {
        Self::new(DEFAULT_DRAG_THRESHOLD_PX)
    }
}

impl GestureTracker {
    /// Create a tracker with a custom drag threshold in pixels.
    pub fn new(threshold: f64) -> Self {
        Self {
            threshold,
            origin: None,
            exceeded: false,
        }
    }

    /// Record a pointer press.
    pub fn press(&mut self, x: f64, y: f64) {
        self.origin = Some((x, y));
        self.exceeded = false;
    }

    /// Record pointer movement. Once the travel from the press position
    /// exceeds the threshold, the gesture is latched as a drag; moving back
    /// toward the origin does not undo that.
    pub fn movement(&mut self, x: f64, y: f64) {
        if self.exceeded {
            return;
        }
        if let Some((ox, oy)) = self.origin {
            let travel = ((x - ox).powi(2) + (y - oy).powi(2)).sqrt();
            if travel > self.threshold {
                self.exceeded = true;
            }
        }
    }

    /// Record a pointer release and classify the completed gesture.
    pub fn release(&mut self, x: f64, y: f64) -> Gesture {
        self.movement(x, y);
        self.origin = None;
        if std::mem::take(&mut self.exceeded) {
            Gesture::Drag
        } else {
            Gesture::Click
        }
    }

    /// Abandon an in-progress gesture without classifying it.
    pub fn reset(&mut self) {
        self.origin = None;
        self.exceeded = false;
    }
}
