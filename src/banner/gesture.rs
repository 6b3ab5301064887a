//! Touch tracking for the drop banner: tap vs. swipe disambiguation.
//!
//! A touch becomes a swipe as soon as its displacement leaves the tap slop;
//! from then on it can only dismiss or snap back, never navigate. A touch
//! that stays inside the slop and ends within the quick-tap window is a tap.

use std::time::{Duration, Instant};

use serde::Serialize;

/// Thresholds, derived from `BannerTimings`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GestureThresholds {
    /// Upward travel (px) that dismisses on release.
    pub swipe_distance_px: f32,
    /// Upward release velocity (px/s) that dismisses regardless of distance.
    pub swipe_velocity_px_s: f32,
    pub quick_tap: Duration,
    pub tap_slop_px: f32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum GestureOutcome {
    /// Navigate to the banner's target.
    Tap,
    /// Swipe past threshold: leave through the exit path.
    Dismiss,
    /// Swipe below threshold: back to rest, no state change.
    SnapBack,
    /// No touch in progress, or a long press.
    Ignored,
}

#[derive(Debug, Clone, Default)]
pub struct GestureTracker {
    started_at: Option<Instant>,
    dx: f32,
    dy: f32,
    is_swiping: bool,
}

impl GestureTracker {
    pub fn start(&mut self, at: Instant) {
        *self = Self {
            started_at: Some(at),
            ..Self::default()
        };
    }

    /// Cumulative translation since `start`. Upward is negative `dy`.
    pub fn moved(&mut self, dx: f32, dy: f32, t: &GestureThresholds) {
        if self.started_at.is_none() {
            return;
        }
        self.dx = dx;
        self.dy = dy;
        if dx.hypot(dy) > t.tap_slop_px {
            self.is_swiping = true;
        }
    }

    pub fn is_swiping(&self) -> bool {
        self.is_swiping
    }

    pub fn is_active(&self) -> bool {
        self.started_at.is_some()
    }

    /// Classify the release and reset. `velocity_y` is px/s, upward negative.
    pub fn finish(
        &mut self,
        at: Instant,
        velocity_y: f32,
        t: &GestureThresholds,
    ) -> GestureOutcome {
        let Some(started) = self.started_at else {
            return GestureOutcome::Ignored;
        };
        let (dx, dy, swiping) = (self.dx, self.dy, self.is_swiping);
        self.reset();

        if swiping {
            let upward = -dy;
            let flung = -velocity_y >= t.swipe_velocity_px_s;
            if upward > 0.0 && (upward >= t.swipe_distance_px || flung) {
                return GestureOutcome::Dismiss;
            }
            return GestureOutcome::SnapBack;
        }

        let held = at.saturating_duration_since(started);
        if held < t.quick_tap && dx.hypot(dy) < t.tap_slop_px {
            GestureOutcome::Tap
        } else {
            GestureOutcome::Ignored
        }
    }

    pub fn reset(&mut self) {
        *self = Self::default();
    }
}
