//! # Drop banner queue
//! Single-slot, FIFO-backed presentation state machine for transient banners.
//!
//! ```text
//!  Idle --enqueue--> Showing --auto-dismiss / swipe / tap--> Dismissing
//!   ^                   ^                                       |
//!   |                   +------ stagger, backlog non-empty -----+
//!   +------------------------- backlog empty -------------------+
//! ```
//!
//! - At most one card is current; the backlog is FIFO and holds each id once.
//! - Dismissed ids are remembered for the session and never shown again.
//! - Every state change cancels the pending timer first, so a timer that
//!   belonged to an earlier card can never act on the current one.
//! - While `Dismissing` (exit animation or stagger), touches are ignored.

pub mod gesture;
pub mod timer;

use std::collections::{HashSet, VecDeque};
use std::time::{Duration, Instant};

use metrics::counter;
use serde::{Deserialize, Serialize};

use crate::classify::{classify_alert, classify_item, Category};
use crate::model::{Alert, Impact, Item};

pub use gesture::{GestureOutcome, GestureThresholds, GestureTracker};
pub use timer::{ManualScheduler, TimerId, TimerScheduler, TokioScheduler};

/// Banner timing and gesture thresholds (`[banner]` in the pipeline config).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BannerTimings {
    pub auto_dismiss_ms: u64,
    pub exit_animation_ms: u64,
    pub stagger_ms: u64,
    pub swipe_distance_px: f32,
    pub swipe_velocity_px_s: f32,
    pub quick_tap_ms: u64,
    pub tap_slop_px: f32,
}

impl Default for BannerTimings {
    fn default() -> Self {
        Self {
            auto_dismiss_ms: 5_000,
            exit_animation_ms: 300,
            stagger_ms: 400,
            swipe_distance_px: 40.0,
            swipe_velocity_px_s: 500.0,
            quick_tap_ms: 200,
            tap_slop_px: 5.0,
        }
    }
}

impl BannerTimings {
    pub fn auto_dismiss(&self) -> Duration {
        Duration::from_millis(self.auto_dismiss_ms)
    }

    pub fn exit_animation(&self) -> Duration {
        Duration::from_millis(self.exit_animation_ms)
    }

    pub fn stagger(&self) -> Duration {
        Duration::from_millis(self.stagger_ms)
    }

    pub fn gestures(&self) -> GestureThresholds {
        GestureThresholds {
            swipe_distance_px: self.swipe_distance_px,
            swipe_velocity_px_s: self.swipe_velocity_px_s,
            quick_tap: Duration::from_millis(self.quick_tap_ms),
            tap_slop_px: self.tap_slop_px,
        }
    }
}

/// What a banner displays; built from an alert or a feed item.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BannerCard {
    pub id: String,
    pub title: String,
    pub source: String,
    pub impact: Impact,
    pub category: Category,
}

impl From<&Alert> for BannerCard {
    fn from(a: &Alert) -> Self {
        Self {
            id: a.id.clone(),
            title: a.headline.clone(),
            source: a.source.clone(),
            impact: a.impact,
            category: classify_alert(a),
        }
    }
}

impl BannerCard {
    /// `None` for items that have no title or cannot be classified.
    pub fn from_item(it: &Item) -> Option<Self> {
        Some(Self {
            id: it.id.clone(),
            title: it.title_text()?.to_string(),
            source: it.source.as_ref().map(|s| s.name.clone()).unwrap_or_default(),
            impact: it.impact()?,
            category: classify_item(it)?,
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum BannerPhase {
    Idle,
    Showing,
    Dismissing,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum BannerEvent {
    Shown { card: BannerCard },
    Dismissing { id: String },
    Dismissed { id: String },
    Navigate { id: String },
    Idle,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum TimerKind {
    AutoDismiss,
    ExitComplete,
    Promote,
}

#[derive(Debug, Clone, Copy)]
struct Pending {
    id: TimerId,
    kind: TimerKind,
}

/// Serializable view of the queue.
#[derive(Debug, Clone, Serialize)]
pub struct BannerSnapshot {
    pub phase: BannerPhase,
    pub current: Option<BannerCard>,
    pub queued: Vec<String>,
    pub dismissed: usize,
    pub highlighted: Option<String>,
}

type NavigateFn = Box<dyn FnMut(&str) + Send>;

pub struct BannerQueue<S: TimerScheduler> {
    timings: BannerTimings,
    scheduler: S,
    phase: BannerPhase,
    current: Option<BannerCard>,
    backlog: VecDeque<BannerCard>,
    dismissed: HashSet<String>,
    highlighted: Option<String>,
    pending: Option<Pending>,
    gesture: GestureTracker,
    navigate: Option<NavigateFn>,
}

impl<S: TimerScheduler> BannerQueue<S> {
    pub fn new(timings: BannerTimings, scheduler: S) -> Self {
        Self {
            timings,
            scheduler,
            phase: BannerPhase::Idle,
            current: None,
            backlog: VecDeque::new(),
            dismissed: HashSet::new(),
            highlighted: None,
            pending: None,
            gesture: GestureTracker::default(),
            navigate: None,
        }
    }

    /// Callback invoked with the card id when a banner is tapped.
    pub fn on_navigate<F>(&mut self, f: F)
    where
        F: FnMut(&str) + Send + 'static,
    {
        self.navigate = Some(Box::new(f));
    }

    pub fn phase(&self) -> BannerPhase {
        self.phase
    }

    pub fn current(&self) -> Option<&BannerCard> {
        self.current.as_ref()
    }

    pub fn backlog(&self) -> impl Iterator<Item = &BannerCard> {
        self.backlog.iter()
    }

    pub fn is_dismissed(&self, id: &str) -> bool {
        self.dismissed.contains(id)
    }

    pub fn timings(&self) -> &BannerTimings {
        &self.timings
    }

    pub fn scheduler(&self) -> &S {
        &self.scheduler
    }

    pub fn scheduler_mut(&mut self) -> &mut S {
        &mut self.scheduler
    }

    /// Set the scroll-to-target pointer.
    pub fn highlight(&mut self, id: impl Into<String>) {
        self.highlighted = Some(id.into());
    }

    pub fn highlighted(&self) -> Option<&str> {
        self.highlighted.as_deref()
    }

    /// Consume the scroll-to-target pointer.
    pub fn take_highlight(&mut self) -> Option<String> {
        self.highlighted.take()
    }

    pub fn snapshot(&self) -> BannerSnapshot {
        BannerSnapshot {
            phase: self.phase,
            current: self.current.clone(),
            queued: self.backlog.iter().map(|c| c.id.clone()).collect(),
            dismissed: self.dismissed.len(),
            highlighted: self.highlighted.clone(),
        }
    }

    /// Admit cards. Ids already current, queued or dismissed are skipped.
    /// From `Idle`, the first admitted card is shown at once.
    pub fn enqueue<I>(&mut self, cards: I) -> Vec<BannerEvent>
    where
        I: IntoIterator<Item = BannerCard>,
    {
        for card in cards {
            if self.is_known(&card.id) {
                tracing::trace!(target: "feed::banner", id = %card.id, "duplicate banner skipped");
                continue;
            }
            tracing::debug!(target: "feed::banner", id = %card.id, "banner queued");
            self.backlog.push_back(card);
        }

        let mut events = Vec::new();
        if self.phase == BannerPhase::Idle && self.pending.is_none() {
            self.promote_next(&mut events);
        }
        events
    }

    fn is_known(&self, id: &str) -> bool {
        self.dismissed.contains(id)
            || self.current.as_ref().is_some_and(|c| c.id == id)
            || self.backlog.iter().any(|c| c.id == id)
    }

    /// Deliver a fired timer. Anything but the one pending id is stale.
    pub fn on_timer(&mut self, id: TimerId) -> Vec<BannerEvent> {
        let mut events = Vec::new();
        let kind = match self.pending {
            Some(p) if p.id == id => p.kind,
            _ => {
                tracing::trace!(target: "feed::banner", ?id, "stale timer ignored");
                return events;
            }
        };
        self.pending = None;

        match kind {
            TimerKind::AutoDismiss => self.begin_dismiss(&mut events),
            TimerKind::ExitComplete => self.finish_dismiss(&mut events),
            TimerKind::Promote => self.promote_next(&mut events),
        }
        events
    }

    /// Dismiss the current card through the normal exit path.
    pub fn dismiss_current(&mut self) -> Vec<BannerEvent> {
        let mut events = Vec::new();
        if self.phase == BannerPhase::Showing {
            self.gesture.reset();
            self.begin_dismiss(&mut events);
        }
        events
    }

    pub fn touch_start(&mut self, at: Instant) {
        if self.phase == BannerPhase::Showing {
            self.gesture.start(at);
        }
    }

    /// Cumulative translation of the active touch (px, upward negative).
    pub fn touch_move(&mut self, dx: f32, dy: f32) {
        if self.phase == BannerPhase::Showing {
            let t = self.timings.gestures();
            self.gesture.moved(dx, dy, &t);
        }
    }

    pub fn is_swiping(&self) -> bool {
        self.gesture.is_swiping()
    }

    /// Release the active touch. Taps dismiss and navigate; swipes past the
    /// threshold dismiss; anything else leaves the state alone.
    pub fn touch_end(
        &mut self,
        at: Instant,
        velocity_y: f32,
    ) -> (GestureOutcome, Vec<BannerEvent>) {
        let mut events = Vec::new();
        if self.phase != BannerPhase::Showing {
            self.gesture.reset();
            return (GestureOutcome::Ignored, events);
        }

        let t = self.timings.gestures();
        let outcome = self.gesture.finish(at, velocity_y, &t);
        match outcome {
            GestureOutcome::Dismiss => self.begin_dismiss(&mut events),
            GestureOutcome::Tap => {
                if let Some(id) = self.current.as_ref().map(|c| c.id.clone()) {
                    self.begin_dismiss(&mut events);
                    self.highlighted = Some(id.clone());
                    if let Some(nav) = self.navigate.as_mut() {
                        nav(&id);
                    }
                    events.push(BannerEvent::Navigate { id });
                }
            }
            GestureOutcome::SnapBack | GestureOutcome::Ignored => {}
        }
        (outcome, events)
    }

    /// Stop all timers; the component is going away. State is kept and
    /// [`mount`](Self::mount) picks it up again.
    pub fn unmount(&mut self) {
        self.cancel_pending();
        self.gesture.reset();
    }

    /// Re-arm the timer the current phase is waiting on. A showing card gets
    /// a fresh auto-dismiss period. No-op while a timer is already pending.
    pub fn mount(&mut self) -> Vec<BannerEvent> {
        let mut events = Vec::new();
        if self.pending.is_some() {
            return events;
        }
        match (self.phase, self.current.is_some()) {
            (BannerPhase::Showing, _) => {
                self.arm(TimerKind::AutoDismiss, self.timings.auto_dismiss());
            }
            (BannerPhase::Dismissing, true) => {
                self.arm(TimerKind::ExitComplete, self.timings.exit_animation());
            }
            (BannerPhase::Dismissing, false) if !self.backlog.is_empty() => {
                self.arm(TimerKind::Promote, self.timings.stagger());
            }
            (BannerPhase::Dismissing, false) => self.go_idle(&mut events),
            (BannerPhase::Idle, _) => {
                if !self.backlog.is_empty() {
                    self.promote_next(&mut events);
                }
            }
        }
        events
    }

    /// Drop everything, including the dismissed set.
    pub fn reset(&mut self) {
        self.unmount();
        self.phase = BannerPhase::Idle;
        self.current = None;
        self.backlog.clear();
        self.dismissed.clear();
        self.highlighted = None;
    }

    // -- transitions --

    fn cancel_pending(&mut self) {
        if let Some(p) = self.pending.take() {
            self.scheduler.cancel(p.id);
        }
    }

    fn arm(&mut self, kind: TimerKind, delay: Duration) {
        self.cancel_pending();
        let id = self.scheduler.schedule(delay);
        self.pending = Some(Pending { id, kind });
    }

    fn promote_next(&mut self, events: &mut Vec<BannerEvent>) {
        match self.backlog.pop_front() {
            Some(card) => {
                tracing::info!(target: "feed::banner", id = %card.id, "banner shown");
                counter!("banner_shown_total").increment(1);
                self.current = Some(card.clone());
                self.phase = BannerPhase::Showing;
                self.arm(TimerKind::AutoDismiss, self.timings.auto_dismiss());
                events.push(BannerEvent::Shown { card });
            }
            None => self.go_idle(events),
        }
    }

    fn begin_dismiss(&mut self, events: &mut Vec<BannerEvent>) {
        let Some(id) = self.current.as_ref().map(|c| c.id.clone()) else {
            return;
        };
        self.phase = BannerPhase::Dismissing;
        self.arm(TimerKind::ExitComplete, self.timings.exit_animation());
        events.push(BannerEvent::Dismissing { id });
    }

    fn finish_dismiss(&mut self, events: &mut Vec<BannerEvent>) {
        if let Some(card) = self.current.take() {
            if self.dismissed.insert(card.id.clone()) {
                counter!("banner_dismissed_total").increment(1);
            }
            tracing::debug!(target: "feed::banner", id = %card.id, "banner dismissed");
            events.push(BannerEvent::Dismissed { id: card.id });
        }

        if self.backlog.is_empty() {
            self.go_idle(events);
        } else {
            // Stays `Dismissing` until the stagger elapses.
            self.arm(TimerKind::Promote, self.timings.stagger());
        }
    }

    fn go_idle(&mut self, events: &mut Vec<BannerEvent>) {
        self.cancel_pending();
        if self.phase != BannerPhase::Idle {
            self.phase = BannerPhase::Idle;
            events.push(BannerEvent::Idle);
        }
    }
}

impl BannerQueue<ManualScheduler> {
    /// Advance virtual time, delivering every timer that falls due in order
    /// (including ones scheduled along the way).
    pub fn advance(&mut self, by: Duration) -> Vec<BannerEvent> {
        let target = self.scheduler.now() + by;
        let mut events = Vec::new();
        while let Some(id) = self.scheduler.pop_due(target) {
            events.extend(self.on_timer(id));
        }
        self.scheduler.set_now(target);
        events
    }
}

impl<S: TimerScheduler> Drop for BannerQueue<S> {
    fn drop(&mut self) {
        self.cancel_pending();
    }
}
