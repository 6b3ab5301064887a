//! Cancelable delayed callbacks for the banner queue.
//!
//! The queue never sleeps itself: it asks a [`TimerScheduler`] for a
//! [`TimerId`] and later receives that id back through
//! `BannerQueue::on_timer`. Ids it no longer waits for are ignored.

use std::collections::HashMap;
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TimerId(pub u64);

pub trait TimerScheduler {
    /// Arrange for `id` to be delivered after `delay`.
    fn schedule(&mut self, delay: Duration) -> TimerId;
    /// Best-effort cancel; unknown or already-fired ids are a no-op.
    fn cancel(&mut self, id: TimerId);
}

/// Virtual clock: nothing fires until the owner advances time.
#[derive(Debug, Default)]
pub struct ManualScheduler {
    now: Duration,
    next_id: u64,
    pending: Vec<(Duration, TimerId)>,
}

impl ManualScheduler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Elapsed virtual time.
    pub fn now(&self) -> Duration {
        self.now
    }

    pub fn pending(&self) -> usize {
        self.pending.len()
    }

    /// Pop the earliest timer due at or before `until`, moving the clock to
    /// its due time.
    pub fn pop_due(&mut self, until: Duration) -> Option<TimerId> {
        let idx = self
            .pending
            .iter()
            .enumerate()
            .filter(|(_, (due, _))| *due <= until)
            .min_by_key(|(_, (due, id))| (*due, *id))
            .map(|(i, _)| i)?;
        let (due, id) = self.pending.swap_remove(idx);
        self.now = self.now.max(due);
        Some(id)
    }

    /// Move the clock forward without firing anything.
    pub fn set_now(&mut self, now: Duration) {
        self.now = self.now.max(now);
    }
}

impl TimerScheduler for ManualScheduler {
    fn schedule(&mut self, delay: Duration) -> TimerId {
        self.next_id += 1;
        let id = TimerId(self.next_id);
        self.pending.push((self.now + delay, id));
        id
    }

    fn cancel(&mut self, id: TimerId) {
        self.pending.retain(|(_, p)| *p != id);
    }
}

/// Real timers on the tokio runtime. Fired ids arrive on the receiver
/// returned by [`TokioScheduler::new`].
#[derive(Debug)]
pub struct TokioScheduler {
    tx: mpsc::UnboundedSender<TimerId>,
    next_id: u64,
    tasks: HashMap<TimerId, JoinHandle<()>>,
}

impl TokioScheduler {
    pub fn new() -> (Self, mpsc::UnboundedReceiver<TimerId>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (
            Self {
                tx,
                next_id: 0,
                tasks: HashMap::new(),
            },
            rx,
        )
    }

    /// Timers that have neither fired nor been canceled.
    pub fn live(&self) -> usize {
        self.tasks.values().filter(|h| !h.is_finished()).count()
    }
}

impl TimerScheduler for TokioScheduler {
    fn schedule(&mut self, delay: Duration) -> TimerId {
        self.tasks.retain(|_, h| !h.is_finished());

        self.next_id += 1;
        let id = TimerId(self.next_id);
        let tx = self.tx.clone();
        let handle = tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            // Receiver gone means the session was torn down.
            let _ = tx.send(id);
        });
        self.tasks.insert(id, handle);
        id
    }

    fn cancel(&mut self, id: TimerId) {
        if let Some(h) = self.tasks.remove(&id) {
            h.abort();
        }
    }
}

impl Drop for TokioScheduler {
    fn drop(&mut self) {
        for (_, h) in self.tasks.drain() {
            h.abort();
        }
    }
}
