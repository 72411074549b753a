//! Expiry timers.
//!
//! Every armed timer is an independent tokio task, so a slow callback never
//! delays another principal's expiry. Each handle moves from `Pending` to
//! exactly one of `Fired` or `Cancelled`; the transition is a single
//! compare-and-swap, so a cancel racing a fire observes exactly one winner.

use dashmap::DashMap;
use parking_lot::Mutex;
use std::future::Future;
use std::sync::Arc;
use std::sync::atomic::{AtomicU8, AtomicU64, Ordering};
use std::time::Duration;
use tokio::task::AbortHandle;
use tracing::{debug, trace};

/// Lifecycle of a single timer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum TimerState {
    Pending = 0,
    Fired = 1,
    Cancelled = 2,
}

impl TimerState {
    fn from_u8(v: u8) -> Self {
        match v {
            1 => TimerState::Fired,
            2 => TimerState::Cancelled,
            _ => TimerState::Pending,
        }
    }
}

/// Result of [`ExpiryScheduler::cancel`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CancelOutcome {
    /// The callback will never run.
    Cancelled,
    /// The timer had already fired; its callback runs (or ran) as usual.
    AlreadyFired,
    /// The handle was cancelled earlier.
    AlreadyCancelled,
}

/// Identifier of an armed timer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TimerId(pub u64);

#[derive(Debug)]
struct TimerShared {
    state: AtomicU8,
    task: Mutex<Option<AbortHandle>>,
}

impl TimerShared {
    fn new() -> Self {
        Self {
            state: AtomicU8::new(TimerState::Pending as u8),
            task: Mutex::new(None),
        }
    }

    /// Move out of `Pending`. Returns false if another transition won.
    fn resolve(&self, to: TimerState) -> bool {
        self.state
            .compare_exchange(
                TimerState::Pending as u8,
                to as u8,
                Ordering::AcqRel,
                Ordering::Acquire,
            )
            .is_ok()
    }
}

/// Handle to an armed timer.
#[derive(Debug, Clone)]
pub struct ExpiryHandle {
    id: TimerId,
    shared: Arc<TimerShared>,
}

impl ExpiryHandle {
    pub fn state(&self) -> TimerState {
        TimerState::from_u8(self.shared.state.load(Ordering::Acquire))
    }
}

/// Arms and cancels expiry timers.
#[derive(Debug, Default)]
pub struct ExpiryScheduler {
    next_id: AtomicU64,
    pending: Arc<DashMap<TimerId, ExpiryHandle>>,
}

impl ExpiryScheduler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Schedule `on_fire` to run once, no earlier than `after` from now.
    ///
    /// Must be called from within a tokio runtime.
    pub fn arm<F, Fut>(&self, after: Duration, on_fire: F) -> ExpiryHandle
    where
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        let id = TimerId(self.next_id.fetch_add(1, Ordering::Relaxed));
        let shared = Arc::new(TimerShared::new());
        let handle = ExpiryHandle {
            id,
            shared: Arc::clone(&shared),
        };
        self.pending.insert(id, handle.clone());

        let pending = Arc::clone(&self.pending);
        let task = tokio::spawn(async move {
            tokio::time::sleep(after).await;
            if !shared.resolve(TimerState::Fired) {
                return;
            }
            pending.remove(&id);
            trace!(timer = id.0, "Expiry timer fired");
            on_fire().await;
        });
        *handle.shared.task.lock() = Some(task.abort_handle());

        debug!(timer = id.0, after_secs = after.as_secs(), "Expiry timer armed");
        handle
    }

    /// Cancel a timer. The callback is guaranteed not to run if this returns
    /// [`CancelOutcome::Cancelled`].
    pub fn cancel(&self, handle: &ExpiryHandle) -> CancelOutcome {
        if handle.shared.resolve(TimerState::Cancelled) {
            if let Some(task) = handle.shared.task.lock().take() {
                task.abort();
            }
            self.pending.remove(&handle.id);
            debug!(timer = handle.id.0, "Expiry timer cancelled");
            return CancelOutcome::Cancelled;
        }
        match handle.state() {
            TimerState::Cancelled => CancelOutcome::AlreadyCancelled,
            _ => CancelOutcome::AlreadyFired,
        }
    }

    /// Number of timers that have neither fired nor been cancelled.
    pub fn pending(&self) -> usize {
        self.pending.len()
    }

    /// Cancel every pending timer. Returns how many were cancelled.
    pub fn shutdown(&self) -> usize {
        let handles: Vec<ExpiryHandle> = self.pending.iter().map(|e| e.value().clone()).collect();
        handles
            .iter()
            .filter(|h| self.cancel(h) == CancelOutcome::Cancelled)
            .count()
    }
}
