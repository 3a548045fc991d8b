//! Debounce and throttle primitives for write coalescing.
//!
//! DESIGN
//! ======
//! [`Debouncer`] owns at most one pending timer task. Every call aborts the
//! previous timer and re-arms with the newest payload, so the action fires
//! once per quiet period with the last value it was given. A zero wait
//! still goes through a spawned task rather than running inline, preserving
//! ordering relative to other scheduled work.
//!
//! [`Throttle`] is the leading-edge companion: it runs its action
//! immediately when enough time has passed since the last run and drops the
//! call otherwise. It is not used by the persistence controller.

use std::sync::Arc;
use std::time::{Duration, Instant};

use futures::future::BoxFuture;
use tokio::task::JoinHandle;

/// Async action driven by a [`Debouncer`], receiving the latest payload.
pub type DebouncedAction<T> = Arc<dyn Fn(T) -> BoxFuture<'static, ()> + Send + Sync>;

/// Trailing-edge debouncer: the action runs once `wait` elapses with no
/// further calls, with the most recent payload.
///
/// Dropping the debouncer cancels a pending timer. Once the quiet period
/// has elapsed the action is committed: it runs on a detached task, so
/// cancellation only applies before the timer fires.
pub struct Debouncer<T> {
    wait: Duration,
    action: DebouncedAction<T>,
    pending: Option<JoinHandle<()>>,
}

impl<T: Send + 'static> Debouncer<T> {
    /// Build a debouncer around `action`. Calls require a Tokio runtime.
    pub fn new<F>(wait: Duration, action: F) -> Self
    where
        F: Fn(T) -> BoxFuture<'static, ()> + Send + Sync + 'static,
    {
        Self {
            wait,
            action: Arc::new(action),
            pending: None,
        }
    }

    /// Schedule `payload`, replacing any pending timer.
    pub fn call(&mut self, payload: T) {
        self.cancel();
        let action = Arc::clone(&self.action);
        let wait = self.wait;
        self.pending = Some(tokio::spawn(async move {
            tokio::time::sleep(wait).await;
            // Detached: cancellation only applies before the quiet period
            // elapses, never mid-action.
            tokio::spawn(action(payload));
        }));
    }
}

impl<T> Debouncer<T> {
    /// Drop the pending timer, if any, without running the action.
    pub fn cancel(&mut self) {
        if let Some(pending) = self.pending.take() {
            pending.abort();
        }
    }

    /// Whether a timer is armed and has not yet fired.
    #[must_use]
    pub fn is_pending(&self) -> bool {
        self.pending
            .as_ref()
            .is_some_and(|handle| !handle.is_finished())
    }
}

impl<T> Drop for Debouncer<T> {
    fn drop(&mut self) {
        self.cancel();
    }
}

/// Fixed-rate gate: runs its action immediately if at least `interval` has
/// passed since the last run, otherwise drops the call outright.
pub struct Throttle<T> {
    interval: Duration,
    last_fire: Option<Instant>,
    action: Box<dyn FnMut(T) + Send>,
}

impl<T> Throttle<T> {
    /// Build a throttle around `action`.
    pub fn new<F>(interval: Duration, action: F) -> Self
    where
        F: FnMut(T) + Send + 'static,
    {
        Self {
            interval,
            last_fire: None,
            action: Box::new(action),
        }
    }

    /// Run the action with `payload` if the gate is open; reports whether
    /// the action ran.
    pub fn call(&mut self, payload: T) -> bool {
        let now = Instant::now();
        let open = self
            .last_fire
            .is_none_or(|last| now.duration_since(last) >= self.interval);
        if open {
            self.last_fire = Some(now);
            (self.action)(payload);
        }
        open
    }
}

#[cfg(test)]
#[path = "debounce_test.rs"]
mod tests;
