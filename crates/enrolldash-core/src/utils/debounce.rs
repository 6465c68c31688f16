//! Timer-reset primitive.
//!
//! `Debouncer` collapses a burst of `trigger()` calls into a single run of its
//! action, fired once no trigger has arrived for `delay`. Each trigger resets
//! the timer.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::task::JoinHandle;
use tracing::debug;

type Action = Arc<dyn Fn() + Send + Sync>;

/// A scheduled run. Whoever clears `armed` first owns the action.
struct Pending {
    armed: Arc<AtomicBool>,
    handle: JoinHandle<()>,
}

impl Pending {
    /// Disarm and stop the timer. Returns true if the action had not been
    /// claimed yet.
    fn disarm(self) -> bool {
        let claimed = self.armed.swap(false, Ordering::SeqCst);
        self.handle.abort();
        claimed
    }
}

pub struct Debouncer {
    delay: Duration,
    action: Action,
    pending: Mutex<Option<Pending>>,
}

impl Debouncer {
    pub fn new<F>(delay: Duration, action: F) -> Self
    where
        F: Fn() + Send + Sync + 'static,
    {
        Self {
            delay,
            action: Arc::new(action),
            pending: Mutex::new(None),
        }
    }

    /// Schedule the action, restarting the quiescence timer.
    ///
    /// Outside a tokio runtime there is nothing to drive the timer, so the
    /// action runs immediately.
    pub fn trigger(&self) {
        let mut pending = self.pending.lock().unwrap_or_else(|e| e.into_inner());
        if let Some(previous) = pending.take() {
            previous.disarm();
        }

        let runtime = match tokio::runtime::Handle::try_current() {
            Ok(handle) => handle,
            Err(_) => {
                debug!("No runtime for debounce timer, running action now");
                drop(pending);
                (self.action)();
                return;
            }
        };

        let armed = Arc::new(AtomicBool::new(true));
        let timer_armed = Arc::clone(&armed);
        let action = Arc::clone(&self.action);
        let delay = self.delay;
        let handle = runtime.spawn(async move {
            tokio::time::sleep(delay).await;
            if timer_armed.swap(false, Ordering::SeqCst) {
                action();
            }
        });
        *pending = Some(Pending { armed, handle });
    }

    /// Run a pending action now instead of waiting for the timer.
    /// Does nothing if no action is pending or the timer already claimed it.
    pub fn flush(&self) {
        let pending = self
            .pending
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .take();
        if pending.is_some_and(Pending::disarm) {
            (self.action)();
        }
    }

    /// Drop a pending action without running it.
    pub fn cancel(&self) {
        if let Some(pending) = self
            .pending
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .take()
        {
            pending.disarm();
        }
    }

    pub fn is_pending(&self) -> bool {
        self.pending
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .as_ref()
            .is_some_and(|pending| pending.armed.load(Ordering::SeqCst))
    }
}

impl Drop for Debouncer {
    fn drop(&mut self) {
        self.cancel();
    }
}
