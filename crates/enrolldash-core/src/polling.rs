//! Interval-driven refresh.
//!
//! `PollingScheduler` calls `FetchCoordinator::refresh(false)` on a fixed
//! interval from a background task. It only holds a weak reference to the
//! coordinator, so it never keeps a torn-down dashboard alive.

use std::sync::{Arc, Weak};
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info};

use crate::coordinator::FetchCoordinator;

/// Reports whether the dashboard is currently on screen.
pub trait ViewportObserver: Send + Sync {
    fn is_visible(&self) -> bool;
}

pub struct PollingScheduler {
    coordinator: Weak<FetchCoordinator>,
    visibility: Option<Arc<dyn ViewportObserver>>,
    shutdown_tx: Option<mpsc::Sender<()>>,
    task: Option<JoinHandle<()>>,
}

impl PollingScheduler {
    pub fn new(coordinator: &Arc<FetchCoordinator>) -> Self {
        Self {
            coordinator: Arc::downgrade(coordinator),
            visibility: None,
            shutdown_tx: None,
            task: None,
        }
    }

    /// Skip ticks while `observer` reports the dashboard hidden.
    /// Without an observer, polling runs regardless of visibility.
    pub fn with_visibility(mut self, observer: Arc<dyn ViewportObserver>) -> Self {
        self.visibility = Some(observer);
        self
    }

    /// Start polling every `interval`, replacing any running schedule.
    ///
    /// A zero interval disables polling and returns false. The first refresh
    /// happens one interval after start; mounting has already fetched.
    pub fn start(&mut self, interval: Duration) -> bool {
        self.stop();

        if interval.is_zero() {
            info!("Polling disabled, refresh is manual only");
            return false;
        }

        let (shutdown_tx, mut shutdown_rx) = mpsc::channel::<()>(1);
        let coordinator = self.coordinator.clone();
        let visibility = self.visibility.clone();

        let task = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            // Skip the first tick (immediate)
            ticker.tick().await;

            loop {
                tokio::select! {
                    biased;
                    _ = shutdown_rx.recv() => {
                        break;
                    }
                    _ = ticker.tick() => {
                        if let Some(observer) = &visibility {
                            if !observer.is_visible() {
                                debug!("Dashboard hidden, skipping poll");
                                continue;
                            }
                        }
                        let Some(coordinator) = coordinator.upgrade() else {
                            debug!("Coordinator dropped, stopping poll loop");
                            break;
                        };
                        debug!("Polling refresh");
                        // The coordinator tracks the task; the handle is not needed
                        let _ = coordinator.refresh(false);
                    }
                }
            }
        });

        info!(interval_ms = interval.as_millis() as u64, "Polling started");
        self.shutdown_tx = Some(shutdown_tx);
        self.task = Some(task);
        true
    }

    /// Stop polling. Safe to call when not running.
    pub fn stop(&mut self) {
        if let Some(tx) = self.shutdown_tx.take() {
            let _ = tx.try_send(());
        }
        if let Some(task) = self.task.take() {
            task.abort();
            debug!("Polling stopped");
        }
    }

    pub fn is_running(&self) -> bool {
        self.task.as_ref().is_some_and(|task| !task.is_finished())
    }
}

impl Drop for PollingScheduler {
    fn drop(&mut self) {
        self.stop();
    }
}
