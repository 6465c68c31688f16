//! Refresh orchestration for the dashboard.
//!
//! `FetchCoordinator` owns the dashboard state and is the only thing that
//! mutates it. Each `refresh()` gets a generation number; starting a new
//! refresh aborts the task of the previous one and bumps the generation, and
//! a result is only applied if its generation is still current when it
//! arrives. The check and the state update happen together under the watch
//! channel's lock, so a late response can never overwrite a newer one.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio::sync::watch;
use tokio::task::{AbortHandle, JoinHandle};
use tracing::{debug, error, info, warn};

use crate::api::{ApiError, ChartsEndpoint, StatsEndpoint};
use crate::cache::CacheStore;
use crate::clock::Clock;
use crate::models::{ChartSnapshot, FetchState, StatsSnapshot};
use crate::sanitize::sanitize_charts;

/// Everything the dashboard shows, owned by the coordinator.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DashboardState {
    pub stats: StatsSnapshot,
    pub chart_data: ChartSnapshot,
    pub fetch_state: FetchState,
    pub stats_error: Option<String>,
    pub charts_error: Option<String>,
    pub last_updated: Option<DateTime<Utc>>,
    /// True once data from the cache or a successful fetch has been shown.
    pub has_data: bool,
}

/// How a single refresh ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RefreshOutcome {
    /// Fresh data was applied and written to the cache.
    Updated,
    /// A newer refresh started first; nothing was applied.
    Superseded,
    /// Fetching failed; the message is what the dashboard shows.
    Failed(String),
}

/// Handle to one in-flight refresh.
///
/// Dropping it does not cancel the refresh.
#[derive(Debug)]
pub struct RefreshHandle {
    generation: u64,
    task: JoinHandle<RefreshOutcome>,
}

impl RefreshHandle {
    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Wait for the refresh to settle. An aborted refresh reads as superseded.
    pub async fn wait(self) -> RefreshOutcome {
        match self.task.await {
            Ok(outcome) => outcome,
            Err(e) if e.is_cancelled() => RefreshOutcome::Superseded,
            Err(e) => {
                error!(error = %e, generation = self.generation, "Refresh task panicked");
                RefreshOutcome::Failed("Refresh failed unexpectedly.".to_string())
            }
        }
    }
}

/// State shared with spawned refresh tasks.
struct Shared {
    stats_endpoint: Arc<dyn StatsEndpoint>,
    charts_endpoint: Arc<dyn ChartsEndpoint>,
    cache: CacheStore,
    clock: Arc<dyn Clock>,
    state_tx: watch::Sender<DashboardState>,
    generation: AtomicU64,
}

pub struct FetchCoordinator {
    shared: Arc<Shared>,
    in_flight: Mutex<Option<AbortHandle>>,
    refresh_timeout: Option<Duration>,
}

impl FetchCoordinator {
    pub fn new(
        stats_endpoint: Arc<dyn StatsEndpoint>,
        charts_endpoint: Arc<dyn ChartsEndpoint>,
        cache: CacheStore,
        clock: Arc<dyn Clock>,
    ) -> Self {
        let (state_tx, _) = watch::channel(DashboardState::default());
        Self {
            shared: Arc::new(Shared {
                stats_endpoint,
                charts_endpoint,
                cache,
                clock,
                state_tx,
                generation: AtomicU64::new(0),
            }),
            in_flight: Mutex::new(None),
            refresh_timeout: None,
        }
    }

    /// Fail a refresh that has not settled within `timeout`.
    pub fn with_refresh_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.refresh_timeout = timeout;
        self
    }

    /// Current state.
    pub fn state(&self) -> DashboardState {
        self.shared.state_tx.borrow().clone()
    }

    /// Receiver that is notified on every applied state change.
    pub fn subscribe(&self) -> watch::Receiver<DashboardState> {
        self.shared.state_tx.subscribe()
    }

    /// Generation of the most recently started refresh (0 before the first).
    pub fn current_generation(&self) -> u64 {
        self.shared.generation.load(Ordering::SeqCst)
    }

    /// Show cached data if there is any, then revalidate.
    ///
    /// A cache hit is applied before this returns and the revalidation runs
    /// without a loading state; a miss starts a loading refresh.
    pub fn mount(&self) -> RefreshHandle {
        match self.shared.cache.read() {
            Some(entry) => {
                let cached_at = entry.cached_at();
                self.shared.state_tx.send_modify(|state| {
                    state.stats = entry.stats;
                    state.chart_data = entry.chart_data;
                    state.last_updated = cached_at;
                    state.has_data = true;
                });
                info!(cached_at = ?cached_at, "Showing cached dashboard, revalidating");
                self.refresh(false)
            }
            None => {
                info!("No usable dashboard cache, loading");
                self.refresh(true)
            }
        }
    }

    /// Start a refresh, superseding any refresh still in flight.
    ///
    /// The state goes to `Loading` when nothing has been shown yet and
    /// `show_loading_if_no_cache` is set, otherwise to `Refreshing`.
    pub fn refresh(&self, show_loading_if_no_cache: bool) -> RefreshHandle {
        let mut in_flight = self.in_flight.lock().unwrap_or_else(|e| e.into_inner());

        if let Some(previous) = in_flight.take() {
            if !previous.is_finished() {
                debug!("Superseding in-flight refresh");
            }
            previous.abort();
        }

        let generation = self.shared.generation.fetch_add(1, Ordering::SeqCst) + 1;

        self.shared.state_tx.send_modify(|state| {
            state.fetch_state = if show_loading_if_no_cache && !state.has_data {
                FetchState::Loading
            } else {
                FetchState::Refreshing
            };
        });
        debug!(generation, "Refresh started");

        let shared = Arc::clone(&self.shared);
        let timeout = self.refresh_timeout;
        let task = tokio::spawn(async move { shared.run(generation, timeout).await });
        *in_flight = Some(task.abort_handle());

        RefreshHandle { generation, task }
    }

    /// Abort the in-flight refresh and make sure its result is never applied.
    pub fn shutdown(&self) {
        let previous = self
            .in_flight
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .take();
        if let Some(previous) = previous {
            previous.abort();
        }
        self.shared.generation.fetch_add(1, Ordering::SeqCst);
        self.shared.state_tx.send_if_modified(|state| {
            if state.fetch_state.is_busy() {
                state.fetch_state = FetchState::Idle;
                true
            } else {
                false
            }
        });
        debug!("Fetch coordinator shut down");
    }
}

impl Drop for FetchCoordinator {
    fn drop(&mut self) {
        if let Some(previous) = self
            .in_flight
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .take()
        {
            previous.abort();
        }
    }
}

impl Shared {
    async fn run(&self, generation: u64, timeout: Option<Duration>) -> RefreshOutcome {
        let fetch = async {
            tokio::join!(
                self.stats_endpoint.fetch_stats(),
                self.charts_endpoint.fetch_charts(),
            )
        };

        let (stats_res, charts_res) = match timeout {
            Some(limit) => match tokio::time::timeout(limit, fetch).await {
                Ok(results) => results,
                Err(_) => {
                    warn!(generation, timeout_ms = limit.as_millis() as u64, "Refresh timed out");
                    (Err(ApiError::Timeout), Err(ApiError::Timeout))
                }
            },
            None => fetch.await,
        };

        match (stats_res, charts_res) {
            (Ok(stats), Ok(charts)) => {
                let stats = StatsSnapshot::from(stats);
                let chart_data = sanitize_charts(&charts);
                self.apply_success(generation, stats, chart_data)
            }
            (stats_res, charts_res) => {
                let stats_error = stats_res.err().map(|e| {
                    error!(error = %e, generation, "Stats fetch failed");
                    e.user_message()
                });
                let charts_error = charts_res.err().map(|e| {
                    error!(error = %e, generation, "Charts fetch failed");
                    e.user_message()
                });
                self.apply_failure(generation, stats_error, charts_error)
            }
        }
    }

    fn is_current(&self, generation: u64) -> bool {
        self.generation.load(Ordering::SeqCst) == generation
    }

    fn apply_success(
        &self,
        generation: u64,
        stats: StatsSnapshot,
        chart_data: ChartSnapshot,
    ) -> RefreshOutcome {
        let now = self.clock.now();
        let mut applied = false;

        self.state_tx.send_if_modified(|state| {
            if !self.is_current(generation) {
                return false;
            }
            self.cache.write(&stats, &chart_data);
            state.stats = stats;
            state.chart_data = chart_data;
            state.fetch_state = FetchState::Idle;
            state.stats_error = None;
            state.charts_error = None;
            state.last_updated = Some(now);
            state.has_data = true;
            applied = true;
            true
        });

        if applied {
            info!(generation, "Dashboard refreshed");
            RefreshOutcome::Updated
        } else {
            debug!(generation, "Discarding superseded refresh result");
            RefreshOutcome::Superseded
        }
    }

    fn apply_failure(
        &self,
        generation: u64,
        stats_error: Option<String>,
        charts_error: Option<String>,
    ) -> RefreshOutcome {
        let message = stats_error
            .clone()
            .or_else(|| charts_error.clone())
            .unwrap_or_else(|| "Failed to load dashboard data.".to_string());
        let mut applied = false;

        self.state_tx.send_if_modified(|state| {
            if !self.is_current(generation) {
                return false;
            }
            if !state.has_data {
                state.stats = StatsSnapshot::default();
                state.chart_data = ChartSnapshot::default();
            }
            state.fetch_state = FetchState::Error;
            state.stats_error = stats_error;
            state.charts_error = charts_error;
            applied = true;
            true
        });

        if applied {
            RefreshOutcome::Failed(message)
        } else {
            debug!(generation, "Discarding superseded refresh failure");
            RefreshOutcome::Superseded
        }
    }
}
