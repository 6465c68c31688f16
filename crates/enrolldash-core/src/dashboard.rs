//! Presentation-facing glue.
//!
//! `Dashboard` wires a `FetchCoordinator` and a `PollingScheduler` together,
//! performs the mount sequence, and exposes the read-only `DashboardView`.
//! Tearing it down (or dropping it) aborts the in-flight request and stops
//! polling.

use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::sync::watch;
use tracing::info;

use crate::api::ApiClient;
use crate::cache::{CacheStore, DebouncedStorage, KeyValueStorage};
use crate::clock::{Clock, SystemClock};
use crate::config::Config;
use crate::coordinator::{DashboardState, FetchCoordinator, RefreshHandle};
use crate::models::{ChartSnapshot, StatsSnapshot};
use crate::polling::{PollingScheduler, ViewportObserver};
use crate::utils::age_display;

/// What the dashboard renders. Errors are empty strings when clear.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
#[cfg_attr(feature = "ts", derive(ts_rs::TS), ts(export))]
pub struct DashboardView {
    pub stats: StatsSnapshot,
    pub chart_data: ChartSnapshot,
    pub loading: bool,
    pub refreshing: bool,
    pub stats_error: String,
    pub charts_error: String,
    #[cfg_attr(feature = "ts", ts(type = "string | null"))]
    pub last_updated: Option<DateTime<Utc>>,
}

impl From<&DashboardState> for DashboardView {
    fn from(state: &DashboardState) -> Self {
        Self {
            stats: state.stats,
            chart_data: state.chart_data.clone(),
            loading: state.fetch_state.is_loading(),
            refreshing: state.fetch_state.is_refreshing(),
            stats_error: state.stats_error.clone().unwrap_or_default(),
            charts_error: state.charts_error.clone().unwrap_or_default(),
            last_updated: state.last_updated,
        }
    }
}

impl DashboardView {
    pub fn has_error(&self) -> bool {
        !self.stats_error.is_empty() || !self.charts_error.is_empty()
    }

    /// Freshness label such as "just now" or "5m ago".
    pub fn last_updated_display(&self, now: DateTime<Utc>) -> String {
        match self.last_updated {
            Some(at) => age_display((now - at).num_minutes()),
            None => "never".to_string(),
        }
    }
}

pub struct Dashboard {
    coordinator: Arc<FetchCoordinator>,
    poller: PollingScheduler,
}

impl Dashboard {
    /// Mount: show cached data, start revalidating, and start polling if
    /// `poll_interval` is non-zero.
    ///
    /// Returns the dashboard and the handle of the initial refresh.
    pub fn mount(
        coordinator: FetchCoordinator,
        poll_interval: Duration,
        visibility: Option<Arc<dyn ViewportObserver>>,
    ) -> (Self, RefreshHandle) {
        let coordinator = Arc::new(coordinator);
        let initial = coordinator.mount();

        let mut poller = PollingScheduler::new(&coordinator);
        if let Some(observer) = visibility {
            poller = poller.with_visibility(observer);
        }
        poller.start(poll_interval);

        (
            Self {
                coordinator,
                poller,
            },
            initial,
        )
    }

    /// Build the full stack from configuration: HTTP client, system clock,
    /// TTL cache over `storage` (debounced if configured), then mount.
    pub fn from_config(
        config: &Config,
        storage: Arc<dyn KeyValueStorage>,
        visibility: Option<Arc<dyn ViewportObserver>>,
    ) -> Result<(Self, RefreshHandle)> {
        let api = Arc::new(
            ApiClient::new(&config.api_base_url, config.request_timeout())
                .context("Failed to create API client")?,
        );
        let clock: Arc<dyn Clock> = Arc::new(SystemClock);

        let storage: Arc<dyn KeyValueStorage> = match config.cache_write_debounce() {
            Some(delay) => Arc::new(DebouncedStorage::new(storage, delay)),
            None => storage,
        };
        let cache = CacheStore::new(storage, Arc::clone(&clock)).with_ttl(config.cache_ttl());

        let coordinator = FetchCoordinator::new(api.clone(), api, cache, clock)
            .with_refresh_timeout(config.refresh_timeout());

        let visibility = if config.pause_when_hidden { visibility } else { None };

        info!(api = %config.api_base_url, poll_secs = config.poll_interval_secs, "Mounting dashboard");
        Ok(Self::mount(coordinator, config.poll_interval(), visibility))
    }

    pub fn view(&self) -> DashboardView {
        DashboardView::from(&self.coordinator.state())
    }

    pub fn state(&self) -> DashboardState {
        self.coordinator.state()
    }

    pub fn subscribe(&self) -> watch::Receiver<DashboardState> {
        self.coordinator.subscribe()
    }

    /// Manual refresh. Shows the loading state only if nothing is on screen.
    pub fn refresh(&self) -> RefreshHandle {
        self.coordinator.refresh(true)
    }

    pub fn is_polling(&self) -> bool {
        self.poller.is_running()
    }

    /// Stop polling and abort the in-flight request.
    pub fn teardown(&mut self) {
        self.poller.stop();
        self.coordinator.shutdown();
        info!("Dashboard torn down");
    }
}

impl Drop for Dashboard {
    fn drop(&mut self) {
        self.poller.stop();
        self.coordinator.shutdown();
    }
}
