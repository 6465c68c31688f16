//! Core library for enrolldash.
//!
//! This crate holds the data freshness layer behind the enrollment dashboard:
//!
//! - `api`: HTTP transport and the endpoint traits the coordinator consumes
//! - `cache`: TTL cache store over an injected key/value storage
//! - `sanitize`: normalization of untrusted chart records
//! - `coordinator`: refresh orchestration with supersession of stale fetches
//! - `polling`: optional interval-driven refresh
//! - `dashboard`: mount/teardown glue and the read-only view exposed outward

pub mod api;
pub mod cache;
pub mod clock;
pub mod config;
pub mod coordinator;
pub mod dashboard;
pub mod models;
pub mod polling;
pub mod sanitize;
pub mod utils;

pub use api::{ApiClient, ApiError, ChartsEndpoint, StatsEndpoint};
pub use cache::{CacheEntry, CacheStore, DebouncedStorage, FileStorage, KeyValueStorage, MemoryStorage, StorageError};
pub use clock::{Clock, ManualClock, SystemClock};
pub use config::Config;
pub use coordinator::{DashboardState, FetchCoordinator, RefreshHandle, RefreshOutcome};
pub use dashboard::{Dashboard, DashboardView};
pub use models::{ChartKind, ChartRecord, ChartSnapshot, ChartsResponse, FetchState, StatsResponse, StatsSnapshot};
pub use polling::{PollingScheduler, ViewportObserver};
pub use sanitize::{sanitize, sanitize_charts};
