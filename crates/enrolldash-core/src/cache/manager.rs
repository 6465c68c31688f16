use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::cache::storage::KeyValueStorage;
use crate::clock::Clock;
use crate::models::{ChartSnapshot, StatsSnapshot};

/// Storage key for the dashboard snapshot.
pub const DASHBOARD_CACHE_KEY: &str = "dashboard_cache";

/// Consider the snapshot stale after 5 minutes.
/// Long enough to make repeat visits instant, short enough that counts stay close to live.
pub const DEFAULT_CACHE_TTL_MS: i64 = 300_000;

/// One persisted dashboard snapshot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CacheEntry {
    pub cached_at_epoch_ms: i64,
    pub stats: StatsSnapshot,
    pub chart_data: ChartSnapshot,
}

impl CacheEntry {
    pub fn new(stats: StatsSnapshot, chart_data: ChartSnapshot, cached_at_epoch_ms: i64) -> Self {
        Self {
            cached_at_epoch_ms,
            stats,
            chart_data,
        }
    }

    pub fn age_ms(&self, now_ms: i64) -> i64 {
        now_ms.saturating_sub(self.cached_at_epoch_ms)
    }

    pub fn is_fresh(&self, now_ms: i64, ttl_ms: i64) -> bool {
        self.age_ms(now_ms) < ttl_ms
    }

    pub fn cached_at(&self) -> Option<DateTime<Utc>> {
        Utc.timestamp_millis_opt(self.cached_at_epoch_ms).single()
    }
}

/// TTL cache over a `KeyValueStorage`.
///
/// Never fails outward: storage and parse problems are logged and read as a
/// miss, write failures are logged and dropped. Expired entries are left in
/// place and simply overwritten by the next write.
#[derive(Clone)]
pub struct CacheStore {
    storage: Arc<dyn KeyValueStorage>,
    clock: Arc<dyn Clock>,
    key: String,
    ttl_ms: i64,
}

impl CacheStore {
    pub fn new(storage: Arc<dyn KeyValueStorage>, clock: Arc<dyn Clock>) -> Self {
        Self {
            storage,
            clock,
            key: DASHBOARD_CACHE_KEY.to_string(),
            ttl_ms: DEFAULT_CACHE_TTL_MS,
        }
    }

    pub fn with_ttl(mut self, ttl: Duration) -> Self {
        self.ttl_ms = i64::try_from(ttl.as_millis()).unwrap_or(i64::MAX);
        self
    }

    pub fn with_key(mut self, key: impl Into<String>) -> Self {
        self.key = key.into();
        self
    }

    /// Read the snapshot if present, parseable, and younger than the TTL.
    pub fn read(&self) -> Option<CacheEntry> {
        let contents = match self.storage.get(&self.key) {
            Ok(Some(contents)) => contents,
            Ok(None) => {
                debug!(key = %self.key, "Cache miss: no entry");
                return None;
            }
            Err(e) => {
                warn!(key = %self.key, error = %e, "Failed to read cache, treating as miss");
                return None;
            }
        };

        let entry: CacheEntry = match serde_json::from_str(&contents) {
            Ok(entry) => entry,
            Err(e) => {
                warn!(key = %self.key, error = %e, "Failed to parse cache entry, evicting");
                self.evict();
                return None;
            }
        };

        if entry.cached_at().is_none() {
            warn!(
                key = %self.key,
                cached_at_epoch_ms = entry.cached_at_epoch_ms,
                "Cache entry timestamp out of range, evicting"
            );
            self.evict();
            return None;
        }

        let now_ms = self.clock.now_ms();
        if !entry.is_fresh(now_ms, self.ttl_ms) {
            debug!(key = %self.key, age_ms = entry.age_ms(now_ms), "Cache miss: entry expired");
            return None;
        }

        debug!(key = %self.key, age_ms = entry.age_ms(now_ms), "Cache hit");
        Some(entry)
    }

    fn evict(&self) {
        if let Err(e) = self.storage.remove(&self.key) {
            debug!(key = %self.key, error = %e, "Failed to evict unusable cache entry");
        }
    }

    /// Persist a snapshot stamped with the current time.
    pub fn write(&self, stats: &StatsSnapshot, chart_data: &ChartSnapshot) {
        let entry = CacheEntry::new(*stats, chart_data.clone(), self.clock.now_ms());

        let contents = match serde_json::to_string(&entry) {
            Ok(contents) => contents,
            Err(e) => {
                warn!(key = %self.key, error = %e, "Failed to serialize cache entry");
                return;
            }
        };

        match self.storage.set(&self.key, &contents) {
            Ok(()) => debug!(key = %self.key, bytes = contents.len(), "Cache written"),
            Err(e) => warn!(key = %self.key, error = %e, "Failed to write cache"),
        }
    }
}

// ============================================================================
// Tests
// ============================================================================
