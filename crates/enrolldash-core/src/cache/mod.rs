//! Local caching of the dashboard snapshot.
//!
//! `CacheStore` keeps one timestamped snapshot under a fixed key and treats
//! anything older than the TTL (5 minutes by default) as a miss. Storage is an
//! injected `KeyValueStorage`:
//!
//! - `FileStorage`: one JSON file per key in the cache directory
//! - `MemoryStorage`: in-process map with an optional byte quota
//! - `DebouncedStorage`: coalesces bursts of writes into one after a quiet period

pub mod manager;
pub mod storage;

pub use manager::{CacheEntry, CacheStore, DASHBOARD_CACHE_KEY, DEFAULT_CACHE_TTL_MS};
pub use storage::{DebouncedStorage, FileStorage, KeyValueStorage, MemoryStorage, StorageError};
