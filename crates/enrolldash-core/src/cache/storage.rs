//! Synchronous key/value storage backends.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use thiserror::Error;
use tracing::{debug, warn};

use crate::utils::Debouncer;

#[derive(Error, Debug)]
pub enum StorageError {
    #[error("Storage I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Storage quota exceeded: {needed} bytes needed, {capacity} allowed")]
    QuotaExceeded { needed: usize, capacity: usize },

    #[error("Storage unavailable")]
    Unavailable,
}

/// Capacity-limited string store. Callers are expected to tolerate failures.
pub trait KeyValueStorage: Send + Sync {
    fn get(&self, key: &str) -> Result<Option<String>, StorageError>;
    fn set(&self, key: &str, value: &str) -> Result<(), StorageError>;
    fn remove(&self, key: &str) -> Result<(), StorageError>;
}

// ============================================================================
// File storage
// ============================================================================

/// Stores each key as `<dir>/<key>.json`.
#[derive(Debug, Clone)]
pub struct FileStorage {
    dir: PathBuf,
    max_value_bytes: Option<usize>,
}

impl FileStorage {
    pub fn new(dir: PathBuf) -> Self {
        Self {
            dir,
            max_value_bytes: None,
        }
    }

    /// Reject values larger than `max_value_bytes`.
    pub fn with_max_value_bytes(mut self, max_value_bytes: usize) -> Self {
        self.max_value_bytes = Some(max_value_bytes);
        self
    }

    pub fn dir(&self) -> &PathBuf {
        &self.dir
    }

    fn path(&self, key: &str) -> PathBuf {
        self.dir.join(format!("{}.json", key))
    }
}

impl KeyValueStorage for FileStorage {
    fn get(&self, key: &str) -> Result<Option<String>, StorageError> {
        let path = self.path(key);
        if !path.exists() {
            return Ok(None);
        }
        Ok(Some(std::fs::read_to_string(path)?))
    }

    fn set(&self, key: &str, value: &str) -> Result<(), StorageError> {
        if let Some(capacity) = self.max_value_bytes {
            if value.len() > capacity {
                return Err(StorageError::QuotaExceeded {
                    needed: value.len(),
                    capacity,
                });
            }
        }
        std::fs::create_dir_all(&self.dir)?;
        std::fs::write(self.path(key), value)?;
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<(), StorageError> {
        match std::fs::remove_file(self.path(key)) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}

// ============================================================================
// Memory storage
// ============================================================================

/// In-process storage with an optional total byte quota (keys plus values).
#[derive(Debug, Default)]
pub struct MemoryStorage {
    entries: Mutex<HashMap<String, String>>,
    capacity_bytes: Option<usize>,
    disabled: bool,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_capacity_bytes(capacity_bytes: usize) -> Self {
        Self {
            capacity_bytes: Some(capacity_bytes),
            ..Self::default()
        }
    }

    /// Storage that fails every call, like a browser with storage turned off.
    pub fn disabled() -> Self {
        Self {
            disabled: true,
            ..Self::default()
        }
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<String, String>> {
        self.entries.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn check_enabled(&self) -> Result<(), StorageError> {
        if self.disabled {
            Err(StorageError::Unavailable)
        } else {
            Ok(())
        }
    }
}

impl KeyValueStorage for MemoryStorage {
    fn get(&self, key: &str) -> Result<Option<String>, StorageError> {
        self.check_enabled()?;
        Ok(self.lock().get(key).cloned())
    }

    fn set(&self, key: &str, value: &str) -> Result<(), StorageError> {
        self.check_enabled()?;
        let mut entries = self.lock();
        if let Some(capacity) = self.capacity_bytes {
            let used: usize = entries
                .iter()
                .filter(|(k, _)| k.as_str() != key)
                .map(|(k, v)| k.len() + v.len())
                .sum();
            let needed = used + key.len() + value.len();
            if needed > capacity {
                return Err(StorageError::QuotaExceeded { needed, capacity });
            }
        }
        entries.insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<(), StorageError> {
        self.check_enabled()?;
        self.lock().remove(key);
        Ok(())
    }
}

// ============================================================================
// Debounced storage
// ============================================================================

/// Write-coalescing decorator over another storage.
///
/// `set` only records the latest value per key and restarts a quiescence
/// timer; the backing store is written once the timer fires, on `flush`, or
/// on drop. Reads see pending values. Failed deferred writes are logged.
pub struct DebouncedStorage {
    backing: Arc<Backing>,
    debouncer: Debouncer,
}

/// Pending values plus the store they flush into.
///
/// `write_lock` is held for a whole flush and for every `remove`, so a
/// removal can never be undone by a flush that was already under way.
/// Values stay in `pending` until written, so reads always see one copy.
struct Backing {
    pending: Mutex<HashMap<String, String>>,
    write_lock: Mutex<()>,
    inner: Arc<dyn KeyValueStorage>,
}

impl Backing {
    fn write_pending(&self) {
        let _guard = self.write_lock.lock().unwrap_or_else(|e| e.into_inner());
        let snapshot: Vec<(String, String)> = self
            .pending
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .iter()
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect();

        for (key, value) in snapshot {
            match self.inner.set(&key, &value) {
                Ok(()) => debug!(key = %key, bytes = value.len(), "Flushed debounced write"),
                Err(e) => warn!(key = %key, error = %e, "Debounced write failed"),
            }
            // A newer value set during the write stays pending
            let mut pending = self.pending.lock().unwrap_or_else(|e| e.into_inner());
            if pending.get(&key) == Some(&value) {
                pending.remove(&key);
            }
        }
    }

    fn remove(&self, key: &str) -> Result<(), StorageError> {
        let _guard = self.write_lock.lock().unwrap_or_else(|e| e.into_inner());
        self.pending
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .remove(key);
        self.inner.remove(key)
    }
}

impl DebouncedStorage {
    pub fn new(inner: Arc<dyn KeyValueStorage>, delay: Duration) -> Self {
        let backing = Arc::new(Backing {
            pending: Mutex::new(HashMap::new()),
            write_lock: Mutex::new(()),
            inner,
        });

        let flush_backing = Arc::clone(&backing);
        let debouncer = Debouncer::new(delay, move || flush_backing.write_pending());

        Self { backing, debouncer }
    }

    /// Write all pending values to the backing store now.
    pub fn flush(&self) {
        self.debouncer.cancel();
        self.backing.write_pending();
    }

    pub fn has_pending(&self) -> bool {
        !self
            .backing
            .pending
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .is_empty()
    }
}

impl KeyValueStorage for DebouncedStorage {
    fn get(&self, key: &str) -> Result<Option<String>, StorageError> {
        let pending = self
            .backing
            .pending
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .get(key)
            .cloned();
        match pending {
            Some(value) => Ok(Some(value)),
            None => self.backing.inner.get(key),
        }
    }

    fn set(&self, key: &str, value: &str) -> Result<(), StorageError> {
        self.backing
            .pending
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .insert(key.to_string(), value.to_string());
        self.debouncer.trigger();
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<(), StorageError> {
        self.backing.remove(key)
    }
}

impl Drop for DebouncedStorage {
    fn drop(&mut self) {
        self.flush();
    }
}
