//! Storage adapter — persistent key-value backend with in-memory fallback.
//!
//! DESIGN
//! ======
//! The adapter never surfaces a failure as an operation error. When the
//! persistent backend is missing or fails at runtime, reads and writes fall
//! through to an in-memory map owned by the adapter instance, the failure
//! is logged, and mutating operations report a [`StoreOutcome`] so callers
//! can notify an observer. Quota exhaustion keeps a distinct error variant
//! so it can be special-cased.
//!
//! ERROR HANDLING
//! ==============
//! The fallback map absorbs every degraded operation, so a session keeps
//! its state even when the disk rejects every write. The map is scoped to
//! one adapter instance and is never shared across instances.

use std::collections::HashMap;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use async_trait::async_trait;
use tracing::warn;

/// File written and removed at construction to probe a root for writability.
const PROBE_FILE: &str = ".formstash-probe";

// =============================================================================
// ERRORS AND OUTCOMES
// =============================================================================

/// Failure raised by a persistent [`StorageBackend`].
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    /// The backend ran out of space or hit a quota limit.
    #[error("storage quota exhausted: {0}")]
    QuotaExceeded(#[source] io::Error),
    /// Any other backend I/O failure.
    #[error("storage backend failed: {0}")]
    Io(#[from] io::Error),
}

impl StorageError {
    fn from_io(error: io::Error) -> Self {
        match error.kind() {
            io::ErrorKind::StorageFull | io::ErrorKind::QuotaExceeded => {
                Self::QuotaExceeded(error)
            }
            _ => Self::Io(error),
        }
    }

    /// Whether this failure is quota exhaustion rather than a general fault.
    #[must_use]
    pub fn is_quota(&self) -> bool {
        matches!(self, Self::QuotaExceeded(_))
    }
}

/// Result of a mutating adapter operation. Never an error from the caller's
/// point of view: a degraded operation still completed against the fallback
/// map.
#[derive(Debug)]
pub enum StoreOutcome {
    /// The persistent backend accepted the operation.
    Persisted,
    /// No persistent backend is attached; only the in-memory map changed.
    MemoryOnly,
    /// The persistent backend failed; the in-memory map absorbed the
    /// operation and the failure is carried here.
    FellBack(StorageError),
}

impl StoreOutcome {
    /// The failure carried by a degraded operation, if any.
    #[must_use]
    pub fn failure(&self) -> Option<&StorageError> {
        match self {
            Self::FellBack(error) => Some(error),
            Self::Persisted | Self::MemoryOnly => None,
        }
    }
}

// =============================================================================
// BACKEND TRAIT + DISK IMPLEMENTATION
// =============================================================================

/// A persistent key-value backend.
#[async_trait]
pub trait StorageBackend: Send + Sync {
    /// Read the stored string for `key`, or `None` when absent.
    async fn get(&self, key: &str) -> Result<Option<String>, StorageError>;

    /// Store `value` under `key`, replacing any previous value.
    async fn set(&self, key: &str, value: &str) -> Result<(), StorageError>;

    /// Delete `key`. Deleting an absent key is not an error.
    async fn remove(&self, key: &str) -> Result<(), StorageError>;
}

/// Disk-backed [`StorageBackend`]: one file per key inside a root directory.
#[derive(Debug)]
pub struct DiskBackend {
    root: PathBuf,
}

impl DiskBackend {
    /// Open `root`, creating it if needed, and probe it for writability.
    ///
    /// # Errors
    /// Fails when the directory cannot be created or written to.
    pub fn open(root: impl Into<PathBuf>) -> Result<Self, StorageError> {
        let root = root.into();
        std::fs::create_dir_all(&root).map_err(StorageError::from_io)?;
        let probe = root.join(PROBE_FILE);
        std::fs::write(&probe, b"probe").map_err(StorageError::from_io)?;
        std::fs::remove_file(&probe).map_err(StorageError::from_io)?;
        Ok(Self { root })
    }

    fn key_path(&self, key: &str) -> PathBuf {
        self.root.join(encode_key(key))
    }
}

#[async_trait]
impl StorageBackend for DiskBackend {
    async fn get(&self, key: &str) -> Result<Option<String>, StorageError> {
        match tokio::fs::read_to_string(self.key_path(key)).await {
            Ok(raw) => Ok(Some(raw)),
            Err(error) if error.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(error) => Err(StorageError::from_io(error)),
        }
    }

    async fn set(&self, key: &str, value: &str) -> Result<(), StorageError> {
        tokio::fs::write(self.key_path(key), value)
            .await
            .map_err(StorageError::from_io)
    }

    async fn remove(&self, key: &str) -> Result<(), StorageError> {
        match tokio::fs::remove_file(self.key_path(key)).await {
            Ok(()) => Ok(()),
            Err(error) if error.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(error) => Err(StorageError::from_io(error)),
        }
    }
}

/// Escape a storage key into a filesystem-safe file name. Bytes outside
/// `[A-Za-z0-9._-]` are percent-encoded, so distinct keys never collide.
fn encode_key(key: &str) -> String {
    let mut name = String::with_capacity(key.len() + 8);
    for byte in key.bytes() {
        match byte {
            b'a'..=b'z' | b'A'..=b'Z' | b'0'..=b'9' | b'.' | b'_' | b'-' => {
                name.push(byte as char);
            }
            other => name.push_str(&format!("%{other:02X}")),
        }
    }
    name.push_str(".json");
    name
}

// =============================================================================
// ADAPTER
// =============================================================================

/// Adapter in front of an optional persistent backend, degrading to an
/// instance-scoped in-memory map when the backend is absent or failing.
pub struct StorageAdapter {
    backend: Option<Box<dyn StorageBackend>>,
    fallback: Mutex<HashMap<String, String>>,
}

impl StorageAdapter {
    /// Adapter over a disk directory, degrading to memory-only when the
    /// directory cannot be opened or probed.
    #[must_use]
    pub fn detect(root: impl AsRef<Path>) -> Self {
        match DiskBackend::open(root.as_ref()) {
            Ok(backend) => Self::with_backend(Box::new(backend)),
            Err(error) => {
                warn!(
                    root = %root.as_ref().display(),
                    error = %error,
                    "persistent storage unavailable; using in-memory fallback"
                );
                Self::memory()
            }
        }
    }

    /// Adapter over an explicit backend.
    #[must_use]
    pub fn with_backend(backend: Box<dyn StorageBackend>) -> Self {
        Self {
            backend: Some(backend),
            fallback: Mutex::new(HashMap::new()),
        }
    }

    /// Memory-only adapter. State lives for the adapter's lifetime only.
    #[must_use]
    pub fn memory() -> Self {
        Self {
            backend: None,
            fallback: Mutex::new(HashMap::new()),
        }
    }

    /// Whether a persistent backend is attached.
    #[must_use]
    pub fn is_persistent(&self) -> bool {
        self.backend.is_some()
    }

    /// Read `key`, serving the in-memory fallback on backend failure.
    pub async fn get(&self, key: &str) -> Option<String> {
        let Some(backend) = &self.backend else {
            return self.fallback_get(key);
        };
        match backend.get(key).await {
            Ok(found) => found,
            Err(error) => {
                warn!(key, error = %error, "storage read failed; serving in-memory fallback");
                self.fallback_get(key)
            }
        }
    }

    /// Write `key`. The in-memory map absorbs the value when the backend
    /// fails, so the session still observes it through [`Self::get`].
    pub async fn set(&self, key: &str, value: &str) -> StoreOutcome {
        let Some(backend) = &self.backend else {
            self.fallback_set(key, value);
            return StoreOutcome::MemoryOnly;
        };
        match backend.set(key, value).await {
            Ok(()) => StoreOutcome::Persisted,
            Err(error) => {
                if error.is_quota() {
                    warn!(key, error = %error, "storage quota exceeded; keeping value in memory only");
                } else {
                    warn!(key, error = %error, "storage write failed; keeping value in memory only");
                }
                self.fallback_set(key, value);
                StoreOutcome::FellBack(error)
            }
        }
    }

    /// Remove `key` from the backend and the in-memory map.
    pub async fn remove(&self, key: &str) -> StoreOutcome {
        self.fallback_remove(key);
        let Some(backend) = &self.backend else {
            return StoreOutcome::MemoryOnly;
        };
        match backend.remove(key).await {
            Ok(()) => StoreOutcome::Persisted,
            Err(error) => {
                warn!(key, error = %error, "storage remove failed");
                StoreOutcome::FellBack(error)
            }
        }
    }

    fn fallback_get(&self, key: &str) -> Option<String> {
        self.fallback
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .get(key)
            .cloned()
    }

    fn fallback_set(&self, key: &str, value: &str) {
        self.fallback
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .insert(key.to_owned(), value.to_owned());
    }

    fn fallback_remove(&self, key: &str) {
        self.fallback
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .remove(key);
    }
}

// =============================================================================
// TEST SUPPORT
// =============================================================================

#[cfg(test)]
pub(crate) mod test_support {
    use std::sync::Arc;

    use super::*;

    #[derive(Default)]
    struct RecordingInner {
        store: HashMap<String, String>,
        sets: Vec<(String, String)>,
        removes: usize,
        fail_kind: Option<io::ErrorKind>,
    }

    /// Backend double that records writes and can be told to fail every
    /// operation with a given I/O error kind.
    #[derive(Clone, Default)]
    pub(crate) struct RecordingBackend {
        inner: Arc<Mutex<RecordingInner>>,
    }

    impl RecordingBackend {
        pub(crate) fn new() -> Self {
            Self::default()
        }

        pub(crate) fn preload(&self, key: &str, value: &str) {
            self.lock().store.insert(key.to_owned(), value.to_owned());
        }

        pub(crate) fn fail_all(&self, kind: io::ErrorKind) {
            self.lock().fail_kind = Some(kind);
        }

        pub(crate) fn set_count(&self) -> usize {
            self.lock().sets.len()
        }

        pub(crate) fn remove_count(&self) -> usize {
            self.lock().removes
        }

        pub(crate) fn last_set(&self) -> Option<(String, String)> {
            self.lock().sets.last().cloned()
        }

        pub(crate) fn stored(&self, key: &str) -> Option<String> {
            self.lock().store.get(key).cloned()
        }

        fn lock(&self) -> std::sync::MutexGuard<'_, RecordingInner> {
            self.inner
                .lock()
                .unwrap_or_else(std::sync::PoisonError::into_inner)
        }

        fn injected_failure(&self) -> Option<StorageError> {
            self.lock()
                .fail_kind
                .map(|kind| StorageError::from_io(io::Error::new(kind, "injected failure")))
        }
    }

    #[async_trait]
    impl StorageBackend for RecordingBackend {
        async fn get(&self, key: &str) -> Result<Option<String>, StorageError> {
            if let Some(error) = self.injected_failure() {
                return Err(error);
            }
            Ok(self.lock().store.get(key).cloned())
        }

        async fn set(&self, key: &str, value: &str) -> Result<(), StorageError> {
            if let Some(error) = self.injected_failure() {
                return Err(error);
            }
            let mut inner = self.lock();
            inner.sets.push((key.to_owned(), value.to_owned()));
            inner.store.insert(key.to_owned(), value.to_owned());
            Ok(())
        }

        async fn remove(&self, key: &str) -> Result<(), StorageError> {
            if let Some(error) = self.injected_failure() {
                return Err(error);
            }
            let mut inner = self.lock();
            inner.removes += 1;
            inner.store.remove(key);
            Ok(())
        }
    }
}

#[cfg(test)]
#[path = "storage_test.rs"]
mod tests;
