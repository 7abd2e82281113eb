//! Durable single-slot result storage.
//!
//! A session's final tool result is written here the moment it is
//! extracted, before the invocation is acknowledged, so a crash or
//! disconnect between extraction and display cannot lose it. The store is
//! a single slot with last-write-wins semantics; the one read at session
//! start clears it.

use std::fs;
use std::path::{Path, PathBuf};

use parking_lot::Mutex;
use serde_json::Value;
use thiserror::Error;

/// Errors from the durable store.
#[derive(Debug, Error)]
pub enum StoreError {
    /// Filesystem failure
    #[error("Store I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The result could not be serialized
    #[error("Store serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Abstract durable single-slot store for the last extracted tool result.
///
/// `save` must be synchronous and durable before it returns.
/// `load_and_clear` is expected to be called once at session start; a
/// corrupt slot is discarded, never propagated.
pub trait ResultStore: Send + Sync {
    /// Overwrite the slot with `result`.
    fn save(&self, result: &Value) -> Result<(), StoreError>;

    /// Take the slot contents, leaving it empty. Returns `None` when the
    /// slot is empty or holds unparseable data.
    fn load_and_clear(&self) -> Option<Value>;
}

// =============================================================================
// File-backed store
// =============================================================================

/// File-backed [`ResultStore`].
///
/// Writes go to a sibling temp file first and are renamed into place, so
/// the slot is never observable half-written.
pub struct FileResultStore {
    path: PathBuf,
}

impl FileResultStore {
    /// Create a store at `path`, creating parent directories as needed.
    pub fn new(path: impl Into<PathBuf>) -> Result<Self, StoreError> {
        let path = path.into();
        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
        {
            fs::create_dir_all(parent)?;
        }
        Ok(Self { path })
    }

    /// The slot path.
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn tmp_path(&self) -> PathBuf {
        let mut os = self.path.as_os_str().to_owned();
        os.push(".tmp");
        PathBuf::from(os)
    }
}

impl ResultStore for FileResultStore {
    fn save(&self, result: &Value) -> Result<(), StoreError> {
        let bytes = serde_json::to_vec(result)?;
        let tmp = self.tmp_path();
        fs::write(&tmp, &bytes)?;
        fs::rename(&tmp, &self.path)?;
        tracing::debug!(path = %self.path.display(), "Persisted tool result");
        Ok(())
    }

    fn load_and_clear(&self) -> Option<Value> {
        let raw = match fs::read(&self.path) {
            Ok(raw) => raw,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return None,
            Err(e) => {
                tracing::warn!(path = %self.path.display(), "Failed to read result slot: {}", e);
                return None;
            }
        };

        // Clear the slot regardless of whether the contents parse; a corrupt
        // entry must not survive to poison the next recovery.
        if let Err(e) = fs::remove_file(&self.path) {
            tracing::warn!(path = %self.path.display(), "Failed to clear result slot: {}", e);
        }

        match serde_json::from_slice(&raw) {
            Ok(value) => Some(value),
            Err(e) => {
                tracing::warn!("Discarding corrupt persisted result: {}", e);
                None
            }
        }
    }
}

// =============================================================================
// In-memory store
// =============================================================================

/// In-memory [`ResultStore`] for tests and ephemeral deployments.
///
/// Stores the serialized form so corrupt-slot behavior can be exercised
/// the same way as with the file store.
#[derive(Default)]
pub struct MemoryResultStore {
    slot: Mutex<Option<String>>,
}

impl MemoryResultStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the raw slot contents. Test hook for corrupt data.
    pub fn set_raw(&self, raw: impl Into<String>) {
        *self.slot.lock() = Some(raw.into());
    }
}

impl ResultStore for MemoryResultStore {
    fn save(&self, result: &Value) -> Result<(), StoreError> {
        let raw = serde_json::to_string(result)?;
        *self.slot.lock() = Some(raw);
        Ok(())
    }

    fn load_and_clear(&self) -> Option<Value> {
        let raw = self.slot.lock().take()?;
        match serde_json::from_str(&raw) {
            Ok(value) => Some(value),
            Err(e) => {
                tracing::warn!("Discarding corrupt persisted result: {}", e);
                None
            }
        }
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn sample_result() -> Value {
        json!({
            "text": "Solid fundamentals.",
            "score": 80,
            "strengths": ["clear communication"],
        })
    }

    #[test]
    fn test_file_store_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileResultStore::new(dir.path().join("last_feedback.json")).unwrap();

        store.save(&sample_result()).unwrap();
        assert_eq!(store.load_and_clear(), Some(sample_result()));
    }

    #[test]
    fn test_load_and_clear_is_one_shot() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileResultStore::new(dir.path().join("slot.json")).unwrap();

        store.save(&sample_result()).unwrap();
        assert!(store.load_and_clear().is_some());
        assert!(store.load_and_clear().is_none());
    }

    #[test]
    fn test_crash_recovery_from_fresh_instance() {
        // save() then drop everything; an independent instance on the same
        // path must still recover the result.
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("slot.json");

        {
            let store = FileResultStore::new(&path).unwrap();
            store.save(&sample_result()).unwrap();
        }

        let recovered = FileResultStore::new(&path).unwrap();
        assert_eq!(recovered.load_and_clear(), Some(sample_result()));
    }

    #[test]
    fn test_corrupt_slot_discarded() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("slot.json");
        fs::write(&path, b"{ not json").unwrap();

        let store = FileResultStore::new(&path).unwrap();
        assert!(store.load_and_clear().is_none());
        // The corrupt entry is gone, not resurfaced on the next read.
        assert!(store.load_and_clear().is_none());
        assert!(!path.exists());
    }

    #[test]
    fn test_last_write_wins() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileResultStore::new(dir.path().join("slot.json")).unwrap();

        store.save(&json!({"score": 10})).unwrap();
        store.save(&json!({"score": 90})).unwrap();
        assert_eq!(store.load_and_clear(), Some(json!({"score": 90})));
    }

    #[test]
    fn test_creates_parent_directories() {
        let dir = tempfile::tempdir().unwrap();
        let nested = dir.path().join("state").join("results").join("slot.json");
        let store = FileResultStore::new(&nested).unwrap();
        store.save(&sample_result()).unwrap();
        assert!(nested.exists());
    }

    #[test]
    fn test_memory_store_round_trip() {
        let store = MemoryResultStore::new();
        store.save(&sample_result()).unwrap();
        assert_eq!(store.load_and_clear(), Some(sample_result()));
        assert!(store.load_and_clear().is_none());
    }

    #[test]
    fn test_memory_store_corrupt_slot() {
        let store = MemoryResultStore::new();
        store.set_raw("###");
        assert!(store.load_and_clear().is_none());
        assert!(store.load_and_clear().is_none());
    }
}
