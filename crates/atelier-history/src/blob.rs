use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::{Mutex, PoisonError};

use tracing::warn;

/// Trait for single-slot JSON persistence.
///
/// Each key holds one JSON-encoded string. The trait is synchronous and
/// infallible by contract: a missing or unreadable slot reads as absent,
/// and write failures are logged rather than surfaced, since the history
/// log is a convenience, not a durability guarantee.
pub trait BlobStore: Send + Sync {
  /// Read the blob stored under `key`, if any.
  fn get(&self, key: &str) -> Option<String>;

  /// Replace the blob stored under `key`.
  fn set(&self, key: &str, value: String);
}

/// File-backed blob store: one `<key>.json` file per key under a directory.
#[derive(Debug)]
pub struct FsBlobStore {
  dir: PathBuf,
}

impl FsBlobStore {
  pub fn new(dir: impl Into<PathBuf>) -> Self {
    Self { dir: dir.into() }
  }

  fn path_for(&self, key: &str) -> PathBuf {
    self.dir.join(format!("{key}.json"))
  }
}

impl BlobStore for FsBlobStore {
  fn get(&self, key: &str) -> Option<String> {
    std::fs::read_to_string(self.path_for(key)).ok()
  }

  fn set(&self, key: &str, value: String) {
    if let Err(e) = std::fs::create_dir_all(&self.dir) {
      warn!(dir = %self.dir.display(), error = %e, "failed to create blob store directory");
      return;
    }
    let path = self.path_for(key);
    if let Err(e) = std::fs::write(&path, value) {
      warn!(path = %path.display(), error = %e, "failed to persist blob");
    }
  }
}

/// In-memory blob store implementation.
///
/// Suitable for tests or ephemeral sessions.
#[derive(Debug, Default)]
pub struct InMemoryBlobStore {
  data: Mutex<HashMap<String, String>>,
}

impl InMemoryBlobStore {
  pub fn new() -> Self {
    Self::default()
  }
}

impl BlobStore for InMemoryBlobStore {
  fn get(&self, key: &str) -> Option<String> {
    let data = self.data.lock().unwrap_or_else(PoisonError::into_inner);
    data.get(key).cloned()
  }

  fn set(&self, key: &str, value: String) {
    let mut data = self.data.lock().unwrap_or_else(PoisonError::into_inner);
    data.insert(key.to_string(), value);
  }
}
