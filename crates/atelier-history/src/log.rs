use std::sync::{Arc, Mutex, PoisonError};

use tracing::warn;

use crate::blob::BlobStore;
use crate::types::{HistoryEntry, HistoryPatch};

/// Well-known blob key the history log lives under.
pub const HISTORY_KEY: &str = "history";

/// Maximum number of retained entries; the oldest is evicted past this.
pub const HISTORY_CAP: usize = 50;

/// Ordered, capped, task-id-addressable log of past tasks.
///
/// Entries are stored most-recent-first as one JSON array in a single blob
/// slot. A corrupt blob is treated as an empty log, never an error.
pub struct HistoryLog {
  store: Arc<dyn BlobStore>,
  // Serializes read-modify-write cycles; the blob store itself only
  // guarantees atomic get/set.
  write_lock: Mutex<()>,
}

impl HistoryLog {
  pub fn new(store: Arc<dyn BlobStore>) -> Self {
    Self {
      store,
      write_lock: Mutex::new(()),
    }
  }

  /// All entries, most recent first.
  pub fn list(&self) -> Vec<HistoryEntry> {
    self.load()
  }

  /// Look up an entry by task id.
  pub fn get(&self, task_id: &str) -> Option<HistoryEntry> {
    self.load().into_iter().find(|e| e.task_id == task_id)
  }

  /// Insert a new entry at the head, evicting the oldest past the cap.
  pub fn append(&self, entry: HistoryEntry) {
    let _guard = self.write_lock.lock().unwrap_or_else(PoisonError::into_inner);
    let mut entries = self.load();
    entries.insert(0, entry);
    entries.truncate(HISTORY_CAP);
    self.save(&entries);
  }

  /// Shallow-merge a patch into the entry with the given task id.
  ///
  /// Returns `false` (and writes nothing) when no entry matches.
  pub fn merge(&self, task_id: &str, patch: &HistoryPatch) -> bool {
    let _guard = self.write_lock.lock().unwrap_or_else(PoisonError::into_inner);
    let mut entries = self.load();
    let Some(entry) = entries.iter_mut().find(|e| e.task_id == task_id) else {
      return false;
    };
    patch.apply_to(entry);
    self.save(&entries);
    true
  }

  /// Drop all entries.
  pub fn clear(&self) {
    let _guard = self.write_lock.lock().unwrap_or_else(PoisonError::into_inner);
    self.save(&[]);
  }

  fn load(&self) -> Vec<HistoryEntry> {
    let Some(raw) = self.store.get(HISTORY_KEY) else {
      return Vec::new();
    };
    serde_json::from_str(&raw).unwrap_or_else(|e| {
      warn!(error = %e, "history blob is corrupt, starting from an empty log");
      Vec::new()
    })
  }

  fn save(&self, entries: &[HistoryEntry]) {
    match serde_json::to_string(entries) {
      Ok(raw) => self.store.set(HISTORY_KEY, raw),
      Err(e) => warn!(error = %e, "failed to encode history log"),
    }
  }
}
