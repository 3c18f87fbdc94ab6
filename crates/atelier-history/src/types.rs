use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use atelier_task::TaskState;

/// A durable projection of a task, keyed by its remote task id.
///
/// At most one entry exists per task id; updates are in-place merges via
/// [`HistoryPatch`](crate::HistoryPatch), never duplicate insertions.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistoryEntry {
  pub task_id: String,
  pub created_at: DateTime<Utc>,
  pub state: TaskState,
  pub prompt: String,
  /// Resolved input-image URLs, kept for display.
  #[serde(default)]
  pub input_previews: Vec<String>,
  pub result_url: Option<String>,
  pub error: Option<String>,
  /// Last raw provider payload observed for this task. Diagnostic only.
  pub raw_response: Option<serde_json::Value>,
}

/// A shallow merge applied to an existing [`HistoryEntry`].
///
/// `None` leaves a field untouched. The doubled options on `result_url` and
/// `error` distinguish "leave as is" from "clear": a succeeded task clears
/// its error, a failed task clears its result URL.
#[derive(Debug, Clone, Default)]
pub struct HistoryPatch {
  pub state: Option<TaskState>,
  pub result_url: Option<Option<String>>,
  pub error: Option<Option<String>>,
  pub raw_response: Option<serde_json::Value>,
}

impl HistoryPatch {
  /// Patch for a task that reached `Succeeded` with the given result URL.
  pub fn succeeded(url: impl Into<String>, raw: serde_json::Value) -> Self {
    Self {
      state: Some(TaskState::Succeeded),
      result_url: Some(Some(url.into())),
      error: Some(None),
      raw_response: Some(raw),
    }
  }

  /// Patch for a task that reached `Failed` with the given message.
  pub fn failed(message: impl Into<String>, raw: serde_json::Value) -> Self {
    Self {
      state: Some(TaskState::Failed),
      result_url: Some(None),
      error: Some(Some(message.into())),
      raw_response: Some(raw),
    }
  }

  /// Patch that only refreshes the diagnostic payload.
  pub fn diagnostics(raw: serde_json::Value) -> Self {
    Self {
      raw_response: Some(raw),
      ..Self::default()
    }
  }

  /// Apply this patch to an entry in place.
  pub fn apply_to(&self, entry: &mut HistoryEntry) {
    if let Some(state) = self.state {
      entry.state = state;
    }
    if let Some(result_url) = &self.result_url {
      entry.result_url = result_url.clone();
    }
    if let Some(error) = &self.error {
      entry.error = error.clone();
    }
    if let Some(raw) = &self.raw_response {
      entry.raw_response = Some(raw.clone());
    }
  }
}
