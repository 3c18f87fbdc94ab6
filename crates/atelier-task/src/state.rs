use std::fmt;

use serde::{Deserialize, Serialize};

/// State of a tracked generation task.
///
/// `Succeeded` and `Failed` are terminal: once a task reaches either, no
/// further transitions occur and polling stops.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskState {
  Idle,
  Submitted,
  Processing,
  Succeeded,
  Failed,
}

impl TaskState {
  /// Whether this state admits no further transitions.
  pub fn is_terminal(&self) -> bool {
    matches!(self, TaskState::Succeeded | TaskState::Failed)
  }

  /// Whether a task in this state should have an active watch.
  pub fn is_watchable(&self) -> bool {
    matches!(self, TaskState::Submitted | TaskState::Processing)
  }
}

impl fmt::Display for TaskState {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    let label = match self {
      TaskState::Idle => "idle",
      TaskState::Submitted => "submitted",
      TaskState::Processing => "processing",
      TaskState::Succeeded => "succeeded",
      TaskState::Failed => "failed",
    };
    f.pad(label)
  }
}
