use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::config::{AspectRatio, GenerationConfig, OutputFormat, Resolution};
use crate::state::TaskState;

/// The live view of the currently selected task.
///
/// This is what the outer surface renders: at most one task is "live" at a
/// time, and the reconciler only writes to it while the task id still
/// matches. `raw_response` holds the last raw provider payload and is purely
/// diagnostic; control decisions never read it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskView {
  /// Remote task id, assigned by the provider at creation. `None` until the
  /// submission round-trip completes.
  pub task_id: Option<String>,
  pub state: TaskState,
  pub prompt: String,
  pub aspect_ratio: AspectRatio,
  pub resolution: Resolution,
  pub output_format: OutputFormat,
  /// Set exactly once, on the transition into `Succeeded`.
  pub result_url: Option<String>,
  /// Set exactly once, on the transition into `Failed`.
  pub error: Option<String>,
  /// Last raw provider payload observed for this task. Diagnostic only.
  pub raw_response: Option<serde_json::Value>,
  pub created_at: Option<DateTime<Utc>>,
}

impl TaskView {
  /// An empty view with no task selected.
  pub fn idle() -> Self {
    Self {
      task_id: None,
      state: TaskState::Idle,
      prompt: String::new(),
      aspect_ratio: AspectRatio::default(),
      resolution: Resolution::default(),
      output_format: OutputFormat::default(),
      result_url: None,
      error: None,
      raw_response: None,
      created_at: None,
    }
  }

  /// A freshly submitted view for the given request, timestamped now.
  ///
  /// The task id arrives later, once the provider acknowledges creation.
  pub fn submitted(config: &GenerationConfig) -> Self {
    Self {
      task_id: None,
      state: TaskState::Submitted,
      prompt: config.prompt.clone(),
      aspect_ratio: config.aspect_ratio,
      resolution: config.resolution,
      output_format: config.output_format,
      result_url: None,
      error: None,
      raw_response: None,
      created_at: Some(Utc::now()),
    }
  }
}

impl Default for TaskView {
  fn default() -> Self {
    Self::idle()
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn idle_view_has_no_task() {
    let view = TaskView::idle();
    assert_eq!(view.state, TaskState::Idle);
    assert!(view.task_id.is_none());
    assert!(view.result_url.is_none());
  }

  #[test]
  fn submitted_view_snapshots_the_request() {
    let mut config = GenerationConfig::from_prompt("a lighthouse at dusk");
    config.aspect_ratio = AspectRatio::Landscape169;

    let view = TaskView::submitted(&config);
    assert_eq!(view.state, TaskState::Submitted);
    assert_eq!(view.prompt, "a lighthouse at dusk");
    assert_eq!(view.aspect_ratio, AspectRatio::Landscape169);
    assert!(view.created_at.is_some());
  }
}
