//! Applying normalized poll results to the live view and the history.

use std::sync::{Arc, Mutex, PoisonError};

use serde_json::{Value, json};
use tracing::info;

use atelier_history::{HistoryLog, HistoryPatch};
use atelier_provider::JobOutcome;
use atelier_task::{TaskState, TaskView};

/// Keeps the live task view and the history log consistent with the
/// remote state.
///
/// Terminal applies are convergent merges: applying the same outcome twice
/// is observably a no-op, which is what makes an overlapping manual check
/// and scheduled tick safe without any mutual exclusion between them. The
/// live view is only written while its task id still matches the result's,
/// so a late tick for a task the user has navigated away from can never
/// clobber the freshly selected one; its history entry is still updated.
pub struct Reconciler {
  live: Mutex<TaskView>,
  history: Arc<HistoryLog>,
}

impl Reconciler {
  pub fn new(history: Arc<HistoryLog>) -> Self {
    Self {
      live: Mutex::new(TaskView::idle()),
      history,
    }
  }

  /// Snapshot of the live view.
  pub fn live(&self) -> TaskView {
    self.lock_live().clone()
  }

  /// Replace the live view wholesale (submission, history selection).
  pub fn replace_live(&self, view: TaskView) {
    *self.lock_live() = view;
  }

  pub fn history(&self) -> &Arc<HistoryLog> {
    &self.history
  }

  /// Apply a normalized poll result for `task_id`.
  ///
  /// Returns `true` when the outcome was terminal, i.e. the watch for this
  /// task should stop re-arming.
  pub fn apply(&self, task_id: &str, outcome: &JobOutcome, raw: &Value) -> bool {
    {
      let mut live = self.lock_live();
      let selected = live.task_id.as_deref() == Some(task_id);
      if selected {
        live.raw_response = Some(raw.clone());
        match outcome {
          JobOutcome::Running => {}
          JobOutcome::Succeeded { url } => {
            live.state = TaskState::Succeeded;
            live.result_url = Some(url.clone());
            live.error = None;
          }
          JobOutcome::Failed { message, .. } => {
            live.state = TaskState::Failed;
            live.error = Some(message.clone());
            live.result_url = None;
          }
        }
      }
    }

    let patch = match outcome {
      JobOutcome::Running => HistoryPatch::diagnostics(raw.clone()),
      JobOutcome::Succeeded { url } => {
        info!(task_id, url = %url, "task succeeded");
        HistoryPatch::succeeded(url.clone(), raw.clone())
      }
      JobOutcome::Failed { kind, message } => {
        info!(task_id, ?kind, message = %message, "task failed");
        HistoryPatch::failed(message.clone(), raw.clone())
      }
    };
    self.history.merge(task_id, &patch);

    outcome.is_terminal()
  }

  /// Record a transient poll failure.
  ///
  /// No state transition and no history write; only the live diagnostics
  /// are refreshed, and only while the failing task is still selected.
  pub fn record_poll_error(&self, task_id: &str, message: &str) {
    let mut live = self.lock_live();
    if live.task_id.as_deref() == Some(task_id) {
      live.raw_response = Some(json!({ "error": message }));
    }
  }

  fn lock_live(&self) -> std::sync::MutexGuard<'_, TaskView> {
    self.live.lock().unwrap_or_else(PoisonError::into_inner)
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use atelier_history::{HistoryEntry, InMemoryBlobStore};
  use atelier_provider::FailureKind;
  use chrono::Utc;

  fn reconciler_with(task_ids: &[&str]) -> Reconciler {
    let history = Arc::new(HistoryLog::new(Arc::new(InMemoryBlobStore::new())));
    for id in task_ids.iter().rev() {
      history.append(HistoryEntry {
        task_id: id.to_string(),
        created_at: Utc::now(),
        state: TaskState::Processing,
        prompt: "p".to_string(),
        input_previews: vec![],
        result_url: None,
        error: None,
        raw_response: None,
      });
    }
    Reconciler::new(history)
  }

  fn select(reconciler: &Reconciler, task_id: &str) {
    let mut view = TaskView::idle();
    view.task_id = Some(task_id.to_string());
    view.state = TaskState::Processing;
    reconciler.replace_live(view);
  }

  #[test]
  fn running_refreshes_diagnostics_only() {
    let reconciler = reconciler_with(&["t1"]);
    select(&reconciler, "t1");

    let raw = json!({"data": {"state": "running"}});
    let terminal = reconciler.apply("t1", &JobOutcome::Running, &raw);

    assert!(!terminal);
    let live = reconciler.live();
    assert_eq!(live.state, TaskState::Processing);
    assert_eq!(live.raw_response, Some(raw));
    assert_eq!(
      reconciler.history().get("t1").unwrap().state,
      TaskState::Processing
    );
  }

  #[test]
  fn succeeded_updates_live_and_history() {
    let reconciler = reconciler_with(&["t1"]);
    select(&reconciler, "t1");

    let outcome = JobOutcome::Succeeded {
      url: "https://x/img.png".to_string(),
    };
    let terminal = reconciler.apply("t1", &outcome, &json!({}));

    assert!(terminal);
    let live = reconciler.live();
    assert_eq!(live.state, TaskState::Succeeded);
    assert_eq!(live.result_url.as_deref(), Some("https://x/img.png"));
    assert_eq!(live.error, None);

    let entry = reconciler.history().get("t1").unwrap();
    assert_eq!(entry.state, TaskState::Succeeded);
    assert_eq!(entry.result_url.as_deref(), Some("https://x/img.png"));
  }

  #[test]
  fn terminal_apply_is_idempotent() {
    let reconciler = reconciler_with(&["t1"]);
    select(&reconciler, "t1");

    let outcome = JobOutcome::Succeeded {
      url: "https://x/img.png".to_string(),
    };
    let raw = json!({"data": {"state": "success"}});

    reconciler.apply("t1", &outcome, &raw);
    let live_once = reconciler.live();
    let history_once = reconciler.history().list();

    // A redundant apply (overlapping manual check) changes nothing.
    reconciler.apply("t1", &outcome, &raw);
    assert_eq!(reconciler.live(), live_once);
    assert_eq!(reconciler.history().list(), history_once);
  }

  #[test]
  fn stale_result_updates_history_but_not_live_view() {
    let reconciler = reconciler_with(&["a", "b"]);
    // The user has moved on to task b; a's result arrives late.
    select(&reconciler, "b");

    let outcome = JobOutcome::Succeeded {
      url: "https://x/stale.png".to_string(),
    };
    reconciler.apply("a", &outcome, &json!({}));

    let live = reconciler.live();
    assert_eq!(live.task_id.as_deref(), Some("b"));
    assert_eq!(live.state, TaskState::Processing);
    assert_eq!(live.result_url, None);

    let entry = reconciler.history().get("a").unwrap();
    assert_eq!(entry.state, TaskState::Succeeded);
  }

  #[test]
  fn failed_clears_result_url() {
    let reconciler = reconciler_with(&["t1"]);
    select(&reconciler, "t1");

    let outcome = JobOutcome::Failed {
      kind: FailureKind::Remote,
      message: "quota exceeded".to_string(),
    };
    let terminal = reconciler.apply("t1", &outcome, &json!({}));

    assert!(terminal);
    let live = reconciler.live();
    assert_eq!(live.state, TaskState::Failed);
    assert_eq!(live.error.as_deref(), Some("quota exceeded"));
    assert_eq!(live.result_url, None);
  }

  #[test]
  fn poll_error_touches_diagnostics_only_for_the_selected_task() {
    let reconciler = reconciler_with(&["t1"]);
    select(&reconciler, "t1");

    reconciler.record_poll_error("t1", "connection refused");
    let live = reconciler.live();
    assert_eq!(live.state, TaskState::Processing);
    assert_eq!(live.raw_response, Some(json!({"error": "connection refused"})));

    // A poll error for a deselected task is dropped.
    reconciler.record_poll_error("other", "timeout");
    assert_eq!(
      reconciler.live().raw_response,
      Some(json!({"error": "connection refused"}))
    );
  }
}
