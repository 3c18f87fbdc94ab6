//! Watcher behavior under a paused clock: cadence, terminal stop,
//! cancellation on re-arm, and the stale-tick race.

use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use serde_json::{Value, json};
use tokio::sync::Notify;

use atelier_history::{HistoryEntry, HistoryLog, InMemoryBlobStore};
use atelier_provider::{CreateTaskRequest, JobService, ProviderError};
use atelier_runtime::{Reconciler, WatchConfig, Watcher};
use atelier_task::{TaskState, TaskView};

/// Fake provider with per-task queued status payloads; the last payload
/// repeats once the queue runs dry.
#[derive(Default)]
struct ScriptedJobs {
  responses: Mutex<HashMap<String, VecDeque<Value>>>,
  calls: Mutex<HashMap<String, usize>>,
}

impl ScriptedJobs {
  fn script(&self, task_id: &str, payloads: Vec<Value>) {
    self
      .responses
      .lock()
      .unwrap()
      .insert(task_id.to_string(), payloads.into());
  }

  fn calls_for(&self, task_id: &str) -> usize {
    *self.calls.lock().unwrap().get(task_id).unwrap_or(&0)
  }
}

#[async_trait]
impl JobService for ScriptedJobs {
  async fn create_task(&self, _request: &CreateTaskRequest) -> Result<Value, ProviderError> {
    Ok(json!({}))
  }

  async fn job_info(&self, task_id: &str) -> Result<Value, ProviderError> {
    *self
      .calls
      .lock()
      .unwrap()
      .entry(task_id.to_string())
      .or_insert(0) += 1;

    let mut responses = self.responses.lock().unwrap();
    let queue = responses.entry(task_id.to_string()).or_default();
    let payload = if queue.len() > 1 {
      queue.pop_front().unwrap()
    } else {
      queue.front().cloned().unwrap_or(Value::Null)
    };
    Ok(payload)
  }
}

fn history_with(task_ids: &[&str]) -> Arc<HistoryLog> {
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
  history
}

fn select(reconciler: &Reconciler, task_id: &str) {
  let mut view = TaskView::idle();
  view.task_id = Some(task_id.to_string());
  view.state = TaskState::Processing;
  reconciler.replace_live(view);
}

fn fast_config() -> WatchConfig {
  WatchConfig {
    interval: Duration::from_secs(5),
    initial_delay: Duration::from_secs(1),
  }
}

#[tokio::test(start_paused = true)]
async fn watch_polls_until_terminal_then_stops() {
  let jobs = Arc::new(ScriptedJobs::default());
  jobs.script(
    "t1",
    vec![
      json!({"data": {"state": "running"}}),
      json!({"data": {"state": "running"}}),
      json!({"data": {"state": "success", "resultJson": "{\"resultUrls\":[\"https://x/img.png\"]}"}}),
    ],
  );

  let reconciler = Arc::new(Reconciler::new(history_with(&["t1"])));
  select(&reconciler, "t1");
  let watcher = Watcher::new(jobs.clone(), reconciler.clone(), fast_config());

  watcher.watch("t1");

  // Initial delay plus two intervals covers the three scripted ticks.
  tokio::time::sleep(Duration::from_secs(12)).await;

  let live = reconciler.live();
  assert_eq!(live.state, TaskState::Succeeded);
  assert_eq!(live.result_url.as_deref(), Some("https://x/img.png"));
  assert_eq!(jobs.calls_for("t1"), 3);

  // The terminal tick ended the loop; no further checks fire.
  tokio::time::sleep(Duration::from_secs(60)).await;
  assert_eq!(jobs.calls_for("t1"), 3);
}

#[tokio::test(start_paused = true)]
async fn transient_errors_keep_the_watch_alive() {
  struct FlakyJobs {
    calls: Mutex<usize>,
  }

  #[async_trait]
  impl JobService for FlakyJobs {
    async fn create_task(&self, _request: &CreateTaskRequest) -> Result<Value, ProviderError> {
      Ok(json!({}))
    }

    async fn job_info(&self, _task_id: &str) -> Result<Value, ProviderError> {
      let mut calls = self.calls.lock().unwrap();
      *calls += 1;
      if *calls < 3 {
        Err(ProviderError::Api {
          status: 502,
          message: "bad gateway".to_string(),
        })
      } else {
        Ok(json!({"data": {"state": "success", "resultJson": {"resultUrls": ["https://x/ok.png"]}}}))
      }
    }
  }

  let jobs = Arc::new(FlakyJobs {
    calls: Mutex::new(0),
  });
  let reconciler = Arc::new(Reconciler::new(history_with(&["t1"])));
  select(&reconciler, "t1");
  let watcher = Watcher::new(jobs.clone(), reconciler.clone(), fast_config());

  watcher.watch("t1");
  tokio::time::sleep(Duration::from_secs(3)).await;

  // After the first failed tick: no transition, diagnostics recorded.
  let live = reconciler.live();
  assert_eq!(live.state, TaskState::Processing);
  assert!(live.raw_response.is_some());

  tokio::time::sleep(Duration::from_secs(15)).await;
  assert_eq!(reconciler.live().state, TaskState::Succeeded);
}

#[tokio::test(start_paused = true)]
async fn rearming_cancels_the_previous_watch() {
  let jobs = Arc::new(ScriptedJobs::default());
  jobs.script("t1", vec![json!({"data": {"state": "running"}})]);
  jobs.script("t2", vec![json!({"data": {"state": "running"}})]);

  let reconciler = Arc::new(Reconciler::new(history_with(&["t1", "t2"])));
  select(&reconciler, "t1");
  let watcher = Watcher::new(jobs.clone(), reconciler.clone(), fast_config());

  watcher.watch("t1");
  tokio::time::sleep(Duration::from_secs(7)).await;
  let t1_calls = jobs.calls_for("t1");
  assert!(t1_calls >= 1);

  select(&reconciler, "t2");
  watcher.watch("t2");
  assert_eq!(watcher.watched_task().as_deref(), Some("t2"));

  tokio::time::sleep(Duration::from_secs(30)).await;

  // t1's loop stopped firing the moment t2 was armed.
  assert_eq!(jobs.calls_for("t1"), t1_calls);
  assert!(jobs.calls_for("t2") >= 2);
}

/// A provider whose task "a" status call blocks until released, so a tick
/// can be held in flight across a watch switch.
struct GatedJobs {
  release_a: Notify,
}

#[async_trait]
impl JobService for GatedJobs {
  async fn create_task(&self, _request: &CreateTaskRequest) -> Result<Value, ProviderError> {
    Ok(json!({}))
  }

  async fn job_info(&self, task_id: &str) -> Result<Value, ProviderError> {
    if task_id == "a" {
      self.release_a.notified().await;
      Ok(json!({"data": {"state": "success", "resultJson": {"resultUrls": ["https://x/late.png"]}}}))
    } else {
      Ok(json!({"data": {"state": "running"}}))
    }
  }
}

#[tokio::test(start_paused = true)]
async fn late_tick_for_a_deselected_task_cannot_overwrite_the_live_view() {
  let jobs = Arc::new(GatedJobs {
    release_a: Notify::new(),
  });
  let reconciler = Arc::new(Reconciler::new(history_with(&["a", "b"])));
  select(&reconciler, "a");
  let watcher = Watcher::new(jobs.clone(), reconciler.clone(), fast_config());

  // a's first tick starts and then hangs inside the status call.
  watcher.watch("a");
  tokio::time::sleep(Duration::from_secs(2)).await;

  // The user moves on to b while a's tick is still in flight.
  select(&reconciler, "b");
  watcher.watch("b");
  tokio::time::sleep(Duration::from_secs(2)).await;

  // a's response finally arrives.
  jobs.release_a.notify_one();
  tokio::time::sleep(Duration::from_millis(10)).await;

  // b's live view is untouched by a's late success...
  let live = reconciler.live();
  assert_eq!(live.task_id.as_deref(), Some("b"));
  assert_eq!(live.state, TaskState::Processing);
  assert_eq!(live.result_url, None);

  // ...but a's history entry still received it.
  let entry = reconciler.history().get("a").unwrap();
  assert_eq!(entry.state, TaskState::Succeeded);
  assert_eq!(entry.result_url.as_deref(), Some("https://x/late.png"));
}

#[tokio::test(start_paused = true)]
async fn check_now_works_without_an_armed_watch() {
  let jobs = Arc::new(ScriptedJobs::default());
  jobs.script(
    "t1",
    vec![json!({"data": {"state": "failed", "failMsg": "quota exceeded"}})],
  );

  let reconciler = Arc::new(Reconciler::new(history_with(&["t1"])));
  select(&reconciler, "t1");
  let watcher = Watcher::new(jobs.clone(), reconciler.clone(), fast_config());

  let terminal = watcher.check_now("t1").await;
  assert!(terminal);
  assert_eq!(reconciler.live().state, TaskState::Failed);
  assert_eq!(
    reconciler.live().error.as_deref(),
    Some("quota exceeded")
  );
}
