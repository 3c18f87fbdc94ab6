//! The session facade: submission, selection, and manual checks.

use std::sync::Arc;

use chrono::Utc;
use serde_json::json;
use tracing::{error, info, instrument};

use atelier_history::{HistoryEntry, HistoryLog};
use atelier_provider::{CreateTaskRequest, JobService, extract_error_message, extract_task_id};
use atelier_task::{GenerationConfig, ImageInput, TaskState, TaskView};
use atelier_upload::Uploader;

use crate::error::SessionError;
use crate::reconciler::Reconciler;
use crate::watcher::{WatchConfig, Watcher};

/// Owns the collaborators and exposes the operations the outer surface
/// calls: submit a generation request, re-check the selected task, select
/// a history entry, read the live view and the history.
pub struct Session {
  jobs: Arc<dyn JobService>,
  uploader: Arc<dyn Uploader>,
  reconciler: Arc<Reconciler>,
  watcher: Watcher,
}

impl Session {
  pub fn new(
    jobs: Arc<dyn JobService>,
    uploader: Arc<dyn Uploader>,
    history: Arc<HistoryLog>,
    watch_config: WatchConfig,
  ) -> Self {
    let reconciler = Arc::new(Reconciler::new(history));
    let watcher = Watcher::new(jobs.clone(), reconciler.clone(), watch_config);
    Self {
      jobs,
      uploader,
      reconciler,
      watcher,
    }
  }

  /// Snapshot of the live task view.
  pub fn live(&self) -> TaskView {
    self.reconciler.live()
  }

  /// History entries, most recent first.
  pub fn history(&self) -> Vec<HistoryEntry> {
    self.reconciler.history().list()
  }

  pub fn clear_history(&self) {
    self.reconciler.history().clear();
  }

  /// Stop the active watch without changing the live view.
  pub fn stop_watching(&self) {
    self.watcher.stop();
  }

  /// Submit a generation request and start watching the resulting task.
  ///
  /// Every failure before the watch is armed (input read, upload, creation
  /// call, missing task id) lands the live view in `Failed` with a message
  /// in addition to being returned, so it is never silently dropped.
  #[instrument(name = "submit", skip(self, config), fields(prompt_len = config.prompt.len()))]
  pub async fn submit(&self, config: GenerationConfig) -> Result<String, SessionError> {
    self.watcher.stop();
    let mut view = TaskView::submitted(&config);
    self.reconciler.replace_live(view.clone());

    let image_urls = match self.resolve_inputs(&config.image_inputs).await {
      Ok(urls) => urls,
      Err(e) => {
        self.fail_live(e.to_string());
        return Err(e);
      }
    };

    let request = CreateTaskRequest {
      prompt: config.prompt.clone(),
      aspect_ratio: config.aspect_ratio,
      resolution: config.resolution,
      output_format: config.output_format,
      image_urls: image_urls.clone(),
    };

    let raw = match self.jobs.create_task(&request).await {
      Ok(raw) => raw,
      Err(e) => {
        error!(error = %e, "task creation failed");
        self.fail_live(e.to_string());
        return Err(e.into());
      }
    };

    let Some(task_id) = extract_task_id(&raw) else {
      let message = extract_error_message(&raw)
        .unwrap_or_else(|| "provider returned no task id".to_string());
      error!(message = %message, "creation response carried no task id");
      self.fail_live(message.clone());
      return Err(SessionError::Submission { message });
    };

    info!(task_id = %task_id, "task created");

    self.reconciler.history().append(HistoryEntry {
      task_id: task_id.clone(),
      created_at: view.created_at.unwrap_or_else(Utc::now),
      state: TaskState::Processing,
      prompt: config.prompt.clone(),
      input_previews: image_urls,
      result_url: None,
      error: None,
      raw_response: Some(raw.clone()),
    });

    view.task_id = Some(task_id.clone());
    view.state = TaskState::Processing;
    view.raw_response = Some(raw);
    self.reconciler.replace_live(view);

    self.watcher.watch(&task_id);
    Ok(task_id)
  }

  /// Perform one ad-hoc status check for the selected task.
  ///
  /// Works even when no watch is armed (e.g. a terminal task re-checked
  /// from history). Safe to overlap with a scheduled tick.
  pub async fn check_now(&self) -> Result<(), SessionError> {
    let Some(task_id) = self.reconciler.live().task_id else {
      return Err(SessionError::NoActiveTask);
    };
    self.watcher.check_now(&task_id).await;
    Ok(())
  }

  /// Load a history entry into the live view.
  ///
  /// Any previous watch is cancelled first; a new one is armed only when
  /// the entry is still in a watchable state.
  pub fn select_history_entry(&self, task_id: &str) -> Result<(), SessionError> {
    let Some(entry) = self.reconciler.history().get(task_id) else {
      return Err(SessionError::UnknownTask {
        task_id: task_id.to_string(),
      });
    };

    self.watcher.stop();
    self.reconciler.replace_live(TaskView {
      task_id: Some(entry.task_id.clone()),
      state: entry.state,
      prompt: entry.prompt.clone(),
      aspect_ratio: Default::default(),
      resolution: Default::default(),
      output_format: Default::default(),
      result_url: entry.result_url.clone(),
      error: entry.error.clone(),
      raw_response: entry.raw_response.clone(),
      created_at: Some(entry.created_at),
    });

    if entry.state.is_watchable() {
      self.watcher.watch(task_id);
    }
    Ok(())
  }

  /// Wait until the live task leaves the watched states.
  ///
  /// Intended for non-reactive callers like the CLI; returns the final
  /// view. Returns immediately when nothing is being watched.
  pub async fn wait_until_settled(&self) -> TaskView {
    loop {
      let view = self.reconciler.live();
      if !view.state.is_watchable() {
        return view;
      }
      tokio::time::sleep(std::time::Duration::from_millis(200)).await;
    }
  }

  async fn resolve_inputs(&self, inputs: &[ImageInput]) -> Result<Vec<String>, SessionError> {
    let mut urls = Vec::with_capacity(inputs.len());
    for input in inputs {
      match input {
        ImageInput::Url(url) => urls.push(url.clone()),
        ImageInput::File(path) => {
          let bytes = tokio::fs::read(path)
            .await
            .map_err(|e| SessionError::InputRead {
              path: path.display().to_string(),
              message: e.to_string(),
            })?;
          let name = path
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_else(|| "image".to_string());
          urls.push(self.uploader.upload(&name, bytes).await?);
        }
      }
    }
    Ok(urls)
  }

  fn fail_live(&self, message: String) {
    let mut view = self.reconciler.live();
    view.state = TaskState::Failed;
    view.raw_response = Some(json!({ "error": message }));
    view.error = Some(message);
    view.result_url = None;
    self.reconciler.replace_live(view);
  }
}
