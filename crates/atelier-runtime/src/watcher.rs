//! The polling watch over a single remote task.

use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use tokio_util::sync::CancellationToken;
use tracing::{info, instrument, warn};

use atelier_provider::{JobService, normalize};

use crate::reconciler::Reconciler;

/// Polling cadence settings.
#[derive(Debug, Clone)]
pub struct WatchConfig {
  /// Fixed interval between status checks.
  pub interval: Duration,
  /// Delay before the first check, giving the remote system time to
  /// register the job.
  pub initial_delay: Duration,
}

impl Default for WatchConfig {
  fn default() -> Self {
    Self {
      interval: Duration::from_secs(5),
      initial_delay: Duration::from_secs(1),
    }
  }
}

struct ActiveWatch {
  task_id: String,
  cancel: CancellationToken,
}

/// Owns the single active polling watch.
///
/// At most one watch exists at a time; arming a new one cancels the
/// previous one first, so a stale loop can never keep firing for a task
/// the caller has moved away from. `watch` and `stop` are the only
/// mutators of the handle.
pub struct Watcher {
  jobs: Arc<dyn JobService>,
  reconciler: Arc<Reconciler>,
  config: WatchConfig,
  active: Mutex<Option<ActiveWatch>>,
}

impl Watcher {
  pub fn new(jobs: Arc<dyn JobService>, reconciler: Arc<Reconciler>, config: WatchConfig) -> Self {
    Self {
      jobs,
      reconciler,
      config,
      active: Mutex::new(None),
    }
  }

  /// Begin watching `task_id`, cancelling any previous watch.
  pub fn watch(&self, task_id: &str) {
    let mut active = self.lock_active();
    if let Some(previous) = active.take() {
      info!(task_id = %previous.task_id, "cancelling previous watch");
      previous.cancel.cancel();
    }

    let cancel = CancellationToken::new();
    let jobs = self.jobs.clone();
    let reconciler = self.reconciler.clone();
    let config = self.config.clone();
    let id = task_id.to_string();
    let loop_cancel = cancel.clone();
    tokio::spawn(async move {
      poll_loop(jobs, reconciler, id, config, loop_cancel).await;
    });

    *active = Some(ActiveWatch {
      task_id: task_id.to_string(),
      cancel,
    });
  }

  /// Cancel the active watch, if any.
  pub fn stop(&self) {
    if let Some(previous) = self.lock_active().take() {
      info!(task_id = %previous.task_id, "stopping watch");
      previous.cancel.cancel();
    }
  }

  /// Task id the watch handle was last armed for.
  ///
  /// A finished loop leaves its handle in place until the next `watch`,
  /// matching "the watch stops by ceasing to re-arm", so this reports the
  /// armed task, not liveness.
  pub fn watched_task(&self) -> Option<String> {
    self.lock_active().as_ref().map(|w| w.task_id.clone())
  }

  /// Perform one ad-hoc status check outside the armed cadence.
  ///
  /// Returns `true` when the task reached a terminal state.
  pub async fn check_now(&self, task_id: &str) -> bool {
    tick(self.jobs.as_ref(), &self.reconciler, task_id).await
  }

  fn lock_active(&self) -> std::sync::MutexGuard<'_, Option<ActiveWatch>> {
    self.active.lock().unwrap_or_else(PoisonError::into_inner)
  }
}

async fn poll_loop(
  jobs: Arc<dyn JobService>,
  reconciler: Arc<Reconciler>,
  task_id: String,
  config: WatchConfig,
  cancel: CancellationToken,
) {
  info!(task_id = %task_id, interval = ?config.interval, "watch started");

  tokio::select! {
    _ = cancel.cancelled() => return,
    _ = tokio::time::sleep(config.initial_delay) => {}
  }

  loop {
    if cancel.is_cancelled() {
      info!(task_id = %task_id, "watch cancelled");
      return;
    }

    if tick(jobs.as_ref(), &reconciler, &task_id).await {
      info!(task_id = %task_id, "watch finished, task reached a terminal state");
      return;
    }

    tokio::select! {
      _ = cancel.cancelled() => {
        info!(task_id = %task_id, "watch cancelled");
        return;
      }
      _ = tokio::time::sleep(config.interval) => {}
    }
  }
}

/// One status check: fetch, normalize, reconcile.
///
/// A transport failure does not end the watch and does not transition
/// state; the failure is assumed transient and only surfaces through the
/// live view's diagnostics.
#[instrument(name = "status_check", skip(jobs, reconciler))]
async fn tick(jobs: &dyn JobService, reconciler: &Reconciler, task_id: &str) -> bool {
  let raw = match jobs.job_info(task_id).await {
    Ok(raw) => raw,
    Err(e) => {
      warn!(task_id, error = %e, "status check failed, will retry on the next tick");
      reconciler.record_poll_error(task_id, &e.to_string());
      return false;
    }
  };

  let outcome = normalize(&raw);
  reconciler.apply(task_id, &outcome, &raw)
}
