//! Session error types.

use atelier_provider::ProviderError;
use atelier_upload::UploadError;

/// Errors surfaced by session operations.
///
/// Submission errors are also reflected in the live task view as a
/// `Failed` state, so a caller that only watches the view never misses
/// them. Transient poll errors never appear here; the watch absorbs them.
#[derive(Debug, thiserror::Error)]
pub enum SessionError {
  /// An input image could not be read from disk.
  #[error("failed to read input image '{path}': {message}")]
  InputRead { path: String, message: String },

  /// An input image upload failed before the job was submitted.
  #[error("image upload failed: {0}")]
  Upload(#[from] UploadError),

  /// The provider call itself failed.
  #[error(transparent)]
  Provider(#[from] ProviderError),

  /// The creation response carried no extractable task id.
  #[error("task submission failed: {message}")]
  Submission { message: String },

  /// `check_now` was called with no task selected.
  #[error("no task is selected")]
  NoActiveTask,

  /// `select_history_entry` named a task the history does not contain.
  #[error("no history entry for task '{task_id}'")]
  UnknownTask { task_id: String },
}
