//! Normalization of raw provider payloads.
//!
//! The status endpoint has returned several shapes over time: bare objects
//! or single-element arrays, status under `data.state`, `data.status` or at
//! the root, and result URLs behind a `resultJson` field that may be a
//! plain object, a JSON-encoded string, or a double-encoded string. The
//! functions here resolve all of those variants with a fixed precedence.

use serde_json::{Map, Value};

/// Why a task ended up in `Failed`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureKind {
  /// The provider explicitly reported the job as failed.
  Remote,
  /// The provider reported success but no result URL could be located;
  /// surfaced as a failure rather than a success with nothing to show.
  MissingResult,
}

/// Canonical result of one status check.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum JobOutcome {
  /// No actionable terminal state yet.
  Running,
  Succeeded { url: String },
  Failed { kind: FailureKind, message: String },
}

impl JobOutcome {
  pub fn is_terminal(&self) -> bool {
    !matches!(self, JobOutcome::Running)
  }
}

/// Normalize a raw status payload into a [`JobOutcome`].
pub fn normalize(response: &Value) -> JobOutcome {
  let body = unwrap_body(response);
  let data = body.get("data");

  let status = find_status(&body, data).unwrap_or_else(|| {
    // A present, non-empty resultJson is taken as conclusive proof of
    // success even when no status field made it into the payload.
    if data.map(has_result_json).unwrap_or(false) {
      "SUCCESS".to_string()
    } else {
      String::new()
    }
  });

  match status.as_str() {
    "SUCCESS" | "SUCCEEDED" | "COMPLETED" => match data.and_then(extract_result_url) {
      Some(url) => JobOutcome::Succeeded { url },
      None => JobOutcome::Failed {
        kind: FailureKind::MissingResult,
        message: "provider reported success but no result URL could be located in the response"
          .to_string(),
      },
    },
    "FAILED" | "FAILURE" => JobOutcome::Failed {
      kind: FailureKind::Remote,
      message: extract_failure_message(&body, data),
    },
    _ => JobOutcome::Running,
  }
}

/// Extract the remote task id from a creation response.
///
/// Checked in order: `data.taskId`, `data.id`, `data.task_id`, root
/// `taskId`, root `id`. Numeric ids are rendered as strings.
pub fn extract_task_id(response: &Value) -> Option<String> {
  let body = unwrap_body(response);
  let data = body.get("data");

  [
    data.and_then(|d| d.get("taskId")),
    data.and_then(|d| d.get("id")),
    data.and_then(|d| d.get("task_id")),
    body.get("taskId"),
    body.get("id"),
  ]
  .into_iter()
  .flatten()
  .find_map(id_as_string)
}

/// Best-effort error message embedded in a provider response.
pub fn extract_error_message(response: &Value) -> Option<String> {
  let body = unwrap_body(response);
  ["msg", "message", "error"]
    .into_iter()
    .find_map(|key| body.get(key).and_then(Value::as_str))
    .filter(|s| !s.is_empty())
    .map(str::to_string)
}

/// Array responses carry the payload as their first element; an empty
/// array reads as an empty object.
fn unwrap_body(response: &Value) -> Value {
  match response {
    Value::Array(items) => items
      .first()
      .cloned()
      .unwrap_or_else(|| Value::Object(Map::new())),
    other => other.clone(),
  }
}

fn find_status(body: &Value, data: Option<&Value>) -> Option<String> {
  [
    data.and_then(|d| d.get("state")),
    data.and_then(|d| d.get("status")),
    body.get("status"),
    body.get("state"),
  ]
  .into_iter()
  .flatten()
  .filter_map(Value::as_str)
  .map(str::to_uppercase)
  .find(|s| !s.is_empty())
}

fn has_result_json(data: &Value) -> bool {
  match data.get("resultJson") {
    None | Some(Value::Null) => false,
    Some(Value::String(s)) => !s.is_empty(),
    Some(_) => true,
  }
}

fn extract_result_url(data: &Value) -> Option<String> {
  if let Some(result_json) = data.get("resultJson") {
    let decoded = decode_result_json(result_json);
    let url = decoded
      .get("resultUrls")
      .and_then(|urls| urls.get(0))
      .and_then(Value::as_str)
      .or_else(|| decoded.get("image_url").and_then(Value::as_str));
    if let Some(url) = url {
      return Some(url.to_string());
    }
  }

  // Older payloads put the result under output/result/results directly.
  ["output", "result", "results"]
    .into_iter()
    .filter_map(|key| data.get(key))
    .find_map(url_from_result_value)
}

/// `resultJson` may be a plain object, a JSON-encoded string, or a
/// double-encoded string; decode up to twice, ignoring parse failures.
fn decode_result_json(value: &Value) -> Value {
  let mut current = value.clone();
  for _ in 0..2 {
    let Some(text) = current.as_str() else {
      break;
    };
    match serde_json::from_str(text) {
      Ok(decoded) => current = decoded,
      Err(_) => break,
    }
  }
  current
}

fn url_from_result_value(value: &Value) -> Option<String> {
  if let Some(url) = value
    .get("results")
    .and_then(|r| r.get(0))
    .and_then(Value::as_str)
  {
    return Some(url.to_string());
  }
  if let Some(url) = value.as_str() {
    return Some(url.to_string());
  }
  if let Some(url) = value.get("image_url").and_then(Value::as_str) {
    return Some(url.to_string());
  }
  value
    .as_array()
    .and_then(|items| items.first())
    .and_then(Value::as_str)
    .map(str::to_string)
}

fn extract_failure_message(body: &Value, data: Option<&Value>) -> String {
  [
    data.and_then(|d| d.get("error")),
    data.and_then(|d| d.get("failMsg")),
    body.get("error"),
  ]
  .into_iter()
  .flatten()
  .filter_map(Value::as_str)
  .find(|s| !s.is_empty())
  .map(str::to_string)
  .unwrap_or_else(|| "job failed without a reported reason".to_string())
}

fn id_as_string(value: &Value) -> Option<String> {
  match value {
    Value::String(s) if !s.is_empty() => Some(s.clone()),
    Value::Number(n) => Some(n.to_string()),
    _ => None,
  }
}
