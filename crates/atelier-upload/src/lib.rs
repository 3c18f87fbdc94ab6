//! Atelier Upload
//!
//! Uploading local input images to a durable, publicly fetchable URL. The
//! generation provider only accepts URLs, so any local file goes through an
//! [`Uploader`] before a job is submitted; an upload failure aborts the
//! submission before a remote task is even created.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde_json::Value;
use tracing::{info, instrument, warn};
use url::Url;

/// Errors that can occur while uploading an input image.
#[derive(Debug, thiserror::Error)]
pub enum UploadError {
  #[error("upload request failed: {0}")]
  Http(#[from] reqwest::Error),

  #[error("invalid upload endpoint: {0}")]
  Endpoint(#[from] url::ParseError),

  #[error("upload rejected ({status}): {message}")]
  Rejected { status: u16, message: String },

  /// The store accepted the bytes but returned no usable URL.
  #[error("upload succeeded but the response contained no URL")]
  MissingUrl,
}

/// Seam for turning a local file into a publicly fetchable URL.
///
/// The polling core treats this as opaque: it only ever sees the returned
/// URL or the error.
#[async_trait]
pub trait Uploader: Send + Sync {
  async fn upload(&self, file_name: &str, bytes: Vec<u8>) -> Result<String, UploadError>;
}

/// Uploader backed by an HTTP blob store (PUT bytes, bearer token, JSON
/// response carrying the public `url`).
pub struct HttpBlobUploader {
  http: Client,
  endpoint: String,
  token: String,
  /// Pause after a successful upload so the store's CDN can propagate the
  /// object before the provider fetches it.
  propagation_delay: Duration,
}

impl HttpBlobUploader {
  pub fn new(endpoint: impl Into<String>, token: impl Into<String>) -> Self {
    Self {
      http: Client::new(),
      endpoint: endpoint.into(),
      token: token.into(),
      propagation_delay: Duration::from_secs(2),
    }
  }

  pub fn with_propagation_delay(mut self, delay: Duration) -> Self {
    self.propagation_delay = delay;
    self
  }

  fn object_url(&self, file_name: &str) -> Result<Url, UploadError> {
    let base = self.endpoint.trim_end_matches('/');
    let name = unique_object_name(file_name);
    Ok(Url::parse(&format!("{base}/{name}"))?)
  }
}

#[async_trait]
impl Uploader for HttpBlobUploader {
  #[instrument(name = "upload_image", skip(self, bytes), fields(size = bytes.len()))]
  async fn upload(&self, file_name: &str, bytes: Vec<u8>) -> Result<String, UploadError> {
    let url = self.object_url(file_name)?;

    let response = self
      .http
      .put(url)
      .bearer_auth(&self.token)
      .body(bytes)
      .send()
      .await?;

    let status = response.status();
    if !status.is_success() {
      let message = response
        .text()
        .await
        .unwrap_or_else(|_| "no response body".to_string());
      warn!(status = status.as_u16(), "upload rejected");
      return Err(UploadError::Rejected {
        status: status.as_u16(),
        message,
      });
    }

    let body: Value = response.json().await?;
    let public_url = body
      .get("url")
      .and_then(Value::as_str)
      .filter(|s| !s.is_empty())
      .ok_or(UploadError::MissingUrl)?
      .to_string();

    info!(url = %public_url, "upload complete");

    if !self.propagation_delay.is_zero() {
      tokio::time::sleep(self.propagation_delay).await;
    }

    Ok(public_url)
  }
}

/// Sanitize a filename and prefix a random component to avoid collisions.
fn unique_object_name(file_name: &str) -> String {
  let clean: String = file_name
    .chars()
    .map(|c| if c.is_ascii_alphanumeric() || c == '.' { c } else { '_' })
    .collect();
  format!("{}_{}", uuid::Uuid::new_v4().simple(), clean)
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn object_names_are_sanitized() {
    let name = unique_object_name("my photo (1).png");
    assert!(name.ends_with("my_photo__1_.png"));
    assert!(!name.contains(' '));
  }

  #[test]
  fn object_names_are_unique() {
    assert_ne!(unique_object_name("a.png"), unique_object_name("a.png"));
  }

  #[test]
  fn object_url_joins_cleanly() {
    let uploader = HttpBlobUploader::new("https://blobs.example.com/store/", "tok");
    let url = uploader.object_url("cat.png").unwrap();
    assert!(url.as_str().starts_with("https://blobs.example.com/store/"));
    assert!(url.as_str().ends_with("_cat.png"));
  }
}
