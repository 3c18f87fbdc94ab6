//! Provider HTTP client.

use async_trait::async_trait;
use reqwest::Client;
use serde_json::{Value, json};
use tracing::{debug, instrument};
use url::Url;

use atelier_task::{AspectRatio, OutputFormat, Resolution};

use crate::error::ProviderError;

/// Connection settings for the provider.
#[derive(Debug, Clone)]
pub struct ProviderConfig {
  /// Base URL of the jobs API, e.g. `https://api.kie.ai/api/v1/jobs`.
  pub base_url: String,
  /// Bearer token for the jobs API.
  pub api_key: String,
  /// Model name sent with every creation request.
  pub model: String,
}

/// A fully resolved creation request: the prompt, the generation
/// parameters, and input images already uploaded to public URLs.
#[derive(Debug, Clone, PartialEq)]
pub struct CreateTaskRequest {
  pub prompt: String,
  pub aspect_ratio: AspectRatio,
  pub resolution: Resolution,
  pub output_format: OutputFormat,
  pub image_urls: Vec<String>,
}

/// Seam between the polling core and the remote jobs API.
///
/// Both calls return the raw payload untouched; id extraction and status
/// normalization live in [`crate::response`] so they stay testable without
/// a network.
#[async_trait]
pub trait JobService: Send + Sync {
  /// Create a remote generation job.
  async fn create_task(&self, request: &CreateTaskRequest) -> Result<Value, ProviderError>;

  /// Fetch the current status payload for a job.
  async fn job_info(&self, task_id: &str) -> Result<Value, ProviderError>;
}

/// reqwest-backed [`JobService`] implementation.
pub struct ProviderClient {
  http: Client,
  config: ProviderConfig,
}

impl ProviderClient {
  pub fn new(config: ProviderConfig) -> Self {
    Self {
      http: Client::new(),
      config,
    }
  }

  fn endpoint(&self, path: &str) -> Result<Url, ProviderError> {
    let base = self.config.base_url.trim_end_matches('/');
    Ok(Url::parse(&format!("{base}/{path}"))?)
  }
}

#[async_trait]
impl JobService for ProviderClient {
  #[instrument(name = "create_task", skip(self, request), fields(model = %self.config.model))]
  async fn create_task(&self, request: &CreateTaskRequest) -> Result<Value, ProviderError> {
    let mut input = json!({
      "prompt": request.prompt,
      "aspect_ratio": request.aspect_ratio,
      "resolution": request.resolution,
      "output_format": request.output_format,
    });
    if !request.image_urls.is_empty() {
      input["image_input"] = json!(request.image_urls);
    }
    let payload = json!({
      "model": self.config.model,
      "input": input,
    });

    let response = self
      .http
      .post(self.endpoint("createTask")?)
      .bearer_auth(&self.config.api_key)
      .json(&payload)
      .send()
      .await?;

    let status = response.status();
    if !status.is_success() {
      let body: Value = response.json().await.unwrap_or(Value::Null);
      let message = crate::response::extract_error_message(&body)
        .unwrap_or_else(|| "failed to create task".to_string());
      return Err(ProviderError::Api {
        status: status.as_u16(),
        message,
      });
    }

    let body: Value = response.json().await?;
    debug!(body = %body, "task created");
    Ok(body)
  }

  #[instrument(name = "job_info", skip(self))]
  async fn job_info(&self, task_id: &str) -> Result<Value, ProviderError> {
    let response = self
      .http
      .get(self.endpoint("recordInfo")?)
      .query(&[("id", task_id)])
      .bearer_auth(&self.config.api_key)
      .send()
      .await?;

    let status = response.status();
    if !status.is_success() {
      return Err(ProviderError::Api {
        status: status.as_u16(),
        message: "failed to fetch job info".to_string(),
      });
    }

    Ok(response.json().await?)
  }
}
