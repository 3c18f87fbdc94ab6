//! Atelier Config
//!
//! Settings for the provider connection, the upload store, and polling
//! cadence. Every default is an explicit, documented constant here at the
//! boundary; nothing in the core logic carries an embedded credential or
//! endpoint. The API key deliberately has no default.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

/// Filename of the settings file inside the data directory.
pub const SETTINGS_FILE: &str = "settings.json";

/// Default jobs API base URL.
pub const DEFAULT_BASE_URL: &str = "https://api.kie.ai/api/v1/jobs";

/// Default model requested for generation jobs.
pub const DEFAULT_MODEL: &str = "nano-banana-pro";

/// Default polling cadence, in seconds.
pub const DEFAULT_POLL_INTERVAL_SECS: u64 = 5;

/// Default delay before the first status check, giving the remote system
/// time to register the job. Milliseconds.
pub const DEFAULT_INITIAL_DELAY_MS: u64 = 1_000;

/// Default pause after an upload for CDN propagation. Milliseconds.
pub const DEFAULT_PROPAGATION_DELAY_MS: u64 = 2_000;

/// Errors that can occur loading settings.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
  #[error("failed to read settings file {path}: {source}")]
  Io {
    path: String,
    #[source]
    source: std::io::Error,
  },

  #[error("failed to parse settings file {path}: {source}")]
  Parse {
    path: String,
    #[source]
    source: serde_json::Error,
  },
}

/// Provider connection settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ProviderSettings {
  pub base_url: String,
  /// Bearer token for the jobs API. Empty means unconfigured; submission
  /// fails fast without one.
  pub api_key: String,
  pub model: String,
}

impl Default for ProviderSettings {
  fn default() -> Self {
    Self {
      base_url: DEFAULT_BASE_URL.to_string(),
      api_key: String::new(),
      model: DEFAULT_MODEL.to_string(),
    }
  }
}

/// Upload store settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct UploadSettings {
  /// HTTP blob store endpoint. Empty means file inputs are unavailable.
  pub endpoint: String,
  pub token: String,
  pub propagation_delay_ms: u64,
}

impl Default for UploadSettings {
  fn default() -> Self {
    Self {
      endpoint: String::new(),
      token: String::new(),
      propagation_delay_ms: DEFAULT_PROPAGATION_DELAY_MS,
    }
  }
}

/// Full application settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
  pub provider: ProviderSettings,
  pub upload: UploadSettings,
  pub poll_interval_secs: u64,
  pub initial_delay_ms: u64,
}

impl Default for Settings {
  fn default() -> Self {
    Self {
      provider: ProviderSettings::default(),
      upload: UploadSettings::default(),
      poll_interval_secs: DEFAULT_POLL_INTERVAL_SECS,
      initial_delay_ms: DEFAULT_INITIAL_DELAY_MS,
    }
  }
}

impl Settings {
  /// Load settings from the given file; a missing file yields defaults.
  pub fn load(path: &Path) -> Result<Self, ConfigError> {
    let raw = match std::fs::read_to_string(path) {
      Ok(raw) => raw,
      Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Self::default()),
      Err(e) => {
        return Err(ConfigError::Io {
          path: path.display().to_string(),
          source: e,
        });
      }
    };
    serde_json::from_str(&raw).map_err(|e| ConfigError::Parse {
      path: path.display().to_string(),
      source: e,
    })
  }

  /// Apply environment variable overrides (`ATELIER_API_KEY`,
  /// `ATELIER_BASE_URL`, `ATELIER_MODEL`, `ATELIER_UPLOAD_ENDPOINT`,
  /// `ATELIER_UPLOAD_TOKEN`).
  pub fn apply_env(&mut self) {
    self.apply_overrides(|key| std::env::var(key).ok());
  }

  /// Apply overrides from an arbitrary lookup; how `apply_env` is tested
  /// without mutating process environment.
  pub fn apply_overrides(&mut self, get: impl Fn(&str) -> Option<String>) {
    if let Some(v) = get("ATELIER_API_KEY") {
      self.provider.api_key = v;
    }
    if let Some(v) = get("ATELIER_BASE_URL") {
      self.provider.base_url = v;
    }
    if let Some(v) = get("ATELIER_MODEL") {
      self.provider.model = v;
    }
    if let Some(v) = get("ATELIER_UPLOAD_ENDPOINT") {
      self.upload.endpoint = v;
    }
    if let Some(v) = get("ATELIER_UPLOAD_TOKEN") {
      self.upload.token = v;
    }
  }
}

/// Default data directory (`~/.atelier`), falling back to a relative
/// `.atelier` when no home directory can be determined.
pub fn default_data_dir() -> PathBuf {
  dirs::home_dir()
    .map(|home| home.join(".atelier"))
    .unwrap_or_else(|| PathBuf::from(".atelier"))
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn missing_file_yields_defaults() {
    let dir = tempfile::tempdir().expect("failed to create temp dir");
    let settings = Settings::load(&dir.path().join(SETTINGS_FILE)).unwrap();
    assert_eq!(settings.provider.base_url, DEFAULT_BASE_URL);
    assert_eq!(settings.provider.api_key, "");
    assert_eq!(settings.poll_interval_secs, DEFAULT_POLL_INTERVAL_SECS);
  }

  #[test]
  fn partial_file_falls_back_per_field() {
    let dir = tempfile::tempdir().expect("failed to create temp dir");
    let path = dir.path().join(SETTINGS_FILE);
    std::fs::write(&path, r#"{"provider": {"api_key": "k-123"}}"#).unwrap();

    let settings = Settings::load(&path).unwrap();
    assert_eq!(settings.provider.api_key, "k-123");
    assert_eq!(settings.provider.model, DEFAULT_MODEL);
    assert_eq!(settings.initial_delay_ms, DEFAULT_INITIAL_DELAY_MS);
  }

  #[test]
  fn malformed_file_is_an_error() {
    let dir = tempfile::tempdir().expect("failed to create temp dir");
    let path = dir.path().join(SETTINGS_FILE);
    std::fs::write(&path, "{ nope").unwrap();

    assert!(matches!(
      Settings::load(&path),
      Err(ConfigError::Parse { .. })
    ));
  }

  #[test]
  fn overrides_replace_only_what_they_name() {
    let mut settings = Settings::default();
    settings.apply_overrides(|key| match key {
      "ATELIER_API_KEY" => Some("env-key".to_string()),
      "ATELIER_UPLOAD_ENDPOINT" => Some("https://blobs.example.com".to_string()),
      _ => None,
    });

    assert_eq!(settings.provider.api_key, "env-key");
    assert_eq!(settings.upload.endpoint, "https://blobs.example.com");
    assert_eq!(settings.provider.base_url, DEFAULT_BASE_URL);
  }
}
