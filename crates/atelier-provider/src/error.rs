//! Provider error types.

/// Errors that can occur talking to the provider.
#[derive(Debug, thiserror::Error)]
pub enum ProviderError {
  /// Transport-level failure (connect, send, body read, JSON decode).
  #[error("request failed: {0}")]
  Http(#[from] reqwest::Error),

  /// The provider answered with a non-success HTTP status.
  #[error("provider rejected the request ({status}): {message}")]
  Api { status: u16, message: String },

  /// The configured base URL does not parse.
  #[error("invalid provider endpoint: {0}")]
  Endpoint(#[from] url::ParseError),
}
