//! Atelier Provider
//!
//! HTTP client for the remote image-generation API, and the pure response
//! normalizer that turns its heterogeneous payloads into a closed
//! [`JobOutcome`] variant.
//!
//! The provider's response shape has drifted across its own revisions, so
//! the normalizer carries a layered fallback chain that tolerates every
//! observed variant at once. All of that logic is pure functions over
//! `serde_json::Value`, testable without any network.

mod client;
mod error;
mod response;

pub use client::{CreateTaskRequest, JobService, ProviderClient, ProviderConfig};
pub use error::ProviderError;
pub use response::{
  FailureKind, JobOutcome, extract_error_message, extract_task_id, normalize,
};
