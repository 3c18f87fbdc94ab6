//! Atelier History
//!
//! This crate provides the persistence seam and the task history log.
//!
//! The [`BlobStore`] trait is a synchronous single-slot key/value store
//! (one JSON string per key) with file-backed and in-memory
//! implementations. [`HistoryLog`] builds the capped, most-recent-first,
//! task-id-addressable log on top of it.

mod blob;
mod log;
mod types;

pub use blob::{BlobStore, FsBlobStore, InMemoryBlobStore};
pub use log::{HISTORY_CAP, HISTORY_KEY, HistoryLog};
pub use types::{HistoryEntry, HistoryPatch};
