//! Atelier Runtime
//!
//! The polling and reconciliation core. A [`Session`] owns the live task
//! view, the history log, and a [`Watcher`] that polls the provider on a
//! fixed cadence; each status payload is normalized and applied through the
//! [`Reconciler`], which keeps the live view and the history convergent
//! across overlapping or late-arriving checks.

mod error;
mod reconciler;
mod session;
mod watcher;

pub use error::SessionError;
pub use reconciler::Reconciler;
pub use session::Session;
pub use watcher::{WatchConfig, Watcher};
