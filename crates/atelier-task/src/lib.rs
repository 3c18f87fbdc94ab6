//! Atelier Task
//!
//! Core data model for remote image-generation tasks: the task state
//! machine, the generation request snapshot, and the live task view the
//! rest of the system reads and reconciles against.

mod config;
mod state;
mod view;

pub use config::{
  AspectRatio, GenerationConfig, ImageInput, InvalidValueError, OutputFormat, Resolution,
};
pub use state::TaskState;
pub use view::TaskView;
