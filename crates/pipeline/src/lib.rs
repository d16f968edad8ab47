//! Generation orchestration and history access.
//!
//! - [`Orchestrator`] drives extraction then generation for one identity at
//!   a time and hands the result to a detached persistence task.
//! - [`HistoryAccessor`] serves the owner-scoped history operations: list,
//!   edit, delete, share, export.

pub mod attempts;
pub mod error;
pub mod history;
pub mod orchestrator;

#[cfg(test)]
mod testing;

pub use attempts::{AttemptGuard, AttemptRegistry};
pub use error::{GenerationError, PersistError};
pub use history::{Download, HistoryAccessor};
pub use orchestrator::{GenerationOutcome, GenerationRequest, Orchestrator, UploadedPhoto};
