//! Typed error hierarchy for the ad generation workflow.
//!
//! Validation and not-found errors surface synchronously to the caller.
//! Everything that happens after a run starts executes on the background
//! worker and is written into the run store as a terminal failure instead of
//! being thrown across that boundary.

use thiserror::Error;
use uuid::Uuid;

/// Errors from the workflow subsystem (store, engine, and the API seam).
#[derive(Debug, Error)]
pub enum WorkflowError {
    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Run with ID '{0}' not found")]
    RunNotFound(Uuid),

    #[error("Stage '{stage}' failed: {message}")]
    AdapterFailure { stage: String, message: String },

    #[error("max retries exceeded ({max_retries} attempts)")]
    RetriesExhausted { max_retries: u32 },

    #[error("no actionable strategy returned by critique")]
    NoStrategy,

    #[error("Run {0} is not completed yet")]
    NotCompleted(Uuid),

    #[error("Run store lock poisoned")]
    LockPoisoned,

    #[error("Engine fault: {0}")]
    EngineFault(String),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}
