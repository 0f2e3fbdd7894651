// ❌ Error taxonomy for a reconciliation run
//
// Fatal variants abort the whole run before anything is written.
// DivisionNotFound and UnmatchedAnnotation are recovered inside the
// pipeline and only ever surface through the quality report.

use thiserror::Error;

use crate::entities::DivisionId;

/// Result type for pipeline operations
pub type Result<T> = std::result::Result<T, PipelineError>;

#[derive(Error, Debug)]
pub enum PipelineError {
    /// Malformed division id list (rejected before any retrieval)
    #[error("Invalid input: {0}")]
    InputValidation(String),

    /// Retrieval of roster, division or annotation data failed
    #[error("Failed to fetch {what}: {reason}")]
    FetchFailure { what: String, reason: String },

    /// A required field is missing or has the wrong shape
    #[error("Schema mismatch in {what}: field '{field}'")]
    SchemaMismatch { what: String, field: String },

    /// The source returned nothing for a requested division
    #[error("Division {0} returned no data")]
    DivisionNotFound(DivisionId),

    /// An annotation row references a division that was not requested
    #[error("Annotation for division {0} does not match any requested division")]
    UnmatchedAnnotation(DivisionId),

    /// Aggregates that cannot be true for well-formed input
    #[error("Data integrity fault: {0}")]
    DataIntegrity(String),

    /// Configuration loading or validation error
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl PipelineError {
    pub fn fetch(what: impl Into<String>, reason: impl std::fmt::Display) -> Self {
        PipelineError::FetchFailure {
            what: what.into(),
            reason: reason.to_string(),
        }
    }

    pub fn schema(what: impl Into<String>, field: impl Into<String>) -> Self {
        PipelineError::SchemaMismatch {
            what: what.into(),
            field: field.into(),
        }
    }

    /// Recoverable errors degrade a single division or row; everything else
    /// aborts the run.
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            PipelineError::DivisionNotFound(_) | PipelineError::UnmatchedAnnotation(_)
        )
    }
}
