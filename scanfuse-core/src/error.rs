//! Error types for scanfuse

use thiserror::Error;

/// Main error type for scanfuse operations
#[derive(Error, Debug)]
pub enum Error {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid data: {0}")]
    InvalidData(String),

    #[error("Algorithm error: {0}")]
    Algorithm(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Descriptor dimension mismatch: expected {expected}, found {found}")]
    DimensionMismatch { expected: usize, found: usize },

    #[error("Correspondence set is empty")]
    EmptyCorrespondenceSet,

    /// A minimal sample that cannot determine a rigid transform.
    /// Only produced inside the sample consensus loop.
    #[error("Degenerate sample")]
    DegenerateSample,

    #[error("Insufficient {what}: need at least {required}, got {found}")]
    InsufficientFrame {
        what: &'static str,
        required: usize,
        found: usize,
    },

    #[error("Fusion worker is no longer running")]
    WorkerStopped,
}

/// Result type alias for scanfuse operations
pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    /// Whether a registration session can keep streaming after this error.
    ///
    /// Structural problems with a single frame pair are recoverable; the
    /// session skips registration for that pair and keeps merging.
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            Error::DimensionMismatch { .. } | Error::EmptyCorrespondenceSet | Error::DegenerateSample
        )
    }
}
