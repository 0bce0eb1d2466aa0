//! Error types for the tracker.

use thiserror::Error;

/// Reasons a delivery candidate is rejected by the reconciliation engine.
///
/// These are computed synchronously and returned as values so callers can
/// branch without exception-style handling. No state mutation occurs when
/// validation fails.
#[derive(Clone, Debug, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("Taka number not found: {0}")]
    TakaNotFound(String),

    #[error("Machine number does not match for taka {taka_number}: expected {expected}, got {got}")]
    MachineMismatch {
        taka_number: String,
        expected: String,
        got: String,
    },

    #[error("Meter does not match for taka {taka_number}: expected {expected}, got {got}")]
    MeterMismatch {
        taka_number: String,
        expected: String,
        got: String,
    },

    #[error("Taka number {0} has already been delivered")]
    AlreadyDelivered(String),

    #[error("Taka number {0} appears more than once in the batch")]
    DuplicateInBatch(String),
}

/// Failures of the opaque image-extraction collaborator.
///
/// `Empty` (the call succeeded but produced no entries) and `Failed` are
/// distinct conditions; both are surfaced to the user with the same
/// guidance (retry with a clearer image).
#[derive(Clone, Debug, Error)]
pub enum ExtractionError {
    #[error("No entries could be extracted from the image")]
    Empty,

    #[error("Extraction failed: {0}")]
    Failed(String),
}

/// Main error type for tracker operations.
#[derive(Debug, Error)]
pub enum TrackerError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Deserialization error: {0}")]
    Deserialization(String),

    #[error("Corruption detected: {0}")]
    Corruption(String),

    #[error("Data directory is locked by another process")]
    Locked,

    #[error("Data directory not initialized")]
    NotInitialized,

    #[error("Invalid entry: {0}")]
    InvalidEntry(String),

    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error("Batch entry {index} rejected: {cause}")]
    BatchValidation {
        index: usize,
        #[source]
        cause: ValidationError,
    },

    #[error(transparent)]
    Extraction(#[from] ExtractionError),

    #[error("Remote schema missing, setup required: {0}")]
    ConnectivitySetup(String),

    #[error("Remote store unreachable: {0}")]
    Connectivity(String),

    #[error("Sync push failed during {operation}: {message}")]
    SyncPush { operation: String, message: String },
}

impl From<serde_json::Error> for TrackerError {
    fn from(e: serde_json::Error) -> Self {
        TrackerError::Serialization(e.to_string())
    }
}

/// Result type for tracker operations.
pub type Result<T> = std::result::Result<T, TrackerError>;
