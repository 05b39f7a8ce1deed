//! Error types for Surebook

use thiserror::Error;

use crate::validate::ValidationError;

/// Result type alias using Surebook's Error
pub type Result<T> = std::result::Result<T, Error>;

/// Surebook error types with messages suitable for direct display
#[derive(Error, Debug)]
pub enum Error {
    // Key material errors
    #[error("Encryption key must decode to exactly 32 bytes")]
    KeyFormat,

    #[error("Encryption failed")]
    Encryption,

    #[error("Decryption failed (invalid key, truncated, or corrupted data)")]
    Decryption,

    #[error("Required environment variable is missing: {0}")]
    Environment(String),

    #[error(
        "Runtime key file is missing while a database file exists. \
         Restore the key file or set the key environment variables."
    )]
    KeyFileMissing,

    // Domain errors
    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error("A customer with this resident id already exists")]
    DuplicateResidentId,

    #[error("An insurance with this policy number already exists")]
    DuplicatePolicyNumber,

    #[error("Customer has active insurance contracts and cannot be deleted")]
    ActiveDependencyExists,

    #[error("Another active customer already holds this resident id")]
    RestoreConflict,

    #[error("{0} not found")]
    NotFound(&'static str),

    // Infrastructure errors
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("CSV header missing: {0}")]
    CsvHeader(String),

    #[error("Serialization error: {0}")]
    Serde(#[from] serde_json::Error),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}
