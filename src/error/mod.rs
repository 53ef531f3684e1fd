//! Error taxonomy.
//!
//! Collaborator failures ([`LangbaseError`], [`StorageError`]) and caller
//! mistakes ([`ToolError`]) abort a pipeline run. Malformed model output is
//! never an error here: agents absorb it into fallback values.
//! [`SchemaError`] stays local to the data-contract constructors.

use thiserror::Error;

/// Errors that end a pipeline run or CLI command.
#[derive(Debug, Error)]
pub enum AppError {
    /// Missing or unusable settings; raised before any stage runs.
    #[error("Configuration error: {message}")]
    Config { message: String },

    /// The report store failed.
    #[error("Report store error: {0}")]
    Storage(#[from] StorageError),

    /// The model collaborator failed.
    #[error("Model call failed: {0}")]
    Langbase(#[from] LangbaseError),

    /// A stage was called with input of the wrong shape.
    #[error("Usage error: {0}")]
    Usage(#[from] ToolError),

    /// A stage payload could not be serialized.
    #[error("Internal error: {message}")]
    Internal { message: String },
}

/// Report store failures.
#[derive(Debug, Error)]
pub enum StorageError {
    /// The database file or pool could not be opened.
    #[error("Cannot open report database: {message}")]
    Connection { message: String },

    /// Embedded schema migrations failed.
    #[error("Report schema migration failed: {message}")]
    Migration { message: String },

    /// A report did not encode or decode as JSON.
    #[error("Report is not valid JSON: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Any other database failure.
    #[error("Database error: {0}")]
    Sqlx(#[from] sqlx::Error),
}

/// Failures talking to Langbase Pipes.
#[derive(Debug, Error)]
pub enum LangbaseError {
    /// Every attempt failed; `retries` counts the attempts made.
    #[error("Pipe unavailable after {retries} attempt(s): {message}")]
    Unavailable { message: String, retries: u32 },

    /// Non-success HTTP status.
    #[error("Langbase returned {status}: {message}")]
    Api { status: u16, message: String },

    /// Success status but an unreadable envelope.
    #[error("Unreadable pipe response: {message}")]
    InvalidResponse { message: String },

    /// The request exceeded the configured timeout.
    #[error("Pipe call timed out after {timeout_ms}ms")]
    Timeout { timeout_ms: u64 },

    /// Transport-level failure.
    #[error("HTTP transport error: {0}")]
    Http(#[from] reqwest::Error),
}

/// Caller contract violations (wrong input shape for a stage).
#[derive(Debug, Error)]
pub enum ToolError {
    /// `field` failed validation for `reason`.
    #[error("Invalid {field}: {reason}")]
    Validation { field: String, reason: String },
}

/// Data-contract violations raised by validated constructors and by
/// deserialization of graphs, mappings and hypotheses.
#[derive(Debug, Error, PartialEq)]
pub enum SchemaError {
    /// Score or confidence outside `[0, 1]`.
    #[error("{field} must be within [0, 1], got {value}")]
    OutOfRange { field: &'static str, value: f64 },

    /// Two nodes of one graph share an id.
    #[error("Duplicate node id in graph: {id}")]
    DuplicateNodeId { id: String },
}

/// Result alias for pipeline and CLI operations.
pub type AppResult<T> = Result<T, AppError>;

/// Result alias for the report store.
pub type StorageResult<T> = Result<T, StorageError>;

/// Result alias for pipe calls.
pub type LangbaseResult<T> = Result<T, LangbaseError>;
