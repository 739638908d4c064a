use thiserror::Error;

use crate::models::request::RunStatus;

/// Custom error type for database operations.
#[derive(Error, Debug)]
pub enum DbError {
    /// Error that occurs during database interactions (e.g., SQL query failure).
    #[error("Database error: {0}")]
    Sqlx(#[from] sqlx::Error),
    /// Configuration error (e.g., invalid database URL or missing parameters).
    #[error("Configuration error: {0}")]
    Config(String),
    /// Connection error (e.g., issues with network or database connection).
    #[error("Connection error: {0}")]
    Connection(String),
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),
    /// General error with a custom message.
    #[error("Error: {0}")]
    General(String),
}

/// Failure of a whole schema analysis run.
#[derive(Error, Debug)]
pub enum AnalysisError {
    /// The connection could not be opened or was lost. The caller may retry.
    #[error("Connection failed: {0}")]
    ConnectionFailed(String),
    /// A catalog query failed (permissions, version mismatch).
    #[error("Metadata unavailable: {0}")]
    MetadataUnavailable(String),
    /// No catalog dialect is registered for the engine.
    #[error("Unsupported engine: {0}")]
    UnsupportedEngine(String),
}

impl From<DbError> for AnalysisError {
    fn from(err: DbError) -> Self {
        match err {
            DbError::Connection(msg) => AnalysisError::ConnectionFailed(msg),
            DbError::Sqlx(e) if is_connection_error(&e) => {
                AnalysisError::ConnectionFailed(e.to_string())
            }
            other => AnalysisError::MetadataUnavailable(other.to_string()),
        }
    }
}

fn is_connection_error(err: &sqlx::Error) -> bool {
    matches!(
        err,
        sqlx::Error::Io(_)
            | sqlx::Error::Tls(_)
            | sqlx::Error::PoolTimedOut
            | sqlx::Error::PoolClosed
            | sqlx::Error::WorkerCrashed
    )
}

#[derive(Error, Debug, Clone, PartialEq)]
pub enum GenerationError {
    /// Generation was requested against a schema with zero tables.
    #[error("Schema '{0}' has no tables to generate queries from")]
    EmptySchema(String),
    #[error("Invalid parameters: {0}")]
    InvalidParameters(String),
    /// The consumer of generated queries failed (e.g., output file not writable).
    #[error("Query sink error: {0}")]
    Sink(String),
}

impl From<DbError> for GenerationError {
    fn from(err: DbError) -> Self {
        GenerationError::Sink(err.to_string())
    }
}

#[derive(Error, Debug, Clone, PartialEq)]
pub enum LifecycleError {
    #[error("Invalid status transition from {from:?} to {to:?}")]
    InvalidTransition { from: RunStatus, to: RunStatus },
}
