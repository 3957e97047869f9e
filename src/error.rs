//! Top-level error types for the taskflow service.

/// Top-level error type for the task-management service.
#[derive(Debug, thiserror::Error)]
pub enum TaskflowError {
    /// Configuration error.
    #[error("config error: {0}")]
    Config(String),

    /// Task store error.
    #[error("store error: {0}")]
    Store(#[from] crate::store::StoreError),

    /// Scheduling advisor error.
    #[error("advisor error: {0}")]
    Advisor(#[from] crate::advisor::AdvisorError),

    /// HTTP server error.
    #[error("server error: {0}")]
    Server(String),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Convenience result type.
pub type Result<T> = std::result::Result<T, TaskflowError>;
