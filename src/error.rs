use thiserror::Error;

/// Main error type for the application.
#[derive(Error, Debug)]
pub enum AppError {
    /// Resource not found error.
    #[error("Not found: {0}")]
    NotFound(String),

    /// Rejected input (bad email, unknown status, duplicate account).
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Authentication failure. Carries a user-facing message only.
    #[error("{0}")]
    Auth(String),

    /// No signed-in user for an operation that needs one.
    #[error("Not signed in")]
    Unauthenticated,

    /// I/O error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// HTTP client error.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Configuration error.
    #[error("Configuration error: {0}")]
    Config(String),

    /// Internal error.
    #[error("Internal error: {0}")]
    Internal(String),
}

/// Result type alias for the application.
pub type Result<T> = std::result::Result<T, AppError>;
