//! Error taxonomy shared across the crate
//!
//! Errors are classified by kind (what went wrong) rather than by transport.
//! The CLI maps kinds to process exit codes; the MCP surface maps them to
//! tool results. Every user-facing message names the offending identifier
//! (path, endpoint, collection) and, where it helps, a remediation hint.

use thiserror::Error;

/// Process exit codes for the CLI surface.
#[repr(i32)]
pub enum ExitCode {
    Success = 0,
    UserError = 1,
    ConfigError = 2,
    StorageError = 3,
    NetworkError = 4,
    FileError = 5,
}

/// Unified error for all engine operations.
#[derive(Debug, Error)]
pub enum AppError {
    /// Missing or malformed configuration (environment, data dir).
    #[error("Config error: {0}")]
    Config(String),

    /// Metadata store open/read/write failure.
    #[error("Storage error: {0}")]
    Storage(String),

    /// Vector store HTTP failure or dimension mismatch.
    #[error("Vector store error ({endpoint}): {message}")]
    Vector { endpoint: String, message: String },

    /// Embedding provider HTTP/auth/shape failure.
    #[error("Embedding error ({provider}): {message}")]
    Embedding { provider: String, message: String },

    /// Per-file read/decode/chunk-range failure.
    #[error("File error ({path}): {message}")]
    FileProcessing { path: String, message: String },

    /// File not indexed, workspace name unknown.
    #[error("Not found: {0}")]
    NotFound(String),

    /// Malformed arguments, unconfirmed destructive operation.
    #[error("Invalid input: {0}")]
    UserInput(String),
}

pub type Result<T> = std::result::Result<T, AppError>;

impl AppError {
    pub fn vector(endpoint: impl Into<String>, message: impl Into<String>) -> Self {
        AppError::Vector {
            endpoint: endpoint.into(),
            message: message.into(),
        }
    }

    pub fn embedding(provider: impl Into<String>, message: impl Into<String>) -> Self {
        AppError::Embedding {
            provider: provider.into(),
            message: message.into(),
        }
    }

    pub fn file(path: impl Into<String>, message: impl Into<String>) -> Self {
        AppError::FileProcessing {
            path: path.into(),
            message: message.into(),
        }
    }

    /// Exit code for the CLI surface.
    ///
    /// Per-file errors during `index` are summarized, not raised, so a
    /// `FileProcessing` that reaches the top level means the requested file
    /// itself could not be served.
    pub fn exit_code(&self) -> i32 {
        match self {
            AppError::Config(_) => ExitCode::ConfigError as i32,
            AppError::Storage(_) => ExitCode::StorageError as i32,
            AppError::Vector { .. } | AppError::Embedding { .. } => ExitCode::NetworkError as i32,
            AppError::FileProcessing { .. } => ExitCode::FileError as i32,
            AppError::NotFound(_) | AppError::UserInput(_) => ExitCode::UserError as i32,
        }
    }
}

impl From<sqlx::Error> for AppError {
    fn from(e: sqlx::Error) -> Self {
        AppError::Storage(e.to_string())
    }
}
