use std::time::Duration;

use thiserror::Error;

/// Convenience alias for `Result<T, CliError>`.
pub type CliResult<T> = Result<T, CliError>;

/// Top-level error type for the client library.
///
/// Nothing here is retried locally: the wrapped database service owns retry
/// and consistency decisions, so every variant is surfaced as-is.
#[derive(Error, Debug)]
pub enum CliError {
    /// Statement text could not be classified. Raised before execution.
    #[error("invalid statement: {0}")]
    InvalidStatement(String),

    /// Transaction misuse, e.g. COMMIT outside a read-write transaction.
    #[error("{0}")]
    Transaction(String),

    #[error("database error: {0}")]
    Database(#[from] tokio_postgres::Error),

    #[error("admin error: {0}")]
    Admin(String),

    #[error("operation {name} did not complete within {timeout:?}")]
    OperationTimeout { name: String, timeout: Duration },

    #[error("cannot decode column {column} of type {type_name}: {reason}")]
    Decode {
        column: String,
        type_name: String,
        reason: String,
    },

    #[error("config error: {0}")]
    Config(String),

    #[error("credential error: {0}")]
    Credential(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl CliError {
    /// True when the error was raised by local validation rather than by the
    /// remote service.
    pub fn is_user_error(&self) -> bool {
        matches!(
            self,
            CliError::InvalidStatement(_)
                | CliError::Transaction(_)
                | CliError::Config(_)
                | CliError::Credential(_)
        )
    }
}
