//! CLI-specific error types

use thiserror::Error;

#[derive(Debug, Error)]
pub enum CliError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Service error: {0}")]
    Service(#[from] commongood::ServiceError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl CliError {
    /// Process exit code for this error
    pub fn exit_code(&self) -> i32 {
        match self {
            CliError::Config(_) => 78,
            CliError::Service(commongood::ServiceError::Config(_)) => 78,
            CliError::Service(_) | CliError::Io(_) => 1,
        }
    }
}

pub type CliResult<T> = Result<T, CliError>;
