//! Error types for the fastpush CLI.

use std::fmt;

/// Result type for CLI operations.
pub type CliResult<T> = Result<T, CliError>;

/// CLI error types.
#[derive(Debug)]
pub enum CliError {
    /// IO error (working directory, output)
    Io(std::io::Error),

    /// Configuration could not be loaded or is invalid
    Config(fastpush_config::ConfigError),

    /// The update flow stopped
    Update(fastpush_update::UpdateError),

    /// AWS setup failed
    Aws(fastpush_aws::AwsError),

    /// Invalid argument combination
    InvalidArgument(String),
}

impl fmt::Display for CliError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CliError::Io(e) => write!(f, "IO error: {}", e),
            CliError::Config(e) => write!(f, "Configuration error: {}", e),
            CliError::Update(e) => write!(f, "{}", e),
            CliError::Aws(e) => write!(f, "{}", e),
            CliError::InvalidArgument(msg) => write!(f, "Invalid argument: {}", msg),
        }
    }
}

impl std::error::Error for CliError {}

impl From<std::io::Error> for CliError {
    fn from(e: std::io::Error) -> Self {
        CliError::Io(e)
    }
}

impl From<fastpush_config::ConfigError> for CliError {
    fn from(e: fastpush_config::ConfigError) -> Self {
        CliError::Config(e)
    }
}

impl From<fastpush_update::UpdateError> for CliError {
    fn from(e: fastpush_update::UpdateError) -> Self {
        CliError::Update(e)
    }
}

impl From<fastpush_aws::AwsError> for CliError {
    fn from(e: fastpush_aws::AwsError) -> Self {
        CliError::Aws(e)
    }
}
