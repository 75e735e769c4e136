//! AWS error types.

use thiserror::Error;

/// Result type for AWS operations.
pub type Result<T> = std::result::Result<T, AwsError>;

/// AWS service errors.
#[derive(Debug, Error)]
pub enum AwsError {
    /// A service call failed.
    #[error("{operation} failed: {message}")]
    Service {
        operation: &'static str,
        message: String,
    },

    /// The stack exists but listing returned nothing.
    #[error("Did not get any stack resources for {0}")]
    NoStackResources(String),
}

impl AwsError {
    /// Wrap an SDK error, keeping its full source chain in the message.
    pub fn service<E>(operation: &'static str, err: E) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        Self::Service {
            operation,
            message: aws_sdk_lambda::error::DisplayErrorContext(err).to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_service_error_display() {
        let io = std::io::Error::new(std::io::ErrorKind::TimedOut, "connect timed out");
        let err = AwsError::service("UpdateFunctionCode", io);
        let message = err.to_string();
        assert!(message.starts_with("UpdateFunctionCode failed"));
        assert!(message.contains("connect timed out"));
    }

    #[test]
    fn test_no_stack_resources_display() {
        let err = AwsError::NoStackResources("MyStack".to_string());
        assert_eq!(err.to_string(), "Did not get any stack resources for MyStack");
    }
}
