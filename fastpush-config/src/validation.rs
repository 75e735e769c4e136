// Configuration validation

use crate::{ConfigError, Result};

/// Trait for validating configuration
pub trait Validate {
    fn validate(&self) -> Result<()>;
}

/// Configuration validator with rules
pub struct ConfigValidator;

impl ConfigValidator {
    /// Validate that a value is not empty
    pub fn not_empty(value: &str, field: &str) -> Result<()> {
        if value.trim().is_empty() {
            return Err(ConfigError::ValidationError(format!(
                "{} cannot be empty",
                field
            )));
        }
        Ok(())
    }

    /// Validate that a command has a program to run
    pub fn command(parts: &[String], field: &str) -> Result<()> {
        match parts.first() {
            Some(program) if !program.trim().is_empty() => Ok(()),
            _ => Err(ConfigError::ValidationError(format!(
                "{} must name a program to run",
                field
            ))),
        }
    }

    /// Validate URL format
    pub fn is_url(value: &str, field: &str) -> Result<()> {
        if !value.starts_with("http://") && !value.starts_with("https://") {
            return Err(ConfigError::ValidationError(format!(
                "{} must be a valid URL",
                field
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_not_empty_validation() {
        assert!(ConfigValidator::not_empty("value", "field").is_ok());
        assert!(ConfigValidator::not_empty("", "field").is_err());
        assert!(ConfigValidator::not_empty("   ", "field").is_err());
    }

    #[test]
    fn test_command_validation() {
        assert!(ConfigValidator::command(&["npx".into(), "esbuild".into()], "cmd").is_ok());
        assert!(ConfigValidator::command(&[], "cmd").is_err());
        assert!(ConfigValidator::command(&[" ".into()], "cmd").is_err());
    }

    #[test]
    fn test_url_validation() {
        assert!(ConfigValidator::is_url("https://example.com", "field").is_ok());
        assert!(ConfigValidator::is_url("http://localhost:4566", "field").is_ok());
        assert!(ConfigValidator::is_url("localhost:4566", "field").is_err());
    }
}
