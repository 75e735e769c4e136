//! Error types for the update flow.

use fastpush_aws::AwsError;
use std::path::PathBuf;
use thiserror::Error;

/// Result type for update operations.
pub type Result<T> = std::result::Result<T, UpdateError>;

/// Errors raised by the update flow.
///
/// Only a few of these stop a run; bundle, archive and upload failures are
/// caught per function and end up in the [`UpdateReport`](crate::UpdateReport).
#[derive(Debug, Error)]
pub enum UpdateError {
    /// Updating the protected branch without the override flag.
    #[error(
        "Uploading to {0} is disabled by default. We highly discourage doing so, \
         but if you must, set FORCE_MASTER_UPDATE env variable to true"
    )]
    ProtectedBranch(String),

    /// The current git branch could not be determined.
    #[error("Could not determine the current git branch: {0}")]
    Branch(String),

    /// `cdk synth` failed or produced an unusable cloud assembly.
    #[error("Synth failed: {0}")]
    Synth(String),

    /// A synthesized template could not be read.
    #[error("Invalid template {path}: {message}")]
    Template { path: PathBuf, message: String },

    /// esbuild failed for an entry file.
    #[error("Bundling {entry} failed: {message}")]
    Bundle { entry: PathBuf, message: String },

    /// The bundle could not be zipped.
    #[error("Archive error: {0}")]
    Archive(String),

    /// The cache file could not be written.
    #[error("Cache error at {path}: {message}")]
    Cache { path: PathBuf, message: String },

    /// AWS call failed.
    #[error(transparent)]
    Aws(#[from] AwsError),

    /// IO error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl UpdateError {
    pub(crate) fn bundle(entry: impl Into<PathBuf>, message: impl Into<String>) -> Self {
        Self::Bundle {
            entry: entry.into(),
            message: message.into(),
        }
    }

    pub(crate) fn template(path: impl Into<PathBuf>, message: impl Into<String>) -> Self {
        Self::Template {
            path: path.into(),
            message: message.into(),
        }
    }
}

impl From<zip::result::ZipError> for UpdateError {
    fn from(e: zip::result::ZipError) -> Self {
        UpdateError::Archive(e.to_string())
    }
}
