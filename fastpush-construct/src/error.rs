//! Construct errors.

use std::path::PathBuf;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, ConstructError>;

#[derive(Debug, Error)]
pub enum ConstructError {
    #[error("Only `NODEJS` runtimes are supported, got {0}")]
    UnsupportedRuntime(String),

    #[error("Only JavaScript or TypeScript entry files are supported: {0}")]
    UnsupportedEntry(PathBuf),

    #[error("Cannot find entry file at {0}")]
    EntryNotFound(PathBuf),

    #[error("Unknown lambda: {0}")]
    UnknownLambda(String),

    #[error("Unknown table: {0}")]
    UnknownTable(String),

    #[error("Table {0} was registered without a stream")]
    NoStream(String),

    #[error(transparent)]
    Update(#[from] fastpush_update::UpdateError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}
