//! CLI command implementations.

pub mod cache;
pub mod inspect;
pub mod run_update;

use fastpush_config::FastpushConfig;
use std::path::PathBuf;

use crate::error::CliResult;

/// Project directory and its layered configuration.
pub(crate) fn load_project() -> CliResult<(PathBuf, FastpushConfig)> {
    let project_dir = std::env::current_dir()?;
    let config = FastpushConfig::load(&project_dir)?;
    Ok((project_dir, config))
}
