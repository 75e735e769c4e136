//! `fastpush cache show` and `fastpush cache clear`.

use colored::Colorize;
use fastpush_update::{CacheStore, resolve_branch, resolve_target};

use super::load_project;
use crate::error::CliResult;
use crate::{info, success, warn};

async fn store_and_branch(branch: Option<String>) -> CliResult<(CacheStore, String)> {
    let (project_dir, config) = load_project()?;
    let store = CacheStore::new(config.cache_dir_in(&project_dir));
    let branch = resolve_branch(branch.or(config.branch).as_deref(), &project_dir).await?;
    Ok((store, branch))
}

/// Print what the branch cache holds.
pub async fn show(branch: Option<String>) -> CliResult<()> {
    let (store, branch) = store_and_branch(branch).await?;
    let path = store.path_for(&branch);

    let Some(cache) = store.load(&branch) else {
        warn(&format!("No cache for branch {}", branch.cyan()));
        let others = store.branches();
        if !others.is_empty() {
            info(&format!("Cached branches: {}", others.join(", ")));
        }
        return Ok(());
    };

    println!();
    info(&path.display().to_string().dimmed().to_string());
    info(&format!(
        "{} stack resources, {} upload infos",
        cache.stack_resources.len(),
        cache.upload_infos.len()
    ));
    println!();

    for (_, upload) in &cache.upload_infos {
        let physical = resolve_target(
            &cache.stack_resources,
            &cache.upload_infos,
            &upload.function_name,
        )
        .map(|target| target.physical_id)
        .unwrap_or_else(|| "not deployed".to_string());

        println!(
            "  {:<32} {:<48} {}",
            upload.function_name.bold(),
            physical.cyan(),
            upload.entry_full_path.display().to_string().dimmed()
        );
    }
    Ok(())
}

/// Delete one branch's cache, or every cache with `all`.
pub async fn clear(branch: Option<String>, all: bool) -> CliResult<()> {
    if all {
        let (project_dir, config) = load_project()?;
        let store = CacheStore::new(config.cache_dir_in(&project_dir));
        let removed = store.clear_all()?;
        success(&format!("Removed {} cache file(s)", removed));
        return Ok(());
    }

    let (store, branch) = store_and_branch(branch).await?;
    if store.clear(&branch)? {
        success(&format!("Cleared cache for branch {}", branch.cyan()));
    } else {
        warn(&format!("No cache for branch {}", branch.cyan()));
    }
    Ok(())
}
