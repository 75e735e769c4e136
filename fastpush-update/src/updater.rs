//! The update flow: branch guard, cache or synth, resolution, fan-out.

use fastpush_aws::{
    AwsServices, FunctionCodeUpdater, StackResourceLister, list_all_stack_resources,
};
use fastpush_config::FastpushConfig;
use futures::future::join_all;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{error, info, warn};

use crate::archive::zip_bundle;
use crate::branch::{ensure_branch_allowed, resolve_branch};
use crate::bundle::{Bundler, EsbuildBundler};
use crate::cache::{CacheStore, ResourceCache};
use crate::report::{UpdateOutcome, UpdateReport, UpdateStage, logs_hint};
use crate::resolve::{UpdateTarget, resolve_all, resolve_target};
use crate::synth::Synthesizer;
use crate::{Result, UpdateError};

/// Recompiles and pushes function code to an already deployed stack.
///
/// Every collaborator sits behind a trait so the whole flow can run against
/// recording fakes.
pub struct FunctionUpdater {
    synthesizer: Arc<dyn Synthesizer>,
    lister: Arc<dyn StackResourceLister>,
    bundler: Arc<dyn Bundler>,
    uploader: Arc<dyn FunctionCodeUpdater>,
    cache: CacheStore,
    working_dir: PathBuf,
    branch: Option<String>,
    force_master_update: bool,
    refresh: bool,
}

impl FunctionUpdater {
    pub fn new(
        synthesizer: Arc<dyn Synthesizer>,
        lister: Arc<dyn StackResourceLister>,
        bundler: Arc<dyn Bundler>,
        uploader: Arc<dyn FunctionCodeUpdater>,
        cache: CacheStore,
    ) -> Self {
        Self {
            synthesizer,
            lister,
            bundler,
            uploader,
            cache,
            working_dir: PathBuf::from("."),
            branch: None,
            force_master_update: false,
            refresh: false,
        }
    }

    /// Wire the real AWS clients and esbuild from `config`.
    pub fn from_config(
        config: &FastpushConfig,
        services: &AwsServices,
        synthesizer: Arc<dyn Synthesizer>,
        project_dir: &Path,
    ) -> Self {
        let bundler = EsbuildBundler::new(config.bundle.clone(), config.external_modules());
        Self::new(
            synthesizer,
            Arc::new(services.stack_resources()),
            Arc::new(bundler),
            Arc::new(services.code_updater()),
            CacheStore::new(config.cache_dir_in(project_dir)),
        )
        .working_dir(project_dir)
        .branch(config.branch.clone())
        .force_master_update(config.force_master_update)
    }

    /// Directory git is asked about and entry paths are shown relative to.
    pub fn working_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.working_dir = dir.into();
        self
    }

    /// Branch to use instead of asking git.
    pub fn branch(mut self, branch: Option<String>) -> Self {
        self.branch = branch;
        self
    }

    pub fn force_master_update(mut self, force: bool) -> Self {
        self.force_master_update = force;
        self
    }

    /// Ignore an existing cache entry and rebuild it.
    pub fn refresh(mut self, refresh: bool) -> Self {
        self.refresh = refresh;
        self
    }

    pub fn cache(&self) -> &CacheStore {
        &self.cache
    }

    /// Update the function named by `target` (logical or physical id), or
    /// every function with upload info when `target` is `None`.
    ///
    /// Per-function failures are recorded in the report, never returned.
    pub async fn run(&self, target: Option<&str>) -> Result<UpdateReport> {
        let branch = resolve_branch(self.branch.as_deref(), &self.working_dir).await?;
        ensure_branch_allowed(&branch, self.force_master_update)?;

        info!(
            "Using branch {} as a base for your deployment, kill this process if that is not correct",
            branch
        );

        let (resources, stack_name, from_cache) = self.load_resources(&branch).await?;
        let mut report = UpdateReport {
            branch,
            stack_name,
            from_cache,
            ..UpdateReport::default()
        };

        let targets = match target {
            Some(id) => match resolve_target(&resources.stack_resources, &resources.upload_infos, id) {
                Some(target) => vec![target],
                None => {
                    warn!(function = id, "no deployed function with upload info matches, nothing to update");
                    report.unmatched = Some(id.to_string());
                    return Ok(report);
                }
            },
            None => resolve_all(&resources.stack_resources, &resources.upload_infos),
        };

        info!(functions = targets.len(), "updating function code");
        report.outcomes = join_all(targets.into_iter().map(|t| self.update_one(t))).await;
        Ok(report)
    }

    async fn load_resources(&self, branch: &str) -> Result<(ResourceCache, Option<String>, bool)> {
        if !self.refresh {
            if let Some(cache) = self.cache.load(branch) {
                return Ok((cache, None, true));
            }
        }

        let stack = self.synthesizer.synthesize().await?;
        let upload_infos = stack.template.upload_infos();
        let stack_resources = list_all_stack_resources(self.lister.as_ref(), &stack.stack_name)
            .await
            .map_err(UpdateError::from)?;

        let cache = ResourceCache::new(stack_resources, upload_infos);
        if let Err(e) = self.cache.store(branch, &cache) {
            warn!(error = %e, "could not write cache, continuing without it");
        }
        Ok((cache, Some(stack.stack_name), false))
    }

    async fn update_one(&self, target: UpdateTarget) -> UpdateOutcome {
        let bundle = match self
            .bundler
            .bundle(&target.entry_full_path, &target.external_modules)
            .await
        {
            Ok(bundle) => bundle,
            Err(e) => return failed(target, UpdateStage::Bundle, e),
        };

        let zip = match zip_bundle(bundle.dir()) {
            Ok(zip) => zip,
            Err(e) => return failed(target, UpdateStage::Archive, e),
        };

        match self.uploader.update_function_code(&target.physical_id, zip).await {
            Ok(update) => {
                info!(
                    "Lambda updated for {}. Run to follow logs:\n{}",
                    self.display_entry(&target.entry_full_path),
                    logs_hint(&target.physical_id)
                );
                UpdateOutcome::Updated {
                    target,
                    code_sha256: update.code_sha256,
                    last_modified: update.last_modified,
                }
            }
            Err(e) => failed(target, UpdateStage::Upload, e.into()),
        }
    }

    fn display_entry(&self, entry: &Path) -> String {
        let base = std::fs::canonicalize(&self.working_dir).unwrap_or_else(|_| self.working_dir.clone());
        entry
            .strip_prefix(&base)
            .unwrap_or(entry)
            .display()
            .to_string()
    }
}

fn failed(target: UpdateTarget, stage: UpdateStage, e: UpdateError) -> UpdateOutcome {
    error!(
        function = %target.logical_id,
        physical_id = %target.physical_id,
        %stage,
        error = %e,
        "function update failed"
    );
    UpdateOutcome::Failed {
        target,
        stage,
        error: e.to_string(),
    }
}
