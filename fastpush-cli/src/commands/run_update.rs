//! `fastpush run-update`.

use colored::Colorize;
use fastpush_aws::{AwsConfig, AwsServices};
use fastpush_update::{
    CdkSynthesizer, FunctionUpdater, Synthesizer, TemplateFileSynthesizer, UpdateOutcome,
    UpdateReport, ensure_branch_allowed, resolve_branch,
};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;

use super::load_project;
use crate::error::{CliError, CliResult};
use crate::{failure, info, success, warn};

pub struct RunUpdateOptions {
    pub stack: PathBuf,
    pub function_id: Option<String>,
    pub template: Option<PathBuf>,
    pub stack_name: Option<String>,
    pub branch: Option<String>,
    pub refresh: bool,
    pub region: Option<String>,
    pub profile: Option<String>,
}

pub async fn run(options: RunUpdateOptions) -> CliResult<()> {
    let (project_dir, mut config) = load_project()?;

    if options.branch.is_some() {
        config.branch = options.branch;
    }
    if options.region.is_some() {
        config.aws.region = options.region;
    }
    if options.profile.is_some() {
        config.aws.profile = options.profile;
    }

    // Refuse before any AWS configuration is loaded.
    let branch = resolve_branch(config.branch.as_deref(), &project_dir).await?;
    ensure_branch_allowed(&branch, config.force_master_update)?;

    let synthesizer: Arc<dyn Synthesizer> = match options.template {
        Some(template) => {
            let stack_name = options.stack_name.ok_or_else(|| {
                CliError::InvalidArgument("--stack-name is required with --template".to_string())
            })?;
            Arc::new(TemplateFileSynthesizer::new(template, stack_name))
        }
        None => {
            let mut synth =
                CdkSynthesizer::new(&options.stack, &project_dir).settings(config.synth.clone());
            if let Some(name) = options.stack_name {
                synth = synth.stack_name(name);
            }
            Arc::new(synth)
        }
    };

    let services = AwsServices::new(AwsConfig::from_settings(&config.aws)).await?;
    let updater = FunctionUpdater::from_config(&config, &services, synthesizer, &project_dir)
        .branch(Some(branch))
        .refresh(options.refresh);

    let start = Instant::now();
    let report = updater.run(options.function_id.as_deref()).await?;
    print_report(&report, start.elapsed().as_secs_f64());
    Ok(())
}

fn print_report(report: &UpdateReport, seconds: f64) {
    println!();
    info(&format!(
        "Branch {}{}",
        report.branch.cyan(),
        if report.from_cache {
            " (cached stack resources)".dimmed().to_string()
        } else {
            String::new()
        }
    ));

    if let Some(id) = &report.unmatched {
        warn(&format!(
            "No deployed function with upload info matches {}",
            id.bold()
        ));
        return;
    }

    if report.outcomes.is_empty() {
        warn("No functions with upload info found in this stack");
        return;
    }

    for outcome in &report.outcomes {
        let target = outcome.target();
        match outcome {
            UpdateOutcome::Updated { .. } => {
                success(&format!("{} ({})", target.logical_id, target.physical_id));
                info(&format!("Follow logs: {}", outcome.logs_hint().dimmed()));
            }
            UpdateOutcome::Failed { stage, error: message, .. } => {
                failure(&format!(
                    "{} ({}) failed at {}: {}",
                    target.logical_id, target.physical_id, stage, message
                ));
            }
        }
    }

    println!();
    let failed = report.failed().count();
    let summary = format!(
        "{} updated, {} failed in {:.2}s",
        report.updated().count(),
        failed,
        seconds
    );
    if failed == 0 {
        success(&summary);
    } else {
        warn(&summary);
    }
}
