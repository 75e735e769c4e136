//! Per-function results of a run.

use serde::Serialize;
use std::fmt;

use crate::resolve::UpdateTarget;

/// Where a per-function update stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum UpdateStage {
    Bundle,
    Archive,
    Upload,
}

impl fmt::Display for UpdateStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            UpdateStage::Bundle => write!(f, "bundle"),
            UpdateStage::Archive => write!(f, "archive"),
            UpdateStage::Upload => write!(f, "upload"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "lowercase")]
pub enum UpdateOutcome {
    Updated {
        target: UpdateTarget,
        code_sha256: Option<String>,
        last_modified: Option<String>,
    },
    Failed {
        target: UpdateTarget,
        stage: UpdateStage,
        error: String,
    },
}

impl UpdateOutcome {
    pub fn target(&self) -> &UpdateTarget {
        match self {
            UpdateOutcome::Updated { target, .. } | UpdateOutcome::Failed { target, .. } => target,
        }
    }

    pub fn is_updated(&self) -> bool {
        matches!(self, UpdateOutcome::Updated { .. })
    }

    /// `aws logs tail` command following this function's log group.
    pub fn logs_hint(&self) -> String {
        logs_hint(&self.target().physical_id)
    }
}

/// Command that follows the logs of a deployed function.
pub fn logs_hint(physical_id: &str) -> String {
    format!("aws logs tail --follow /aws/lambda/{}", physical_id)
}

/// Everything a run did.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct UpdateReport {
    pub branch: String,
    pub stack_name: Option<String>,
    pub from_cache: bool,
    /// Set when a single function was requested but did not resolve.
    pub unmatched: Option<String>,
    pub outcomes: Vec<UpdateOutcome>,
}

impl UpdateReport {
    pub fn updated(&self) -> impl Iterator<Item = &UpdateOutcome> {
        self.outcomes.iter().filter(|o| o.is_updated())
    }

    pub fn failed(&self) -> impl Iterator<Item = &UpdateOutcome> {
        self.outcomes.iter().filter(|o| !o.is_updated())
    }

    pub fn is_success(&self) -> bool {
        self.unmatched.is_none() && self.outcomes.iter().all(UpdateOutcome::is_updated)
    }
}
