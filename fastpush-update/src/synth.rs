//! Stack synthesis.
//!
//! Synthesis is delegated to the CDK toolkit; this module only runs it and
//! reads the resulting cloud assembly.

use async_trait::async_trait;
use fastpush_config::SynthSettings;
use serde::Deserialize;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use tokio::process::Command;
use tracing::{debug, info};

use crate::template::{SynthesizedStack, Template};
use crate::{Result, UpdateError};

const STACK_ARTIFACT_TYPE: &str = "aws:cloudformation:stack";

/// Produces the template and name of the stack to update.
#[async_trait]
pub trait Synthesizer: Send + Sync {
    async fn synthesize(&self) -> Result<SynthesizedStack>;
}

/// Reads an already synthesized template.
#[derive(Debug, Clone)]
pub struct TemplateFileSynthesizer {
    path: PathBuf,
    stack_name: String,
}

impl TemplateFileSynthesizer {
    pub fn new(path: impl Into<PathBuf>, stack_name: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            stack_name: stack_name.into(),
        }
    }
}

#[async_trait]
impl Synthesizer for TemplateFileSynthesizer {
    async fn synthesize(&self) -> Result<SynthesizedStack> {
        Ok(SynthesizedStack {
            stack_name: self.stack_name.clone(),
            template: Template::from_file(&self.path)?,
        })
    }
}

/// Runs `cdk synth` for a stack entry file.
#[derive(Debug, Clone)]
pub struct CdkSynthesizer {
    stack_path: PathBuf,
    stack_name: Option<String>,
    working_dir: PathBuf,
    settings: SynthSettings,
}

impl CdkSynthesizer {
    pub fn new(stack_path: impl Into<PathBuf>, working_dir: impl Into<PathBuf>) -> Self {
        Self {
            stack_path: stack_path.into(),
            stack_name: None,
            working_dir: working_dir.into(),
            settings: SynthSettings::default(),
        }
    }

    /// Pick this stack when the app defines several.
    pub fn stack_name(mut self, name: impl Into<String>) -> Self {
        self.stack_name = Some(name.into());
        self
    }

    pub fn settings(mut self, settings: SynthSettings) -> Self {
        self.settings = settings;
        self
    }

    /// The `--app` argument handed to the toolkit.
    pub fn app_command(&self) -> String {
        format!(
            "{} \"{}\"",
            self.settings.app_command,
            self.working_dir.join(&self.stack_path).display()
        )
    }
}

#[async_trait]
impl Synthesizer for CdkSynthesizer {
    async fn synthesize(&self) -> Result<SynthesizedStack> {
        let (program, args) = self
            .settings
            .cdk_command
            .split_first()
            .ok_or_else(|| UpdateError::Synth("empty cdk command".to_string()))?;

        let assembly = tempfile::Builder::new().prefix("fastpush-synth").tempdir()?;
        let app = self.app_command();

        info!(app = %app, "synthesizing stack");

        let output = Command::new(program)
            .args(args)
            .arg("synth")
            .arg("--app")
            .arg(&app)
            .arg("--output")
            .arg(assembly.path())
            .arg("--quiet")
            .current_dir(&self.working_dir)
            .env("NODE_ENV", &self.settings.node_env)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .output()
            .await
            .map_err(|e| UpdateError::Synth(format!("failed to run {}: {}", program, e)))?;

        if !output.status.success() {
            return Err(UpdateError::Synth(format!(
                "{} exited with {}: {}",
                program,
                output.status,
                String::from_utf8_lossy(&output.stderr).trim()
            )));
        }

        read_cloud_assembly(assembly.path(), self.stack_name.as_deref())
    }
}

#[derive(Debug, Deserialize)]
struct AssemblyManifest {
    #[serde(default)]
    artifacts: BTreeMap<String, Artifact>,
}

#[derive(Debug, Deserialize)]
struct Artifact {
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    properties: ArtifactProperties,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ArtifactProperties {
    template_file: Option<String>,
    stack_name: Option<String>,
}

/// Load the stack template from a cloud assembly directory.
///
/// With `wanted` set, the stack whose artifact id or stack name matches is
/// used; otherwise the assembly must contain exactly one stack.
pub fn read_cloud_assembly(dir: &Path, wanted: Option<&str>) -> Result<SynthesizedStack> {
    let manifest_path = dir.join("manifest.json");
    let content = std::fs::read_to_string(&manifest_path)
        .map_err(|e| UpdateError::Synth(format!("{}: {}", manifest_path.display(), e)))?;
    let manifest: AssemblyManifest = serde_json::from_str(&content)
        .map_err(|e| UpdateError::Synth(format!("{}: {}", manifest_path.display(), e)))?;

    let stacks: Vec<(String, ArtifactProperties)> = manifest
        .artifacts
        .into_iter()
        .filter(|(_, artifact)| artifact.kind == STACK_ARTIFACT_TYPE)
        .map(|(id, artifact)| {
            let mut properties = artifact.properties;
            properties.stack_name.get_or_insert_with(|| id.clone());
            (id, properties)
        })
        .collect();

    let names: Vec<&str> = stacks
        .iter()
        .filter_map(|(_, p)| p.stack_name.as_deref())
        .collect();

    let selected = match wanted {
        Some(name) => stacks
            .iter()
            .find(|(id, p)| id == name || p.stack_name.as_deref() == Some(name)),
        None if stacks.len() == 1 => stacks.first(),
        None => None,
    };

    let Some((id, properties)) = selected else {
        return Err(UpdateError::Synth(match wanted {
            Some(name) => format!("stack {} not found; assembly has [{}]", name, names.join(", ")),
            None => format!(
                "expected one stack, assembly has [{}]; pass --stack-name",
                names.join(", ")
            ),
        }));
    };

    let template_file = properties
        .template_file
        .clone()
        .unwrap_or_else(|| format!("{}.template.json", id));
    let stack_name = properties.stack_name.clone().unwrap_or_else(|| id.clone());

    debug!(stack = %stack_name, template = %template_file, "read cloud assembly");

    Ok(SynthesizedStack {
        stack_name,
        template: Template::from_file(&dir.join(template_file))?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn write_assembly(dir: &Path, manifest: serde_json::Value, templates: &[(&str, serde_json::Value)]) {
        std::fs::write(dir.join("manifest.json"), manifest.to_string()).unwrap();
        for (name, template) in templates {
            std::fs::write(dir.join(name), template.to_string()).unwrap();
        }
    }

    fn lambda_template(id: &str) -> serde_json::Value {
        json!({ "Resources": { id: { "Type": "AWS::Lambda::Function" } } })
    }

    #[test]
    fn test_single_stack_assembly() {
        let dir = tempfile::tempdir().unwrap();
        write_assembly(
            dir.path(),
            json!({
                "version": "36.0.0",
                "artifacts": {
                    "ApiStack": {
                        "type": "aws:cloudformation:stack",
                        "environment": "aws://unknown-account/unknown-region",
                        "properties": { "templateFile": "ApiStack.template.json", "stackName": "api-dev" }
                    },
                    "Tree": { "type": "cdk:tree", "properties": { "file": "tree.json" } }
                }
            }),
            &[("ApiStack.template.json", lambda_template("Handler"))],
        );

        let stack = read_cloud_assembly(dir.path(), None).unwrap();
        assert_eq!(stack.stack_name, "api-dev");
        assert!(stack.template.resources.contains_key("Handler"));
    }

    #[test]
    fn test_stack_name_defaults_to_artifact_id() {
        let dir = tempfile::tempdir().unwrap();
        write_assembly(
            dir.path(),
            json!({ "artifacts": { "Workers": { "type": "aws:cloudformation:stack", "properties": {} } } }),
            &[("Workers.template.json", lambda_template("Worker"))],
        );

        let stack = read_cloud_assembly(dir.path(), None).unwrap();
        assert_eq!(stack.stack_name, "Workers");
    }

    #[test]
    fn test_multiple_stacks_need_a_name() {
        let dir = tempfile::tempdir().unwrap();
        write_assembly(
            dir.path(),
            json!({
                "artifacts": {
                    "A": { "type": "aws:cloudformation:stack", "properties": { "templateFile": "A.template.json" } },
                    "B": { "type": "aws:cloudformation:stack", "properties": { "templateFile": "B.template.json", "stackName": "b-prod" } }
                }
            }),
            &[
                ("A.template.json", lambda_template("FnA")),
                ("B.template.json", lambda_template("FnB")),
            ],
        );

        let err = read_cloud_assembly(dir.path(), None).unwrap_err();
        assert!(err.to_string().contains("--stack-name"));

        let stack = read_cloud_assembly(dir.path(), Some("b-prod")).unwrap();
        assert!(stack.template.resources.contains_key("FnB"));

        let stack = read_cloud_assembly(dir.path(), Some("A")).unwrap();
        assert_eq!(stack.stack_name, "A");

        assert!(read_cloud_assembly(dir.path(), Some("C")).is_err());
    }

    #[test]
    fn test_app_command_quotes_stack_path() {
        let synth = CdkSynthesizer::new("stacks/api stack.ts", "/repo");
        assert_eq!(
            synth.app_command(),
            "npx ts-node --prefer-ts-exts \"/repo/stacks/api stack.ts\""
        );
    }

    #[tokio::test]
    async fn test_template_file_synthesizer() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("Stack.template.json");
        std::fs::write(&path, lambda_template("Fn").to_string()).unwrap();

        let stack = TemplateFileSynthesizer::new(&path, "stack-dev")
            .synthesize()
            .await
            .unwrap();
        assert_eq!(stack.stack_name, "stack-dev");
    }
}
