//! Recompiling a function's entry file with esbuild.

use async_trait::async_trait;
use fastpush_config::BundleSettings;
use std::path::Path;
use std::process::Stdio;
use tempfile::TempDir;
use tokio::process::Command;
use tracing::{debug, error};

use crate::{Result, UpdateError};

/// File name of the compiled handler inside the bundle directory.
pub const BUNDLE_FILE_NAME: &str = "main.js";

/// A compiled bundle living in its own temporary directory.
///
/// The directory is removed when the output is dropped.
#[derive(Debug)]
pub struct BundleOutput {
    dir: TempDir,
}

impl BundleOutput {
    /// Wrap an existing directory that already holds `main.js`.
    pub fn new(dir: TempDir) -> Self {
        Self { dir }
    }

    pub fn dir(&self) -> &Path {
        self.dir.path()
    }
}

/// Compiles one entry file into a deployable bundle.
#[async_trait]
pub trait Bundler: Send + Sync {
    /// `external_modules` are left out of the bundle on top of whatever the
    /// bundler is configured with.
    async fn bundle(&self, entry: &Path, external_modules: &[String]) -> Result<BundleOutput>;
}

/// [`Bundler`] that shells out to esbuild.
#[derive(Debug, Clone)]
pub struct EsbuildBundler {
    settings: BundleSettings,
    external_modules: Vec<String>,
}

impl EsbuildBundler {
    /// `external_modules` should already include `aws-sdk`.
    pub fn new(settings: BundleSettings, external_modules: Vec<String>) -> Self {
        Self {
            settings,
            external_modules,
        }
    }

    /// esbuild arguments for `entry`, writing into `outdir`.
    pub fn args(&self, entry: &Path, external_modules: &[String], outdir: &Path) -> Vec<String> {
        let mut args = vec![
            entry.display().to_string(),
            "--bundle".to_string(),
            "--platform=node".to_string(),
            "--format=cjs".to_string(),
        ];
        if self.settings.keep_names {
            args.push("--keep-names".to_string());
        }
        if self.settings.minify {
            args.push("--minify".to_string());
        }
        if self.settings.sourcemap {
            args.push("--sourcemap".to_string());
        }
        let mut externals: Vec<&String> = Vec::new();
        for module in self.external_modules.iter().chain(external_modules) {
            if !externals.contains(&module) {
                externals.push(module);
            }
        }
        args.extend(externals.iter().map(|module| format!("--external:{}", module)));
        args.push(format!("--outfile={}", outdir.join(BUNDLE_FILE_NAME).display()));
        args.push("--log-level=warning".to_string());
        args
    }
}

#[async_trait]
impl Bundler for EsbuildBundler {
    async fn bundle(&self, entry: &Path, external_modules: &[String]) -> Result<BundleOutput> {
        let (program, base_args) = self
            .settings
            .esbuild_command
            .split_first()
            .ok_or_else(|| UpdateError::bundle(entry, "empty esbuild command"))?;

        let dir = tempfile::Builder::new().prefix("fastpush-bundle").tempdir()?;
        let args = self.args(entry, external_modules, dir.path());

        debug!(entry = %entry.display(), program = %program, ?args, "running esbuild");

        let output = Command::new(program)
            .args(base_args)
            .args(&args)
            .env("NODE_ENV", &self.settings.node_env)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .output()
            .await
            .map_err(|e| UpdateError::bundle(entry, format!("failed to run {}: {}", program, e)))?;

        if !output.status.success() {
            return Err(UpdateError::bundle(
                entry,
                String::from_utf8_lossy(&output.stderr).trim().to_string(),
            ));
        }

        let compiled = std::fs::read_dir(dir.path())?.count();
        if compiled == 0 {
            error!(
                "No files compiled for: {}. Something probably went wrong.",
                entry.display()
            );
            return Err(UpdateError::bundle(entry, "no files compiled"));
        }

        Ok(BundleOutput::new(dir))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn bundler() -> EsbuildBundler {
        let settings = BundleSettings::default();
        EsbuildBundler::new(
            settings,
            vec!["aws-sdk".to_string(), "sharp".to_string()],
        )
    }

    #[test]
    fn test_args_match_synth_options() {
        let args = bundler().args(Path::new("/src/handler.ts"), &[], Path::new("/tmp/out"));

        assert_eq!(args[0], "/src/handler.ts");
        for flag in [
            "--bundle",
            "--platform=node",
            "--format=cjs",
            "--keep-names",
            "--minify",
            "--sourcemap",
            "--external:aws-sdk",
            "--external:sharp",
            "--outfile=/tmp/out/main.js",
        ] {
            assert!(args.iter().any(|a| a == flag), "missing {}", flag);
        }
    }

    #[test]
    fn test_args_respect_disabled_flags() {
        let settings = BundleSettings {
            minify: false,
            sourcemap: false,
            ..BundleSettings::default()
        };
        let args =
            EsbuildBundler::new(settings, vec![]).args(Path::new("a.js"), &[], Path::new("/o"));

        assert!(!args.iter().any(|a| a == "--minify"));
        assert!(!args.iter().any(|a| a == "--sourcemap"));
        assert!(!args.iter().any(|a| a.starts_with("--external:")));
    }

    #[test]
    fn test_per_function_externals_are_merged() {
        let extra = vec!["pg-native".to_string(), "aws-sdk".to_string()];
        let args = bundler().args(Path::new("/src/db.ts"), &extra, Path::new("/o"));

        let externals: Vec<&str> = args
            .iter()
            .filter_map(|a| a.strip_prefix("--external:"))
            .collect();
        assert_eq!(externals, ["aws-sdk", "sharp", "pg-native"]);
    }

    #[tokio::test]
    async fn test_missing_program_is_a_bundle_error() {
        let settings = BundleSettings {
            esbuild_command: vec!["fastpush-no-such-esbuild".to_string()],
            ..BundleSettings::default()
        };
        let err = EsbuildBundler::new(settings, vec![])
            .bundle(Path::new("/src/a.ts"), &[])
            .await
            .unwrap_err();

        assert!(matches!(err, UpdateError::Bundle { .. }));
        assert!(err.to_string().contains("/src/a.ts"));
    }

    #[tokio::test]
    async fn test_empty_command_rejected() {
        let settings = BundleSettings {
            esbuild_command: vec![],
            ..BundleSettings::default()
        };
        let err = EsbuildBundler::new(settings, vec![])
            .bundle(Path::new("a.ts"), &[])
            .await
            .unwrap_err();
        assert!(err.to_string().contains("empty esbuild command"));
    }
}
