//! Configuration for fastpush.
//!
//! Values are layered, later layers winning:
//!
//! 1. built-in defaults
//! 2. `fastpush.toml` / `fastpush.json` in the project directory
//! 3. `.env` in the project directory
//! 4. the process environment
//! 5. command line overrides (applied by the binary)

pub mod env;
pub mod error;
pub mod loader;
pub mod validation;

pub use env::EnvLoader;
pub use error::{ConfigError, Result};
pub use loader::{ConfigLoader, FileFormat, find_config_file};
pub use validation::{ConfigValidator, Validate};

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Directory, relative to the project root, holding per-branch caches.
pub const DEFAULT_CACHE_DIR: &str = ".update-function-cache";

/// Branch that refuses fast updates unless forced.
pub const PROTECTED_BRANCH: &str = "master";

/// Top-level configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FastpushConfig {
    /// Branch whose cache and stack are targeted; `None` means ask git.
    pub branch: Option<String>,
    /// Allow updates while on [`PROTECTED_BRANCH`].
    pub force_master_update: bool,
    /// Cache directory; relative paths are resolved against the project root.
    pub cache_dir: PathBuf,
    pub aws: AwsSettings,
    pub bundle: BundleSettings,
    pub synth: SynthSettings,
}

impl Default for FastpushConfig {
    fn default() -> Self {
        Self {
            branch: None,
            force_master_update: false,
            cache_dir: PathBuf::from(DEFAULT_CACHE_DIR),
            aws: AwsSettings::default(),
            bundle: BundleSettings::default(),
            synth: SynthSettings::default(),
        }
    }
}

/// Connection settings handed to the AWS SDK loader.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AwsSettings {
    pub region: Option<String>,
    pub profile: Option<String>,
    /// Custom endpoint, e.g. LocalStack.
    pub endpoint_url: Option<String>,
}

/// esbuild invocation used to recompile an entry file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BundleSettings {
    pub esbuild_command: Vec<String>,
    /// Modules left out of the bundle; `aws-sdk` is always added.
    pub external_modules: Vec<String>,
    pub minify: bool,
    pub sourcemap: bool,
    pub keep_names: bool,
    /// `NODE_ENV` seen by the bundler child process.
    pub node_env: String,
}

impl Default for BundleSettings {
    fn default() -> Self {
        Self {
            esbuild_command: vec!["npx".to_string(), "esbuild".to_string()],
            external_modules: Vec::new(),
            minify: true,
            sourcemap: true,
            keep_names: true,
            node_env: "development".to_string(),
        }
    }
}

/// `cdk synth` invocation used on a cache miss.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SynthSettings {
    pub cdk_command: Vec<String>,
    /// Prefix for `--app`; the stack entry path is appended.
    pub app_command: String,
    /// `NODE_ENV` seen by the synth child process.
    pub node_env: String,
}

impl Default for SynthSettings {
    fn default() -> Self {
        Self {
            cdk_command: vec!["npx".to_string(), "cdk".to_string()],
            app_command: "npx ts-node --prefer-ts-exts".to_string(),
            node_env: "test".to_string(),
        }
    }
}

impl FastpushConfig {
    /// Load every layer for the project rooted at `project_dir`.
    pub fn load(project_dir: &Path) -> Result<Self> {
        let mut config = match find_config_file(project_dir) {
            Some(path) => Self::from_file(&path)?,
            None => Self::default(),
        };

        let env = EnvLoader::new().with_dotenv(project_dir.join(".env"))?;
        config.apply_env(&env);
        config.validate()?;
        Ok(config)
    }

    /// Read a config file; missing keys keep their defaults.
    pub fn from_file(path: &Path) -> Result<Self> {
        let value = ConfigLoader::auto(path)?.load_file(path)?;
        let config = serde_json::from_value(value)
            .map_err(|e| ConfigError::ParseError(format!("{}: {}", path.display(), e)))?;
        tracing::debug!(path = %path.display(), "loaded config file");
        Ok(config)
    }

    /// Overlay environment variables.
    pub fn apply_env(&mut self, env: &EnvLoader) {
        if let Some(branch) = env.get("BRANCH") {
            self.branch = Some(branch);
        }
        // Only the exact string "true" unlocks the protected branch.
        if let Some(force) = env.get("FORCE_MASTER_UPDATE") {
            self.force_master_update = force == "true";
        }
        if let Some(dir) = env.get("FASTPUSH_CACHE_DIR") {
            self.cache_dir = PathBuf::from(dir);
        }

        if let Some(region) = env.first_of(&["AWS_REGION", "AWS_DEFAULT_REGION"]) {
            self.aws.region = Some(region);
        }
        if let Some(profile) = env.get("AWS_PROFILE") {
            self.aws.profile = Some(profile);
        }
        if let Some(endpoint) = env.get("AWS_ENDPOINT_URL") {
            self.aws.endpoint_url = Some(endpoint);
        }

        if let Some(command) = env.load_command("FASTPUSH_ESBUILD") {
            self.bundle.esbuild_command = command;
        }
        if let Some(modules) = env.load_list("FASTPUSH_EXTERNAL_MODULES") {
            self.bundle.external_modules = modules;
        }
        if let Some(minify) = env.load_flag("FASTPUSH_MINIFY") {
            self.bundle.minify = minify;
        }
        if let Some(node_env) = env.get("FASTPUSH_BUNDLE_NODE_ENV") {
            self.bundle.node_env = node_env;
        }

        if let Some(command) = env.load_command("FASTPUSH_CDK") {
            self.synth.cdk_command = command;
        }
        if let Some(app) = env.get("FASTPUSH_CDK_APP") {
            self.synth.app_command = app;
        }
    }

    /// Cache directory resolved against `project_dir`.
    pub fn cache_dir_in(&self, project_dir: &Path) -> PathBuf {
        if self.cache_dir.is_absolute() {
            self.cache_dir.clone()
        } else {
            project_dir.join(&self.cache_dir)
        }
    }

    /// External modules for the bundler, `aws-sdk` first and no duplicates.
    pub fn external_modules(&self) -> Vec<String> {
        let mut modules = vec!["aws-sdk".to_string()];
        for module in &self.bundle.external_modules {
            if !modules.contains(module) {
                modules.push(module.clone());
            }
        }
        modules
    }
}

impl Validate for FastpushConfig {
    fn validate(&self) -> Result<()> {
        ConfigValidator::not_empty(&self.cache_dir.to_string_lossy(), "cache_dir")?;
        ConfigValidator::not_empty(&self.bundle.node_env, "bundle.node_env")?;
        ConfigValidator::command(&self.bundle.esbuild_command, "bundle.esbuild_command")?;
        ConfigValidator::command(&self.synth.cdk_command, "synth.cdk_command")?;
        ConfigValidator::not_empty(&self.synth.app_command, "synth.app_command")?;
        if let Some(branch) = &self.branch {
            ConfigValidator::not_empty(branch, "branch")?;
        }
        if let Some(endpoint) = &self.aws.endpoint_url {
            ConfigValidator::is_url(endpoint, "aws.endpoint_url")?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = FastpushConfig::default();
        assert_eq!(config.cache_dir, PathBuf::from(".update-function-cache"));
        assert!(!config.force_master_update);
        assert_eq!(config.bundle.node_env, "development");
        assert_eq!(config.synth.node_env, "test");
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_force_master_requires_exact_true() {
        let mut config = FastpushConfig::default();
        config.apply_env(&EnvLoader::from_map([("FORCE_MASTER_UPDATE", "TRUE")]));
        assert!(!config.force_master_update);

        config.apply_env(&EnvLoader::from_map([("FORCE_MASTER_UPDATE", "true")]));
        assert!(config.force_master_update);
    }

    #[test]
    fn test_env_overrides() {
        let mut config = FastpushConfig::default();
        config.apply_env(&EnvLoader::from_map([
            ("BRANCH", "feature/login"),
            ("AWS_DEFAULT_REGION", "eu-central-1"),
            ("FASTPUSH_EXTERNAL_MODULES", "pg-native,aws-sdk"),
            ("FASTPUSH_ESBUILD", "./node_modules/.bin/esbuild"),
            ("FASTPUSH_MINIFY", "false"),
        ]));

        assert_eq!(config.branch.as_deref(), Some("feature/login"));
        assert_eq!(config.aws.region.as_deref(), Some("eu-central-1"));
        assert_eq!(config.external_modules(), vec!["aws-sdk", "pg-native"]);
        assert_eq!(config.bundle.esbuild_command, vec!["./node_modules/.bin/esbuild"]);
        assert!(!config.bundle.minify);
    }

    #[test]
    fn test_cache_dir_resolution() {
        let mut config = FastpushConfig::default();
        assert_eq!(
            config.cache_dir_in(Path::new("/work/app")),
            PathBuf::from("/work/app/.update-function-cache")
        );

        config.cache_dir = PathBuf::from("/tmp/cache");
        assert_eq!(config.cache_dir_in(Path::new("/work/app")), PathBuf::from("/tmp/cache"));
    }

    #[test]
    fn test_validation_rejects_bad_endpoint() {
        let mut config = FastpushConfig::default();
        config.aws.endpoint_url = Some("localhost:4566".to_string());
        assert!(matches!(config.validate(), Err(ConfigError::ValidationError(_))));
    }
}
