// Environment variable loading

use crate::{ConfigError, Result};
use std::collections::HashMap;
use std::env;
use std::path::Path;

/// Environment variable loader.
///
/// Looks variables up in an optional overlay first (values read from a `.env`
/// file, or a fixed map in tests) and then in the process environment. The
/// process environment always wins over `.env` values, matching `dotenvy`'s
/// "never override" behaviour without mutating the environment.
#[derive(Debug, Default, Clone)]
pub struct EnvLoader {
    dotenv: HashMap<String, String>,
    fixed: Option<HashMap<String, String>>,
}

impl EnvLoader {
    /// Loader backed by the process environment only.
    pub fn new() -> Self {
        Self::default()
    }

    /// Loader backed by a fixed map; the process environment is ignored.
    pub fn from_map<K, V>(vars: impl IntoIterator<Item = (K, V)>) -> Self
    where
        K: Into<String>,
        V: Into<String>,
    {
        Self {
            dotenv: HashMap::new(),
            fixed: Some(vars.into_iter().map(|(k, v)| (k.into(), v.into())).collect()),
        }
    }

    /// Add the entries of a `.env` file underneath the process environment.
    ///
    /// A missing file is not an error.
    pub fn with_dotenv(mut self, path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        if !path.exists() {
            return Ok(self);
        }

        let iter = dotenvy::from_path_iter(path)
            .map_err(|e| ConfigError::LoadError(format!("{}: {}", path.display(), e)))?;
        for item in iter {
            let (key, value) =
                item.map_err(|e| ConfigError::ParseError(format!("{}: {}", path.display(), e)))?;
            self.dotenv.insert(key, value);
        }

        tracing::debug!(path = %path.display(), vars = self.dotenv.len(), "loaded .env file");
        Ok(self)
    }

    /// Look a variable up; empty values count as unset.
    pub fn get(&self, key: &str) -> Option<String> {
        let value = match &self.fixed {
            Some(map) => map.get(key).cloned(),
            None => env::var(key).ok().or_else(|| self.dotenv.get(key).cloned()),
        };
        value.filter(|v| !v.is_empty())
    }

    /// First variable of `keys` that is set.
    pub fn first_of(&self, keys: &[&str]) -> Option<String> {
        keys.iter().find_map(|key| self.get(key))
    }

    /// Boolean flag: `1`/`true` are on, `0`/`false` are off, anything else unset.
    pub fn load_flag(&self, key: &str) -> Option<bool> {
        match self.get(key)?.to_lowercase().as_str() {
            "1" | "true" => Some(true),
            "0" | "false" => Some(false),
            _ => None,
        }
    }

    /// Comma separated list, trimmed, empty items dropped.
    pub fn load_list(&self, key: &str) -> Option<Vec<String>> {
        self.get(key).map(|raw| {
            raw.split(',')
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(str::to_string)
                .collect()
        })
    }

    /// Whitespace separated command line, e.g. `npx esbuild`.
    pub fn load_command(&self, key: &str) -> Option<Vec<String>> {
        self.get(key)
            .map(|raw| raw.split_whitespace().map(str::to_string).collect())
            .filter(|parts: &Vec<String>| !parts.is_empty())
    }
}
