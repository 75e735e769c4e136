//! Branch-scoped cache of stack resources and upload infos.
//!
//! Synthesizing the stack and listing its resources dominate a run, so their
//! results are kept per branch. Nothing invalidates an entry automatically;
//! after redeploying, clear it (`fastpush cache clear`) or pass `--refresh`.

use fastpush_aws::StackResourceSummary;
use percent_encoding::{AsciiSet, CONTROLS, percent_decode_str, utf8_percent_encode};
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

use crate::upload_info::{UploadInfo, parse_output_value};
use crate::{Result, UpdateError};

const CACHE_FILE_SUFFIX: &str = ".cache.json";

/// Bytes escaped in cache file names. `%` is included so decoding is exact.
const BRANCH_FILE_ESCAPES: &AsciiSet = &CONTROLS.add(b'%').add(b'/').add(b'\\').add(b':');

/// What one branch's cache file holds.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResourceCache {
    pub stack_resources: Vec<StackResourceSummary>,
    #[serde(deserialize_with = "deserialize_upload_infos")]
    pub upload_infos: Vec<(String, UploadInfo)>,
}

impl ResourceCache {
    pub fn new(
        stack_resources: Vec<StackResourceSummary>,
        upload_infos: Vec<(String, UploadInfo)>,
    ) -> Self {
        Self {
            stack_resources,
            upload_infos,
        }
    }
}

// Older cache files stored the raw template output (`{"Value": {"Fn::Join": ...}}`)
// next to each key instead of the parsed upload info. Both are accepted.
fn deserialize_upload_infos<'de, D>(deserializer: D) -> std::result::Result<Vec<(String, UploadInfo)>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw: Vec<(String, Value)> = Vec::deserialize(deserializer)?;
    Ok(raw
        .into_iter()
        .filter_map(|(key, value)| {
            let info = serde_json::from_value::<UploadInfo>(value.clone())
                .ok()
                .or_else(|| value.get("Value").and_then(parse_output_value));
            if info.is_none() {
                debug!(output = %key, "dropping unreadable cached upload info");
            }
            info.map(|info| (key, info))
        })
        .collect())
}

/// Reads and writes `<dir>/<branch>.cache.json` files.
#[derive(Debug, Clone)]
pub struct CacheStore {
    dir: PathBuf,
}

impl CacheStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Cache file for `branch`. The name is percent-encoded, so `feature/x`
    /// is `feature%2Fx.cache.json` and never collides with `feature-x`.
    pub fn path_for(&self, branch: &str) -> PathBuf {
        let name = utf8_percent_encode(branch, BRANCH_FILE_ESCAPES);
        self.dir.join(format!("{}{}", name, CACHE_FILE_SUFFIX))
    }

    /// The cached entry for `branch`, if one exists and parses.
    pub fn load(&self, branch: &str) -> Option<ResourceCache> {
        let path = self.path_for(branch);
        let content = match std::fs::read_to_string(&path) {
            Ok(content) => content,
            Err(_) => {
                info!("Cache not found for this branch");
                return None;
            }
        };

        match serde_json::from_str(&content) {
            Ok(cache) => {
                debug!(path = %path.display(), "using cached stack resources");
                Some(cache)
            }
            Err(e) => {
                warn!(path = %path.display(), error = %e, "ignoring unreadable cache file");
                None
            }
        }
    }

    /// Write the entry for `branch`, creating the directory if needed.
    pub fn store(&self, branch: &str, cache: &ResourceCache) -> Result<PathBuf> {
        let path = self.path_for(branch);
        let cache_error = |message: String| UpdateError::Cache {
            path: path.clone(),
            message,
        };

        std::fs::create_dir_all(&self.dir).map_err(|e| cache_error(e.to_string()))?;
        let content =
            serde_json::to_string_pretty(cache).map_err(|e| cache_error(e.to_string()))?;
        std::fs::write(&path, content).map_err(|e| cache_error(e.to_string()))?;

        debug!(path = %path.display(), "cache written");
        Ok(path)
    }

    /// Remove the entry for `branch`. Returns whether a file was deleted.
    pub fn clear(&self, branch: &str) -> Result<bool> {
        let path = self.path_for(branch);
        match std::fs::remove_file(&path) {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(UpdateError::Cache {
                path,
                message: e.to_string(),
            }),
        }
    }

    /// Remove every cache file in the directory. Returns how many were deleted.
    pub fn clear_all(&self) -> Result<usize> {
        let entries = match std::fs::read_dir(&self.dir) {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(0),
            Err(e) => return Err(e.into()),
        };

        let mut removed = 0;
        for entry in entries {
            let path = entry?.path();
            let is_cache = path
                .file_name()
                .and_then(|name| name.to_str())
                .is_some_and(|name| name.ends_with(CACHE_FILE_SUFFIX));
            if is_cache {
                std::fs::remove_file(&path)?;
                removed += 1;
            }
        }
        Ok(removed)
    }

    /// Branches that currently have a cache file.
    pub fn branches(&self) -> Vec<String> {
        let Ok(entries) = std::fs::read_dir(&self.dir) else {
            return Vec::new();
        };
        let mut branches: Vec<String> = entries
            .filter_map(|entry| entry.ok())
            .filter_map(|entry| {
                entry
                    .file_name()
                    .to_str()
                    .and_then(|name| name.strip_suffix(CACHE_FILE_SUFFIX))
                    .and_then(|name| percent_decode_str(name).decode_utf8().ok())
                    .map(|branch| branch.into_owned())
            })
            .collect();
        branches.sort();
        branches
    }
}
