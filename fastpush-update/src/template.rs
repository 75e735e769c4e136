//! Synthesized CloudFormation templates.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::path::Path;

use crate::upload_info::{self, UploadInfo};
use crate::{Result, UpdateError};

/// The parts of a template the update flow reads.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct Template {
    #[serde(default)]
    pub resources: Map<String, Value>,
    #[serde(default)]
    pub outputs: Map<String, Value>,
}

impl Template {
    /// Read a `*.template.json` file.
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| UpdateError::template(path, e.to_string()))?;
        serde_json::from_str(&content).map_err(|e| UpdateError::template(path, e.to_string()))
    }

    /// Upload infos from both channels.
    ///
    /// Resource metadata wins; a legacy output is only used for functions the
    /// metadata does not cover. Keys are output keys either way.
    pub fn upload_infos(&self) -> Vec<(String, UploadInfo)> {
        let mut infos: Vec<(String, UploadInfo)> = upload_info::extract_from_metadata(&self.resources)
            .into_iter()
            .map(|(logical_id, info)| (upload_info::output_key(&logical_id), info))
            .collect();

        for (key, info) in upload_info::extract_upload_infos(&self.outputs) {
            if !infos.iter().any(|(_, known)| known.function_name == info.function_name) {
                infos.push((key, info));
            }
        }

        infos
    }
}

/// Result of synthesizing one stack.
#[derive(Debug, Clone)]
pub struct SynthesizedStack {
    pub stack_name: String,
    pub template: Template,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::path::PathBuf;

    #[test]
    fn test_metadata_preferred_over_output() {
        let template: Template = serde_json::from_value(json!({
            "Resources": {
                "Foo": {
                    "Type": "AWS::Lambda::Function",
                    "Metadata": { "fastpush:uploadInfo": { "schemaVersion": 1, "entryFullPath": "/new/foo.ts" } }
                },
                "Bar": { "Type": "AWS::Lambda::Function" }
            },
            "Outputs": {
                "FooUploadInfoExtended": { "Value": { "Fn::Join": ["", ["{\"entryFullPath\":\"/old/foo.ts\",\"functionName\":\"", { "Ref": "Foo" }, "\"}"]] } },
                "BarUploadInfoExtended": { "Value": { "Fn::Join": ["", ["{\"entryFullPath\":\"/old/bar.ts\",\"functionName\":\"", { "Ref": "Bar" }, "\"}"]] } }
            }
        }))
        .unwrap();

        let infos = template.upload_infos();
        assert_eq!(infos.len(), 2);
        assert_eq!(infos[0].0, "FooUploadInfoExtended");
        assert_eq!(infos[0].1.entry_full_path, PathBuf::from("/new/foo.ts"));
        assert_eq!(infos[1].1, UploadInfo::new("/old/bar.ts", "Bar"));
    }

    #[test]
    fn test_template_without_outputs() {
        let template: Template =
            serde_json::from_value(json!({ "Resources": {}, "Parameters": {} })).unwrap();
        assert!(template.upload_infos().is_empty());
    }

    #[test]
    fn test_from_file_reports_path() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("Broken.template.json");
        std::fs::write(&path, "{").unwrap();

        let err = Template::from_file(&path).unwrap_err();
        assert!(err.to_string().contains("Broken.template.json"));
    }
}
