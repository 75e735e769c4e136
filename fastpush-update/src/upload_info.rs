//! Upload info: which entry file a deployed function was built from.
//!
//! Two channels carry it through the synthesized template:
//!
//! - a stack output whose key contains [`UPLOAD_INFO_MARKER`] and whose value
//!   is `{"Fn::Join": ["", [prefix, {"Ref": id}, suffix]]}`; concatenating the
//!   parts with the `Ref` replaced by the logical id yields the JSON of an
//!   [`UploadInfo`]
//! - resource metadata under [`UPLOAD_INFO_METADATA_KEY`], a versioned object
//!   whose function name is the resource's own logical id

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// Substring identifying upload-info stack outputs.
pub const UPLOAD_INFO_MARKER: &str = "UploadInfoExtended";

/// Resource metadata key of the explicit channel.
pub const UPLOAD_INFO_METADATA_KEY: &str = "fastpush:uploadInfo";

/// Version written into resource metadata.
pub const UPLOAD_INFO_SCHEMA_VERSION: u32 = 1;

// Stands in for the function name while serializing, then becomes the Ref.
const FUNCTION_NAME_SLOT: &str = "${Token[FunctionName]}";

/// Entry file and function of one bundled Lambda.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UploadInfo {
    pub entry_full_path: PathBuf,
    /// Logical id of the function resource.
    pub function_name: String,
    /// Modules the synth-time bundle left external, besides the configured ones.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub external_modules: Vec<String>,
}

impl UploadInfo {
    pub fn new(entry_full_path: impl Into<PathBuf>, function_name: impl Into<String>) -> Self {
        Self {
            entry_full_path: entry_full_path.into(),
            function_name: function_name.into(),
            external_modules: Vec::new(),
        }
    }

    pub fn with_external_modules(mut self, modules: Vec<String>) -> Self {
        self.external_modules = modules;
        self
    }
}

/// Versioned payload stored in resource metadata.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UploadInfoMetadata {
    pub schema_version: u32,
    pub entry_full_path: PathBuf,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub external_modules: Vec<String>,
}

impl UploadInfoMetadata {
    pub fn new(entry_full_path: impl Into<PathBuf>, external_modules: Vec<String>) -> Self {
        Self {
            schema_version: UPLOAD_INFO_SCHEMA_VERSION,
            entry_full_path: entry_full_path.into(),
            external_modules,
        }
    }
}

/// Output key for the function with logical id `id`.
pub fn output_key(id: &str) -> String {
    format!("{}{}", id, UPLOAD_INFO_MARKER)
}

/// Build the `Fn::Join` output value for a function.
///
/// The function name is emitted as a `Ref` to `logical_id` so the deployed
/// output carries the physical name while the template keeps the logical one.
pub fn join_output_value(
    entry_full_path: &Path,
    logical_id: &str,
    external_modules: &[String],
) -> Value {
    let placeholder = UploadInfo::new(entry_full_path, FUNCTION_NAME_SLOT)
        .with_external_modules(external_modules.to_vec());
    // Serializing a struct of a path and a string cannot fail.
    let text = serde_json::to_string(&placeholder).unwrap_or_default();
    let (prefix, suffix) = text.split_once(FUNCTION_NAME_SLOT).unwrap_or((&text, ""));

    serde_json::json!({
        "Fn::Join": ["", [prefix, { "Ref": logical_id }, suffix]]
    })
}

/// Parse one output `Value` back into an [`UploadInfo`].
///
/// Accepts the three-part join, or a plain string if the value was already
/// resolved. Anything else yields `None`.
pub fn parse_output_value(value: &Value) -> Option<UploadInfo> {
    let text = match value {
        Value::String(text) => text.clone(),
        Value::Object(map) => {
            let join = map.get("Fn::Join")?.as_array()?;
            let [delimiter, parts] = join.as_slice() else {
                return None;
            };
            let delimiter = delimiter.as_str()?;
            let [prefix, reference, suffix] = parts.as_array()?.as_slice() else {
                return None;
            };
            [
                prefix.as_str()?,
                reference.get("Ref")?.as_str()?,
                suffix.as_str()?,
            ]
            .join(delimiter)
        }
        _ => return None,
    };

    serde_json::from_str(&text).ok()
}

/// Upload infos found in a template's `Outputs` map, in output key order.
///
/// Outputs whose key lacks the marker are ignored; marked outputs with an
/// unexpected shape are skipped.
pub fn extract_upload_infos(outputs: &Map<String, Value>) -> Vec<(String, UploadInfo)> {
    outputs
        .iter()
        .filter(|(key, _)| key.contains(UPLOAD_INFO_MARKER))
        .filter_map(|(key, output)| {
            let info = output.get("Value").and_then(parse_output_value);
            if info.is_none() {
                debug!(output = %key, "skipping upload-info output with unexpected shape");
            }
            info.map(|info| (key.clone(), info))
        })
        .collect()
}

/// Upload infos found in resource metadata, keyed by logical id.
pub fn extract_from_metadata(resources: &Map<String, Value>) -> Vec<(String, UploadInfo)> {
    resources
        .iter()
        .filter_map(|(logical_id, resource)| {
            let raw = resource.get("Metadata")?.get(UPLOAD_INFO_METADATA_KEY)?;
            let metadata: UploadInfoMetadata = match serde_json::from_value(raw.clone()) {
                Ok(metadata) => metadata,
                Err(e) => {
                    warn!(resource = %logical_id, error = %e, "unreadable upload-info metadata");
                    return None;
                }
            };
            if metadata.schema_version != UPLOAD_INFO_SCHEMA_VERSION {
                warn!(
                    resource = %logical_id,
                    version = metadata.schema_version,
                    "unsupported upload-info schema version"
                );
                return None;
            }
            Some((
                logical_id.clone(),
                UploadInfo::new(metadata.entry_full_path, logical_id.clone())
                    .with_external_modules(metadata.external_modules),
            ))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn outputs(value: Value) -> Map<String, Value> {
        value.as_object().cloned().unwrap()
    }

    #[test]
    fn test_extracts_join_output() {
        let outputs = outputs(json!({
            "FooUploadInfoExtended": {
                "Value": {
                    "Fn::Join": ["", [
                        "{\"entryFullPath\":\"/a/b.ts\",\"functionName\":\"",
                        { "Ref": "Foo" },
                        "\"}"
                    ]]
                },
                "Condition": "FootestEnvCondition"
            }
        }));

        let infos = extract_upload_infos(&outputs);
        assert_eq!(
            infos,
            vec![(
                "FooUploadInfoExtended".to_string(),
                UploadInfo::new("/a/b.ts", "Foo")
            )]
        );
    }

    #[test]
    fn test_ignores_unmarked_outputs() {
        let outputs = outputs(json!({
            "FooUrl": { "Value": "https://abc.execute-api.us-east-1.amazonaws.com" },
            "BarUploadInfoExtended": { "Value": "{\"entryFullPath\":\"/src/bar.ts\",\"functionName\":\"Bar\"}" }
        }));

        let infos = extract_upload_infos(&outputs);
        assert_eq!(infos.len(), 1);
        assert_eq!(infos[0].1, UploadInfo::new("/src/bar.ts", "Bar"));
    }

    #[test]
    fn test_skips_unexpected_shapes() {
        let outputs = outputs(json!({
            "AUploadInfoExtended": { "Value": { "Fn::Join": ["", ["{", { "Ref": "A" }]] } },
            "BUploadInfoExtended": { "Value": { "Fn::GetAtt": ["B", "Arn"] } },
            "CUploadInfoExtended": { "Value": { "Fn::Join": ["", ["not json ", { "Ref": "C" }, ""]] } },
            "DUploadInfoExtended": { "Export": { "Name": "d" } },
            "EUploadInfoExtended": { "Value": 42 }
        }));

        assert!(extract_upload_infos(&outputs).is_empty());
    }

    #[test]
    fn test_join_value_parses_back() {
        let value = join_output_value(
            Path::new("/repo/src/handlers/create \"user\".ts"),
            "CreateUser",
            &[],
        );
        let parts = &value["Fn::Join"][1];
        assert_eq!(parts[1], json!({ "Ref": "CreateUser" }));

        let info = parse_output_value(&value).unwrap();
        assert_eq!(info.function_name, "CreateUser");
        assert_eq!(
            info.entry_full_path,
            PathBuf::from("/repo/src/handlers/create \"user\".ts")
        );
    }

    #[test]
    fn test_join_value_keeps_external_modules() {
        let modules = vec!["pg-native".to_string()];
        let value = join_output_value(Path::new("/src/db.ts"), "Db", &modules);

        let info = parse_output_value(&value).unwrap();
        assert_eq!(info, UploadInfo::new("/src/db.ts", "Db").with_external_modules(modules));
    }

    #[test]
    fn test_non_empty_delimiter_is_honoured() {
        let value = json!({
            "Fn::Join": ["\"", ["{\"entryFullPath\":\"/x.js\",\"functionName\":", { "Ref": "X" }, "}"]]
        });
        assert_eq!(parse_output_value(&value), Some(UploadInfo::new("/x.js", "X")));
    }

    #[test]
    fn test_metadata_channel() {
        let resources = outputs(json!({
            "Foo": {
                "Type": "AWS::Lambda::Function",
                "Metadata": { "fastpush:uploadInfo": { "schemaVersion": 1, "entryFullPath": "/a/b.ts" } }
            },
            "Db": {
                "Type": "AWS::Lambda::Function",
                "Metadata": { "fastpush:uploadInfo": {
                    "schemaVersion": 1, "entryFullPath": "/db.ts", "externalModules": ["pg-native"]
                } }
            },
            "Future": {
                "Type": "AWS::Lambda::Function",
                "Metadata": { "fastpush:uploadInfo": { "schemaVersion": 2, "entryFullPath": "/c.ts" } }
            },
            "Broken": {
                "Metadata": { "fastpush:uploadInfo": "nope" }
            },
            "Table": { "Type": "AWS::DynamoDB::Table" }
        }));

        let infos = extract_from_metadata(&resources);
        assert_eq!(
            infos,
            vec![
                (
                    "Db".to_string(),
                    UploadInfo::new("/db.ts", "Db").with_external_modules(vec!["pg-native".to_string()])
                ),
                ("Foo".to_string(), UploadInfo::new("/a/b.ts", "Foo")),
            ]
        );
    }

    #[test]
    fn test_output_key() {
        assert_eq!(output_key("Foo"), "FooUploadInfoExtended");
    }
}
