//! Matching deployed resources to upload infos.

use fastpush_aws::StackResourceSummary;
use serde::Serialize;
use std::path::PathBuf;
use tracing::warn;

use crate::upload_info::UploadInfo;

/// One deployed function to recompile and push.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateTarget {
    pub logical_id: String,
    pub physical_id: String,
    pub entry_full_path: PathBuf,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub external_modules: Vec<String>,
}

fn target_for(resource: &StackResourceSummary, info: &UploadInfo) -> Option<UpdateTarget> {
    let Some(physical_id) = resource.physical_resource_id.clone() else {
        warn!(resource = %resource.logical_resource_id, "resource has no physical id yet");
        return None;
    };
    Some(UpdateTarget {
        logical_id: resource.logical_resource_id.clone(),
        physical_id,
        entry_full_path: info.entry_full_path.clone(),
        external_modules: info.external_modules.clone(),
    })
}

fn info_for<'a>(infos: &'a [(String, UploadInfo)], logical_id: &str) -> Option<&'a UploadInfo> {
    infos
        .iter()
        .map(|(_, info)| info)
        .find(|info| info.function_name == logical_id)
}

/// Resolve a single function by logical id, falling back to physical id.
pub fn resolve_target(
    resources: &[StackResourceSummary],
    infos: &[(String, UploadInfo)],
    id: &str,
) -> Option<UpdateTarget> {
    let resource = resources
        .iter()
        .find(|r| r.logical_resource_id == id)
        .or_else(|| {
            resources
                .iter()
                .find(|r| r.physical_resource_id.as_deref() == Some(id))
        })?;

    let info = info_for(infos, &resource.logical_resource_id)?;
    target_for(resource, info)
}

/// One target per upload info that has a deployed resource, in upload-info order.
pub fn resolve_all(
    resources: &[StackResourceSummary],
    infos: &[(String, UploadInfo)],
) -> Vec<UpdateTarget> {
    infos
        .iter()
        .filter_map(|(_, info)| {
            let resource = resources
                .iter()
                .find(|r| r.logical_resource_id == info.function_name);
            if resource.is_none() {
                warn!(function = %info.function_name, "no deployed resource for function, skipping");
            }
            target_for(resource?, info)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn resources() -> Vec<StackResourceSummary> {
        vec![
            StackResourceSummary::new("Foo", "foo-123").with_type("AWS::Lambda::Function"),
            StackResourceSummary::new("Bar", "bar-456").with_type("AWS::Lambda::Function"),
            StackResourceSummary::new("Table", "table-789").with_type("AWS::DynamoDB::Table"),
        ]
    }

    fn infos() -> Vec<(String, UploadInfo)> {
        vec![
            ("FooUploadInfoExtended".to_string(), UploadInfo::new("/a/b.ts", "Foo")),
            ("BarUploadInfoExtended".to_string(), UploadInfo::new("/a/bar.ts", "Bar")),
            ("GoneUploadInfoExtended".to_string(), UploadInfo::new("/a/gone.ts", "Gone")),
        ]
    }

    #[test]
    fn test_resolves_logical_id_to_physical() {
        let target = resolve_target(&resources(), &infos(), "Foo").unwrap();
        assert_eq!(
            target,
            UpdateTarget {
                logical_id: "Foo".to_string(),
                physical_id: "foo-123".to_string(),
                entry_full_path: PathBuf::from("/a/b.ts"),
                external_modules: vec![],
            }
        );
    }

    #[test]
    fn test_resolves_physical_id() {
        let target = resolve_target(&resources(), &infos(), "bar-456").unwrap();
        assert_eq!(target.logical_id, "Bar");
    }

    #[test]
    fn test_unknown_id_or_missing_info() {
        assert!(resolve_target(&resources(), &infos(), "Nope").is_none());
        assert!(resolve_target(&resources(), &infos(), "Table").is_none());
    }

    #[test]
    fn test_resource_without_physical_id() {
        let mut resources = resources();
        resources[0].physical_resource_id = None;
        assert!(resolve_target(&resources, &infos(), "Foo").is_none());
    }

    #[test]
    fn test_resolve_all_drops_undeployed() {
        let targets = resolve_all(&resources(), &infos());
        let ids: Vec<_> = targets.iter().map(|t| t.physical_id.as_str()).collect();
        assert_eq!(ids, vec!["foo-123", "bar-456"]);
    }
}
