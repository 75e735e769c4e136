//! CloudFormation stack resources.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::{AwsError, Result};

/// Identity of one deployed resource.
///
/// Field names follow the CloudFormation API so cache files stay readable by
/// anything that speaks `ListStackResources` JSON.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct StackResourceSummary {
    pub logical_resource_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub physical_resource_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resource_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resource_status: Option<String>,
}

impl StackResourceSummary {
    /// Summary with just the two ids set.
    pub fn new(logical_id: impl Into<String>, physical_id: impl Into<String>) -> Self {
        Self {
            logical_resource_id: logical_id.into(),
            physical_resource_id: Some(physical_id.into()),
            resource_type: None,
            resource_status: None,
        }
    }

    /// Set the resource type, e.g. `AWS::Lambda::Function`.
    pub fn with_type(mut self, resource_type: impl Into<String>) -> Self {
        self.resource_type = Some(resource_type.into());
        self
    }
}

impl From<&aws_sdk_cloudformation::types::StackResourceSummary> for StackResourceSummary {
    fn from(summary: &aws_sdk_cloudformation::types::StackResourceSummary) -> Self {
        Self {
            logical_resource_id: summary.logical_resource_id().unwrap_or_default().to_string(),
            physical_resource_id: summary.physical_resource_id().map(str::to_string),
            resource_type: summary.resource_type().map(str::to_string),
            resource_status: summary.resource_status().map(|s| s.as_str().to_string()),
        }
    }
}

/// One page of `ListStackResources`.
#[derive(Debug, Clone, Default)]
pub struct StackResourcePage {
    pub summaries: Vec<StackResourceSummary>,
    pub next_token: Option<String>,
}

/// Source of stack resource pages.
#[async_trait]
pub trait StackResourceLister: Send + Sync {
    /// Fetch the page following `next_token` (the first page when `None`).
    async fn list_page(
        &self,
        stack_name: &str,
        next_token: Option<&str>,
    ) -> Result<StackResourcePage>;
}

/// Fetch every resource of `stack_name`, following continuation tokens.
///
/// Fails with [`AwsError::NoStackResources`] when the first page is empty.
pub async fn list_all_stack_resources(
    lister: &dyn StackResourceLister,
    stack_name: &str,
) -> Result<Vec<StackResourceSummary>> {
    let first = lister.list_page(stack_name, None).await?;
    if first.summaries.is_empty() {
        return Err(AwsError::NoStackResources(stack_name.to_string()));
    }

    let mut resources = first.summaries;
    let mut next_token = first.next_token;
    let mut pages = 1;

    while let Some(token) = next_token {
        let page = lister.list_page(stack_name, Some(&token)).await?;
        resources.extend(page.summaries);
        next_token = page.next_token;
        pages += 1;
    }

    debug!(stack = stack_name, pages, resources = resources.len(), "listed stack resources");
    Ok(resources)
}

/// [`StackResourceLister`] backed by the CloudFormation API.
#[derive(Clone)]
pub struct CloudFormationResources {
    client: aws_sdk_cloudformation::Client,
}

impl CloudFormationResources {
    pub fn new(client: aws_sdk_cloudformation::Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl StackResourceLister for CloudFormationResources {
    async fn list_page(
        &self,
        stack_name: &str,
        next_token: Option<&str>,
    ) -> Result<StackResourcePage> {
        let output = self
            .client
            .list_stack_resources()
            .stack_name(stack_name)
            .set_next_token(next_token.map(str::to_string))
            .send()
            .await
            .map_err(|e| AwsError::service("ListStackResources", e))?;

        Ok(StackResourcePage {
            summaries: output
                .stack_resource_summaries()
                .iter()
                .map(StackResourceSummary::from)
                .collect(),
            next_token: output.next_token().map(str::to_string),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    /// Serves canned pages keyed by continuation token.
    struct PagedLister {
        pages: Vec<StackResourcePage>,
        requested: Mutex<Vec<Option<String>>>,
    }

    impl PagedLister {
        fn new(pages: Vec<StackResourcePage>) -> Self {
            Self {
                pages,
                requested: Mutex::new(Vec::new()),
            }
        }
    }

    #[async_trait]
    impl StackResourceLister for PagedLister {
        async fn list_page(
            &self,
            _stack_name: &str,
            next_token: Option<&str>,
        ) -> Result<StackResourcePage> {
            self.requested
                .lock()
                .unwrap()
                .push(next_token.map(str::to_string));
            let index = match next_token {
                None => 0,
                Some(token) => token.trim_start_matches("page-").parse().unwrap(),
            };
            Ok(self.pages[index].clone())
        }
    }

    fn page(ids: &[&str], next: Option<&str>) -> StackResourcePage {
        StackResourcePage {
            summaries: ids
                .iter()
                .map(|id| StackResourceSummary::new(*id, format!("{}-phys", id.to_lowercase())))
                .collect(),
            next_token: next.map(str::to_string),
        }
    }

    #[tokio::test]
    async fn test_follows_continuation_tokens() {
        let lister = PagedLister::new(vec![
            page(&["A", "B"], Some("page-1")),
            page(&["C"], Some("page-2")),
            page(&["D"], None),
        ]);

        let resources = list_all_stack_resources(&lister, "Stack").await.unwrap();
        let ids: Vec<_> = resources.iter().map(|r| r.logical_resource_id.as_str()).collect();
        assert_eq!(ids, vec!["A", "B", "C", "D"]);

        let requested = lister.requested.lock().unwrap().clone();
        assert_eq!(
            requested,
            vec![None, Some("page-1".to_string()), Some("page-2".to_string())]
        );
    }

    #[tokio::test]
    async fn test_empty_first_page_is_an_error() {
        let lister = PagedLister::new(vec![page(&[], None)]);
        let err = list_all_stack_resources(&lister, "Ghost").await.unwrap_err();
        assert!(matches!(err, AwsError::NoStackResources(name) if name == "Ghost"));
    }

    #[test]
    fn test_summary_serializes_pascal_case() {
        let summary = StackResourceSummary::new("Foo", "foo-123").with_type("AWS::Lambda::Function");
        let json = serde_json::to_value(&summary).unwrap();
        assert_eq!(json["LogicalResourceId"], "Foo");
        assert_eq!(json["PhysicalResourceId"], "foo-123");
        assert_eq!(json["ResourceType"], "AWS::Lambda::Function");
        assert!(json.get("ResourceStatus").is_none());
    }

    #[test]
    fn test_summary_reads_api_shaped_json() {
        let summary: StackResourceSummary = serde_json::from_value(serde_json::json!({
            "LogicalResourceId": "Foo",
            "PhysicalResourceId": "foo-123",
            "ResourceStatus": "UPDATE_COMPLETE",
            "LastUpdatedTimestamp": "2021-03-01T10:00:00.000Z",
            "DriftInformation": { "StackResourceDriftStatus": "NOT_CHECKED" }
        }))
        .unwrap();

        assert_eq!(summary.physical_resource_id.as_deref(), Some("foo-123"));
        assert_eq!(summary.resource_status.as_deref(), Some("UPDATE_COMPLETE"));
    }
}
