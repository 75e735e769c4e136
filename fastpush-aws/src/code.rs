//! Lambda function code updates.

use async_trait::async_trait;
use aws_sdk_lambda::primitives::Blob;
use tracing::debug;

use crate::{AwsError, Result};

/// What Lambda reported after accepting new code.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CodeUpdate {
    pub function_name: String,
    pub code_sha256: Option<String>,
    pub last_modified: Option<String>,
}

/// Replaces the code of a deployed function.
#[async_trait]
pub trait FunctionCodeUpdater: Send + Sync {
    /// Upload `zip` as the new code of `function_name` (name or ARN).
    async fn update_function_code(&self, function_name: &str, zip: Vec<u8>) -> Result<CodeUpdate>;
}

/// [`FunctionCodeUpdater`] backed by the Lambda API.
#[derive(Clone)]
pub struct LambdaCodeUpdater {
    client: aws_sdk_lambda::Client,
}

impl LambdaCodeUpdater {
    pub fn new(client: aws_sdk_lambda::Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl FunctionCodeUpdater for LambdaCodeUpdater {
    async fn update_function_code(&self, function_name: &str, zip: Vec<u8>) -> Result<CodeUpdate> {
        debug!(function = function_name, bytes = zip.len(), "uploading function code");

        let output = self
            .client
            .update_function_code()
            .function_name(function_name)
            .zip_file(Blob::new(zip))
            .send()
            .await
            .map_err(|e| AwsError::service("UpdateFunctionCode", e))?;

        Ok(CodeUpdate {
            function_name: output
                .function_name()
                .unwrap_or(function_name)
                .to_string(),
            code_sha256: output.code_sha256().map(str::to_string),
            last_modified: output.last_modified().map(str::to_string),
        })
    }
}
