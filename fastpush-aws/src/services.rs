//! AWS services container with lazy client creation.

use parking_lot::RwLock;
use std::sync::Arc;
use tracing::info;

use crate::{AwsConfig, CloudFormationResources, CredentialsSource, LambdaCodeUpdater, Result};

/// Container for the AWS service clients fastpush talks to.
///
/// The shared SDK configuration is resolved once; each client is created on
/// first use.
pub struct AwsServices {
    sdk_config: aws_config::SdkConfig,
    cloudformation: RwLock<Option<aws_sdk_cloudformation::Client>>,
    lambda: RwLock<Option<aws_sdk_lambda::Client>>,
}

impl AwsServices {
    /// Create a new AWS services container.
    pub async fn new(config: AwsConfig) -> Result<Arc<Self>> {
        let sdk_config = Self::build_sdk_config(&config).await?;

        info!(
            region = ?sdk_config.region(),
            endpoint = ?config.endpoint_url,
            "AWS services initialized"
        );

        Ok(Arc::new(Self {
            sdk_config,
            cloudformation: RwLock::new(None),
            lambda: RwLock::new(None),
        }))
    }

    /// Build AWS SDK configuration.
    async fn build_sdk_config(config: &AwsConfig) -> Result<aws_config::SdkConfig> {
        let mut loader = aws_config::defaults(aws_config::BehaviorVersion::latest());

        if let Some(region) = &config.region {
            loader = loader.region(aws_config::Region::new(region.clone()));
        }

        match &config.credentials {
            CredentialsSource::Profile(profile) => {
                loader = loader.profile_name(profile);
            }
            CredentialsSource::Explicit {
                access_key_id,
                secret_access_key,
                session_token,
            } => {
                let creds = aws_credential_types::Credentials::new(
                    access_key_id,
                    secret_access_key,
                    session_token.clone(),
                    None,
                    "explicit",
                );
                loader = loader.credentials_provider(creds);
            }
            CredentialsSource::Auto => {}
        }

        if let Some(endpoint) = &config.endpoint_url {
            loader = loader.endpoint_url(endpoint);
        }

        Ok(loader.load().await)
    }

    /// Get the CloudFormation client.
    pub fn cloudformation(&self) -> aws_sdk_cloudformation::Client {
        let mut client = self.cloudformation.write();
        client
            .get_or_insert_with(|| {
                info!("CloudFormation client initialized");
                aws_sdk_cloudformation::Client::new(&self.sdk_config)
            })
            .clone()
    }

    /// Get the Lambda client.
    pub fn lambda(&self) -> aws_sdk_lambda::Client {
        let mut client = self.lambda.write();
        client
            .get_or_insert_with(|| {
                info!("Lambda client initialized");
                aws_sdk_lambda::Client::new(&self.sdk_config)
            })
            .clone()
    }

    /// Stack resource lister over the CloudFormation client.
    pub fn stack_resources(&self) -> CloudFormationResources {
        CloudFormationResources::new(self.cloudformation())
    }

    /// Code updater over the Lambda client.
    pub fn code_updater(&self) -> LambdaCodeUpdater {
        LambdaCodeUpdater::new(self.lambda())
    }
}
