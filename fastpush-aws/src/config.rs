//! AWS configuration.

use fastpush_config::AwsSettings;
use serde::{Deserialize, Serialize};

/// Credentials source for AWS authentication.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CredentialsSource {
    /// Use AWS profile from ~/.aws/credentials.
    Profile(String),
    /// Use explicit credentials.
    Explicit {
        access_key_id: String,
        secret_access_key: String,
        session_token: Option<String>,
    },
    /// Auto-detect credentials (default AWS SDK behavior).
    #[default]
    Auto,
}

/// AWS connection configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AwsConfig {
    /// AWS region.
    pub region: Option<String>,
    /// Credentials source.
    #[serde(default)]
    pub credentials: CredentialsSource,
    /// Custom endpoint URL (for LocalStack, etc.).
    pub endpoint_url: Option<String>,
}

impl AwsConfig {
    /// Create a builder.
    pub fn builder() -> AwsConfigBuilder {
        AwsConfigBuilder::new()
    }

    /// Build from the `[aws]` section of the fastpush configuration.
    pub fn from_settings(settings: &AwsSettings) -> Self {
        let mut builder = AwsConfigBuilder::new();
        if let Some(region) = &settings.region {
            builder = builder.region(region);
        }
        if let Some(profile) = &settings.profile {
            builder = builder.profile(profile);
        }
        if let Some(endpoint) = &settings.endpoint_url {
            builder = builder.endpoint_url(endpoint);
        }
        builder.build()
    }
}

/// Builder for AWS configuration.
#[derive(Default)]
pub struct AwsConfigBuilder {
    config: AwsConfig,
}

impl AwsConfigBuilder {
    /// Create a new builder.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the AWS region.
    pub fn region(mut self, region: impl Into<String>) -> Self {
        self.config.region = Some(region.into());
        self
    }

    /// Use explicit credentials.
    pub fn explicit_credentials(
        mut self,
        access_key_id: impl Into<String>,
        secret_access_key: impl Into<String>,
    ) -> Self {
        self.config.credentials = CredentialsSource::Explicit {
            access_key_id: access_key_id.into(),
            secret_access_key: secret_access_key.into(),
            session_token: None,
        };
        self
    }

    /// Use a named profile.
    pub fn profile(mut self, profile: impl Into<String>) -> Self {
        self.config.credentials = CredentialsSource::Profile(profile.into());
        self
    }

    /// Set a custom endpoint URL.
    pub fn endpoint_url(mut self, url: impl Into<String>) -> Self {
        self.config.endpoint_url = Some(url.into());
        self
    }

    /// Configure for LocalStack.
    pub fn localstack(self) -> Self {
        self.endpoint_url("http://localhost:4566")
            .explicit_credentials("test", "test")
    }

    /// Build the configuration.
    pub fn build(self) -> AwsConfig {
        self.config
    }
}
