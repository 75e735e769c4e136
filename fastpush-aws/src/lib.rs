//! # fastpush AWS
//!
//! The two AWS calls the fast-update flow needs, behind traits so the flow can
//! be driven by recording fakes in tests:
//!
//! - [`StackResourceLister`]: paginated `ListStackResources`
//! - [`FunctionCodeUpdater`]: `UpdateFunctionCode` with a zip payload
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use fastpush_aws::{AwsConfig, AwsServices, list_all_stack_resources};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = AwsConfig::builder().region("us-east-1").build();
//!     let services = AwsServices::new(config).await?;
//!
//!     let resources =
//!         list_all_stack_resources(&services.stack_resources(), "MyStack").await?;
//!     println!("{} resources", resources.len());
//!     Ok(())
//! }
//! ```

mod code;
mod config;
mod error;
mod resources;
mod services;

pub use code::{CodeUpdate, FunctionCodeUpdater, LambdaCodeUpdater};
pub use config::{AwsConfig, AwsConfigBuilder, CredentialsSource};
pub use error::{AwsError, Result};
pub use resources::{
    CloudFormationResources, StackResourceLister, StackResourcePage, StackResourceSummary,
    list_all_stack_resources,
};
pub use services::AwsServices;

// Re-export AWS crates for convenience
pub use aws_config;
pub use aws_sdk_cloudformation;
pub use aws_sdk_lambda;
