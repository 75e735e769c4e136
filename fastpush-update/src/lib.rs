//! # fastpush update
//!
//! Push recompiled Lambda code to a stack that is already deployed, skipping
//! a full CloudFormation deployment.
//!
//! A run resolves the git branch, refuses `master` unless forced, loads the
//! branch's cached view of the stack (or synthesizes it and lists its
//! resources), then rebuilds each selected function with esbuild, zips the
//! bundle and calls `UpdateFunctionCode`.
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use fastpush_update::{CdkSynthesizer, FunctionUpdater};
//! use std::sync::Arc;
//!
//! let synth = Arc::new(CdkSynthesizer::new("lib/stack.ts", &project_dir));
//! let updater = FunctionUpdater::from_config(&config, &services, synth, &project_dir);
//!
//! let report = updater.run(Some("CreateUserFunction")).await?;
//! for outcome in report.updated() {
//!     println!("{}", outcome.logs_hint());
//! }
//! ```

pub mod archive;
pub mod branch;
pub mod bundle;
pub mod cache;
pub mod error;
pub mod report;
pub mod resolve;
pub mod synth;
pub mod template;
pub mod upload_info;
pub mod updater;

pub use archive::zip_bundle;
pub use branch::{ensure_branch_allowed, resolve_branch};
pub use bundle::{BundleOutput, Bundler, EsbuildBundler};
pub use cache::{CacheStore, ResourceCache};
pub use error::{Result, UpdateError};
pub use report::{UpdateOutcome, UpdateReport, UpdateStage, logs_hint};
pub use resolve::{UpdateTarget, resolve_all, resolve_target};
pub use synth::{CdkSynthesizer, Synthesizer, TemplateFileSynthesizer, read_cloud_assembly};
pub use template::{SynthesizedStack, Template};
pub use upload_info::{
    UPLOAD_INFO_MARKER, UPLOAD_INFO_METADATA_KEY, UploadInfo, UploadInfoMetadata,
    extract_from_metadata, extract_upload_infos, join_output_value, output_key,
};
pub use updater::FunctionUpdater;
