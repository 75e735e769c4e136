// fastpush - push recompiled Lambda code to a deployed CDK stack
//
// The update flow lives in fastpush-update; this crate re-exports it together
// with the supporting crates so applications can depend on a single package.

// Re-export the update flow
pub use fastpush_update::*;

// Re-export supporting crates
pub use fastpush_aws;
pub use fastpush_config;

#[cfg(feature = "log")]
pub use fastpush_log;

#[cfg(feature = "construct")]
pub use fastpush_construct;

/// Prelude for common imports.
pub mod prelude {
    pub use fastpush_aws::{AwsConfig, AwsServices, FunctionCodeUpdater, StackResourceLister};
    pub use fastpush_config::FastpushConfig;
    pub use fastpush_update::{
        CacheStore, CdkSynthesizer, FunctionUpdater, Synthesizer, TemplateFileSynthesizer,
        UpdateOutcome, UpdateReport,
    };

    #[cfg(feature = "construct")]
    pub use fastpush_construct::{Dependency, FunctionDefinition, FunctionProps, Registry};
}
