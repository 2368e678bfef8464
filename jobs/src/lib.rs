/// Job and resource descriptions
mod spec;
pub use spec::{JobId, JobSpec, ResourceSpec, Walltime};

/// Record of every job that went through the scheduler in one run
mod registry;
pub use registry::{JobRegistry, JobState};

/// Utility for generating the contents of a batch script
mod script_builder;
pub use script_builder::JobScriptBuilder;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Job \"{job}\" depends on \"{dependency}\", which was not scheduled before it")]
    UnknownDependency { job: String, dependency: String },
    #[error(transparent)]
    PathEncoding(#[from] util::PathEncodingError),
}
