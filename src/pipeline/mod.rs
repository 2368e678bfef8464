/// Per-stage outcome records
mod result;
pub use result::{Payload, StageResult, StageStatus};

/// What a stage is and how it describes its work
mod stage;
pub use stage::{Stage, StagePlan, StageWork, Step, StepTool};

/// The fixed analysis sequence
mod stages;
pub use stages::{standard_stages, StageSettings};

/// Runs stages, locally or as batch jobs
mod orchestrator;
pub use orchestrator::{Orchestrator, OrchestratorConfig, PipelineOutcome, RunMode, StageRecord};

/// Aggregated results for immediate runs
mod summary;
pub use summary::Summary;
