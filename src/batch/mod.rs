/// Writes, submits and records batch jobs
mod scheduler;
pub use scheduler::{JobScheduler, Scheduled};

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Unable to render batch script")]
    Build(#[from] jobs::Error),
    #[error("Unable to write batch script {0}")]
    WriteScript(String, #[source] anyhow::Error),
}
