use std::collections::BTreeMap;

use serde::Serialize;

/// Free-form details attached to a stage result, e.g. `tool`, `output_dir`, `error`.
pub type Payload = BTreeMap<String, String>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum StageStatus {
    Success,
    /// A command ran and exited non-zero.
    Failed,
    /// Something on our side went wrong (e.g. couldn't write an output file).
    Error,
    /// The stage couldn't run at all: tool absent with no fallback, or missing input.
    Skipped,
}

impl StageStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Success => "success",
            Self::Failed => "failed",
            Self::Error => "error",
            Self::Skipped => "skipped",
        }
    }
}

/// The outcome of one stage. Created once, never modified.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StageResult {
    status: StageStatus,
    #[serde(flatten)]
    payload: Payload,
}

impl StageResult {
    pub fn new(status: StageStatus, payload: Payload) -> Self {
        Self { status, payload }
    }

    pub fn success(payload: Payload) -> Self {
        Self::new(StageStatus::Success, payload)
    }

    pub fn failed(payload: Payload) -> Self {
        Self::new(StageStatus::Failed, payload)
    }

    pub fn error(payload: Payload) -> Self {
        Self::new(StageStatus::Error, payload)
    }

    pub fn skipped(reason: &str) -> Self {
        let mut payload = Payload::new();
        payload.insert("reason".to_owned(), reason.to_owned());
        Self::new(StageStatus::Skipped, payload)
    }

    pub fn status(&self) -> StageStatus {
        self.status
    }

    pub fn payload(&self) -> &Payload {
        &self.payload
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.payload.get(key).map(String::as_str)
    }
}
