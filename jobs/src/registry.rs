use util::HashMap;

use crate::JobId;

/// What happened to a job when it was handed to the scheduler.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum JobState {
    /// Script written but never submitted (dry run).
    Unsubmitted,
    Submitted(JobId),
    SubmissionFailed,
}

impl JobState {
    pub fn job_id(&self) -> Option<&JobId> {
        match self {
            Self::Submitted(id) => Some(id),
            _ => None,
        }
    }
}

/// Append-only record of the jobs scheduled during one run, keyed by job name.
///
/// Owned by a single scheduler; nothing here is global, so two runs in the same
/// process keep separate registries.
#[derive(Debug, Default)]
pub struct JobRegistry {
    /// declaration order
    entries: Vec<(String, JobState)>,
    /// name -> index into `entries`
    index: HashMap<String, usize>,
}

impl JobRegistry {
    /// Record the outcome for `name`. Returns false (and leaves the registry
    /// unchanged) if `name` was already recorded.
    pub fn declare(&mut self, name: &str, state: JobState) -> bool {
        if self.index.contains_key(name) {
            log::warn!("job \"{name}\" is already in the registry; keeping the first entry");
            return false;
        }
        self.index.insert(name.to_owned(), self.entries.len());
        self.entries.push((name.to_owned(), state));
        true
    }

    /// Record a successful submission.
    pub fn record(&mut self, name: &str, id: JobId) -> bool {
        self.declare(name, JobState::Submitted(id))
    }

    pub fn state(&self, name: &str) -> Option<&JobState> {
        self.index.get(name).map(|i| &self.entries[*i].1)
    }

    pub fn job_id(&self, name: &str) -> Option<&JobId> {
        self.state(name).and_then(JobState::job_id)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.index.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// All entries, in the order they were declared.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &JobState)> {
        self.entries.iter().map(|(name, state)| (name.as_str(), state))
    }

    /// Only the jobs that received an id, in declaration order.
    pub fn submitted(&self) -> impl Iterator<Item = (&str, &JobId)> {
        self.iter()
            .filter_map(|(name, state)| state.job_id().map(|id| (name, id)))
    }
}
