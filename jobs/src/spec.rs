use std::fmt;
use std::path::PathBuf;

/// Identifier assigned by the batch scheduler on submission.
/// Opaque to us; only the scheduler knows what it means.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct JobId(String);

impl JobId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for JobId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Wall-clock limit for a job, kept exactly as the user wrote it
/// (`240:00:00`, `90:00`, `3600`). The scheduler decides what it accepts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Walltime(String);

impl Walltime {
    pub fn new(text: impl Into<String>) -> Self {
        Self(text.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Walltime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Resources requested from the scheduler. Not validated here;
/// the scheduler rejects what it can't satisfy.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResourceSpec {
    pub queue: String,
    pub nodes: u32,
    pub cores_per_node: u32,
    pub walltime: Walltime,
}

impl Default for ResourceSpec {
    fn default() -> Self {
        Self {
            queue: "high".to_owned(),
            nodes: 1,
            cores_per_node: 60,
            walltime: Walltime::new("240:00:00"),
        }
    }
}

/// Everything needed to render one batch script.
///
/// `name` is used for the script filename and log file prefixes, so it should be
/// unique within a run. Two specs with the same name write the same script path.
#[derive(Debug, Clone)]
pub struct JobSpec {
    pub name: String,
    /// Shell lines, copied into the script verbatim.
    pub commands: Vec<String>,
    pub working_dir: PathBuf,
    pub resources: ResourceSpec,
    /// Only emitted as a commented activation hint.
    pub env_name: Option<String>,
    /// Names of jobs that must finish successfully before this one starts.
    pub depends_on: Vec<String>,
}

impl JobSpec {
    pub fn new(
        name: impl Into<String>,
        working_dir: impl Into<PathBuf>,
        resources: ResourceSpec,
    ) -> Self {
        Self {
            name: name.into(),
            commands: Vec::new(),
            working_dir: working_dir.into(),
            resources,
            env_name: None,
            depends_on: Vec::new(),
        }
    }

    pub fn with_commands<I, S>(mut self, commands: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.commands.extend(commands.into_iter().map(Into::into));
        self
    }

    pub fn with_env_name(mut self, env_name: impl Into<String>) -> Self {
        self.env_name = Some(env_name.into());
        self
    }

    pub fn depends_on(mut self, job_name: impl Into<String>) -> Self {
        self.depends_on.push(job_name.into());
        self
    }
}
