use std::path::{Path, PathBuf};

use util::{shell_join, shell_quote};

use crate::env::{ExecutionContext, ToolRequest};
use crate::exec::ToolProbe;

use super::Payload;

/// One named unit of the analysis sequence.
///
/// A stage only describes its work; the orchestrator decides whether that
/// work runs here and now or goes into a batch script.
pub trait Stage {
    /// Key for this stage's result. Unique within a run.
    fn key(&self) -> String;

    /// Heading for this stage in the text summary.
    fn title(&self) -> String;

    /// Batch job name; also names the script and the job's log files.
    fn job_name(&self) -> String;

    /// Working directory name, under the output directory.
    fn dir_name(&self) -> &str;

    /// Decide what to run, checking tool availability with `probe` if needed.
    fn plan(&self, probe: &ToolProbe<'_>, workdir: &Path) -> StagePlan;

    /// Job names this stage's batch job must wait for.
    fn depends_on(&self) -> Vec<String> {
        Vec::new()
    }
}

pub enum StagePlan {
    /// Nothing can run; the string says why.
    Skip(String),
    Run(StageWork),
}

/// The commands for a stage, plus what to report on success.
#[derive(Debug, Clone)]
pub struct StageWork {
    /// Primary tool, reported in the result.
    pub tool: String,
    pub steps: Vec<Step>,
    /// Environment named in the batch script's activation hint.
    pub env_hint: Option<String>,
    /// Extra result fields on success.
    pub details: Payload,
}

impl StageWork {
    pub fn new(tool: impl Into<String>, steps: Vec<Step>) -> Self {
        Self {
            tool: tool.into(),
            steps,
            env_hint: None,
            details: Payload::new(),
        }
    }

    pub fn with_env_hint(mut self, env: impl Into<String>) -> Self {
        self.env_hint = Some(env.into());
        self
    }

    pub fn detail(mut self, key: &str, value: impl Into<String>) -> Self {
        self.details.insert(key.to_owned(), value.into());
        self
    }
}

/// How a step's program is found.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StepTool {
    /// Resolve an execution context for this request first.
    Resolve(ToolRequest),
    /// Run the program straight from `PATH`.
    Direct,
}

/// A single command in a stage.
#[derive(Debug, Clone)]
pub struct Step {
    pub tool: StepTool,
    /// Program followed by its arguments.
    pub args: Vec<String>,
    /// Write the command's stdout to this file.
    pub stdout_to: Option<PathBuf>,
    /// A non-zero exit is logged and the stage carries on.
    pub optional: bool,
    /// Run only if all of these exist.
    pub only_if_exists: Vec<PathBuf>,
}

impl Step {
    fn new<I, S>(tool: StepTool, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            tool,
            args: args.into_iter().map(Into::into).collect(),
            stdout_to: None,
            optional: false,
            only_if_exists: Vec::new(),
        }
    }

    pub fn resolved<I, S>(req: ToolRequest, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::new(StepTool::Resolve(req), args)
    }

    pub fn direct<I, S>(args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::new(StepTool::Direct, args)
    }

    pub fn capture(mut self, path: impl Into<PathBuf>) -> Self {
        self.stdout_to = Some(path.into());
        self
    }

    pub fn optional(mut self) -> Self {
        self.optional = true;
        self
    }

    pub fn only_if_exists<I: IntoIterator<Item = PathBuf>>(mut self, paths: I) -> Self {
        self.only_if_exists.extend(paths);
        self
    }

    /// The program this step runs.
    pub fn program(&self) -> &str {
        self.args.first().map(String::as_str).unwrap_or_default()
    }

    /// Render this step as one line of a batch script. Resolved tools are
    /// assumed to live in a managed environment named after the tool.
    pub fn shell_line(&self, manager: &str) -> String {
        let mut line = match &self.tool {
            StepTool::Resolve(req) => {
                ExecutionContext::Managed(req.tool.clone()).shell_line(manager, &self.args)
            }
            StepTool::Direct => shell_join(&self.args),
        };
        if let Some(path) = &self.stdout_to {
            line.push_str(" > ");
            line.push_str(&shell_quote(&path.to_string_lossy()));
        }
        if self.optional {
            line.push_str(&format!(" || echo '{} failed; continuing'", self.program()));
        }
        if !self.only_if_exists.is_empty() {
            let tests: Vec<String> = self
                .only_if_exists
                .iter()
                .map(|p| format!("[ -f {} ]", shell_quote(&p.to_string_lossy())))
                .collect();
            line = format!("if {}; then {line}; fi", tests.join(" && "));
        }
        line
    }
}
