use std::fmt;

use util::{shell_join, shell_quote};

/// Pick an execution context for each tool
mod resolver;
pub use resolver::{EnvConfig, EnvironmentResolver};

/// Parsing the output of environment and module listings
mod listing;

/// Where a tool runs. A plain descriptor; resolving one doesn't
/// load or activate anything.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExecutionContext {
    /// A named managed environment, run through the environment manager's launcher.
    Managed(String),
    /// A site module, loaded into a fresh shell before the command.
    Module(String),
    /// Whatever `PATH` resolves the command to.
    System(String),
}

impl ExecutionContext {
    pub fn name(&self) -> &str {
        match self {
            Self::Managed(name) | Self::Module(name) | Self::System(name) => name,
        }
    }

    /// Short label used in logs and result payloads.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Managed(_) => "env",
            Self::Module(_) => "module",
            Self::System(_) => "system",
        }
    }

    /// The script for `module load` + command, as one shell string.
    /// Every argument is quoted on its own.
    pub fn module_script<S: AsRef<str>>(module: &str, args: &[S]) -> String {
        format!("module load {} && {}", shell_quote(module), shell_join(args))
    }

    /// Render `args` run in this context as a single shell line,
    /// `manager` being the environment manager's executable.
    pub fn shell_line<S: AsRef<str>>(&self, manager: &str, args: &[S]) -> String {
        match self {
            Self::Managed(env) => format!(
                "{} run -n {} {}",
                shell_quote(manager),
                shell_quote(env),
                shell_join(args)
            ),
            Self::Module(module) => Self::module_script(module, args),
            Self::System(_) => shell_join(args),
        }
    }
}

impl fmt::Display for ExecutionContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.kind(), self.name())
    }
}

/// A tool that needs an execution context.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ToolRequest {
    pub tool: String,
    /// Package to install if we have to create an environment; defaults to `tool`.
    pub package: Option<String>,
    /// Channels to install from, in priority order.
    pub channels: Vec<String>,
}

impl ToolRequest {
    pub fn new(tool: impl Into<String>) -> Self {
        Self {
            tool: tool.into(),
            package: None,
            channels: Vec::new(),
        }
    }

    /// Shortcut for the usual bioconda + conda-forge channel pair.
    pub fn bioconda(tool: impl Into<String>) -> Self {
        Self::new(tool).with_channels(["bioconda", "conda-forge"])
    }

    pub fn with_package(mut self, package: impl Into<String>) -> Self {
        self.package = Some(package.into());
        self
    }

    pub fn with_channels<I, S>(mut self, channels: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.channels.extend(channels.into_iter().map(Into::into));
        self
    }

    pub fn package(&self) -> &str {
        self.package.as_deref().unwrap_or(&self.tool)
    }
}
