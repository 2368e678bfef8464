//! Scripted process table for tests.
//!
//! `ScriptedSpawner` answers each `CommandLine` from a list of rules instead of
//! starting anything, and remembers every invocation so tests can assert on
//! what would have been run. Programs without a rule behave as if they were
//! not installed.

use std::cell::RefCell;
use std::io;
use std::time::Duration;

use super::{CommandLine, RunOutput, Spawner};

/// What a scripted program does when invoked.
#[derive(Debug, Clone)]
pub enum Reply {
    Exit(RunOutput),
    TimedOut,
}

impl Reply {
    pub fn ok(stdout: &str) -> Self {
        Self::Exit(RunOutput {
            exit_code: Some(0),
            stdout: stdout.to_owned(),
            stderr: String::new(),
            not_found: false,
        })
    }

    pub fn fail(code: i32, stderr: &str) -> Self {
        Self::Exit(RunOutput {
            exit_code: Some(code),
            stdout: String::new(),
            stderr: stderr.to_owned(),
            not_found: false,
        })
    }
}

#[derive(Debug)]
struct Rule {
    program: String,
    args_prefix: Vec<String>,
    reply: Reply,
}

#[derive(Debug, Default)]
pub struct ScriptedSpawner {
    rules: RefCell<Vec<Rule>>,
    calls: RefCell<Vec<CommandLine>>,
}

impl ScriptedSpawner {
    pub fn new() -> Self {
        Self::default()
    }

    /// Answer any invocation of `program` whose arguments start with `args_prefix`.
    /// Later rules take precedence over earlier ones.
    pub fn on(&self, program: &str, args_prefix: &[&str], reply: Reply) -> &Self {
        self.rules.borrow_mut().push(Rule {
            program: program.to_owned(),
            args_prefix: args_prefix.iter().map(|s| s.to_string()).collect(),
            reply,
        });
        self
    }

    /// Every invocation so far, in order.
    pub fn calls(&self) -> Vec<CommandLine> {
        self.calls.borrow().clone()
    }

    /// Number of invocations of `program`.
    pub fn calls_to(&self, program: &str) -> usize {
        self.calls
            .borrow()
            .iter()
            .filter(|c| c.program == program)
            .count()
    }
}

impl Spawner for ScriptedSpawner {
    fn output(&self, cmd: &CommandLine, _timeout: Option<Duration>) -> io::Result<RunOutput> {
        self.calls.borrow_mut().push(cmd.clone());
        let rules = self.rules.borrow();
        let rule = rules
            .iter()
            .rev()
            .find(|r| r.program == cmd.program && cmd.args.starts_with(&r.args_prefix));
        match rule.map(|r| &r.reply) {
            Some(Reply::Exit(out)) => Ok(out.clone()),
            Some(Reply::TimedOut) => Err(io::Error::new(io::ErrorKind::TimedOut, "timed out")),
            None => Err(io::Error::new(
                io::ErrorKind::NotFound,
                format!("{}: command not found", cmd.program),
            )),
        }
    }
}
