use std::path::{Path, PathBuf};

use colored::Colorize;

use jobs::{JobId, JobRegistry, JobScriptBuilder, JobSpec, JobState};

use crate::exec::{CommandLine, Spawner};
use crate::fs::Fs;

use super::Error;

/// Result of handing one job to the scheduler.
#[derive(Debug, Clone)]
pub struct Scheduled {
    pub script: PathBuf,
    pub state: JobState,
}

/// Owns the job registry for one run: renders each `JobSpec` to a script,
/// submits it (or only logs it in a dry run), and records the outcome so
/// later jobs can depend on it.
///
/// A failed submission doesn't stop anything; the job is recorded as failed
/// and the run carries on.
pub struct JobScheduler<'a> {
    spawner: &'a dyn Spawner,
    /// batch submission command, e.g. `qsub`
    submit_cmd: String,
    dry_run: bool,
    registry: JobRegistry,
    /// reused for rendering every script
    strbuf: String,
}

impl<'a> JobScheduler<'a> {
    pub fn new(spawner: &'a dyn Spawner, submit_cmd: impl Into<String>, dry_run: bool) -> Self {
        Self {
            spawner,
            submit_cmd: submit_cmd.into(),
            dry_run,
            registry: JobRegistry::default(),
            strbuf: String::with_capacity(2048),
        }
    }

    pub fn registry(&self) -> &JobRegistry {
        &self.registry
    }

    pub fn is_dry_run(&self) -> bool {
        self.dry_run
    }

    /// Render, write and submit `spec`, then record what happened.
    ///
    /// Fails only if the script can't be produced: an undeclared dependency,
    /// or an I/O error writing it. Submission problems are reported through
    /// the returned `JobState`.
    pub fn schedule(&mut self, spec: &JobSpec, fs: &Fs) -> Result<Scheduled, Error> {
        JobScriptBuilder::new(&mut self.strbuf).build(spec, &self.registry)?;

        let script = fs.script_path(&spec.name);
        fs.create_dir(fs.script_dir())
            .and_then(|_| fs.write_executable(&script, &self.strbuf))
            .map_err(|e| Error::WriteScript(script.display().to_string(), e))?;
        log::info!("PBS script written to: {}", script.display());

        let state = if self.dry_run {
            self.submit(&script);
            JobState::Unsubmitted
        } else {
            match self.submit(&script) {
                Some(id) => JobState::Submitted(id),
                None => JobState::SubmissionFailed,
            }
        };
        self.registry.declare(&spec.name, state.clone());
        Ok(Scheduled { script, state })
    }

    /// Hand `script` to the submission command and return the id it prints.
    /// In a dry run, only logs what would have been done.
    pub fn submit(&self, script: &Path) -> Option<JobId> {
        if self.dry_run {
            log::info!("[DRY RUN] Would submit job: {} {}", self.submit_cmd, script.display());
            return None;
        }

        let cmd = CommandLine::new(&self.submit_cmd).arg(script.display().to_string());
        match self.spawner.output(&cmd, None) {
            Ok(out) if out.success() => match parse_job_id(&out.stdout) {
                Some(id) => {
                    log::info!("Job submitted successfully: {id}");
                    Some(id)
                }
                None => {
                    log::error!("{} printed no job id for {}", self.submit_cmd, script.display());
                    None
                }
            },
            Ok(out) => {
                log::error!("Failed to submit job: {}", out.stderr.trim());
                eprintln!("{} {}", "SUBMIT FAILED".red(), script.display());
                None
            }
            Err(e) => {
                log::error!(
                    "{} could not be run ({e}); is PBS/Torque installed?",
                    self.submit_cmd
                );
                eprintln!("{} {}", "SUBMIT FAILED".red(), script.display());
                None
            }
        }
    }

    /// Record a job id obtained outside `schedule`.
    pub fn record(&mut self, name: &str, id: JobId) -> bool {
        self.registry.record(name, id)
    }
}

/// The first non-empty line of the submission command's output.
fn parse_job_id(stdout: &str) -> Option<JobId> {
    stdout
        .lines()
        .map(str::trim)
        .find(|line| !line.is_empty())
        .map(JobId::new)
}
