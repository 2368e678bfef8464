use std::path::Path;

use colored::Colorize;

use jobs::{JobSpec, JobState, ResourceSpec};
use util::HashSet;

use crate::batch::{self, JobScheduler};
use crate::env::{EnvConfig, EnvironmentResolver, ExecutionContext};
use crate::exec::{CommandRunner, RunOutput, Spawner, ToolProbe};
use crate::fs::Fs;

use super::{Payload, Stage, StagePlan, StageResult, StageStatus, StageWork, StepTool};

/// How stage work gets executed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunMode {
    /// Run every command here, one after another, and collect results.
    Immediate,
    /// Write one batch script per stage and hand it to the scheduler.
    Deferred { dry_run: bool },
}

#[derive(Debug, Clone)]
pub struct OrchestratorConfig {
    pub env: EnvConfig,
    /// batch submission command, e.g. `qsub`
    pub submit_cmd: String,
    /// requested for every batch job
    pub resources: ResourceSpec,
}

/// One stage's entry in the outcome, in run order.
#[derive(Debug, Clone)]
pub struct StageRecord {
    pub key: String,
    pub title: String,
    pub result: StageResult,
}

/// Everything a run produced.
#[derive(Debug)]
pub struct PipelineOutcome {
    pub mode: RunMode,
    pub records: Vec<StageRecord>,
    /// Batch jobs in scheduling order. Empty in immediate mode.
    pub jobs: Vec<(String, JobState)>,
}

impl PipelineOutcome {
    pub fn get(&self, key: &str) -> Option<&StageResult> {
        self.records.iter().find(|r| r.key == key).map(|r| &r.result)
    }
}

enum Backend<'a> {
    Immediate {
        resolver: EnvironmentResolver<'a>,
        runner: CommandRunner<'a>,
    },
    Deferred(JobScheduler<'a>),
}

/// Runs the stage sequence and produces exactly one `StageResult` per stage.
///
/// Nothing a stage does stops the run: missing tools, failing commands and
/// failed submissions all end up in that stage's result. The one exception
/// is a batch job that names a dependency nobody scheduled, which is a
/// mistake in the stage list and aborts the run.
pub struct Orchestrator<'a> {
    fs: &'a Fs,
    probe: ToolProbe<'a>,
    /// launcher baked into batch scripts
    manager: String,
    resources: ResourceSpec,
    mode: RunMode,
    backend: Backend<'a>,
}

impl<'a> Orchestrator<'a> {
    pub fn new(
        spawner: &'a dyn Spawner,
        fs: &'a Fs,
        mode: RunMode,
        config: OrchestratorConfig,
    ) -> Self {
        let probe = ToolProbe::new(spawner, config.env.probe_timeout);
        let manager = config.env.manager.clone();
        let backend = match mode {
            RunMode::Immediate => Backend::Immediate {
                runner: CommandRunner::new(spawner, &manager),
                resolver: EnvironmentResolver::new(spawner, config.env),
            },
            RunMode::Deferred { dry_run } => {
                Backend::Deferred(JobScheduler::new(spawner, config.submit_cmd, dry_run))
            }
        };
        Self {
            fs,
            probe,
            manager,
            resources: config.resources,
            mode,
            backend,
        }
    }

    /// Run `stages` in order.
    ///
    /// Returns an error only if a batch script can't be rendered because it
    /// depends on a job that wasn't scheduled earlier in this run.
    pub fn run(&mut self, stages: &[Box<dyn Stage>]) -> Result<PipelineOutcome, batch::Error> {
        let mut records = Vec::with_capacity(stages.len());
        let mut seen = HashSet::default();

        for stage in stages {
            let key = stage.key();
            if !seen.insert(key.clone()) {
                log::warn!("stage {key} is listed more than once; running it only the first time");
                continue;
            }
            let title = stage.title();
            eprintln!("{} {}", "STAGE".green(), title);

            let result = self.run_stage(stage.as_ref())?;
            match result.status() {
                StageStatus::Success => log::info!("{key}: {}", result.status().as_str()),
                status => log::warn!("{key}: {}", status.as_str()),
            }
            records.push(StageRecord { key, title, result });
        }

        let jobs = match &self.backend {
            Backend::Deferred(scheduler) => scheduler
                .registry()
                .iter()
                .map(|(name, state)| (name.to_owned(), state.clone()))
                .collect(),
            Backend::Immediate { .. } => Vec::new(),
        };
        Ok(PipelineOutcome {
            mode: self.mode,
            records,
            jobs,
        })
    }

    fn run_stage(&mut self, stage: &dyn Stage) -> Result<StageResult, batch::Error> {
        let fs = self.fs;
        let workdir = fs.stage_dir(stage.dir_name());
        if let Err(e) = fs.create_dir(&workdir) {
            log::error!("could not create {}: {e:#}", workdir.display());
            return Ok(StageResult::error(payload([("error", format!("{e:#}"))])));
        }

        let work = match stage.plan(&self.probe, &workdir) {
            StagePlan::Skip(reason) => {
                log::warn!("Skipping {}: {reason}", stage.key());
                return Ok(StageResult::skipped(&reason));
            }
            StagePlan::Run(work) => work,
        };

        match &mut self.backend {
            Backend::Immediate { resolver, runner } => {
                Ok(run_immediate(fs, resolver, runner, &work, &workdir))
            }
            Backend::Deferred(scheduler) => {
                let commands = work.steps.iter().map(|step| step.shell_line(&self.manager));
                let mut spec = JobSpec::new(stage.job_name(), &workdir, self.resources.clone())
                    .with_commands(commands);
                if let Some(env) = &work.env_hint {
                    spec = spec.with_env_name(env);
                }
                for dependency in stage.depends_on() {
                    spec = spec.depends_on(dependency);
                }
                schedule(fs, scheduler, &spec, &work)
            }
        }
    }
}

/// Run each step in turn, stopping at the first required step that fails.
fn run_immediate(
    fs: &Fs,
    resolver: &mut EnvironmentResolver<'_>,
    runner: &CommandRunner<'_>,
    work: &StageWork,
    workdir: &Path,
) -> StageResult {
    let mut contexts: Vec<String> = Vec::new();

    for step in &work.steps {
        if let Some(missing) = step.only_if_exists.iter().find(|p| !fs.exists(p)) {
            log::warn!("{} skipped: {} not found", step.program(), missing.display());
            continue;
        }

        let ctx = match &step.tool {
            StepTool::Resolve(req) => resolver.resolve(req),
            StepTool::Direct => ExecutionContext::System(step.program().to_owned()),
        };
        let ctx_label = ctx.to_string();
        if !contexts.contains(&ctx_label) {
            contexts.push(ctx_label);
        }

        let out = runner.run(&ctx, &step.args, Some(workdir));
        if !out.success() {
            let diagnostic = diagnostic(&out);
            if step.optional {
                log::warn!("{} failed; continuing: {diagnostic}", step.program());
                continue;
            }
            if out.not_found {
                log::warn!("Skipping stage: {} is not installed", step.program());
                return StageResult::skipped(&format!("{} is not installed", step.program()));
            }
            log::error!("{} failed: {diagnostic}", step.program());
            return StageResult::failed(payload([
                ("tool", work.tool.clone()),
                ("failed_step", step.program().to_owned()),
                ("error", diagnostic),
            ]));
        }

        if let Some(path) = &step.stdout_to {
            if let Err(e) = fs.write_file(path, &out.stdout) {
                log::error!("could not write {}: {e:#}", path.display());
                return StageResult::error(payload([
                    ("tool", work.tool.clone()),
                    ("error", format!("writing {}: {e:#}", path.display())),
                ]));
            }
            log::info!("{} output saved to {}", step.program(), path.display());
        }
    }

    let mut details = work.details.clone();
    details.insert("tool".to_owned(), work.tool.clone());
    details
        .entry("output_dir".to_owned())
        .or_insert_with(|| workdir.display().to_string());
    if !contexts.is_empty() {
        details.insert("context".to_owned(), contexts.join(", "));
    }
    StageResult::success(details)
}

/// Write and submit the stage's batch job. Submission problems become a
/// `Failed` result; only a bad dependency is an error.
fn schedule(
    fs: &Fs,
    scheduler: &mut JobScheduler<'_>,
    spec: &JobSpec,
    work: &StageWork,
) -> Result<StageResult, batch::Error> {
    let scheduled = match scheduler.schedule(spec, fs) {
        Ok(scheduled) => scheduled,
        Err(e @ batch::Error::Build(_)) => return Err(e),
        Err(e @ batch::Error::WriteScript(..)) => {
            log::error!("{e}");
            return Ok(StageResult::error(payload([
                ("tool", work.tool.clone()),
                ("job_name", spec.name.clone()),
                ("error", format!("{:#}", anyhow::Error::from(e))),
            ])));
        }
    };

    let mut details = payload([
        ("tool", work.tool.clone()),
        ("job_name", spec.name.clone()),
        ("script", scheduled.script.display().to_string()),
    ]);
    match scheduled.state {
        JobState::Submitted(id) => {
            details.insert("job_id".to_owned(), id.to_string());
            Ok(StageResult::success(details))
        }
        JobState::Unsubmitted => {
            details.insert("submitted".to_owned(), "no (dry run)".to_owned());
            Ok(StageResult::success(details))
        }
        JobState::SubmissionFailed => {
            details.insert("error".to_owned(), "job submission failed".to_owned());
            Ok(StageResult::failed(details))
        }
    }
}

/// The most useful text to show for a failed command.
fn diagnostic(out: &RunOutput) -> String {
    let stderr = out.stderr.trim();
    let stdout = out.stdout.trim();
    if !stderr.is_empty() {
        stderr.to_owned()
    } else if !stdout.is_empty() {
        stdout.to_owned()
    } else {
        match out.exit_code {
            Some(code) => format!("exited with code {code}"),
            None => "terminated by a signal".to_owned(),
        }
    }
}

fn payload<const N: usize>(entries: [(&str, String); N]) -> Payload {
    entries.into_iter().map(|(k, v)| (k.to_owned(), v)).collect()
}

#[cfg(test)]
mod tests {
    use std::path::PathBuf;

    use anyhow::Result;
    use tempfile::tempdir;

    use super::*;
    use crate::env::ToolRequest;
    use crate::exec::fake::{Reply, ScriptedSpawner};
    use crate::pipeline::Step;

    /// A stage with fixed work, for driving the orchestrator directly.
    struct Fixed {
        key: &'static str,
        work: Option<StageWork>,
        deps: Vec<String>,
    }

    impl Stage for Fixed {
        fn key(&self) -> String {
            self.key.to_owned()
        }
        fn title(&self) -> String {
            self.key.to_uppercase()
        }
        fn job_name(&self) -> String {
            self.key.to_uppercase()
        }
        fn dir_name(&self) -> &str {
            self.key
        }
        fn plan(&self, _probe: &ToolProbe<'_>, _workdir: &Path) -> StagePlan {
            match &self.work {
                Some(work) => StagePlan::Run(work.clone()),
                None => StagePlan::Skip("nothing to do".to_owned()),
            }
        }
        fn depends_on(&self) -> Vec<String> {
            self.deps.clone()
        }
    }

    fn fixed(key: &'static str, steps: Vec<Step>) -> Box<dyn Stage> {
        Box::new(Fixed {
            key,
            work: Some(StageWork::new(key, steps)),
            deps: Vec::new(),
        })
    }

    fn config() -> OrchestratorConfig {
        OrchestratorConfig {
            env: EnvConfig::default(),
            submit_cmd: "qsub".to_owned(),
            resources: ResourceSpec::default(),
        }
    }

    #[test]
    fn test_optional_and_guarded_steps() -> Result<()> {
        let dir = tempdir()?;
        let fs = Fs::new(dir.path());
        let spawner = ScriptedSpawner::new();
        spawner
            .on("first", &[], Reply::ok("captured"))
            .on("flaky", &[], Reply::fail(1, "oops"));

        let out_file = dir.path().join("a").join("first.txt");
        let stages = vec![fixed(
            "a",
            vec![
                Step::direct(["first"]).capture(&out_file),
                Step::direct(["flaky"]).optional(),
                Step::direct(["guarded"]).only_if_exists([PathBuf::from("/no/such/file")]),
            ],
        )];
        let mut orch = Orchestrator::new(&spawner, &fs, RunMode::Immediate, config());
        let outcome = orch.run(&stages)?;

        let result = outcome.get("a").unwrap();
        assert_eq!(result.status(), StageStatus::Success);
        assert_eq!(result.get("context"), Some("system:first, system:flaky"));
        assert_eq!(std::fs::read_to_string(&out_file)?, "captured");
        assert_eq!(spawner.calls_to("guarded"), 0);
        Ok(())
    }

    #[test]
    fn test_first_failure_stops_stage_not_run() -> Result<()> {
        let dir = tempdir()?;
        let fs = Fs::new(dir.path());
        let spawner = ScriptedSpawner::new();
        spawner
            .on("ok", &[], Reply::ok(""))
            .on("broken", &[], Reply::fail(2, "broken: bad input"));

        let stages = vec![
            fixed("a", vec![Step::direct(["broken"]), Step::direct(["ok"])]),
            fixed("b", vec![Step::direct(["ok"])]),
            Box::new(Fixed {
                key: "c",
                work: None,
                deps: Vec::new(),
            }) as Box<dyn Stage>,
        ];
        let mut orch = Orchestrator::new(&spawner, &fs, RunMode::Immediate, config());
        let outcome = orch.run(&stages)?;

        let a = outcome.get("a").unwrap();
        assert_eq!(a.status(), StageStatus::Failed);
        assert_eq!(a.get("failed_step"), Some("broken"));
        assert_eq!(a.get("error"), Some("broken: bad input"));
        assert_eq!(spawner.calls_to("ok"), 1);

        assert_eq!(outcome.get("b").unwrap().status(), StageStatus::Success);
        assert_eq!(outcome.get("c").unwrap().get("reason"), Some("nothing to do"));
        assert!(outcome.jobs.is_empty());
        Ok(())
    }

    #[test]
    fn test_absent_tool_skips_stage() -> Result<()> {
        let dir = tempdir()?;
        let fs = Fs::new(dir.path());
        let spawner = ScriptedSpawner::new();
        spawner.on("ok", &[], Reply::ok(""));

        let stages = vec![
            fixed("a", vec![Step::direct(["ok"]), Step::direct(["absent"]), Step::direct(["ok"])]),
            fixed("b", vec![Step::direct(["absent"]).optional(), Step::direct(["ok"])]),
        ];
        let mut orch = Orchestrator::new(&spawner, &fs, RunMode::Immediate, config());
        let outcome = orch.run(&stages)?;

        let a = outcome.get("a").unwrap();
        assert_eq!(a.status(), StageStatus::Skipped);
        assert_eq!(a.get("reason"), Some("absent is not installed"));
        // a missing optional step doesn't skip anything:
        assert_eq!(outcome.get("b").unwrap().status(), StageStatus::Success);
        assert_eq!(spawner.calls_to("ok"), 2);
        Ok(())
    }

    #[test]
    fn test_duplicate_key_recorded_once() -> Result<()> {
        let dir = tempdir()?;
        let fs = Fs::new(dir.path());
        let spawner = ScriptedSpawner::new();
        spawner.on("ok", &[], Reply::ok(""));

        let stages = vec![
            fixed("a", vec![Step::direct(["ok"])]),
            fixed("a", vec![Step::direct(["ok"])]),
        ];
        let mut orch = Orchestrator::new(&spawner, &fs, RunMode::Immediate, config());
        let outcome = orch.run(&stages)?;
        assert_eq!(outcome.records.len(), 1);
        assert_eq!(spawner.calls_to("ok"), 1);
        Ok(())
    }

    #[test]
    fn test_deferred_submission() -> Result<()> {
        let dir = tempdir()?;
        let fs = Fs::new(dir.path());
        let spawner = ScriptedSpawner::new();
        spawner.on("qsub", &[], Reply::ok("4242.pbs-server\n"));

        let step = Step::resolved(ToolRequest::bioconda("seqkit"), ["seqkit", "stats", "g.fa"]);
        let work = StageWork::new("seqkit", vec![step]).with_env_hint("seqkit");
        let stages: Vec<Box<dyn Stage>> = vec![
            Box::new(Fixed {
                key: "a",
                work: Some(work),
                deps: Vec::new(),
            }),
            Box::new(Fixed {
                key: "b",
                work: Some(StageWork::new("x", vec![Step::direct(["x"])])),
                deps: vec!["A".to_owned()],
            }),
        ];
        let mode = RunMode::Deferred { dry_run: false };
        let mut orch = Orchestrator::new(&spawner, &fs, mode, config());
        let outcome = orch.run(&stages)?;

        let a = outcome.get("a").unwrap();
        assert_eq!(a.status(), StageStatus::Success);
        assert_eq!(a.get("job_id"), Some("4242.pbs-server"));
        assert_eq!(outcome.jobs.len(), 2);

        let script = std::fs::read_to_string(fs.script_path("A"))?;
        assert!(script.contains("micromamba run -n seqkit seqkit stats g.fa"));
        let script = std::fs::read_to_string(fs.script_path("B"))?;
        assert!(script.contains("#PBS -W depend=afterok:4242.pbs-server"));
        // nothing is resolved when only writing scripts
        assert_eq!(spawner.calls_to("micromamba"), 0);
        Ok(())
    }

    #[test]
    fn test_deferred_submission_failure() -> Result<()> {
        let dir = tempdir()?;
        let fs = Fs::new(dir.path());
        let spawner = ScriptedSpawner::new();
        spawner.on("qsub", &[], Reply::fail(1, "qsub: Unknown queue"));

        let stages = vec![
            fixed("a", vec![Step::direct(["x"])]),
            fixed("b", vec![Step::direct(["y"])]),
        ];
        let mode = RunMode::Deferred { dry_run: false };
        let mut orch = Orchestrator::new(&spawner, &fs, mode, config());
        let outcome = orch.run(&stages)?;

        assert_eq!(outcome.records.len(), 2);
        for record in &outcome.records {
            assert_eq!(record.result.status(), StageStatus::Failed);
            assert!(record.result.get("script").is_some());
        }
        assert_eq!(spawner.calls_to("qsub"), 2);
        Ok(())
    }

    #[test]
    fn test_unknown_dependency_aborts() -> Result<()> {
        let dir = tempdir()?;
        let fs = Fs::new(dir.path());
        let spawner = ScriptedSpawner::new();

        let stages: Vec<Box<dyn Stage>> = vec![Box::new(Fixed {
            key: "a",
            work: Some(StageWork::new("x", vec![Step::direct(["x"])])),
            deps: vec!["NEVER_DECLARED".to_owned()],
        })];
        let mode = RunMode::Deferred { dry_run: true };
        let mut orch = Orchestrator::new(&spawner, &fs, mode, config());
        let err = orch.run(&stages).unwrap_err();
        assert!(matches!(err, batch::Error::Build(jobs::Error::UnknownDependency { .. })));
        assert!(!fs.script_path("A").exists());
        Ok(())
    }
}
