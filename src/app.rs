use anyhow::{Context, Result};
use colored::Colorize;

use jobs::JobState;

use crate::exec::{Spawner, SystemSpawner};
use crate::fs::Fs;
use crate::pipeline::{standard_stages, Orchestrator, PipelineOutcome, RunMode, Summary};
use crate::settings::Settings;
use crate::ui::Ui;

/// This struct actually runs the command-line app.
pub struct App {
    /// Interpreted command line settings
    settings: Settings,
    /// Filesystem interface
    fs: Fs,
    /// User interface
    ui: Ui,
}

impl App {
    /// Create a new `App`.
    pub fn new(settings: Settings) -> Self {
        let fs = Fs::new(&settings.output);
        let ui = Ui::new(&settings);
        Self { settings, fs, ui }
    }

    /// Run the app against real processes on this host.
    pub fn run(self) -> Result<()> {
        let spawner = SystemSpawner::new(self.settings.verbose > 1);
        self.run_with(&spawner)?;
        Ok(())
    }

    /// Run the app, starting every external command through `spawner`.
    ///
    /// Returns `None` if the user declined to submit batch jobs.
    pub fn run_with(mut self, spawner: &dyn Spawner) -> Result<Option<PipelineOutcome>> {
        self.fs.ensure_output_dir_exists(self.ui.verbose)?;
        self.log_header();

        let stages = standard_stages(&self.settings.stage_settings());
        let mode = self.settings.mode();

        if mode == (RunMode::Deferred { dry_run: false }) {
            let prompt = format!(
                "Submit up to {} jobs to queue '{}' with {}?",
                stages.len(),
                self.settings.resources.queue,
                self.settings.submit_cmd,
            );
            if !self.ui.confirm(&prompt)? {
                return Ok(None);
            }
        }

        eprintln!("\n{}.\n", "Starting genome QC pipeline".magenta());
        self.ui.start_timer();

        let config = self.settings.orchestrator_config();
        let outcome = Orchestrator::new(spawner, &self.fs, mode, config)
            .run(&stages)
            .context("while running pipeline")?;

        self.ui.print_elapsed("Pipeline");

        match mode {
            RunMode::Immediate => self.write_summary(&outcome)?,
            RunMode::Deferred { dry_run } => self.print_cluster_summary(&outcome, dry_run),
        }
        Ok(Some(outcome))
    }

    fn log_header(&self) {
        let s = &self.settings;
        log::info!("Starting Genome QC Pipeline");
        log::info!("Genome: {}", s.genome.display());
        log::info!("Output: {}", self.fs.output_dir().display());
        log::info!("Threads: {}", s.threads);
        if s.cluster {
            log::info!("Cluster Mode: ENABLED");
            log::info!("PBS Queue: {}", s.resources.queue);
            log::info!(
                "PBS Resources: nodes={}:ppn={}",
                s.resources.nodes,
                s.resources.cores_per_node
            );
            log::info!("PBS Walltime: {}", s.resources.walltime);
            if s.dry_run {
                log::info!("DRY RUN MODE: Jobs will not be submitted");
            }
        }
    }
}

// REPORTING ////////////
impl App {
    fn write_summary(&self, outcome: &PipelineOutcome) -> Result<()> {
        self.ui.verbose_progress("Writing summary report");
        let summary = Summary::new(&outcome.records)
            .with_header("Genome", self.settings.genome.display())
            .with_header("Output Directory", self.fs.output_dir().display())
            .with_header("Threads", self.settings.threads);

        let json_path = self.fs.summary_json();
        let json = summary.to_json().context("while serializing summary")?;
        self.fs
            .write_file(&json_path, &json)
            .with_context(|| format!("while writing {:?}", json_path))?;

        let txt_path = self.fs.summary_txt();
        let text = summary.render_text();
        self.fs
            .write_file(&txt_path, &text)
            .with_context(|| format!("while writing {:?}", txt_path))?;
        self.ui.done();

        println!("{text}");
        self.ui.notice("Summary JSON saved to:", json_path.display());
        self.ui.notice("Summary text report saved to:", txt_path.display());
        Ok(())
    }

    fn print_cluster_summary(&self, outcome: &PipelineOutcome, dry_run: bool) {
        eprintln!("\n{}", "=".repeat(60));
        eprintln!("{}", "CLUSTER MODE SUMMARY".green());
        eprintln!("{}", "=".repeat(60));
        eprintln!("PBS scripts directory: {}", self.fs.script_dir().display());

        if dry_run {
            eprintln!("DRY RUN: scripts were written but no jobs were submitted.");
            eprintln!("To submit jobs manually, run:");
            for (name, _) in &outcome.jobs {
                eprintln!("  qsub {}", self.fs.script_path(name).display());
            }
            return;
        }

        eprintln!("Submitted jobs:");
        for (name, state) in &outcome.jobs {
            match state {
                JobState::Submitted(id) => eprintln!("  {name}: {id}"),
                _ => self.ui.warning(&format!("  {name}: not submitted")),
            }
        }
        self.ui.verbose_msg("Monitor jobs with: qstat -u $USER");
    }
}
