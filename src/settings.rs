use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};

use jobs::{ResourceSpec, Walltime};

use crate::args::Args;
use crate::env::EnvConfig;
use crate::pipeline::{OrchestratorConfig, RunMode, StageSettings};

#[derive(thiserror::Error, Debug)]
pub enum Error {
    #[error("Genome file not found: {0}")]
    GenomeNotFound(String),
    #[error("Reference genome not found: {0}")]
    ReferenceNotFound(String),
    #[error("--threads must be at least 1")]
    NoThreads,
}

/// Settings are like Args, except all the logic has
/// been applied so e.g. paths are checked and canonicalized.
#[derive(Debug)]
pub struct Settings {
    pub genome: PathBuf,
    pub output: PathBuf,
    pub threads: usize,
    pub busco_dbs: Vec<String>,
    pub reference: Option<PathBuf>,
    pub organism: String,
    pub min_telomere_length: u32,

    pub cluster: bool,
    pub dry_run: bool,
    pub resources: ResourceSpec,

    pub yes: bool,
    pub verbose: u8,

    pub env_manager: String,
    pub module_cmd: String,
    /// `MODULESHOME` from the environment
    pub modules_home: Option<String>,
    pub submit_cmd: String,
    pub probe_timeout: Duration,
}

impl Settings {
    pub fn mode(&self) -> RunMode {
        if self.cluster {
            RunMode::Deferred {
                dry_run: self.dry_run,
            }
        } else {
            RunMode::Immediate
        }
    }

    pub fn stage_settings(&self) -> StageSettings {
        StageSettings {
            genome: self.genome.clone(),
            threads: self.threads,
            organism: self.organism.clone(),
            min_telomere_length: self.min_telomere_length,
            reference: self.reference.clone(),
            busco_dbs: self.busco_dbs.clone(),
        }
    }

    pub fn orchestrator_config(&self) -> OrchestratorConfig {
        OrchestratorConfig {
            env: EnvConfig {
                manager: self.env_manager.clone(),
                module_cmd: self.module_cmd.clone(),
                modules_home: self.modules_home.clone(),
                probe_timeout: self.probe_timeout,
            },
            submit_cmd: self.submit_cmd.clone(),
            resources: self.resources.clone(),
        }
    }
}

fn existing_file(path: &str, err: fn(String) -> Error) -> Result<PathBuf> {
    let path = Path::new(path);
    if !path.exists() {
        return Err(err(path.display().to_string()).into());
    }
    path.canonicalize()
        .with_context(|| format!("while resolving path {:?}", path))
}

impl TryFrom<Args> for Settings {
    type Error = anyhow::Error;
    fn try_from(args: Args) -> Result<Self, Self::Error> {
        let genome = existing_file(&args.genome, Error::GenomeNotFound)?;
        let reference = args
            .reference
            .as_deref()
            .map(|r| existing_file(r, Error::ReferenceNotFound))
            .transpose()?;

        if args.dry_run && !args.cluster {
            log::warn!("--dry-run only applies with --cluster; running stages directly");
        }
        if args.threads == 0 {
            return Err(Error::NoThreads.into());
        }

        let resources = ResourceSpec {
            queue: args.pbs_queue,
            nodes: args.pbs_nodes,
            cores_per_node: args.pbs_ppn,
            walltime: Walltime::new(args.pbs_walltime),
        };

        Ok(Self {
            genome,
            output: PathBuf::from(args.output),
            threads: args.threads,
            busco_dbs: args.busco,
            reference,
            organism: args.organism_type.as_str().to_owned(),
            min_telomere_length: args.min_telomere_length,
            cluster: args.cluster,
            dry_run: args.dry_run && args.cluster,
            resources,
            yes: args.yes,
            verbose: args.verbose,
            env_manager: args.env_manager,
            module_cmd: args.module_cmd,
            modules_home: std::env::var("MODULESHOME").ok(),
            submit_cmd: args.submit_cmd,
            probe_timeout: Duration::from_secs(args.probe_timeout),
        })
    }
}
