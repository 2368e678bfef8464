use util::PathEncodingError;

use crate::{Error, JobId, JobRegistry, JobSpec, ResourceSpec};

/// Shell expression evaluated when the job starts; never expanded here.
const TIME_EXPR: &str = "TIME=`date +%m%d_%H%M`";

/// Utility for building the contents of a batch script.
/// Note that it modifies a String reference held internally;
/// read that String to get the script's contents.
///
/// Output depends only on the `JobSpec` and the registry: the timestamps in the
/// script are shell expressions that run on the compute node.
#[derive(Debug)]
pub struct JobScriptBuilder<'a> {
    strbuf: &'a mut String,
}

impl<'a> JobScriptBuilder<'a> {
    pub fn new(strbuf: &'a mut String) -> Self {
        Self { strbuf }
    }
}

impl JobScriptBuilder<'_> {
    /// Render the whole script for `spec`.
    ///
    /// Every name in `spec.depends_on` must already be in `registry`; otherwise
    /// this fails and the buffer is left empty. Names that are registered but
    /// never received a job id (dry run, failed submission) are left out of the
    /// dependency directive.
    pub fn build(&mut self, spec: &JobSpec, registry: &JobRegistry) -> Result<(), Error> {
        self.strbuf.clear();
        let deps = resolve_dependencies(spec, registry)?;
        let working_dir = spec.working_dir.to_str().ok_or(PathEncodingError)?;

        self.write_directives(&spec.name, &spec.resources);
        self.write_dependencies(&deps);
        self.write_preamble(&spec.name, working_dir);
        if let Some(env_name) = &spec.env_name {
            self.write_env_hint(env_name);
        }
        self.write_commands(&spec.name, &spec.commands);
        self.write_completion();
        Ok(())
    }

    fn line(&mut self, text: &str) {
        self.strbuf.push_str(text);
        self.strbuf.push('\n');
    }

    fn write_directives(&mut self, name: &str, res: &ResourceSpec) {
        self.line("#!/bin/bash");
        self.line(&format!("#PBS -N {name}"));
        self.line(&format!("#PBS -q {}", res.queue));
        self.line(&format!("#PBS -l nodes={}:ppn={}", res.nodes, res.cores_per_node));
        self.line("#PBS -j oe");
        self.line(&format!("#PBS -l walltime={}", res.walltime));
    }

    fn write_dependencies(&mut self, deps: &[&JobId]) {
        if deps.is_empty() {
            return;
        }
        self.strbuf.push_str("#PBS -W depend=afterok:");
        for (i, id) in deps.iter().enumerate() {
            if i > 0 {
                self.strbuf.push(':');
            }
            self.strbuf.push_str(id.as_str());
        }
        self.strbuf.push('\n');
    }

    /// source profile, cd, and duplicate all output into $WD/log.
    fn write_preamble(&mut self, name: &str, working_dir: &str) {
        self.line("");
        self.line("# Source bashrc for environment");
        self.line("source ~/.bashrc");
        self.line("");
        self.line("# Navigate to working directory");
        self.line(&format!("cd {working_dir}"));
        self.line("pwd");
        self.line("WD=`pwd`");
        self.line("");
        self.line("# Setup logging");
        self.line("mkdir -p $WD/log");
        self.line(TIME_EXPR);
        let log = format!("$WD/log/{name}_$TIME");
        self.line(&format!(
            "exec > >(tee -a {log}.log {log}.out) 2> >(tee -a {log}.err {log}.out >&2)"
        ));
        self.line("");
    }

    fn write_env_hint(&mut self, env_name: &str) {
        self.line("# Activate conda/micromamba environment");
        self.line(&format!("#micromamba activate {env_name}"));
        self.line("");
    }

    fn write_commands(&mut self, name: &str, commands: &[String]) {
        self.line("# Execute commands");
        self.line("echo 'Starting job execution...'");
        self.line(&format!("echo 'Job: {name}'"));
        self.line("echo 'Date: '`date`");
        self.line("");
        for cmd in commands {
            self.line(cmd);
        }
        self.line("");
    }

    /// last line has no trailing newline.
    fn write_completion(&mut self) {
        self.strbuf.push_str("echo 'Job completed at: '`date`");
    }
}

fn resolve_dependencies<'r>(
    spec: &JobSpec,
    registry: &'r JobRegistry,
) -> Result<Vec<&'r JobId>, Error> {
    let mut ids: Vec<&JobId> = Vec::with_capacity(spec.depends_on.len());
    for (i, dep) in spec.depends_on.iter().enumerate() {
        if spec.depends_on[..i].contains(dep) {
            continue;
        }
        let state = registry.state(dep).ok_or_else(|| Error::UnknownDependency {
            job: spec.name.clone(),
            dependency: dep.clone(),
        })?;
        match state.job_id() {
            Some(id) => ids.push(id),
            None => log::warn!(
                "job \"{}\": dependency \"{dep}\" has no job id ({state:?}); \
                 rendering without it",
                spec.name
            ),
        }
    }
    Ok(ids)
}
