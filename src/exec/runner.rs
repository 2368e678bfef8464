use std::io;
use std::path::Path;

use crate::env::ExecutionContext;

use super::{CommandLine, RunOutput, Spawner};

/// Runs a command inside a resolved `ExecutionContext`.
///
/// All three kinds of context produce the same `RunOutput`; a command that
/// can't be started comes back as a failed output rather than an error.
pub struct CommandRunner<'a> {
    spawner: &'a dyn Spawner,
    /// environment manager executable, for `Managed` contexts
    manager: String,
}

impl<'a> CommandRunner<'a> {
    pub fn new(spawner: &'a dyn Spawner, manager: impl Into<String>) -> Self {
        Self {
            spawner,
            manager: manager.into(),
        }
    }

    pub fn run<S: AsRef<str>>(
        &self,
        ctx: &ExecutionContext,
        args: &[S],
        cwd: Option<&Path>,
    ) -> RunOutput {
        let Some(cmd) = self.command_line(ctx, args) else {
            return RunOutput::not_started("empty command");
        };
        let cmd = cmd.current_dir(cwd);
        log::debug!("running in {ctx}: {} {:?}", cmd.program, cmd.args);
        match self.spawner.output(&cmd, None) {
            Ok(out) => out,
            Err(e) => {
                log::warn!("could not start {}: {e}", cmd.program);
                let msg = format!("failed to start {}: {e}", cmd.program);
                if e.kind() == io::ErrorKind::NotFound {
                    RunOutput::missing(msg)
                } else {
                    RunOutput::not_started(msg)
                }
            }
        }
    }

    /// Shape `args` into one invocation for `ctx`. None if `args` is empty.
    pub fn command_line<S: AsRef<str>>(
        &self,
        ctx: &ExecutionContext,
        args: &[S],
    ) -> Option<CommandLine> {
        let (program, rest) = args.split_first()?;
        let cmd = match ctx {
            ExecutionContext::Managed(env) => CommandLine::new(&self.manager)
                .args(["run", "-n", env.as_str()])
                .args(args.iter().map(AsRef::<str>::as_ref)),
            ExecutionContext::Module(module) => CommandLine::new("bash")
                .arg("-c")
                .arg(ExecutionContext::module_script(module, args)),
            ExecutionContext::System(_) => CommandLine::new(AsRef::<str>::as_ref(program))
                .args(rest.iter().map(AsRef::<str>::as_ref)),
        };
        Some(cmd)
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::exec::fake::{Reply, ScriptedSpawner};

    #[test]
    fn test_managed_uses_launcher() {
        let spawner = ScriptedSpawner::new();
        spawner.on("micromamba", &["run", "-n", "seqkit"], Reply::ok("stats"));
        let runner = CommandRunner::new(&spawner, "micromamba");
        let ctx = ExecutionContext::Managed("seqkit".to_owned());

        let out = runner.run(&ctx, &["seqkit", "stats", "g.fa"], Some(Path::new("/tmp")));
        assert!(out.success());
        assert_eq!(out.stdout, "stats");
        let call = &spawner.calls()[0];
        assert_eq!(call.args, ["run", "-n", "seqkit", "seqkit", "stats", "g.fa"]);
        assert_eq!(call.cwd.as_deref(), Some(Path::new("/tmp")));
    }

    #[test]
    fn test_module_escapes_each_argument() {
        let spawner = ScriptedSpawner::new();
        spawner.on("bash", &["-c"], Reply::ok(""));
        let runner = CommandRunner::new(&spawner, "micromamba");
        let ctx = ExecutionContext::Module("busco".to_owned());

        runner.run(&ctx, &["busco", "-i", "my genome.fa", "-o", "x; rm -rf ~"], None);
        let call = &spawner.calls()[0];
        assert_eq!(
            call.args,
            ["-c", "module load busco && busco -i 'my genome.fa' -o 'x; rm -rf ~'"]
        );
    }

    #[test]
    fn test_system_runs_as_given() {
        let spawner = ScriptedSpawner::new();
        spawner.on("quast.py", &[], Reply::fail(4, "no contigs"));
        let runner = CommandRunner::new(&spawner, "micromamba");
        let ctx = ExecutionContext::System("quast".to_owned());

        let out = runner.run(&ctx, &["quast.py", "g.fa"], None);
        assert_eq!(out.exit_code, Some(4));
        assert_eq!(out.stderr, "no contigs");
        assert_eq!(spawner.calls()[0].args, ["g.fa"]);
    }

    #[test]
    fn test_missing_program_is_structured_failure() {
        let spawner = ScriptedSpawner::new();
        let runner = CommandRunner::new(&spawner, "micromamba");
        for ctx in [
            ExecutionContext::Managed("x".to_owned()),
            ExecutionContext::Module("x".to_owned()),
            ExecutionContext::System("x".to_owned()),
        ] {
            let out = runner.run(&ctx, &["x", "--go"], None);
            assert!(!out.success());
            assert_eq!(out.exit_code, None);
            assert!(out.stderr.contains("not found"), "{}", out.stderr);
            assert!(out.not_found);
        }
        let empty: [&str; 0] = [];
        let out = runner.run(&ExecutionContext::System("x".into()), &empty, None);
        assert!(!out.success());
        assert!(!out.not_found);

        spawner.on("x", &[], Reply::TimedOut);
        let out = runner.run(&ExecutionContext::System("x".into()), &["x"], None);
        assert!(!out.success());
        assert!(!out.not_found);
    }
}
