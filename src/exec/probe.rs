use std::io;
use std::time::Duration;

use super::{CommandLine, Spawner};

/// Result of trying to invoke an executable.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Availability {
    Available,
    /// Started, but exited non-zero (None: killed, or timed out).
    Unavailable(Option<i32>),
    /// Could not be started at all.
    Missing,
}

impl Availability {
    pub fn is_available(&self) -> bool {
        matches!(self, Self::Available)
    }
}

/// Checks whether a tool is installed and working by running it with
/// harmless arguments (`--help`, `--version`) under a time limit.
/// Never returns an error: every failure just means "not available".
#[derive(Clone, Copy)]
pub struct ToolProbe<'a> {
    spawner: &'a dyn Spawner,
    timeout: Duration,
}

impl<'a> ToolProbe<'a> {
    pub fn new(spawner: &'a dyn Spawner, timeout: Duration) -> Self {
        Self { spawner, timeout }
    }

    pub fn check(&self, exe: &str, args: &[&str]) -> Availability {
        let cmd = CommandLine::new(exe).args(args.iter().copied());
        let availability = match self.spawner.output(&cmd, Some(self.timeout)) {
            Ok(out) if out.success() => Availability::Available,
            Ok(out) => Availability::Unavailable(out.exit_code),
            Err(e) if e.kind() == io::ErrorKind::TimedOut => Availability::Unavailable(None),
            Err(_) => Availability::Missing,
        };
        log::debug!("probe {exe} {args:?}: {availability:?}");
        availability
    }

    pub fn available(&self, exe: &str, args: &[&str]) -> bool {
        self.check(exe, args).is_available()
    }

    /// First candidate that works, in the order given.
    pub fn first_available<'c>(&self, candidates: &[(&'c str, &[&str])]) -> Option<&'c str> {
        candidates
            .iter()
            .find(|(exe, args)| self.available(exe, args))
            .map(|(exe, _)| *exe)
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::exec::fake::{Reply, ScriptedSpawner};

    const T: Duration = Duration::from_secs(1);

    #[test]
    fn test_three_outcomes() {
        let spawner = ScriptedSpawner::new();
        spawner
            .on("seqkit", &["version"], Reply::ok("v2.5"))
            .on("busco", &[], Reply::fail(2, "bad flag"))
            .on("quast.py", &[], Reply::TimedOut);
        let probe = ToolProbe::new(&spawner, T);

        assert_eq!(probe.check("seqkit", &["version"]), Availability::Available);
        assert_eq!(probe.check("busco", &["--help"]), Availability::Unavailable(Some(2)));
        assert_eq!(probe.check("quast.py", &["--help"]), Availability::Unavailable(None));
        assert_eq!(probe.check("GenomeSyn", &["--help"]), Availability::Missing);
        assert!(!probe.available("GenomeSyn", &["--help"]));
    }

    #[test]
    fn test_first_available_in_order() {
        let spawner = ScriptedSpawner::new();
        spawner.on("quartet", &["--help"], Reply::ok(""));
        let probe = ToolProbe::new(&spawner, T);

        let found = probe.first_available(&[("quartet.py", &["--help"]), ("quartet", &["--help"])]);
        assert_eq!(found, Some("quartet"));
        assert_eq!(spawner.calls_to("quartet.py"), 1);

        spawner.on("quartet.py", &["--help"], Reply::ok(""));
        let found = probe.first_available(&[("quartet.py", &["--help"]), ("quartet", &["--help"])]);
        assert_eq!(found, Some("quartet.py"));
    }
}
