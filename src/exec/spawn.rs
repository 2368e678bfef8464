use std::io::{self, stderr, stdout, Read, Write};
use std::path::{Path, PathBuf};
use std::process::{Child, Command, ExitStatus, Stdio};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

const POLL_INTERVAL: Duration = Duration::from_millis(50);

/// A program and its arguments, kept as a list so nothing is re-split by a shell.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandLine {
    pub program: String,
    pub args: Vec<String>,
    pub cwd: Option<PathBuf>,
}

impl CommandLine {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            cwd: None,
        }
    }

    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    pub fn current_dir(mut self, dir: Option<&Path>) -> Self {
        self.cwd = dir.map(Path::to_path_buf);
        self
    }
}

/// Exit status and captured output of a finished process.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunOutput {
    /// None if the process was killed by a signal or never started.
    pub exit_code: Option<i32>,
    pub stdout: String,
    pub stderr: String,
    /// The program itself could not be found.
    pub not_found: bool,
}

impl RunOutput {
    pub fn success(&self) -> bool {
        self.exit_code == Some(0)
    }

    /// Output for a command that could not be started at all.
    pub fn not_started(msg: impl Into<String>) -> Self {
        Self {
            exit_code: None,
            stdout: String::new(),
            stderr: msg.into(),
            not_found: false,
        }
    }

    /// Output for a program that isn't installed.
    pub fn missing(msg: impl Into<String>) -> Self {
        Self {
            not_found: true,
            ..Self::not_started(msg)
        }
    }
}

/// Everything in the crate that starts a process goes through this trait.
pub trait Spawner {
    /// Run `cmd` to completion and capture its output.
    ///
    /// Fails with the spawn error if the program can't be started, and with
    /// `ErrorKind::TimedOut` (after killing the child) if `timeout` elapses.
    fn output(&self, cmd: &CommandLine, timeout: Option<Duration>) -> io::Result<RunOutput>;
}

/// Runs real processes on this host.
#[derive(Debug, Default)]
pub struct SystemSpawner {
    /// if true, child output is also copied to our own stdout/stderr as it arrives
    echo: bool,
}

impl SystemSpawner {
    pub fn new(echo: bool) -> Self {
        Self { echo }
    }
}

impl Spawner for SystemSpawner {
    fn output(&self, cmd: &CommandLine, timeout: Option<Duration>) -> io::Result<RunOutput> {
        log::trace!("spawning {} {:?} in {:?}", cmd.program, cmd.args, cmd.cwd);
        let mut command = Command::new(&cmd.program);
        command
            .args(&cmd.args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());
        if let Some(dir) = &cmd.cwd {
            command.current_dir(dir);
        }
        let mut child = command.spawn()?;

        let child_out = child.stdout.take().ok_or_else(|| detached("stdout"))?;
        let child_err = child.stderr.take().ok_or_else(|| detached("stderr"))?;
        let echo = self.echo;
        let thread_out = thread::spawn(move || communicate(child_out, echo.then(stdout)));
        let thread_err = thread::spawn(move || communicate(child_err, echo.then(stderr)));

        let status = match timeout {
            Some(timeout) => match wait_with_deadline(&mut child, timeout)? {
                Some(status) => status,
                None => {
                    // readers are left to finish on their own; a grandchild may
                    // still hold the pipes open.
                    return Err(io::Error::new(
                        io::ErrorKind::TimedOut,
                        format!("{} did not finish within {timeout:?}", cmd.program),
                    ));
                }
            },
            None => child.wait()?,
        };

        Ok(RunOutput {
            exit_code: status.code(),
            stdout: join_reader(thread_out)?,
            stderr: join_reader(thread_err)?,
            not_found: false,
        })
    }
}

fn detached(stream: &str) -> io::Error {
    io::Error::new(io::ErrorKind::Other, format!("cannot attach to child {stream}"))
}

/// Poll until the child exits or the deadline passes; kill it in the latter case.
fn wait_with_deadline(child: &mut Child, timeout: Duration) -> io::Result<Option<ExitStatus>> {
    let deadline = Instant::now() + timeout;
    loop {
        if let Some(status) = child.try_wait()? {
            return Ok(Some(status));
        }
        if Instant::now() >= deadline {
            // may already have exited between the two calls
            let _ = child.kill();
            child.wait()?;
            return Ok(None);
        }
        thread::sleep(POLL_INTERVAL);
    }
}

fn join_reader(handle: JoinHandle<io::Result<Vec<u8>>>) -> io::Result<String> {
    let bytes = handle
        .join()
        .map_err(|_| io::Error::new(io::ErrorKind::Other, "output reader thread panicked"))??;
    Ok(String::from_utf8_lossy(&bytes).into_owned())
}

/// Read `stream` to the end, keeping a copy and optionally echoing it.
fn communicate<R: Read, W: Write>(mut stream: R, mut echo: Option<W>) -> io::Result<Vec<u8>> {
    let mut captured = Vec::with_capacity(1024);
    let mut buf = [0u8; 1024];
    loop {
        let num_read = stream.read(&mut buf)?;
        if num_read == 0 {
            break;
        }

        let buf = &buf[..num_read];
        captured.extend_from_slice(buf);
        if let Some(out) = echo.as_mut() {
            out.write_all(buf)?;
        }
    }

    Ok(captured)
}

#[cfg(all(test, unix))]
mod test {
    use super::*;
    #[test]
    fn test_captures_both_streams() -> io::Result<()> {
        let cmd = CommandLine::new("sh").args(["-c", "echo out; echo err >&2; exit 3"]);
        let out = SystemSpawner::default().output(&cmd, None)?;
        assert_eq!(out.exit_code, Some(3));
        assert_eq!(out.stdout, "out\n");
        assert_eq!(out.stderr, "err\n");
        assert!(!out.success());
        Ok(())
    }
    #[test]
    fn test_missing_program_is_spawn_error() {
        let cmd = CommandLine::new("definitely-not-a-real-program-gqc");
        let err = SystemSpawner::default().output(&cmd, None).unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::NotFound);
    }
    #[test]
    fn test_timeout_kills_child() {
        let cmd = CommandLine::new("sleep").arg("5");
        let err = SystemSpawner::default()
            .output(&cmd, Some(Duration::from_millis(200)))
            .unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::TimedOut);
    }
    #[test]
    fn test_current_dir() -> io::Result<()> {
        let dir = std::env::temp_dir().canonicalize()?;
        let cmd = CommandLine::new("pwd").current_dir(Some(&dir));
        let out = SystemSpawner::default().output(&cmd, None)?;
        assert_eq!(out.stdout.trim_end(), dir.to_str().unwrap());
        Ok(())
    }
}
