//! External process invocation

use std::ffi::OsString;
use std::fs;
use std::path::PathBuf;
use std::process::{Command, Stdio};
use std::time::Duration;
use tracing::{debug, warn};
use wait_timeout::ChildExt;

/// A fully resolved command line
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Invocation {
    /// Executable
    pub program: PathBuf,
    /// Arguments
    pub args: Vec<OsString>,
    /// Extra environment variables
    pub env: Vec<(OsString, OsString)>,
    /// Wall-clock bound; `None` waits forever
    pub timeout: Option<Duration>,
}

impl Invocation {
    /// Invocation of `program` without arguments
    pub fn new(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            env: Vec::new(),
            timeout: None,
        }
    }

    /// Append an argument
    pub fn arg(mut self, arg: impl Into<OsString>) -> Self {
        self.args.push(arg.into());
        self
    }

    /// Append several arguments
    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<OsString>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    /// Set an environment variable
    pub fn env(mut self, key: impl Into<OsString>, value: impl Into<OsString>) -> Self {
        self.env.push((key.into(), value.into()));
        self
    }

    /// Bound the run time
    pub fn timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }
}

/// What happened to a run
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RunOutcome {
    /// The process exited on its own
    Completed {
        /// Exit code; `None` when killed by a signal
        status: Option<i32>,
        /// Captured standard output
        stdout: String,
        /// Captured standard error
        stderr: String,
    },
    /// The timeout expired and the process was killed
    TimedOut,
    /// The process could not be started or its output could not be read
    Failed(String),
}

/// Runs external tools; a seam for tests
pub trait ToolRunner {
    /// Run `invocation` to completion or until its timeout
    fn run(&self, invocation: &Invocation) -> RunOutcome;
}

/// Runs tools as child processes, capturing output through temporary files
#[derive(Debug, Clone, Copy, Default)]
pub struct ProcessRunner;

impl ToolRunner for ProcessRunner {
    fn run(&self, invocation: &Invocation) -> RunOutcome {
        match run_process(invocation) {
            Ok(outcome) => outcome,
            Err(e) => RunOutcome::Failed(e.to_string()),
        }
    }
}

fn run_process(invocation: &Invocation) -> std::io::Result<RunOutcome> {
    let stdout_file = tempfile::NamedTempFile::new()?;
    let stderr_file = tempfile::NamedTempFile::new()?;

    let mut cmd = Command::new(&invocation.program);
    cmd.args(&invocation.args)
        .envs(invocation.env.iter().map(|(k, v)| (k, v)))
        .stdin(Stdio::null())
        .stdout(Stdio::from(stdout_file.reopen()?))
        .stderr(Stdio::from(stderr_file.reopen()?));

    debug!(program = %invocation.program.display(), args = ?invocation.args, "spawning tool");
    let mut child = cmd.spawn()?;

    let status = match invocation.timeout {
        Some(timeout) => match child.wait_timeout(timeout)? {
            Some(status) => status,
            None => {
                warn!(?timeout, "tool timed out, killing it");
                let _ = child.kill();
                let _ = child.wait();
                return Ok(RunOutcome::TimedOut);
            }
        },
        None => child.wait()?,
    };

    let stdout = fs::read_to_string(stdout_file.path())?;
    let stderr = fs::read_to_string(stderr_file.path())?;

    Ok(RunOutcome::Completed {
        status: status.code(),
        stdout,
        stderr,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_invocation_builder() {
        let inv = Invocation::new("java")
            .arg("-jar")
            .args(["tool.jar", "--cex"])
            .env("LD_LIBRARY_PATH", "/opt/lib")
            .timeout(Some(Duration::from_secs(5)));

        assert_eq!(inv.args.len(), 3);
        assert_eq!(inv.env[0].0, OsString::from("LD_LIBRARY_PATH"));
        assert_eq!(inv.timeout, Some(Duration::from_secs(5)));
    }

    #[test]
    fn test_missing_program_fails() {
        let outcome = ProcessRunner.run(&Invocation::new("/nonexistent/cfa-core-tool"));
        assert!(matches!(outcome, RunOutcome::Failed(_)));
    }

    #[cfg(unix)]
    #[test]
    fn test_captures_stdout() {
        let outcome = ProcessRunner.run(
            &Invocation::new("sh")
                .args(["-c", "echo '(SafetyResult Safe)'"])
                .timeout(Some(Duration::from_secs(10))),
        );
        match outcome {
            RunOutcome::Completed { status, stdout, .. } => {
                assert_eq!(status, Some(0));
                assert_eq!(stdout.trim(), "(SafetyResult Safe)");
            }
            other => panic!("unexpected outcome {:?}", other),
        }
    }

    #[cfg(unix)]
    #[test]
    fn test_timeout_kills() {
        let outcome = ProcessRunner.run(
            &Invocation::new("sh")
                .args(["-c", "sleep 5"])
                .timeout(Some(Duration::from_millis(100))),
        );
        assert_eq!(outcome, RunOutcome::TimedOut);
    }
}
