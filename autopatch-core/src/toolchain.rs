//! Compiler and program invocation.

use std::{
    path::{Path, PathBuf},
    process::{Output, Stdio},
    time::{Duration, Instant},
};

use serde::Serialize;
use thiserror::Error;
use tokio::process::Command;
use tracing::{debug, info, warn};

pub const DEFAULT_CC: &str = "gcc";
pub const DEFAULT_RUN_TIMEOUT: Duration = Duration::from_secs(10);

/// Failures invoking the compiler or a compiled program.
#[derive(Debug, Error)]
pub enum ToolchainError {
    #[error("failed to launch {program}: {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error("compilation failed:\n{stderr}")]
    CompileFailed { stderr: String },

    #[error("{program} did not finish within {timeout:?}")]
    TimedOut { program: String, timeout: Duration },
}

/// Captured result of a finished process.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ProgramOutput {
    pub stdout: String,
    pub stderr: String,
    /// `None` when the process was terminated by a signal.
    pub exit_code: Option<i32>,
    pub signal: Option<i32>,
}

impl ProgramOutput {
    pub fn success(&self) -> bool {
        self.exit_code == Some(0)
    }

    /// stdout followed by stderr, the way results are displayed.
    pub fn combined(&self) -> String {
        format!("{}{}", self.stdout, self.stderr)
    }
}

impl From<Output> for ProgramOutput {
    fn from(output: Output) -> Self {
        #[cfg(unix)]
        let signal = {
            use std::os::unix::process::ExitStatusExt;
            output.status.signal()
        };
        #[cfg(not(unix))]
        let signal = None;

        Self {
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
            exit_code: output.status.code(),
            signal,
        }
    }
}

/// C compiler plus the timeout used when running compiled programs.
#[derive(Debug, Clone)]
pub struct Toolchain {
    cc: PathBuf,
    run_timeout: Duration,
}

impl Default for Toolchain {
    fn default() -> Self {
        Self::new(DEFAULT_CC)
    }
}

impl Toolchain {
    pub fn new(cc: impl Into<PathBuf>) -> Self {
        Self {
            cc: cc.into(),
            run_timeout: DEFAULT_RUN_TIMEOUT,
        }
    }

    pub fn with_run_timeout(mut self, timeout: Duration) -> Self {
        self.run_timeout = timeout;
        self
    }

    pub fn cc(&self) -> &Path {
        &self.cc
    }

    /// Compile `source` into the executable `output`.
    pub async fn compile(
        &self,
        source: &Path,
        output: &Path,
    ) -> Result<ProgramOutput, ToolchainError> {
        let mut cmd = Command::new(&self.cc);
        cmd.arg("-o").arg(output).arg(source);

        debug!(cc = %self.cc.display(), source = %source.display(), "compiling");
        let started = Instant::now();
        let result = capture(&mut cmd, &self.cc.display().to_string(), None)
            .await?;

        if !result.success() {
            warn!(
                source = %source.display(),
                exit_code = ?result.exit_code,
                "compilation failed"
            );
            return Err(ToolchainError::CompileFailed {
                stderr: result.stderr,
            });
        }

        info!(
            output = %output.display(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "compilation succeeded"
        );
        Ok(result)
    }

    /// Run a compiled program with `args`, bounded by the run timeout.
    pub async fn run<I, S>(
        &self,
        binary: &Path,
        args: I,
    ) -> Result<ProgramOutput, ToolchainError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<std::ffi::OsStr>,
    {
        // A bare file name would otherwise be looked up on PATH.
        let binary = if binary.parent() == Some(Path::new("")) {
            Path::new(".").join(binary)
        } else {
            binary.to_path_buf()
        };
        let mut cmd = Command::new(&binary);
        cmd.args(args);
        capture(&mut cmd, &binary.display().to_string(), Some(self.run_timeout))
            .await
    }
}

/// Spawn `cmd` with piped output and wait for it, optionally bounded.
pub(crate) async fn capture(
    cmd: &mut Command,
    program: &str,
    timeout: Option<Duration>,
) -> Result<ProgramOutput, ToolchainError> {
    cmd.stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true);

    let pending = cmd.output();
    let output = match timeout {
        Some(limit) => tokio::time::timeout(limit, pending).await.map_err(
            |_| ToolchainError::TimedOut {
                program: program.to_string(),
                timeout: limit,
            },
        )?,
        None => pending.await,
    }
    .map_err(|source| ToolchainError::Spawn {
        program: program.to_string(),
        source,
    })?;

    Ok(output.into())
}
