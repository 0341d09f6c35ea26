use std::{
    io::Write,
    path::{Path, PathBuf},
    time::{Duration, Instant},
};

use async_trait::async_trait;
use serde::Deserialize;
use tokio::process::Command;
use tracing::{debug, info};

use super::{
    CrashFinder, DEFAULT_ARG_SIZE, DEFAULT_CRASH_MARKER, DEFAULT_FINDER_TIMEOUT,
    FinderError, FinderKind, FinderOutcome, FinderReport,
};
use crate::toolchain::{ToolchainError, capture};

/// angr driver, staged into a temporary file per invocation.
const DRIVER_SOURCE: &str = include_str!("driver.py");

/// Settings for the angr driver invocation.
#[derive(Debug, Clone)]
pub struct SymbolicFinderConfig {
    /// Interpreter with `angr` and `claripy` importable.
    pub python: PathBuf,
    pub timeout: Duration,
    pub crash_marker: String,
    pub arg_size: usize,
}

impl Default for SymbolicFinderConfig {
    fn default() -> Self {
        Self {
            python: PathBuf::from("python3"),
            timeout: DEFAULT_FINDER_TIMEOUT,
            crash_marker: DEFAULT_CRASH_MARKER.to_string(),
            arg_size: DEFAULT_ARG_SIZE,
        }
    }
}

/// Runs the external symbolic-execution engine against a compiled binary.
#[derive(Debug, Clone, Default)]
pub struct SymbolicFinder {
    config: SymbolicFinderConfig,
}

#[derive(Debug, Deserialize)]
struct DriverVerdict {
    found: bool,
    input: Option<String>,
}

impl SymbolicFinder {
    pub fn new(config: SymbolicFinderConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &SymbolicFinderConfig {
        &self.config
    }

    fn stage_driver(&self) -> Result<tempfile::NamedTempFile, FinderError> {
        let mut driver = tempfile::Builder::new()
            .prefix("autopatch-driver-")
            .suffix(".py")
            .tempfile()
            .map_err(FinderError::Driver)?;
        driver
            .write_all(DRIVER_SOURCE.as_bytes())
            .and_then(|_| driver.flush())
            .map_err(FinderError::Driver)?;
        Ok(driver)
    }
}

/// The verdict is the last stdout line that parses as JSON; angr's own
/// chatter may precede it.
fn parse_verdict(stdout: &str) -> Result<FinderOutcome, FinderError> {
    let verdict = stdout
        .lines()
        .rev()
        .map(str::trim)
        .filter(|line| line.starts_with('{'))
        .find_map(|line| serde_json::from_str::<DriverVerdict>(line).ok())
        .ok_or_else(|| {
            FinderError::MalformedOutput(
                stdout.lines().last().unwrap_or_default().to_string(),
            )
        })?;

    match (verdict.found, verdict.input) {
        (true, Some(input)) => Ok(FinderOutcome::Found { input }),
        (true, None) => Err(FinderError::MalformedOutput(
            "verdict reported a crash without an input".to_string(),
        )),
        (false, _) => Ok(FinderOutcome::NotFound),
    }
}

#[async_trait]
impl CrashFinder for SymbolicFinder {
    fn kind(&self) -> FinderKind {
        FinderKind::Symbolic
    }

    async fn available(&self) -> Result<(), FinderError> {
        let mut cmd = Command::new(&self.config.python);
        cmd.arg("-c").arg("import angr, claripy");
        let program = self.config.python.display().to_string();

        match capture(&mut cmd, &program, Some(Duration::from_secs(30))).await {
            Ok(output) if output.success() => Ok(()),
            Ok(output) => Err(FinderError::EngineUnavailable(format!(
                "angr is not importable by {program}: {}",
                output.stderr.trim()
            ))),
            Err(err) => Err(FinderError::EngineUnavailable(err.to_string())),
        }
    }

    async fn find(&self, binary: &Path) -> Result<FinderReport, FinderError> {
        let driver = self.stage_driver()?;
        let program = self.config.python.display().to_string();

        let mut cmd = Command::new(&self.config.python);
        cmd.arg(driver.path())
            .arg(binary)
            .arg(&self.config.crash_marker)
            .arg(self.config.arg_size.to_string());

        debug!(binary = %binary.display(), timeout = ?self.config.timeout, "starting symbolic search");
        let started = Instant::now();

        let output =
            match capture(&mut cmd, &program, Some(self.config.timeout)).await {
                Ok(output) => output,
                Err(ToolchainError::TimedOut { .. }) => {
                    info!(binary = %binary.display(), "symbolic search timed out");
                    return Ok(FinderReport {
                        finder: FinderKind::Symbolic,
                        outcome: FinderOutcome::TimedOut,
                        log: format!(
                            "engine did not finish within {}s",
                            self.config.timeout.as_secs()
                        ),
                    });
                }
                Err(err) => return Err(err.into()),
            };

        if !output.success() {
            return Err(FinderError::EngineFailed {
                exit_code: output.exit_code,
                stderr: output.stderr,
            });
        }

        let outcome = parse_verdict(&output.stdout)?;
        info!(
            binary = %binary.display(),
            outcome = ?outcome,
            elapsed_ms = started.elapsed().as_millis() as u64,
            "symbolic search finished"
        );

        Ok(FinderReport {
            finder: FinderKind::Symbolic,
            outcome,
            log: output.combined(),
        })
    }
}
