use std::path::Path;

use async_trait::async_trait;

use super::{
    CrashFinder, DEFAULT_CRASH_MARKER, FinderError, FinderKind, FinderOutcome,
    FinderReport,
};
use crate::toolchain::{Toolchain, ToolchainError};

/// Arguments tried by the concrete probe, in order.
pub const DEFAULT_PROBE_INPUTS: &[&str] = &["1", "-1", "0", "00", "a", ""];

/// Concrete stand-in for the symbolic engine: runs the binary with each
/// candidate argument and stops at the first whose stdout contains the marker
/// or that dies from a signal. A signal counts because `abort()` discards
/// buffered stdout when the output is a pipe.
#[derive(Debug, Clone)]
pub struct ProbeFinder {
    toolchain: Toolchain,
    inputs: Vec<String>,
    crash_marker: String,
}

impl ProbeFinder {
    pub fn new(toolchain: Toolchain) -> Self {
        Self {
            toolchain,
            inputs: DEFAULT_PROBE_INPUTS.iter().map(|s| s.to_string()).collect(),
            crash_marker: DEFAULT_CRASH_MARKER.to_string(),
        }
    }

    pub fn with_inputs<I, S>(mut self, inputs: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.inputs = inputs.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_crash_marker(mut self, marker: impl Into<String>) -> Self {
        self.crash_marker = marker.into();
        self
    }
}

#[async_trait]
impl CrashFinder for ProbeFinder {
    fn kind(&self) -> FinderKind {
        FinderKind::Probe
    }

    async fn available(&self) -> Result<(), FinderError> {
        Ok(())
    }

    async fn find(&self, binary: &Path) -> Result<FinderReport, FinderError> {
        let mut log = String::new();

        for input in &self.inputs {
            let output = match self.toolchain.run(binary, [input.as_str()]).await {
                Ok(output) => output,
                Err(ToolchainError::TimedOut { timeout, .. }) => {
                    log.push_str(&format!("probe {input:?}: timed out after {timeout:?}\n"));
                    continue;
                }
                Err(err) => return Err(err.into()),
            };
            log.push_str(&format!(
                "probe {input:?}: exit={:?} signal={:?}\n",
                output.exit_code, output.signal
            ));

            if output.stdout.contains(&self.crash_marker)
                || output.signal.is_some()
            {
                return Ok(FinderReport {
                    finder: FinderKind::Probe,
                    outcome: FinderOutcome::Found {
                        input: input.clone(),
                    },
                    log,
                });
            }
        }

        Ok(FinderReport {
            finder: FinderKind::Probe,
            outcome: FinderOutcome::NotFound,
            log,
        })
    }
}
