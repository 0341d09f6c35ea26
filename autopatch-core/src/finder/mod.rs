//! Crash-input search.
//!
//! The real search is performed by an external symbolic-execution engine
//! ([`SymbolicFinder`]). When that engine is not installed, a concrete probe
//! ([`ProbeFinder`]) runs the binary against a short list of candidate
//! arguments instead. Reports always name the finder that produced them.

mod probe;
mod symbolic;

use std::{fmt, path::Path, time::Duration};

use async_trait::async_trait;
use serde::Serialize;
use thiserror::Error;
use tracing::{info, warn};

use crate::toolchain::ToolchainError;

pub use probe::{DEFAULT_PROBE_INPUTS, ProbeFinder};
pub use symbolic::{SymbolicFinder, SymbolicFinderConfig};

/// stdout marker that identifies the crashing path.
pub const DEFAULT_CRASH_MARKER: &str = "CRASH";
pub const DEFAULT_FINDER_TIMEOUT: Duration = Duration::from_secs(120);
/// Bytes of symbolic argv[1]; enough for "0".
pub const DEFAULT_ARG_SIZE: usize = 4;

/// Failures running a crash finder.
#[derive(Debug, Error)]
pub enum FinderError {
    #[error("symbolic execution engine unavailable: {0}")]
    EngineUnavailable(String),

    #[error("failed to stage engine driver: {0}")]
    Driver(#[source] std::io::Error),

    #[error("engine exited with status {exit_code:?}:\n{stderr}")]
    EngineFailed {
        exit_code: Option<i32>,
        stderr: String,
    },

    #[error("could not parse engine output: {0}")]
    MalformedOutput(String),

    #[error(transparent)]
    Toolchain(#[from] ToolchainError),
}

/// Which finder produced a report.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FinderKind {
    Symbolic,
    Probe,
}

impl fmt::Display for FinderKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FinderKind::Symbolic => f.write_str("symbolic"),
            FinderKind::Probe => f.write_str("probe"),
        }
    }
}

/// Result of a crash search.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum FinderOutcome {
    Found { input: String },
    NotFound,
    TimedOut,
}

/// Outcome of a crash search plus the finder's raw log.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FinderReport {
    pub finder: FinderKind,
    pub outcome: FinderOutcome,
    /// Raw engine output, for display.
    pub log: String,
}

impl FinderReport {
    /// One-line human summary.
    pub fn summary(&self) -> String {
        match &self.outcome {
            FinderOutcome::Found { input } => {
                format!("Found argument that causes CRASH: {input:?}")
            }
            FinderOutcome::NotFound => "No crashing input found.".to_string(),
            FinderOutcome::TimedOut => {
                "Crash search timed out before reaching a verdict.".to_string()
            }
        }
    }
}

/// Searches a compiled binary for an argument that makes it crash.
#[async_trait]
pub trait CrashFinder: Send + Sync {
    fn kind(&self) -> FinderKind;

    /// Whether the finder can run on this host.
    async fn available(&self) -> Result<(), FinderError>;

    async fn find(&self, binary: &Path) -> Result<FinderReport, FinderError>;
}

/// Symbolic finder with a probe fallback.
#[derive(Debug, Clone)]
pub struct FinderChain {
    symbolic: SymbolicFinder,
    fallback: Option<ProbeFinder>,
}

impl FinderChain {
    pub fn new(symbolic: SymbolicFinder, fallback: Option<ProbeFinder>) -> Self {
        Self { symbolic, fallback }
    }

    pub async fn find(&self, binary: &Path) -> Result<FinderReport, FinderError> {
        match self.symbolic.available().await {
            Ok(()) => self.symbolic.find(binary).await,
            Err(unavailable) => {
                let Some(fallback) = &self.fallback else {
                    return Err(unavailable);
                };
                warn!(
                    error = %unavailable,
                    "symbolic engine unavailable; using concrete probe"
                );
                let mut report = fallback.find(binary).await?;
                report.log =
                    format!("{unavailable}\n{}", report.log).trim_end().to_string();
                info!(outcome = ?report.outcome, "probe finished");
                Ok(report)
            }
        }
    }
}
