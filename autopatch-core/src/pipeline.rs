//! The end-to-end workflow behind an upload: compile, search for a crashing
//! input, patch, then rebuild and run the patched program with `0`.

use std::{
    path::{Path, PathBuf},
    sync::Arc,
};

use serde::Serialize;
use thiserror::Error;
use tracing::{info, instrument, warn};
use uuid::Uuid;

use crate::{
    finder::{FinderChain, FinderReport},
    patch::{PatchError, PatchMode, RemotePatcher, apply_template_patch},
    toolchain::{ProgramOutput, Toolchain, ToolchainError},
};

/// Input the patched program is exercised with.
pub const VERIFY_INPUT: &str = "0";

/// Failures that stop a pipeline operation outright.
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("failed to prepare run directory {path}: {source}")]
    Workspace {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("remote-assisted patching is not configured")]
    RemoteUnavailable,

    #[error(transparent)]
    Patch(#[from] PatchError),
}

/// Outcome of a single pipeline stage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum StageStatus {
    Succeeded,
    Failed,
    Skipped,
}

/// Status and captured output of one stage.
#[derive(Debug, Clone, Serialize)]
pub struct StageReport {
    pub status: StageStatus,
    pub output: String,
}

impl StageReport {
    fn succeeded(output: impl Into<String>) -> Self {
        Self {
            status: StageStatus::Succeeded,
            output: output.into(),
        }
    }

    fn failed(output: impl Into<String>) -> Self {
        Self {
            status: StageStatus::Failed,
            output: output.into(),
        }
    }

    fn skipped(reason: impl Into<String>) -> Self {
        Self {
            status: StageStatus::Skipped,
            output: reason.into(),
        }
    }
}

/// Everything displayed for one upload.
#[derive(Debug, Clone, Serialize)]
pub struct RunReport {
    pub run_id: Uuid,
    pub source: String,
    pub compile: StageReport,
    pub find: StageReport,
    pub finder: Option<FinderReport>,
    pub patch: StageReport,
    pub patched_source: Option<String>,
    pub verify: StageReport,
    pub verify_output: Option<ProgramOutput>,
}

/// Compile, crash-search, patch and verify workflow rooted at a workspace directory.
#[derive(Debug, Clone)]
pub struct Pipeline {
    toolchain: Toolchain,
    finder: FinderChain,
    remote: Option<RemotePatcher>,
    workspace_root: PathBuf,
}

impl Pipeline {
    pub fn new(
        toolchain: Toolchain,
        finder: FinderChain,
        workspace_root: impl Into<PathBuf>,
    ) -> Self {
        Self {
            toolchain,
            finder,
            remote: None,
            workspace_root: workspace_root.into(),
        }
    }

    pub fn with_remote_patcher(mut self, remote: RemotePatcher) -> Self {
        self.remote = Some(remote);
        self
    }

    pub fn toolchain(&self) -> &Toolchain {
        &self.toolchain
    }

    pub fn workspace_root(&self) -> &Path {
        &self.workspace_root
    }

    pub fn supports(&self, mode: PatchMode) -> bool {
        match mode {
            PatchMode::Template => true,
            PatchMode::Remote => self.remote.is_some(),
        }
    }

    /// Patch `source` in memory with the requested mode.
    pub async fn patch(
        &self,
        source: &str,
        mode: PatchMode,
    ) -> Result<String, PipelineError> {
        match mode {
            PatchMode::Template => Ok(apply_template_patch(source)?),
            PatchMode::Remote => {
                let remote =
                    self.remote.as_ref().ok_or(PipelineError::RemoteUnavailable)?;
                Ok(remote.apply(source).await?)
            }
        }
    }

    async fn prepare_run_dir(&self, run_id: Uuid) -> Result<PathBuf, PipelineError> {
        let dir = self.workspace_root.join(run_id.to_string());
        tokio::fs::create_dir_all(&dir)
            .await
            .map_err(|source| PipelineError::Workspace {
                path: dir.clone(),
                source,
            })?;
        Ok(dir)
    }

    async fn write(path: &Path, contents: &str) -> Result<(), PipelineError> {
        tokio::fs::write(path, contents)
            .await
            .map_err(|source| PipelineError::Workspace {
                path: path.to_path_buf(),
                source,
            })
    }

    /// Run every stage for `source`. Stage failures are recorded in the
    /// report; only workspace I/O problems abort the run.
    #[instrument(skip(self, source), fields(source_len = source.len()))]
    pub async fn run(
        &self,
        source: &str,
        mode: PatchMode,
    ) -> Result<RunReport, PipelineError> {
        let run_id = Uuid::new_v4();
        let dir = self.prepare_run_dir(run_id).await?;
        let source_path = dir.join("program.c");
        let binary_path = dir.join("program");
        let fixed_path = dir.join("program_fixed.c");
        let fixed_binary = dir.join("program_fixed");

        Self::write(&source_path, source).await?;

        let mut report = RunReport {
            run_id,
            source: source.to_string(),
            compile: StageReport::skipped("not run"),
            find: StageReport::skipped("compilation did not succeed"),
            finder: None,
            patch: StageReport::skipped("compilation did not succeed"),
            patched_source: None,
            verify: StageReport::skipped("no patched source"),
            verify_output: None,
        };

        match self.toolchain.compile(&source_path, &binary_path).await {
            Ok(_) => report.compile = StageReport::succeeded("Compilation succeeded."),
            Err(err) => {
                report.compile = StageReport::failed(err.to_string());
                info!(%run_id, "run stopped after failed compilation");
                return Ok(report);
            }
        }

        report.find = match self.finder.find(&binary_path).await {
            Ok(found) => {
                let stage = StageReport::succeeded(format!(
                    "{} finder: {}\n{}",
                    found.finder,
                    found.summary(),
                    found.log
                ));
                report.finder = Some(found);
                stage
            }
            Err(err) => {
                warn!(%run_id, error = %err, "crash search failed");
                StageReport::failed(err.to_string())
            }
        };

        let patched = match self.patch(source, mode).await {
            Ok(patched) => patched,
            Err(PipelineError::Patch(err)) => {
                report.patch = StageReport::failed(err.to_string());
                return Ok(report);
            }
            Err(err) => return Err(err),
        };
        Self::write(&fixed_path, &patched).await?;
        report.patch = StageReport::succeeded(format!("Applied {mode} patch."));
        report.patched_source = Some(patched);

        report.verify = match self.toolchain.compile(&fixed_path, &fixed_binary).await {
            Err(err) => StageReport::failed(format!(
                "Failed to compile fixed program:\n{}",
                match err {
                    ToolchainError::CompileFailed { stderr } => stderr,
                    other => other.to_string(),
                }
            )),
            Ok(_) => match self.toolchain.run(&fixed_binary, [VERIFY_INPUT]).await {
                Ok(output) => {
                    let stage = StageReport::succeeded(output.combined());
                    report.verify_output = Some(output);
                    stage
                }
                Err(err) => StageReport::failed(err.to_string()),
            },
        };

        info!(%run_id, "run finished");
        Ok(report)
    }
}
