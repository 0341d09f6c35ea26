use std::path::{Path, PathBuf};

use anyhow::{Context, Result, bail};
use autopatch_config::Config;
use autopatch_core::{
    FinderOutcome, PatchMode, Pipeline, RunReport,
    pipeline::{StageReport, StageStatus},
    toolchain::ToolchainError,
};

pub async fn compile(config: &Config, src: &Path, output: Option<PathBuf>) -> Result<()> {
    let output = output.unwrap_or_else(|| src.with_extension(""));
    if output == src {
        bail!("refusing to overwrite {} with its own binary", src.display());
    }

    match config.toolchain().compile(src, &output).await {
        Ok(_) => {
            println!("Compiled {} -> {}", src.display(), output.display());
            Ok(())
        }
        Err(ToolchainError::CompileFailed { stderr }) => {
            eprintln!("{stderr}");
            bail!("compilation of {} failed", src.display())
        }
        Err(err) => Err(err.into()),
    }
}

pub async fn find(config: &Config, binary: &Path, json: bool) -> Result<()> {
    let report = config
        .finder_chain()
        .find(binary)
        .await
        .with_context(|| format!("crash search on {} failed", binary.display()))?;

    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
        return Ok(());
    }

    println!("{} finder: {}", report.finder, report.summary());
    if !report.log.is_empty() {
        println!("{}", report.log);
    }
    if let FinderOutcome::Found { input } = &report.outcome {
        println!("crashing input: {input:?}");
    }
    Ok(())
}

pub async fn run(
    config: &Config,
    src: &Path,
    mode: PatchMode,
    api_key: Option<&str>,
    json: bool,
) -> Result<()> {
    let source = tokio::fs::read_to_string(src)
        .await
        .with_context(|| format!("failed to read {}", src.display()))?;

    let mut pipeline = Pipeline::new(
        config.toolchain(),
        config.finder_chain(),
        &config.workspace.root,
    );
    if mode == PatchMode::Remote {
        pipeline = pipeline.with_remote_patcher(super::remote_patcher(config, api_key)?);
    }

    let report = pipeline.run(&source, mode).await?;
    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        print_report(&report);
    }

    if report.compile.status == StageStatus::Failed {
        bail!("compilation failed");
    }
    Ok(())
}

fn print_report(report: &RunReport) {
    println!("run {}", report.run_id);
    print_stage("Compilation", &report.compile);
    print_stage("Crash search", &report.find);
    print_stage("Patch", &report.patch);
    if let Some(patched) = &report.patched_source {
        println!("--- patched source ---\n{patched}");
    }
    print_stage("Verification (argument \"0\")", &report.verify);
}

fn print_stage(title: &str, stage: &StageReport) {
    let status = match stage.status {
        StageStatus::Succeeded => "ok",
        StageStatus::Failed => "FAILED",
        StageStatus::Skipped => "skipped",
    };
    println!("== {title} [{status}] ==");
    if !stage.output.is_empty() {
        println!("{}", stage.output.trim_end());
    }
}
