use std::path::Path;

use anyhow::{Context, Result};
use autopatch_config::Config;
use autopatch_core::{PatchMode, patch::apply_template_patch};
use tracing::info;

pub async fn run(
    config: &Config,
    src: &Path,
    dst: &Path,
    mode: PatchMode,
    api_key: Option<&str>,
) -> Result<()> {
    let source = tokio::fs::read_to_string(src)
        .await
        .with_context(|| format!("failed to read {}", src.display()))?;

    let patched = match mode {
        PatchMode::Template => apply_template_patch(&source)?,
        PatchMode::Remote => {
            let patcher = super::remote_patcher(config, api_key)?;
            patcher.apply(&source).await?
        }
    };

    tokio::fs::write(dst, &patched)
        .await
        .with_context(|| format!("failed to write {}", dst.display()))?;
    info!(%mode, src = %src.display(), dst = %dst.display(), "patch applied");

    println!("Patched file written to {}", dst.display());
    Ok(())
}
