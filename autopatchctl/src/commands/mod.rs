pub mod patch;
pub mod users;
pub mod workflow;

use anyhow::{Context, Result};
use autopatch_config::Config;
use autopatch_core::{PatchError, patch::RemotePatcher};

/// Remote patcher from an explicit key or the configured one.
pub(crate) fn remote_patcher(config: &Config, api_key: Option<&str>) -> Result<RemotePatcher> {
    let Some(patcher) = config.remote.patcher(api_key) else {
        return Err(anyhow::Error::new(PatchError::MissingCredential)
            .context("pass --api-key or set AUTOPATCH_API_KEY / OPENAI_API_KEY"));
    };
    patcher.context("failed to build completion client")
}
