use std::sync::Arc;

use tracing::info;

use super::{PatchError, find_insertion_point, splice};
use crate::completion::{CompletionClient, CompletionRequest};

const PROMPT_PREAMBLE: &str = "You are an assistant that suggests a small C patch to fix a bug.\n\
The input is the source file content. Produce only the replacement code block\n\
to insert where a division by a user-provided integer is unsafe.\n";

/// Prompt sent to the completion endpoint for `source`.
pub fn build_prompt(source: &str) -> String {
    format!("{PROMPT_PREAMBLE}\n\n=== SOURCE ===\n{source}\n\n=== PATCH ===\n")
}

/// Splices a remotely suggested block at the template insertion point.
#[derive(Clone)]
pub struct RemotePatcher {
    client: Arc<dyn CompletionClient>,
}

impl std::fmt::Debug for RemotePatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RemotePatcher").finish_non_exhaustive()
    }
}

impl RemotePatcher {
    pub fn new(client: Arc<dyn CompletionClient>) -> Self {
        Self { client }
    }

    /// The completion text is inserted verbatim (trimmed), without any
    /// validation that it is well-formed C.
    pub async fn apply(&self, source: &str) -> Result<String, PatchError> {
        let insert_at = find_insertion_point(source)
            .ok_or(PatchError::InsertionPointNotFound)?;

        let request = CompletionRequest::new(build_prompt(source));
        let completion = self.client.complete(&request).await?;
        let block = completion.trim();
        if block.is_empty() {
            return Err(PatchError::EmptyCompletion);
        }

        info!(block_len = block.len(), "splicing remote-assisted patch");
        Ok(splice(source, insert_at, &format!("{block}\n")))
    }
}
