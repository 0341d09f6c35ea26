//! Source patching.
//!
//! Both patch modes share one insertion point: the first declaration that
//! reads the user-provided integer (`int x = atoi(argv[1]);`). The template
//! mode splices a fixed guard block after it, the remote-assisted mode splices
//! whatever the completion endpoint returned.

pub mod remote;

use std::{fmt, str::FromStr};

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::completion::CompletionError;

pub use remote::{RemotePatcher, build_prompt};

/// Declaration the guard is inserted after.
pub const INSERTION_PATTERN: &str = r"int\s+x\s*=\s*atoi\(argv\[1\]\);";

/// Guard block inserted by the template patcher.
pub const TEMPLATE_GUARD: &str = r#"
/* AUTO-PATCH (template): add guard for division-by-zero */
if (x == 0) {
    printf("Input was 0, auto-patched to avoid division.\n");
    return 1;
}
"#;

/// Indentation emitted between the matched declaration and the inserted block.
const INSERT_PREFIX: &str = "\n    ";

static INSERTION_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(INSERTION_PATTERN).expect("insertion pattern is a valid regex")
});

/// Failures applying a template or remote patch.
#[derive(Debug, Error)]
pub enum PatchError {
    #[error("could not find the expected pattern to patch")]
    PatternNotFound,

    #[error("could not find insertion point for remote-assisted patch")]
    InsertionPointNotFound,

    #[error("remote-assisted mode requires an API key")]
    MissingCredential,

    #[error("remote completion returned an empty patch")]
    EmptyCompletion,

    #[error(transparent)]
    Completion(#[from] CompletionError),
}

/// How a patch is produced.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum PatchMode {
    /// Insert the fixed guard block.
    #[default]
    Template,
    /// Insert a block suggested by a remote completion endpoint.
    Remote,
}

impl PatchMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            PatchMode::Template => "template",
            PatchMode::Remote => "remote",
        }
    }
}

impl fmt::Display for PatchMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PatchMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "template" => Ok(PatchMode::Template),
            "remote" | "ai" => Ok(PatchMode::Remote),
            other => Err(format!(
                "unknown patch mode '{other}' (expected 'template' or 'remote')"
            )),
        }
    }
}

/// Byte offset immediately after the first insertion-pattern match.
pub fn find_insertion_point(source: &str) -> Option<usize> {
    INSERTION_RE.find(source).map(|m| m.end())
}

/// Apply the template guard after the first matching declaration.
pub fn apply_template_patch(source: &str) -> Result<String, PatchError> {
    let insert_at =
        find_insertion_point(source).ok_or(PatchError::PatternNotFound)?;
    Ok(splice(source, insert_at, TEMPLATE_GUARD))
}

/// Insert `block` at `insert_at`, prefixed by the standard indentation.
pub(crate) fn splice(source: &str, insert_at: usize, block: &str) -> String {
    let mut patched =
        String::with_capacity(source.len() + INSERT_PREFIX.len() + block.len());
    patched.push_str(&source[..insert_at]);
    patched.push_str(INSERT_PREFIX);
    patched.push_str(block);
    patched.push_str(&source[insert_at..]);
    patched
}
