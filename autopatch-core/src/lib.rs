//! # autopatch-core
//!
//! Core library for autopatch: a small workflow that compiles a C program
//! with a division-by-zero defect, asks an external symbolic-execution engine
//! for a crashing argument, and splices a guard into the source.
//!
//! ## Modules
//!
//! - [`patch`]: template and remote-assisted patching at a fixed insertion point
//! - [`completion`]: client for the remote completion endpoint
//! - [`toolchain`]: compiler and program invocation
//! - [`finder`]: crash-input search (external engine, concrete probe fallback)
//! - [`credentials`]: username/password table with Argon2id hashes
//! - [`pipeline`]: the compile → find → patch → verify workflow
//!
//! ## Example
//!
//! ```
//! use autopatch_core::patch::apply_template_patch;
//!
//! let source = "int main(int argc, char **argv) {\n    int x = atoi(argv[1]);\n    return 10 / x;\n}\n";
//! let patched = apply_template_patch(source).unwrap();
//! assert!(patched.contains("if (x == 0)"));
//! ```

pub mod completion;
pub mod credentials;
pub mod finder;
pub mod patch;
pub mod pipeline;
pub mod toolchain;

pub use credentials::{
    CredentialError, CredentialRecord, CredentialStore, PasswordHasher,
    SqliteCredentialStore,
};
pub use finder::{FinderChain, FinderOutcome, FinderReport};
pub use patch::{PatchError, PatchMode};
pub use pipeline::{Pipeline, RunReport};
pub use toolchain::Toolchain;
