//! # pcred-cli: Policy Credential Command-Line Interface
//!
//! ## Subcommands
//!
//! - `pcred hash <FILE>`: canonical SHA-256 of a JSON document.
//! - `pcred commit <FILE> --key-env VAR`: keyed HMAC-SHA-256 commitment.
//! - `pcred keygen --key-id ID`: a fresh Ed25519 signing key.
//! - `pcred issue`: issue a credential from the trust configuration.
//! - `pcred validate`: run the validation pipeline on a token.
//! - `pcred challenge`: issue a committed ZKP challenge.
//! - `pcred verify <REQUEST>`: verify a presentation through the engine.
//!
//! Every subcommand prints one JSON document on stdout. Exit status is 0 on
//! success, 2 when a credential or presentation is rejected, and 1 on
//! operational errors.
//!
//! ## Crate Policy
//!
//! - Argument parsing lives in `main.rs`; handlers live here and return
//!   their output instead of printing, so they can be tested.
//! - Handlers delegate to domain crates. No trust decisions are made here.

pub mod config;
pub mod credential;
pub mod digest;
pub mod keys;
pub mod presentation;

use std::io::Read;
use std::path::Path;

use anyhow::{Context, Result};
use serde_json::Value;

pub use config::TrustConfig;

/// Exit status for a rejected credential or presentation.
pub const EXIT_REJECTED: u8 = 2;

/// What a handler produced.
#[derive(Debug, Clone, PartialEq)]
pub struct CommandOutput {
    /// JSON document for stdout.
    pub body: Value,
    /// Process exit status.
    pub exit_code: u8,
}

impl CommandOutput {
    /// Successful output.
    pub fn ok(body: Value) -> Self {
        Self { body, exit_code: 0 }
    }

    /// Output whose status depends on an accept/reject decision.
    pub fn decision(body: Value, accepted: bool) -> Self {
        Self {
            body,
            exit_code: if accepted { 0 } else { EXIT_REJECTED },
        }
    }
}

/// Read a file, or stdin when `path` is `-`.
pub fn read_input(path: &Path) -> Result<Vec<u8>> {
    if path.as_os_str() == "-" {
        let mut buf = Vec::new();
        std::io::stdin().read_to_end(&mut buf).context("failed to read stdin")?;
        return Ok(buf);
    }
    std::fs::read(path).with_context(|| format!("failed to read {}", path.display()))
}

/// Load the trust configuration named by `--config`.
pub fn require_config(path: Option<&Path>) -> Result<TrustConfig> {
    let path = path.context("this subcommand needs --config <TRUST_CONFIG>")?;
    TrustConfig::load(path)
}
