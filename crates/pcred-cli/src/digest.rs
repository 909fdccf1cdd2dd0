//! # Hash and Commit Subcommands
//!
//! Both read raw JSON text, so numeric literals keep their written form
//! (`1` and `1.0` hash differently).

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Args;
use pcred_core::{canonicalize_and_commit, canonicalize_and_hash, hex_to_bytes};
use serde_json::json;

use crate::{read_input, CommandOutput};

/// Default environment variable for the commitment key.
pub const DEFAULT_COMMITMENT_KEY_ENV: &str = "PCRED_COMMITMENT_KEY_HEX";

/// Arguments for `pcred hash`.
#[derive(Args, Debug)]
pub struct HashArgs {
    /// JSON document, or `-` for stdin.
    #[arg(value_name = "FILE")]
    pub file: PathBuf,
}

/// Arguments for `pcred commit`.
#[derive(Args, Debug)]
pub struct CommitArgs {
    /// JSON document, or `-` for stdin.
    #[arg(value_name = "FILE")]
    pub file: PathBuf,

    /// Environment variable holding the hex HMAC key (at least 32 bytes).
    #[arg(long, default_value = DEFAULT_COMMITMENT_KEY_ENV)]
    pub key_env: String,
}

/// Execute `pcred hash`.
pub fn run_hash(args: &HashArgs) -> Result<CommandOutput> {
    let raw = read_input(&args.file)?;
    let digest = canonicalize_and_hash(&raw).with_context(|| format!("cannot hash {}", args.file.display()))?;
    Ok(CommandOutput::ok(json!({"algorithm": "sha256", "digest": digest})))
}

/// Execute `pcred commit`.
pub fn run_commit(args: &CommitArgs) -> Result<CommandOutput> {
    let key_hex = std::env::var(&args.key_env).with_context(|| format!("{} is not set", args.key_env))?;
    let raw = read_input(&args.file)?;
    commit(&raw, &key_hex)
}

fn commit(raw: &[u8], key_hex: &str) -> Result<CommandOutput> {
    let key = hex_to_bytes(key_hex).map_err(anyhow::Error::msg).context("commitment key is not hex")?;
    let commitment = canonicalize_and_commit(raw, &key)?;
    Ok(CommandOutput::ok(json!({"algorithm": "hmac-sha256", "commitment": commitment})))
}
