//! # Keygen Subcommand
//!
//! Prints a fresh Ed25519 seed and public key. The seed is the only copy;
//! store it in a secret manager and reference it from the trust
//! configuration through `seedEnv`.

use anyhow::Result;
use clap::Args;
use pcred_core::KeyId;
use pcred_crypto::Ed25519KeyPair;
use serde_json::json;

use crate::CommandOutput;

/// Arguments for `pcred keygen`.
#[derive(Args, Debug)]
pub struct KeygenArgs {
    /// Identifier to record for the key.
    #[arg(long)]
    pub key_id: String,
}

/// Execute `pcred keygen`.
pub fn run_keygen(args: &KeygenArgs) -> Result<CommandOutput> {
    let key_id = KeyId::new(&args.key_id)?;
    let pair = Ed25519KeyPair::generate();
    tracing::info!(key_id = %key_id, "generated signing key");
    Ok(CommandOutput::ok(json!({
        "keyId": key_id,
        "publicKeyHex": pair.public_key().to_hex(),
        "seedHex": pair.export_seed_hex(),
    })))
}
