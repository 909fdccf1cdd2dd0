//! # Challenge and Verify Subcommands
//!
//! `verify` routes a verification request through the engine with both
//! verifiers registered. The ZKP path uses the deterministic mock proof
//! backend; hosts that verify real proofs embed the engine with their own
//! `ProofVerificationService` instead of shelling out to this binary.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Args;
use pcred_core::{CancellationSignal, PolicyId};
use pcred_engine::{LegacyCredentialVerifier, VerificationEngine, VerificationRequest, ZkpVerifier};
use pcred_zkp::{ChallengeIssuer, MockProofVerifier};

use crate::credential::validator;
use crate::{read_input, CommandOutput, TrustConfig};

/// Arguments for `pcred challenge`.
#[derive(Args, Debug)]
pub struct ChallengeArgs {
    /// Policy the presentation must satisfy.
    #[arg(long)]
    pub policy: String,

    /// Intended relying party.
    #[arg(long)]
    pub audience: Option<String>,

    /// Challenge lifetime in seconds.
    #[arg(long)]
    pub ttl_secs: Option<i64>,
}

/// Arguments for `pcred verify`.
#[derive(Args, Debug)]
pub struct VerifyArgs {
    /// Verification request JSON, or `-` for stdin.
    #[arg(value_name = "REQUEST")]
    pub request: PathBuf,
}

/// Execute `pcred challenge`.
pub fn run_challenge(args: &ChallengeArgs, config: &TrustConfig) -> Result<CommandOutput> {
    let mut issuer = ChallengeIssuer::new(config.challenge_key()?);
    if let Some(ttl) = args.ttl_secs {
        issuer = issuer.with_ttl_secs(ttl)?;
    }
    let issued = issuer.issue(PolicyId::new(&args.policy)?, args.audience.clone())?;
    Ok(CommandOutput::ok(serde_json::to_value(&issued)?))
}

/// Build the verification engine the trust configuration describes.
pub fn build_engine(config: &TrustConfig) -> Result<VerificationEngine> {
    let section = config.verifier()?;
    let legacy = LegacyCredentialVerifier::new(Arc::new(validator(config)?), section.expected_credential_type.clone())
        .with_attribute_claim(section.attribute_claim.clone());
    let zkp = ZkpVerifier::new(
        config.policy_registry()?,
        Arc::new(MockProofVerifier::new()),
        config.zkp_config()?,
    );
    Ok(VerificationEngine::new()
        .with_verifier(Arc::new(legacy))
        .with_verifier(Arc::new(zkp)))
}

/// Execute `pcred verify`.
pub async fn run_verify(args: &VerifyArgs, config: &TrustConfig, cancel: &CancellationSignal) -> Result<CommandOutput> {
    let raw = read_input(&args.request)?;
    let request: VerificationRequest = serde_json::from_slice(&raw)
        .with_context(|| format!("invalid verification request: {}", args.request.display()))?;
    let engine = build_engine(config)?;
    let result = engine.verify(&request, cancel).await?;
    Ok(CommandOutput::decision(serde_json::to_value(&result)?, result.valid))
}
