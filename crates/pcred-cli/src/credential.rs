//! # Issue and Validate Subcommands

use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use clap::Args;
use pcred_core::{CancellationSignal, PolicyId, PolicyVersion, SubjectId, Timestamp};
use pcred_vc::{CredentialIssuer, CredentialValidator, IssuanceError, IssueRequest};
use serde_json::{json, Map, Value};

use crate::{read_input, CommandOutput, TrustConfig, EXIT_REJECTED};

/// Arguments for `pcred issue`.
#[derive(Args, Debug)]
pub struct IssueArgs {
    /// Policy identifier.
    #[arg(long)]
    pub policy: String,

    /// Policy version; the latest active version when omitted.
    #[arg(long)]
    pub policy_version: Option<u32>,

    /// Pseudonymous subject identifier.
    #[arg(long)]
    pub subject: String,

    /// JSON object file with credential claims.
    #[arg(long)]
    pub claims: Option<PathBuf>,

    /// Device binding tag.
    #[arg(long)]
    pub device_tag: Option<String>,

    /// Explicit expiry (RFC 3339, UTC).
    #[arg(long)]
    pub expires_at: Option<String>,

    /// Not-before time (RFC 3339, UTC).
    #[arg(long)]
    pub not_before: Option<String>,
}

/// Arguments for `pcred validate`.
#[derive(Args, Debug)]
pub struct ValidateArgs {
    /// Compact token.
    #[arg(long, conflicts_with = "token_file")]
    pub token: Option<String>,

    /// File holding the compact token, or `-` for stdin.
    #[arg(long)]
    pub token_file: Option<PathBuf>,
}

/// Build the issuance request from arguments.
fn issue_request(args: &IssueArgs) -> Result<IssueRequest> {
    let claims = match &args.claims {
        None => Map::new(),
        Some(path) => {
            let raw = read_input(path)?;
            match serde_json::from_slice::<Value>(&raw).with_context(|| format!("invalid JSON in {}", path.display()))? {
                Value::Object(map) => map,
                _ => bail!("claims file must hold a JSON object: {}", path.display()),
            }
        }
    };
    let mut request = IssueRequest::new(PolicyId::new(&args.policy)?, SubjectId::new(&args.subject)?, claims);
    request.policy_version = args.policy_version.map(PolicyVersion::new).transpose()?;
    request.device_tag = args.device_tag.clone();
    request.custom_expiry = args.expires_at.as_deref().map(Timestamp::parse).transpose()?;
    request.not_before = args.not_before.as_deref().map(Timestamp::parse).transpose()?;
    Ok(request)
}

/// Execute `pcred issue`.
pub async fn run_issue(args: &IssueArgs, config: &TrustConfig, cancel: &CancellationSignal) -> Result<CommandOutput> {
    let request = issue_request(args)?;
    let keys = config.key_service()?;
    let issuer = CredentialIssuer::new(config.policy_registry()?, keys.clone(), keys);

    match issuer.issue(request, cancel).await {
        Ok(issued) => Ok(CommandOutput::ok(serde_json::to_value(&issued)?)),
        Err(IssuanceError::Cancelled(c)) => Err(c.into()),
        Err(e) if e.is_client_error() => Ok(CommandOutput {
            body: json!({
                "issued": false,
                "reasonCode": e.reason_code(),
                "error": e.to_string(),
            }),
            exit_code: EXIT_REJECTED,
        }),
        Err(e) => Err(anyhow::Error::new(e).context("issuance failed")),
    }
}

/// Build the validator the trust configuration describes.
pub fn validator(config: &TrustConfig) -> Result<CredentialValidator> {
    let mut validator = CredentialValidator::new(config.key_service()?).with_config(config.validator_config());
    if config.bind_policies {
        validator = validator.with_policy_registry(config.policy_registry()?);
    }
    Ok(validator)
}

/// Execute `pcred validate`.
pub async fn run_validate(
    args: &ValidateArgs,
    config: &TrustConfig,
    cancel: &CancellationSignal,
) -> Result<CommandOutput> {
    let token = match (&args.token, &args.token_file) {
        (Some(token), _) => token.clone(),
        (None, Some(path)) => String::from_utf8(read_input(path)?).context("token is not UTF-8")?,
        (None, None) => bail!("pass --token or --token-file"),
    };
    let validator = validator(config)?;
    let result = validator.validate(token.trim(), cancel).await?;
    Ok(CommandOutput::decision(serde_json::to_value(&result)?, result.valid))
}
