//! # Trust Configuration
//!
//! A YAML document naming the signing keys, policy definitions and
//! verifier settings a `pcred` invocation trusts.
//!
//! ```yaml
//! clockSkewSecs: 300
//! bindPolicies: true
//! currentKey: k2
//! keys:
//!   - keyId: k1
//!     status: retired
//!     publicKeyHex: "3b6a..."
//!   - keyId: k2
//!     seedEnv: PCRED_K2_SEED_HEX
//! policies:
//!   - policyId: age-over-18
//!     version: 1
//!     status: active
//!     circuitId: age_over_v1
//!     verificationKeyId: vk-1
//!     verificationKeyFingerprint: f00d
//!     defaultExpirySecs: 3600
//! verifier:
//!   expectedCredentialType: AgeOver18
//!   attributeClaim: satisfied
//!   challengeKeyEnv: PCRED_CHALLENGE_KEY_HEX
//!   proofTimeoutMs: 5000
//! ```
//!
//! ## Security Invariant
//!
//! Seeds and challenge keys should come from the environment (`seedEnv`,
//! `challengeKeyEnv`). `seedHex` exists for local development; its value
//! never appears in `Debug` output.

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use pcred_core::{CommitmentKey, KeyId};
use pcred_crypto::{Ed25519KeyPair, Ed25519PublicKey, InMemoryKeyService, KeyStatus};
use pcred_engine::{ZkpVerifierConfig, DEFAULT_ATTRIBUTE_CLAIM, DEFAULT_PROOF_TIMEOUT};
use pcred_policy::{InMemoryPolicyRegistry, PolicyDefinition};
use pcred_vc::{ValidatorConfig, DEFAULT_CLOCK_SKEW};
use serde::Deserialize;

/// Default environment variable for the challenge key.
pub const DEFAULT_CHALLENGE_KEY_ENV: &str = "PCRED_CHALLENGE_KEY_HEX";

/// One signing key entry.
#[derive(Clone, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct KeyEntry {
    /// Key identifier.
    pub key_id: String,
    /// Lifecycle status.
    #[serde(default = "active")]
    pub status: KeyStatus,
    /// Hex seed, inline.
    #[serde(default)]
    pub seed_hex: Option<String>,
    /// Name of an environment variable holding the hex seed.
    #[serde(default)]
    pub seed_env: Option<String>,
    /// Hex public key, for verification-only entries.
    #[serde(default)]
    pub public_key_hex: Option<String>,
}

fn active() -> KeyStatus {
    KeyStatus::Active
}

impl std::fmt::Debug for KeyEntry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KeyEntry")
            .field("key_id", &self.key_id)
            .field("status", &self.status)
            .field("seed_hex", &self.seed_hex.as_ref().map(|_| "<redacted>"))
            .field("seed_env", &self.seed_env)
            .field("public_key_hex", &self.public_key_hex)
            .finish()
    }
}

/// Verifier settings.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct VerifierSection {
    /// Credential type the legacy verifier expects.
    pub expected_credential_type: String,
    /// Boolean attribute claim checked by the legacy verifier.
    #[serde(default = "default_attribute_claim")]
    pub attribute_claim: String,
    /// Environment variable holding the hex challenge key.
    #[serde(default = "default_challenge_key_env")]
    pub challenge_key_env: String,
    /// Proof-service timeout in milliseconds.
    #[serde(default)]
    pub proof_timeout_ms: Option<u64>,
}

fn default_attribute_claim() -> String {
    DEFAULT_ATTRIBUTE_CLAIM.to_string()
}

fn default_challenge_key_env() -> String {
    DEFAULT_CHALLENGE_KEY_ENV.to_string()
}

/// The whole trust configuration.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct TrustConfig {
    /// Clock-skew tolerance in seconds.
    #[serde(default)]
    pub clock_skew_secs: Option<u64>,
    /// Enable the policy-binding validation stage.
    #[serde(default)]
    pub bind_policies: bool,
    /// Key to issue with; defaults to the first signing key.
    #[serde(default)]
    pub current_key: Option<String>,
    /// Signing and verification keys.
    #[serde(default)]
    pub keys: Vec<KeyEntry>,
    /// Policy definitions.
    #[serde(default)]
    pub policies: Vec<PolicyDefinition>,
    /// Verifier settings; required by `verify` and `challenge`.
    #[serde(default)]
    pub verifier: Option<VerifierSection>,
}

impl TrustConfig {
    /// Load and parse a YAML configuration file.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read trust config: {}", path.display()))?;
        Self::from_yaml(&content).with_context(|| format!("invalid trust config: {}", path.display()))
    }

    /// Parse a YAML configuration document.
    pub fn from_yaml(content: &str) -> Result<Self> {
        let config: Self = serde_yaml::from_str(content)?;
        Ok(config)
    }

    /// Validator settings.
    pub fn validator_config(&self) -> ValidatorConfig {
        ValidatorConfig {
            clock_skew: self
                .clock_skew_secs
                .map(Duration::from_secs)
                .unwrap_or(DEFAULT_CLOCK_SKEW),
        }
    }

    /// Build the key service. Seeds are resolved here.
    pub fn key_service(&self) -> Result<Arc<InMemoryKeyService>> {
        let keys = InMemoryKeyService::new();
        for entry in &self.keys {
            let key_id = KeyId::new(&entry.key_id)?;
            match (entry.seed_hex.as_deref(), entry.seed_env.as_deref(), entry.public_key_hex.as_deref()) {
                (Some(seed), None, None) => {
                    let pair = Ed25519KeyPair::from_seed_hex(seed)
                        .with_context(|| format!("invalid seedHex for key {key_id}"))?;
                    keys.import(key_id.clone(), pair)?;
                }
                (None, Some(var), None) => {
                    let seed = std::env::var(var).with_context(|| format!("{var} is not set (key {key_id})"))?;
                    let pair = Ed25519KeyPair::from_seed_hex(&seed)
                        .with_context(|| format!("invalid seed in {var} for key {key_id}"))?;
                    keys.import(key_id.clone(), pair)?;
                }
                (None, None, Some(pk)) => {
                    let public_key = Ed25519PublicKey::from_hex(pk)
                        .with_context(|| format!("invalid publicKeyHex for key {key_id}"))?;
                    keys.import_public(key_id.clone(), public_key, entry.status)?;
                    continue;
                }
                _ => bail!("key {key_id}: set exactly one of seedHex, seedEnv, publicKeyHex"),
            }
            if entry.status == KeyStatus::Retired {
                keys.retire(&key_id)?;
            }
        }
        if let Some(current) = &self.current_key {
            keys.set_current(&KeyId::new(current)?)?;
        }
        Ok(Arc::new(keys))
    }

    /// Build the policy registry.
    pub fn policy_registry(&self) -> Result<Arc<InMemoryPolicyRegistry>> {
        let registry = InMemoryPolicyRegistry::new();
        for policy in &self.policies {
            registry
                .register(policy.clone())
                .with_context(|| format!("policy {} {}", policy.policy_id, policy.version))?;
        }
        Ok(Arc::new(registry))
    }

    /// The verifier section, or an error naming it.
    pub fn verifier(&self) -> Result<&VerifierSection> {
        self.verifier
            .as_ref()
            .context("trust config has no `verifier` section")
    }

    /// The challenge key, read from the configured environment variable.
    pub fn challenge_key(&self) -> Result<CommitmentKey> {
        let var = &self.verifier()?.challenge_key_env;
        let hex = std::env::var(var).with_context(|| format!("{var} is not set"))?;
        CommitmentKey::from_hex(&hex).with_context(|| format!("invalid challenge key in {var}"))
    }

    /// ZKP verifier settings.
    pub fn zkp_config(&self) -> Result<ZkpVerifierConfig> {
        let section = self.verifier()?;
        let mut config = ZkpVerifierConfig::new(self.challenge_key()?);
        config.proof_timeout = section
            .proof_timeout_ms
            .filter(|ms| *ms > 0)
            .map(Duration::from_millis)
            .unwrap_or(DEFAULT_PROOF_TIMEOUT);
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pcred_crypto::KeyManagementService;
    use pcred_core::CancellationSignal;
    use std::io::Write;

    const SEED_A: &str = "1111111111111111111111111111111111111111111111111111111111111111";
    const SEED_B: &str = "2222222222222222222222222222222222222222222222222222222222222222";

    fn sample_yaml() -> String {
        format!(
            r#"
clockSkewSecs: 120
bindPolicies: true
currentKey: k2
keys:
  - keyId: k1
    seedHex: "{SEED_A}"
  - keyId: k2
    seedHex: "{SEED_B}"
  - keyId: k0
    status: retired
    publicKeyHex: "{pk}"
policies:
  - policyId: age-over-18
    version: 1
    status: active
    circuitId: age_over_v1
    verificationKeyId: vk-1
    verificationKeyFingerprint: f00d
    defaultExpirySecs: 3600
verifier:
  expectedCredentialType: AgeOver18
"#,
            pk = Ed25519KeyPair::from_seed(&[3u8; 32]).public_key().to_hex()
        )
    }

    #[test]
    fn load_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(sample_yaml().as_bytes()).unwrap();
        let config = TrustConfig::load(file.path()).unwrap();
        assert_eq!(config.keys.len(), 3);
        assert_eq!(config.policies.len(), 1);
        assert!(config.bind_policies);
        assert_eq!(config.validator_config().clock_skew, Duration::from_secs(120));
        let verifier = config.verifier().unwrap();
        assert_eq!(verifier.attribute_claim, "satisfied");
        assert_eq!(verifier.challenge_key_env, DEFAULT_CHALLENGE_KEY_ENV);
    }

    #[test]
    fn missing_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        assert!(TrustConfig::load(&dir.path().join("absent.yaml")).is_err());
    }

    #[test]
    fn unknown_fields_rejected() {
        assert!(TrustConfig::from_yaml("keys: []\nsurprise: 1\n").is_err());
    }

    #[tokio::test]
    async fn key_service_honors_current_and_status() {
        let config = TrustConfig::from_yaml(&sample_yaml()).unwrap();
        let keys = config.key_service().unwrap();
        let cancel = CancellationSignal::new();
        let current = keys.current_signing_key(&cancel).await.unwrap().unwrap();
        assert_eq!(current.key_id.as_str(), "k2");
        let k0 = keys.key_by_id(&KeyId::new("k0").unwrap(), &cancel).await.unwrap().unwrap();
        assert!(k0.is_retired());
    }

    #[test]
    fn key_entry_needs_exactly_one_source() {
        let yaml = format!("keys:\n  - keyId: k1\n    seedHex: \"{SEED_A}\"\n    publicKeyHex: \"{SEED_A}\"\n");
        let config = TrustConfig::from_yaml(&yaml).unwrap();
        assert!(config.key_service().is_err());
        let config = TrustConfig::from_yaml("keys:\n  - keyId: k1\n").unwrap();
        assert!(config.key_service().is_err());
    }

    #[test]
    fn debug_redacts_seed() {
        let config = TrustConfig::from_yaml(&sample_yaml()).unwrap();
        let dbg = format!("{config:?}");
        assert!(!dbg.contains(SEED_A));
        assert!(dbg.contains("<redacted>"));
    }

    #[test]
    fn duplicate_policy_versions_rejected() {
        let mut config = TrustConfig::from_yaml(&sample_yaml()).unwrap();
        config.policies.push(config.policies[0].clone());
        assert!(config.policy_registry().is_err());
    }

    #[test]
    fn verifier_section_required() {
        let config = TrustConfig::from_yaml("keys: []\n").unwrap();
        assert!(config.verifier().is_err());
    }
}
