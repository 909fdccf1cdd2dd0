//! # Policy Registry
//!
//! [`PolicyRegistry`] is the lookup interface issuers and validators use.
//! Storage, administration and audit of policy changes live behind it.
//!
//! Resolution rules:
//!
//! - An explicit version returns exactly that version, whatever its status.
//! - No version returns the highest `Active` version. When no version is
//!   active, it returns the highest version, so the caller can report
//!   the policy as inactive rather than unknown.

use std::collections::BTreeMap;

use async_trait::async_trait;
use parking_lot::RwLock;
use pcred_core::{CancellationSignal, PolicyId, PolicyVersion};

use crate::definition::{PolicyDefinition, PolicyStatus};
use crate::error::RegistryError;

/// Read access to policy definitions.
#[async_trait]
pub trait PolicyRegistry: Send + Sync {
    /// Resolve a policy, optionally at a specific version.
    async fn get_policy(
        &self,
        policy_id: &PolicyId,
        version: Option<PolicyVersion>,
        cancel: &CancellationSignal,
    ) -> Result<Option<PolicyDefinition>, RegistryError>;
}

/// In-memory policy registry.
#[derive(Debug, Default)]
pub struct InMemoryPolicyRegistry {
    policies: RwLock<BTreeMap<PolicyId, BTreeMap<PolicyVersion, PolicyDefinition>>>,
}

impl InMemoryPolicyRegistry {
    /// An empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a new definition. An existing `(policy, version)` is never
    /// overwritten.
    pub fn register(&self, definition: PolicyDefinition) -> Result<(), RegistryError> {
        definition.validate()?;
        let mut policies = self.policies.write();
        let versions = policies.entry(definition.policy_id.clone()).or_default();
        if versions.contains_key(&definition.version) {
            return Err(RegistryError::DuplicateVersion {
                policy_id: definition.policy_id,
                version: definition.version,
            });
        }
        tracing::info!(
            policy_id = %definition.policy_id,
            version = definition.version.get(),
            status = %definition.status,
            "policy registered"
        );
        versions.insert(definition.version, definition);
        Ok(())
    }

    /// Move a version to a new lifecycle status.
    pub fn set_status(
        &self,
        policy_id: &PolicyId,
        version: PolicyVersion,
        status: PolicyStatus,
    ) -> Result<(), RegistryError> {
        let mut policies = self.policies.write();
        let definition = policies
            .get_mut(policy_id)
            .and_then(|versions| versions.get_mut(&version))
            .ok_or_else(|| RegistryError::NotFound {
                policy_id: policy_id.clone(),
            })?;
        if !definition.status.can_transition_to(status) {
            return Err(RegistryError::InvalidTransition {
                from: definition.status,
                to: status,
            });
        }
        tracing::info!(
            policy_id = %policy_id,
            version = version.get(),
            from = %definition.status,
            to = %status,
            "policy status changed"
        );
        definition.status = status;
        Ok(())
    }

    /// Number of registered versions across all policies.
    pub fn len(&self) -> usize {
        self.policies.read().values().map(BTreeMap::len).sum()
    }

    /// Whether the registry holds no definitions.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait]
impl PolicyRegistry for InMemoryPolicyRegistry {
    async fn get_policy(
        &self,
        policy_id: &PolicyId,
        version: Option<PolicyVersion>,
        cancel: &CancellationSignal,
    ) -> Result<Option<PolicyDefinition>, RegistryError> {
        cancel.check()?;
        let policies = self.policies.read();
        let Some(versions) = policies.get(policy_id) else {
            return Ok(None);
        };
        let found = match version {
            Some(v) => versions.get(&v),
            None => versions
                .values()
                .rev()
                .find(|d| d.status.is_active())
                .or_else(|| versions.values().next_back()),
        };
        Ok(found.cloned())
    }
}
