//! Credential status (revocation) checks.

use std::{
    collections::{BTreeSet, HashMap},
    fmt::Debug,
    sync::Arc,
};

use anyhow::{bail, Result};
use async_trait::async_trait;
use tokio::sync::Mutex;
use tracing::debug;

use crate::core::credential::{CredentialRecord, CredentialStatusEntry};

pub const STATUS_LIST_2021: &str = "StatusList2021Entry";
pub const BITSTRING_STATUS_LIST: &str = "BitstringStatusListEntry";

/// Decides whether a credential has been invalidated by its issuer.
///
/// An `Err` means "not valid": it may stand for a revoked credential as well as for a status
/// list that could not be fetched.
#[async_trait]
pub trait RevocationChecker: Debug + Send + Sync {
    async fn check_validity(&self, credential: &CredentialRecord) -> Result<()>;
}

/// Checks a single `credentialStatus` entry of one particular status type.
#[async_trait]
pub trait StatusEntryChecker: Debug + Send + Sync {
    async fn check_entry(
        &self,
        credential: &CredentialRecord,
        entry: &CredentialStatusEntry,
    ) -> Result<()>;
}

/// Dispatches every status entry of a credential to the checker registered for its type.
///
/// Built once at startup and read-only afterwards.
#[derive(Debug, Clone, Default)]
pub struct RevocationRegistry {
    checkers: HashMap<String, Arc<dyn StatusEntryChecker>>,
}

impl RevocationRegistry {
    pub fn builder() -> RevocationRegistryBuilder {
        RevocationRegistryBuilder::default()
    }
}

#[async_trait]
impl RevocationChecker for RevocationRegistry {
    async fn check_validity(&self, credential: &CredentialRecord) -> Result<()> {
        for entry in &credential.credential_status {
            let Some(checker) = self.checkers.get(&entry.status_type) else {
                bail!(
                    "no revocation checker registered for status type '{}'",
                    entry.status_type
                )
            };
            debug!(
                "checking status entry '{}' of credential '{}'",
                entry.id, credential.id
            );
            checker.check_entry(credential, entry).await?;
        }
        Ok(())
    }
}

/// Builder struct for [RevocationRegistry].
#[derive(Debug, Clone, Default)]
pub struct RevocationRegistryBuilder {
    checkers: HashMap<String, Arc<dyn StatusEntryChecker>>,
}

impl RevocationRegistryBuilder {
    pub fn with_checker(
        mut self,
        status_type: impl Into<String>,
        checker: Arc<dyn StatusEntryChecker>,
    ) -> Self {
        self.checkers.insert(status_type.into(), checker);
        self
    }

    pub fn build(self) -> RevocationRegistry {
        RevocationRegistry {
            checkers: self.checkers,
        }
    }
}

/// A local in-memory status list. Not for production use!
///
/// Status entries whose `id` has been marked are reported as revoked.
#[derive(Debug, Clone, Default)]
pub struct MemoryStatusList {
    revoked: Arc<Mutex<BTreeSet<String>>>,
}

impl MemoryStatusList {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn revoke(&self, status_entry_id: impl Into<String>) {
        self.revoked.lock().await.insert(status_entry_id.into());
    }
}

#[async_trait]
impl StatusEntryChecker for MemoryStatusList {
    async fn check_entry(
        &self,
        credential: &CredentialRecord,
        entry: &CredentialStatusEntry,
    ) -> Result<()> {
        if self.revoked.lock().await.contains(&entry.id) {
            bail!("credential '{}' is revoked", credential.id)
        }
        Ok(())
    }
}

#[cfg(test)]
mod test {
    use chrono::Utc;
    use serde_json::Map;

    use super::*;
    use crate::core::credential::{
        CredentialContainer, CredentialDescription, CredentialFormat, VcState,
    };

    fn credential(status: Vec<CredentialStatusEntry>) -> CredentialRecord {
        CredentialRecord {
            id: "cred-1".into(),
            participant_context_id: "alice".into(),
            state: VcState::Issued,
            issuance_date: Utc::now(),
            expiration_date: None,
            credential_status: status,
            verifiable_credential: CredentialContainer {
                raw_vc: "eyJ...".into(),
                format: CredentialFormat::Vc1Jwt,
                credential: CredentialDescription {
                    id: None,
                    types: vec!["VerifiableCredential".into()],
                    issuer: None,
                },
            },
        }
    }

    fn entry(id: &str, status_type: &str) -> CredentialStatusEntry {
        CredentialStatusEntry {
            id: id.into(),
            status_type: status_type.into(),
            properties: Map::new(),
        }
    }

    #[tokio::test]
    async fn dispatches_by_status_type() {
        let list = MemoryStatusList::new();
        list.revoke("status#1").await;
        let registry = RevocationRegistry::builder()
            .with_checker(BITSTRING_STATUS_LIST, Arc::new(list))
            .build();

        assert!(registry
            .check_validity(&credential(vec![entry("status#2", BITSTRING_STATUS_LIST)]))
            .await
            .is_ok());
        assert!(registry
            .check_validity(&credential(vec![entry("status#1", BITSTRING_STATUS_LIST)]))
            .await
            .is_err());
    }

    #[tokio::test]
    async fn unknown_status_type_is_not_valid() {
        let registry = RevocationRegistry::builder().build();

        assert!(registry.check_validity(&credential(vec![])).await.is_ok());
        assert!(registry
            .check_validity(&credential(vec![entry("status#1", STATUS_LIST_2021)]))
            .await
            .is_err());
    }
}
