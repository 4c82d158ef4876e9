use std::{
    fmt::Debug,
    sync::{
        atomic::{AtomicUsize, Ordering},
        Arc,
    },
};

use anyhow::{Context, Result};
use async_trait::async_trait;
use tokio::sync::Mutex;

use super::{credential::CredentialRecord, criterion::QuerySpec};

/// Storage interface for verifiable credentials.
#[async_trait]
pub trait CredentialStore: Debug + Send + Sync {
    /// Return every credential matching all criteria of the query.
    async fn query(&self, query: &QuerySpec) -> Result<Vec<CredentialRecord>>;
}

/// A local in-memory credential store. Not for production use!
///
/// # Warning
/// This in-memory store should only be used for test purposes, it will not work for a distributed
/// deployment.
#[derive(Debug, Clone, Default)]
pub struct MemoryCredentialStore {
    records: Arc<Mutex<Vec<CredentialRecord>>>,
    queries: Arc<AtomicUsize>,
}

impl MemoryCredentialStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a credential, replacing any credential with the same id.
    pub async fn insert(&self, record: CredentialRecord) {
        let mut records = self.records.lock().await;
        records.retain(|r| r.id != record.id);
        records.push(record);
    }

    /// Number of queries served so far.
    pub fn query_count(&self) -> usize {
        self.queries.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl CredentialStore for MemoryCredentialStore {
    async fn query(&self, query: &QuerySpec) -> Result<Vec<CredentialRecord>> {
        self.queries.fetch_add(1, Ordering::SeqCst);

        let records = self.records.lock().await;
        let mut result = Vec::new();
        for record in records.iter() {
            let document = serde_json::to_value(record)
                .with_context(|| format!("credential '{}' could not be serialized", record.id))?;
            if query.matches(&document) {
                result.push(record.clone());
            }
        }
        Ok(result)
    }
}
