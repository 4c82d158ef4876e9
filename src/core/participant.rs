use std::{collections::BTreeMap, fmt::Debug, sync::Arc};

use anyhow::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ParticipantState {
    Created,
    Activated,
    Deactivated,
}

/// A participant hosted by this hub.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ParticipantIdentity {
    /// Participant context id.
    pub id: String,
    /// Externally resolvable identity, used as token issuer and audience.
    pub did: String,
    pub state: ParticipantState,
    #[serde(default)]
    pub roles: Vec<String>,
}

impl ParticipantIdentity {
    pub fn new(id: impl Into<String>, did: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            did: did.into(),
            state: ParticipantState::Activated,
            roles: Vec::new(),
        }
    }
}

/// Lookup of participant identities by participant context id.
#[async_trait]
pub trait ParticipantDirectory: Debug + Send + Sync {
    async fn resolve(&self, participant_context_id: &str) -> Result<Option<ParticipantIdentity>>;
}

/// A local in-memory participant directory. Not for production use!
#[derive(Debug, Clone, Default)]
pub struct MemoryParticipantDirectory {
    participants: Arc<Mutex<BTreeMap<String, ParticipantIdentity>>>,
}

impl MemoryParticipantDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn insert(&self, participant: ParticipantIdentity) {
        self.participants
            .lock()
            .await
            .insert(participant.id.clone(), participant);
    }
}

#[async_trait]
impl ParticipantDirectory for MemoryParticipantDirectory {
    async fn resolve(&self, participant_context_id: &str) -> Result<Option<ParticipantIdentity>> {
        Ok(self
            .participants
            .lock()
            .await
            .get(participant_context_id)
            .cloned())
    }
}
