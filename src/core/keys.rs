use std::{collections::BTreeMap, fmt, sync::Arc};

use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use p256::ecdsa::{signature::Signer as _, Signature, SigningKey, VerifyingKey};
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;
use tracing::warn;

/// Purpose a signing key is dedicated to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum KeyUsage {
    TokenSigning,
    PresentationSigning,
}

impl fmt::Display for KeyUsage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            KeyUsage::TokenSigning => write!(f, "TOKEN_SIGNING"),
            KeyUsage::PresentationSigning => write!(f, "PRESENTATION_SIGNING"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum KeyState {
    Created,
    Activated,
    Rotated,
    Revoked,
}

/// Reference to a participant's key pair.
///
/// Raw key material never leaves the key store: signing happens through a [Signer] addressed by
/// `private_key_alias`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SigningKeyHandle {
    /// Public key id, used as the `kid` JWS header. Usually a DID URL.
    pub key_id: String,
    pub private_key_alias: String,
    pub usage: KeyUsage,
    pub state: KeyState,
    pub is_default: bool,
}

/// Lookup of participants' signing keys.
#[async_trait]
pub trait KeyProvider: fmt::Debug + Send + Sync {
    /// Returns the ACTIVATED key of the participant for the given usage, if there is one.
    async fn active_key(
        &self,
        participant_context_id: &str,
        usage: KeyUsage,
    ) -> Result<Option<SigningKeyHandle>>;
}

/// Signs payloads with a private key referenced by alias.
#[async_trait]
pub trait Signer: fmt::Debug + Send + Sync {
    /// The JWS algorithm that will be used to sign.
    fn alg(&self) -> &str;

    async fn sign(&self, private_key_alias: &str, payload: &[u8]) -> Result<Vec<u8>>;
}

/// Resolves public key material of arbitrary token issuers, e.g. through their DID documents.
#[async_trait]
pub trait PublicKeyResolver: fmt::Debug + Send + Sync {
    async fn resolve_public_key(&self, key_id: &str) -> Result<VerifyingKey>;
}

/// Resolves public key material held by this hub on behalf of a participant.
#[async_trait]
pub trait LocalPublicKeyResolver: fmt::Debug + Send + Sync {
    async fn resolve_local_key(
        &self,
        key_id: &str,
        participant_context_id: &str,
    ) -> Result<VerifyingKey>;
}

#[derive(Debug, Default)]
struct KeyRing {
    handles: BTreeMap<String, Vec<SigningKeyHandle>>,
    private_keys: BTreeMap<String, SigningKey>,
    public_keys: BTreeMap<String, VerifyingKey>,
}

/// A local in-memory key store. Not for production use!
///
/// Acts as key provider, signer and both public key resolvers at once. Keys are ES256 (P-256).
///
/// # Warning
/// This in-memory store should only be used for test purposes, private keys are held in process
/// memory and are lost on restart.
#[derive(Debug, Clone, Default)]
pub struct MemoryKeyStore {
    ring: Arc<Mutex<KeyRing>>,
}

impl MemoryKeyStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Generate a new ACTIVATED key pair for a participant.
    ///
    /// The key id is the DID URL `<did>#<key_name>`.
    pub async fn generate(
        &self,
        participant_context_id: &str,
        did: &str,
        key_name: &str,
        usage: KeyUsage,
    ) -> Result<SigningKeyHandle> {
        let key = SigningKey::random(&mut rand::rngs::OsRng);
        let handle = SigningKeyHandle {
            key_id: format!("{did}#{key_name}"),
            private_key_alias: format!("{participant_context_id}-{key_name}-alias"),
            usage,
            state: KeyState::Activated,
            is_default: true,
        };
        self.insert(participant_context_id, handle.clone(), key)
            .await?;
        Ok(handle)
    }

    /// Register a handle together with its private key.
    pub async fn insert(
        &self,
        participant_context_id: &str,
        handle: SigningKeyHandle,
        key: SigningKey,
    ) -> Result<()> {
        let mut ring = self.ring.lock().await;
        if ring.private_keys.contains_key(&handle.private_key_alias) {
            bail!("private key alias '{}' is already in use", handle.private_key_alias)
        }
        ring.public_keys
            .insert(handle.key_id.clone(), VerifyingKey::from(&key));
        ring.private_keys
            .insert(handle.private_key_alias.clone(), key);
        ring.handles
            .entry(participant_context_id.to_owned())
            .or_default()
            .push(handle);
        Ok(())
    }

    /// Change the state of a registered key.
    pub async fn set_state(&self, key_id: &str, state: KeyState) -> Result<()> {
        let mut ring = self.ring.lock().await;
        let handle = ring
            .handles
            .values_mut()
            .flatten()
            .find(|h| h.key_id == key_id)
            .context("key not found")?;
        handle.state = state;
        Ok(())
    }
}

#[async_trait]
impl KeyProvider for MemoryKeyStore {
    async fn active_key(
        &self,
        participant_context_id: &str,
        usage: KeyUsage,
    ) -> Result<Option<SigningKeyHandle>> {
        let ring = self.ring.lock().await;
        let Some(handles) = ring.handles.get(participant_context_id) else {
            return Ok(None);
        };

        let mut active = handles
            .iter()
            .filter(|h| h.usage == usage && h.state == KeyState::Activated);
        let first = active.next();
        if active.next().is_some() {
            warn!(
                "participant '{participant_context_id}' has more than one ACTIVATED {usage} key"
            );
        }

        // prefer the default key pair if there are several
        let default = handles
            .iter()
            .filter(|h| h.usage == usage && h.state == KeyState::Activated)
            .find(|h| h.is_default);

        Ok(default.or(first).cloned())
    }
}

#[async_trait]
impl Signer for MemoryKeyStore {
    fn alg(&self) -> &str {
        "ES256"
    }

    async fn sign(&self, private_key_alias: &str, payload: &[u8]) -> Result<Vec<u8>> {
        let ring = self.ring.lock().await;
        let key = ring
            .private_keys
            .get(private_key_alias)
            .with_context(|| format!("no private key for alias '{private_key_alias}'"))?;
        let sig: Signature = key.sign(payload);
        Ok(sig.to_bytes().to_vec())
    }
}

#[async_trait]
impl PublicKeyResolver for MemoryKeyStore {
    async fn resolve_public_key(&self, key_id: &str) -> Result<VerifyingKey> {
        self.ring
            .lock()
            .await
            .public_keys
            .get(key_id)
            .cloned()
            .with_context(|| format!("no public key found for key id '{key_id}'"))
    }
}

#[async_trait]
impl LocalPublicKeyResolver for MemoryKeyStore {
    async fn resolve_local_key(
        &self,
        key_id: &str,
        participant_context_id: &str,
    ) -> Result<VerifyingKey> {
        let ring = self.ring.lock().await;
        let owned = ring
            .handles
            .get(participant_context_id)
            .is_some_and(|handles| handles.iter().any(|h| h.key_id == key_id));

        if !owned {
            warn!(
                "no key pair with key id '{key_id}' found for participant '{participant_context_id}', \
                falling back to hub-wide key material"
            );
        }

        ring.public_keys
            .get(key_id)
            .cloned()
            .with_context(|| format!("no local public key found for key id '{key_id}'"))
    }
}

#[cfg(test)]
mod test {
    use p256::ecdsa::signature::Verifier;

    use super::*;

    #[tokio::test]
    async fn prefers_default_activated_key() {
        let store = MemoryKeyStore::new();
        let key = SigningKey::random(&mut rand::rngs::OsRng);
        store
            .insert(
                "alice",
                SigningKeyHandle {
                    key_id: "did:web:alice#key-0".into(),
                    private_key_alias: "alice-key-0".into(),
                    usage: KeyUsage::TokenSigning,
                    state: KeyState::Activated,
                    is_default: false,
                },
                key,
            )
            .await
            .unwrap();
        let handle = store
            .generate("alice", "did:web:alice", "key-1", KeyUsage::TokenSigning)
            .await
            .unwrap();

        let active = store
            .active_key("alice", KeyUsage::TokenSigning)
            .await
            .unwrap();
        assert_eq!(active, Some(handle));
    }

    #[tokio::test]
    async fn revoked_keys_are_not_active() {
        let store = MemoryKeyStore::new();
        let handle = store
            .generate("alice", "did:web:alice", "key-1", KeyUsage::TokenSigning)
            .await
            .unwrap();
        store
            .set_state(&handle.key_id, KeyState::Revoked)
            .await
            .unwrap();

        assert!(store
            .active_key("alice", KeyUsage::TokenSigning)
            .await
            .unwrap()
            .is_none());
        assert!(store
            .active_key("alice", KeyUsage::PresentationSigning)
            .await
            .unwrap()
            .is_none());
    }

    #[tokio::test]
    async fn signatures_verify_with_resolved_key() {
        let store = MemoryKeyStore::new();
        let handle = store
            .generate("alice", "did:web:alice", "key-1", KeyUsage::TokenSigning)
            .await
            .unwrap();

        let sig = store
            .sign(&handle.private_key_alias, b"payload")
            .await
            .unwrap();
        let key = store.resolve_public_key(&handle.key_id).await.unwrap();
        let sig = Signature::from_slice(&sig).unwrap();
        assert!(key.verify(b"payload", &sig).is_ok());
    }
}
