#![allow(dead_code)]

use std::{collections::BTreeMap, sync::Arc};

use chrono::{Duration, Utc};
use serde_json::Map;

use identity_hub::{
    api::PresentationApi,
    config::HubConfig,
    core::{
        credential::{
            CredentialContainer, CredentialDescription, CredentialFormat, CredentialRecord,
            CredentialStatusEntry, VcState,
        },
        keys::{KeyUsage, MemoryKeyStore, SigningKeyHandle},
        participant::{MemoryParticipantDirectory, ParticipantIdentity},
        store::{CredentialStore, MemoryCredentialStore},
    },
    presentation::{PresentationCreatorRegistry, PresentationPackager},
    query::CredentialResolver,
    revocation::{MemoryStatusList, RevocationRegistry, BITSTRING_STATUS_LIST},
    token::{TokenIssuer, TokenVerifier},
    utils::SystemClock,
};

pub const HOLDER: &str = "did:web:holder";
pub const RELYING: &str = "did:web:relying";

pub const MEMBERSHIP_SCOPE: &str = "org.eclipse.edc.vc.type:MembershipCredential:read";
pub const DISMANTLER_SCOPE: &str = "org.eclipse.edc.vc.type:DismantlerCredential:read";

/// A hub hosting two participants: `x` mints tokens, `y` holds credentials and answers queries.
pub struct Hub {
    pub participants: MemoryParticipantDirectory,
    pub keys: MemoryKeyStore,
    pub store: MemoryCredentialStore,
    pub status_list: MemoryStatusList,
    pub presentation_key: SigningKeyHandle,
    pub issuer: TokenIssuer,
    pub verifier: TokenVerifier,
    pub resolver: CredentialResolver,
    pub api: PresentationApi,
}

impl Hub {
    pub async fn new() -> Self {
        let store = MemoryCredentialStore::new();
        Self::with_store(store.clone(), Arc::new(store)).await
    }

    /// Build a hub whose resolver queries `backend` instead of the memory store.
    pub async fn with_store(store: MemoryCredentialStore, backend: Arc<dyn CredentialStore>) -> Self {
        let config = HubConfig::default();
        let participants = MemoryParticipantDirectory::new();
        participants
            .insert(ParticipantIdentity::new("x", HOLDER))
            .await;
        participants
            .insert(ParticipantIdentity::new("y", RELYING))
            .await;

        let keys = MemoryKeyStore::new();
        keys.generate("x", HOLDER, "token-key", KeyUsage::TokenSigning)
            .await
            .unwrap();
        let presentation_key = keys
            .generate("y", RELYING, "presentation-key", KeyUsage::PresentationSigning)
            .await
            .unwrap();

        let status_list = MemoryStatusList::new();

        let issuer = TokenIssuer::builder()
            .with_participants(Arc::new(participants.clone()))
            .with_key_provider(Arc::new(keys.clone()))
            .with_signer(Arc::new(keys.clone()))
            .with_config(&config)
            .build()
            .unwrap();
        let verifier = TokenVerifier::builder()
            .with_config(&config, Arc::new(SystemClock))
            .with_public_key_resolver(Arc::new(keys.clone()))
            .with_local_key_resolver(Arc::new(keys.clone()))
            .with_participants(Arc::new(participants.clone()))
            .build()
            .unwrap();
        let resolver = CredentialResolver::builder()
            .with_store(backend)
            .with_revocation_checker(Arc::new(
                RevocationRegistry::builder()
                    .with_checker(BITSTRING_STATUS_LIST, Arc::new(status_list.clone()))
                    .build(),
            ))
            .build()
            .unwrap();
        let packager = PresentationPackager::new(
            PresentationCreatorRegistry::builder()
                .with_default_generators(Arc::new(keys.clone()), Arc::new(SystemClock), &config)
                .with_key_provider(Arc::new(keys.clone()))
                .with_participants(Arc::new(participants.clone()))
                .build()
                .unwrap(),
        );
        let api = PresentationApi::builder()
            .with_participants(Arc::new(participants.clone()))
            .with_verifier(verifier.clone())
            .with_resolver(resolver.clone())
            .with_packager(packager)
            .build()
            .unwrap();

        Self {
            participants,
            keys,
            store,
            status_list,
            presentation_key,
            issuer,
            verifier,
            resolver,
            api,
        }
    }

    /// A token minted by `x` for `y`, granting `scope`.
    pub async fn token(&self, scope: &str) -> String {
        self.issuer
            .issue("x", &claims(HOLDER, HOLDER, RELYING), Some(scope))
            .await
            .unwrap()
    }
}

pub fn claims(iss: &str, sub: &str, aud: &str) -> BTreeMap<String, String> {
    BTreeMap::from([
        ("iss".to_owned(), iss.to_owned()),
        ("sub".to_owned(), sub.to_owned()),
        ("aud".to_owned(), aud.to_owned()),
    ])
}

/// A valid JWT credential of `y`.
pub fn credential(id: &str, credential_type: &str) -> CredentialRecord {
    CredentialRecord {
        id: id.into(),
        participant_context_id: "y".into(),
        state: VcState::Issued,
        issuance_date: Utc::now() - Duration::days(30),
        expiration_date: Some(Utc::now() + Duration::days(30)),
        credential_status: Vec::new(),
        verifiable_credential: CredentialContainer {
            raw_vc: format!("jwt-vc-{id}"),
            format: CredentialFormat::Vc1Jwt,
            credential: CredentialDescription {
                id: Some(format!("urn:uuid:{id}")),
                types: vec!["VerifiableCredential".into(), credential_type.into()],
                issuer: Some("did:web:issuer".into()),
            },
        },
    }
}

pub fn status_entry(id: &str) -> CredentialStatusEntry {
    CredentialStatusEntry {
        id: id.into(),
        status_type: BITSTRING_STATUS_LIST.into(),
        properties: Map::new(),
    }
}
