use std::sync::Arc;

use anyhow::Context;
use async_trait::async_trait;
use chrono::SecondsFormat;
use p256::ecdsa::VerifyingKey;
use serde_json::{json, Map, Value as Json};
use uuid::Uuid;

use crate::{
    core::{
        credential::{CredentialContainer, CredentialFormat},
        jws,
        keys::Signer,
        Error, Result,
    },
    utils::Clock,
};

use super::generator::{
    compose_key_id, require, require_format, require_str, Presentation, PresentationGenerator,
    CONTROLLER, DCP_CONTEXT_URL, PRESENTATION_EXCHANGE_URL, TYPES, W3C_CREDENTIALS_URL,
};

/// The only proof suite this generator produces.
pub const JSON_WEB_SIGNATURE_2020: &str = "JsonWebSignature2020";
/// Optional additional data entry selecting the proof suite.
pub const SUITE: &str = "suite";
pub const ASSERTION_METHOD: &str = "assertionMethod";

/// Packages VC 1.1 JSON-LD credentials into a JSON-LD presentation with an embedded proof.
///
/// JWT credentials cannot be embedded. Requires `types` and `controller` additional data.
///
/// The proof `jws` is a detached ES256 signature over the JSON serialization of the
/// presentation without its `proof`. No JSON-LD canonicalization takes place.
#[derive(Debug, Clone)]
pub struct LdpPresentationGenerator {
    signer: Arc<dyn Signer>,
    clock: Arc<dyn Clock>,
}

impl LdpPresentationGenerator {
    pub fn new(signer: Arc<dyn Signer>, clock: Arc<dyn Clock>) -> Self {
        Self { signer, clock }
    }
}

#[async_trait]
impl PresentationGenerator for LdpPresentationGenerator {
    async fn generate(
        &self,
        credentials: &[CredentialContainer],
        private_key_alias: &str,
        public_key_id: &str,
        issuer: &str,
        additional_data: &Map<String, Json>,
    ) -> Result<Presentation> {
        let types = require(additional_data, TYPES)?;
        if !types.as_array().is_some_and(|t| t.iter().all(Json::is_string)) {
            return Err(Error::illegal_argument(
                "additional data 'types' must be an array of strings",
            ));
        }
        let controller = require_str(additional_data, CONTROLLER)?;
        if let Some(suite) = additional_data.get(SUITE) {
            if suite.as_str() != Some(JSON_WEB_SIGNATURE_2020) {
                return Err(Error::illegal_argument(format!(
                    "No SignatureSuite for identifier '{suite}' was found."
                )));
            }
        }
        require_format("LdpPresentationGenerator", credentials, CredentialFormat::Vc1Ld)?;

        let documents = credentials
            .iter()
            .map(|vc| {
                serde_json::from_str::<Json>(&vc.raw_vc)
                    .ok()
                    .filter(Json::is_object)
                    .ok_or_else(|| {
                        Error::illegal_argument(format!(
                            "credential {:?} is not a JSON-LD document",
                            vc.credential.id
                        ))
                    })
            })
            .collect::<Result<Vec<Json>>>()?;

        let mut presentation = Map::new();
        presentation.insert("@context".into(), merge_contexts(&documents).into());
        presentation.insert(
            "id".into(),
            format!("{DCP_CONTEXT_URL}/id/{}", Uuid::new_v4()).into(),
        );
        presentation.insert("type".into(), types.clone());
        presentation.insert("holder".into(), issuer.into());
        presentation.insert("verifiableCredential".into(), documents.into());

        let key_id = compose_key_id(controller, public_key_id);
        let payload = serde_json::to_vec(&presentation)
            .context("presentation could not be serialized")
            .map_err(Error::Signing)?;
        let signature = jws::sign_detached(
            self.signer.as_ref(),
            private_key_alias,
            &key_id,
            &payload,
        )
        .await
        .map_err(Error::Signing)?;

        presentation.insert(
            "proof".into(),
            json!({
                "type": JSON_WEB_SIGNATURE_2020,
                "created": self.clock.now().to_rfc3339_opts(SecondsFormat::Secs, true),
                "proofPurpose": ASSERTION_METHOD,
                "verificationMethod": key_id,
                "jws": signature,
            }),
        );

        Ok(Presentation::Object(Json::Object(presentation)))
    }
}

/// Base presentation contexts followed by the contexts of the credentials, without duplicates.
fn merge_contexts(documents: &[Json]) -> Vec<String> {
    let mut merged = vec![
        W3C_CREDENTIALS_URL.to_owned(),
        PRESENTATION_EXCHANGE_URL.to_owned(),
    ];
    let contexts = documents
        .iter()
        .filter_map(|doc| doc.get("@context"))
        .flat_map(|context| match context {
            Json::String(s) => vec![s.as_str()],
            Json::Array(values) => values.iter().filter_map(Json::as_str).collect(),
            _ => Vec::new(),
        });
    for context in contexts {
        if !merged.iter().any(|c| c == context) {
            merged.push(context.to_owned());
        }
    }
    merged
}

/// Verify the proof of a presentation produced by [LdpPresentationGenerator].
pub fn verify_proof(presentation: &Json, key: &VerifyingKey) -> anyhow::Result<()> {
    let mut document = presentation
        .as_object()
        .context("presentation is not a JSON object")?
        .clone();
    let proof = document.remove("proof").context("presentation has no proof")?;
    let signature = proof
        .get("jws")
        .and_then(Json::as_str)
        .context("proof has no 'jws'")?;
    jws::verify_detached(signature, &serde_json::to_vec(&document)?, key)
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::{
        core::{
            credential::CredentialDescription,
            keys::{KeyUsage, MemoryKeyStore, PublicKeyResolver},
        },
        utils::SystemClock,
    };

    fn ld_vc(document: Json) -> CredentialContainer {
        CredentialContainer {
            raw_vc: document.to_string(),
            format: CredentialFormat::Vc1Ld,
            credential: CredentialDescription {
                id: document["id"].as_str().map(ToOwned::to_owned),
                types: vec!["VerifiableCredential".into()],
                issuer: None,
            },
        }
    }

    fn membership_vc() -> Json {
        json!({
            "@context": [
                "https://www.w3.org/2018/credentials/v1",
                "https://w3id.org/example/membership/v1"
            ],
            "id": "urn:uuid:1",
            "type": ["VerifiableCredential", "MembershipCredential"],
            "issuer": "did:web:issuer",
            "credentialSubject": {"id": "did:web:alice"}
        })
    }

    fn data(value: Json) -> Map<String, Json> {
        serde_json::from_value(value).unwrap()
    }

    #[tokio::test]
    async fn signs_presentation_object() {
        let keys = MemoryKeyStore::new();
        let handle = keys
            .generate("alice", "did:web:alice", "key-2", KeyUsage::PresentationSigning)
            .await
            .unwrap();
        let generator = LdpPresentationGenerator::new(Arc::new(keys.clone()), Arc::new(SystemClock));

        let presentation = generator
            .generate(
                &[ld_vc(membership_vc())],
                &handle.private_key_alias,
                "key-2",
                "did:web:alice",
                &data(json!({
                    "types": ["VerifiablePresentation"],
                    "controller": "did:web:alice"
                })),
            )
            .await
            .unwrap();

        let object = presentation.as_object().unwrap();
        assert_eq!(
            object["@context"],
            json!([
                W3C_CREDENTIALS_URL,
                PRESENTATION_EXCHANGE_URL,
                "https://w3id.org/example/membership/v1"
            ])
        );
        assert_eq!(object["holder"], json!("did:web:alice"));
        assert_eq!(object["type"], json!(["VerifiablePresentation"]));
        assert_eq!(object["verifiableCredential"][0], membership_vc());
        assert_eq!(object["proof"]["verificationMethod"], json!("did:web:alice#key-2"));

        let key = keys.resolve_public_key(&handle.key_id).await.unwrap();
        verify_proof(object, &key).unwrap();

        let mut tampered = object.clone();
        tampered["holder"] = json!("did:web:mallory");
        assert!(verify_proof(&tampered, &key).is_err());
    }

    #[tokio::test]
    async fn rejects_bad_input() {
        let generator =
            LdpPresentationGenerator::new(Arc::new(MemoryKeyStore::new()), Arc::new(SystemClock));
        let complete = json!({
            "types": ["VerifiablePresentation"],
            "controller": "did:web:alice"
        });

        let mut jwt_vc = ld_vc(membership_vc());
        jwt_vc.format = CredentialFormat::Vc1Jwt;
        let mut not_json = ld_vc(membership_vc());
        not_json.raw_vc = "eyJhbGciOiJFUzI1NiJ9.e30.sig".into();

        let cases = [
            (ld_vc(membership_vc()), json!({"controller": "did:web:alice"})),
            (ld_vc(membership_vc()), json!({"types": ["VerifiablePresentation"]})),
            (
                ld_vc(membership_vc()),
                json!({
                    "types": ["VerifiablePresentation"],
                    "controller": "did:web:alice",
                    "suite": "Ed25519Signature2020"
                }),
            ),
            (jwt_vc, complete.clone()),
            (not_json, complete),
        ];
        for (credential, additional_data) in cases {
            let result = generator
                .generate(
                    &[credential],
                    "alias",
                    "key-2",
                    "did:web:alice",
                    &data(additional_data),
                )
                .await;
            assert!(matches!(result, Err(Error::IllegalArgument(_))));
        }
    }
}
