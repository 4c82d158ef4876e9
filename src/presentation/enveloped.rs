use std::sync::Arc;

use async_trait::async_trait;
use serde_json::{json, Map, Value as Json};
use tracing::error;

use crate::core::{
    claims::{self, ClaimSet},
    credential::{CredentialContainer, CredentialFormat},
    jws,
    keys::Signer,
    Error, Result,
};

use super::generator::{
    compose_key_id, require_format, require_str, Presentation, PresentationGenerator, CONTROLLER,
    VC_PREFIX_V2, VERIFIABLE_PRESENTATION_TYPE,
};

pub const ENVELOPED_VERIFIABLE_CREDENTIAL: &str = "EnvelopedVerifiableCredential";
pub const ENVELOPED_VERIFIABLE_PRESENTATION: &str = "EnvelopedVerifiablePresentation";

/// Packages VC 2.0 JOSE credentials into an enveloped presentation, see
/// <https://www.w3.org/TR/vc-jose-cose/#securing-vps-with-jose>.
///
/// Each credential is wrapped as an `EnvelopedVerifiableCredential`, the resulting presentation
/// is signed and then itself wrapped as an `EnvelopedVerifiablePresentation` and signed again.
/// An `aud` in the additional data is stamped on the outer envelope.
#[derive(Debug, Clone)]
pub struct JwtEnvelopedPresentationGenerator {
    signer: Arc<dyn Signer>,
}

impl JwtEnvelopedPresentationGenerator {
    pub fn new(signer: Arc<dyn Signer>) -> Self {
        Self { signer }
    }
}

#[async_trait]
impl PresentationGenerator for JwtEnvelopedPresentationGenerator {
    async fn generate(
        &self,
        credentials: &[CredentialContainer],
        private_key_alias: &str,
        public_key_id: &str,
        issuer: &str,
        additional_data: &Map<String, Json>,
    ) -> Result<Presentation> {
        require_format(
            "JwtEnvelopedPresentationGenerator",
            credentials,
            CredentialFormat::Vc2Jose,
        )
        .inspect_err(|e| error!("{e}"))?;
        let controller = require_str(additional_data, CONTROLLER)?;
        let key_id = compose_key_id(controller, public_key_id);

        let enveloped_credentials: Vec<Json> = credentials
            .iter()
            .map(|vc| {
                json!({
                    "@context": VC_PREFIX_V2,
                    "id": format!("data:application/vc+jwt,{}", vc.raw_vc),
                    "type": ENVELOPED_VERIFIABLE_CREDENTIAL,
                })
            })
            .collect();

        let mut presentation = ClaimSet::new();
        presentation.insert("@context", json!([VC_PREFIX_V2]));
        presentation.insert("type", VERIFIABLE_PRESENTATION_TYPE);
        presentation.insert("holder", issuer);
        presentation.insert("verifiableCredential", enveloped_credentials);
        let presentation = jws::sign(
            self.signer.as_ref(),
            private_key_alias,
            &key_id,
            &presentation,
        )
        .await
        .map_err(Error::Signing)?;

        let mut envelope = ClaimSet::new();
        envelope.insert("id", format!("data:application/vp+jwt,{presentation}"));
        envelope.insert("type", ENVELOPED_VERIFIABLE_PRESENTATION);
        envelope.insert("@context", json!([VC_PREFIX_V2]));
        if let Some(audience) = additional_data.get(claims::AUDIENCE) {
            envelope.insert(claims::AUDIENCE, audience.clone());
        }

        jws::sign(self.signer.as_ref(), private_key_alias, &key_id, &envelope)
            .await
            .map(Presentation::Jwt)
            .map_err(Error::Signing)
    }
}
