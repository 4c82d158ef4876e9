use std::sync::Arc;

use async_trait::async_trait;
use chrono::Duration;
use serde_json::{json, Map, Value as Json};
use uuid::Uuid;

use crate::{
    core::{
        claims::{self, ClaimSet},
        credential::{CredentialContainer, CredentialFormat},
        jws,
        keys::Signer,
        Error, Result,
    },
    utils::Clock,
};

use super::generator::{
    compose_key_id, require, require_format, require_str, Presentation, PresentationGenerator,
    CONTROLLER, DCP_CONTEXT_URL, PRESENTATION_EXCHANGE_URL, VERIFIABLE_PRESENTATION_TYPE,
    W3C_CREDENTIALS_URL,
};

pub const VERIFIABLE_PRESENTATION_CLAIM: &str = "vp";

/// Packages VC 1.1 JWT credentials into a JWT presentation.
///
/// Requires `aud` and `controller` additional data. Every additional data entry also ends up as
/// a claim of the presentation.
#[derive(Debug, Clone)]
pub struct JwtPresentationGenerator {
    signer: Arc<dyn Signer>,
    clock: Arc<dyn Clock>,
    validity: Duration,
}

impl JwtPresentationGenerator {
    pub fn new(signer: Arc<dyn Signer>, clock: Arc<dyn Clock>, validity_secs: i64) -> Self {
        Self {
            signer,
            clock,
            validity: Duration::seconds(validity_secs),
        }
    }
}

#[async_trait]
impl PresentationGenerator for JwtPresentationGenerator {
    async fn generate(
        &self,
        credentials: &[CredentialContainer],
        private_key_alias: &str,
        public_key_id: &str,
        issuer: &str,
        additional_data: &Map<String, Json>,
    ) -> Result<Presentation> {
        require_format("JwtPresentationGenerator", credentials, CredentialFormat::Vc1Jwt)?;
        require(additional_data, claims::AUDIENCE)?;
        let controller = require_str(additional_data, CONTROLLER)?;
        let key_id = compose_key_id(controller, public_key_id);

        let raw_vcs: Vec<&str> = credentials.iter().map(|vc| vc.raw_vc.as_str()).collect();
        let now = self.clock.now();

        let mut claims = ClaimSet::new()
            .with_issued_at(now)
            .with_not_before(now)
            .with_jti(Uuid::new_v4().to_string())
            .with_expiration(now + self.validity);
        claims.insert(claims::ISSUER, issuer);
        claims.insert(
            VERIFIABLE_PRESENTATION_CLAIM,
            json!({
                "@context": [DCP_CONTEXT_URL, W3C_CREDENTIALS_URL, PRESENTATION_EXCHANGE_URL],
                "type": VERIFIABLE_PRESENTATION_TYPE,
                "verifiableCredential": raw_vcs,
            }),
        );
        claims.merge(ClaimSet::from(additional_data.clone()));

        jws::sign(self.signer.as_ref(), private_key_alias, &key_id, &claims)
            .await
            .map(Presentation::Jwt)
            .map_err(Error::Signing)
    }
}
