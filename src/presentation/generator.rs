use std::fmt::Debug;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value as Json};

use crate::core::{
    credential::{CredentialContainer, CredentialFormat},
    Error, Result,
};

/// Additional data entry carrying the DID of the presenting participant.
pub const CONTROLLER: &str = "controller";
/// Additional data entry carrying the `type` array of a JSON-LD presentation.
pub const TYPES: &str = "types";

pub const W3C_CREDENTIALS_URL: &str = "https://www.w3.org/2018/credentials/v1";
pub const VC_PREFIX_V2: &str = "https://www.w3.org/ns/credentials/v2";
pub const PRESENTATION_EXCHANGE_URL: &str =
    "https://identity.foundation/presentation-exchange/submission/v1";
pub const DCP_CONTEXT_URL: &str = "https://w3id.org/dspace-dcp/v1.0/dcp.jsonld";

pub const VERIFIABLE_PRESENTATION_TYPE: &str = "VerifiablePresentation";

/// A presentation artifact: either a compact JWS or a JSON-LD object with an embedded proof.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Presentation {
    Jwt(String),
    Object(Json),
}

impl Presentation {
    pub fn as_jwt(&self) -> Option<&str> {
        match self {
            Presentation::Jwt(jwt) => Some(jwt),
            Presentation::Object(_) => None,
        }
    }

    pub fn as_object(&self) -> Option<&Json> {
        match self {
            Presentation::Jwt(_) => None,
            Presentation::Object(object) => Some(object),
        }
    }
}

/// Creates a presentation for credentials of one particular format.
#[async_trait]
pub trait PresentationGenerator: Debug + Send + Sync {
    /// Package `credentials` into a single presentation.
    ///
    /// * `private_key_alias` - alias of the key the signer uses.
    /// * `public_key_id` - id the counterparty resolves the verification key with.
    /// * `issuer` - the presenting participant, usually a DID.
    /// * `additional_data` - format specific input, always contains [CONTROLLER].
    async fn generate(
        &self,
        credentials: &[CredentialContainer],
        private_key_alias: &str,
        public_key_id: &str,
        issuer: &str,
        additional_data: &Map<String, Json>,
    ) -> Result<Presentation>;
}

/// Fail with [Error::IllegalArgument] unless every credential is in `format`.
pub(crate) fn require_format(
    generator: &str,
    credentials: &[CredentialContainer],
    format: CredentialFormat,
) -> Result<()> {
    let violations: Vec<String> = credentials
        .iter()
        .filter(|vc| vc.format != format)
        .map(|vc| {
            format!(
                "{} -> {}",
                vc.credential.id.as_deref().unwrap_or("<anonymous>"),
                vc.format
            )
        })
        .collect();

    if violations.is_empty() {
        Ok(())
    } else {
        Err(Error::illegal_argument(format!(
            "{generator} can only handle credentials in {format} format, but the following \
            credentials are in a different format: {violations:?}"
        )))
    }
}

/// Get a mandatory additional data entry.
pub(crate) fn require<'a>(additional_data: &'a Map<String, Json>, name: &str) -> Result<&'a Json> {
    additional_data
        .get(name)
        .ok_or_else(|| Error::illegal_argument(format!("Must provide additional data: '{name}'")))
}

/// Get a mandatory additional data entry that must be a string.
pub(crate) fn require_str<'a>(
    additional_data: &'a Map<String, Json>,
    name: &str,
) -> Result<&'a str> {
    require(additional_data, name)?.as_str().ok_or_else(|| {
        Error::illegal_argument(format!("additional data '{name}' must be a string"))
    })
}

/// Key id as referenced from the controller's DID document.
pub(crate) fn compose_key_id(controller: &str, public_key_id: &str) -> String {
    if public_key_id.starts_with(controller) {
        public_key_id.to_owned()
    } else {
        format!("{controller}#{public_key_id}")
    }
}
