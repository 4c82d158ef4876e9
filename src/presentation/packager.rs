use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value as Json};
use tracing::warn;

use crate::core::{
    claims,
    credential::{CredentialContainer, CredentialFormat},
    Result,
};

use super::{
    generator::{Presentation, TYPES, VERIFIABLE_PRESENTATION_TYPE},
    registry::PresentationCreatorRegistry,
};

/// The presentations handed out in answer to a presentation query.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PresentationResponse {
    /// One presentation per credential format, ordered by format.
    pub presentation_token: Vec<Presentation>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub presentation_submission: Option<Json>,
}

/// Packages resolved credentials into one presentation per credential format.
#[derive(Debug, Clone)]
pub struct PresentationPackager {
    registry: PresentationCreatorRegistry,
}

impl PresentationPackager {
    pub fn new(registry: PresentationCreatorRegistry) -> Self {
        Self { registry }
    }

    /// Create the presentations of `credentials` on behalf of `participant_context_id`.
    ///
    /// Presentation definitions are not supported and are ignored. JWT based presentations are
    /// addressed to `audience`.
    pub async fn create_presentation(
        &self,
        participant_context_id: &str,
        credentials: Vec<CredentialContainer>,
        presentation_definition: Option<&Json>,
        audience: Option<&str>,
    ) -> Result<PresentationResponse> {
        if presentation_definition.is_some() {
            warn!(
                "a presentation definition was supplied, but DIF Presentation Exchange is not \
                supported, ignoring it"
            );
        }

        let mut by_format: BTreeMap<CredentialFormat, Vec<CredentialContainer>> = BTreeMap::new();
        for credential in credentials {
            by_format
                .entry(credential.format)
                .or_default()
                .push(credential);
        }

        let mut presentation_token = Vec::with_capacity(by_format.len());
        for (format, group) in by_format {
            let additional_data = additional_data(format, audience);
            presentation_token.push(
                self.registry
                    .create_presentation(participant_context_id, &group, format, additional_data)
                    .await?,
            );
        }

        Ok(PresentationResponse {
            presentation_token,
            presentation_submission: None,
        })
    }
}

fn additional_data(format: CredentialFormat, audience: Option<&str>) -> Map<String, Json> {
    let mut data = Map::new();
    match format {
        CredentialFormat::Vc1Jwt | CredentialFormat::Vc2Jose => {
            if let Some(audience) = audience {
                data.insert(claims::AUDIENCE.into(), audience.into());
            }
        }
        CredentialFormat::Vc1Ld => {
            data.insert(TYPES.into(), json!([VERIFIABLE_PRESENTATION_TYPE]));
        }
    }
    data
}
