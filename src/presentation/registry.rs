use std::{collections::HashMap, sync::Arc};

use anyhow::bail;
use serde_json::{Map, Value as Json};
use tracing::debug;

use crate::{
    config::HubConfig,
    core::{
        credential::{CredentialContainer, CredentialFormat},
        keys::{KeyProvider, KeyUsage, Signer},
        participant::ParticipantDirectory,
        Error, Result,
    },
    utils::Clock,
};

use super::{
    enveloped::JwtEnvelopedPresentationGenerator,
    generator::{Presentation, PresentationGenerator, CONTROLLER},
    jwt::JwtPresentationGenerator,
    ldp::LdpPresentationGenerator,
};

/// Dispatches presentation creation to the generator registered for a credential format.
///
/// The format mapping is fixed at build time.
#[derive(Debug, Clone)]
pub struct PresentationCreatorRegistry {
    generators: HashMap<CredentialFormat, Arc<dyn PresentationGenerator>>,
    keys: Arc<dyn KeyProvider>,
    participants: Arc<dyn ParticipantDirectory>,
}

impl PresentationCreatorRegistry {
    pub fn builder() -> PresentationCreatorRegistryBuilder {
        PresentationCreatorRegistryBuilder::default()
    }

    /// Create a presentation of `credentials`, which must all be in `format`, signed with the
    /// participant's ACTIVATED presentation signing key.
    ///
    /// The participant's DID is handed to the generator as issuer and as `controller` additional
    /// data.
    pub async fn create_presentation(
        &self,
        participant_context_id: &str,
        credentials: &[CredentialContainer],
        format: CredentialFormat,
        mut additional_data: Map<String, Json>,
    ) -> Result<Presentation> {
        let generator = self
            .generators
            .get(&format)
            .ok_or(Error::NoGeneratorForFormat(format))?;

        let key = self
            .keys
            .active_key(participant_context_id, KeyUsage::PresentationSigning)
            .await
            .map_err(Error::Storage)?
            .ok_or_else(|| Error::KeyNotFound {
                participant: participant_context_id.to_owned(),
                usage: KeyUsage::PresentationSigning,
            })?;

        let did = self
            .participants
            .resolve(participant_context_id)
            .await
            .map_err(Error::Storage)?
            .ok_or_else(|| Error::ParticipantNotFound(participant_context_id.to_owned()))?
            .did;

        additional_data.insert(CONTROLLER.into(), did.clone().into());

        debug!(
            "creating {format} presentation of {} credential(s) for '{participant_context_id}'",
            credentials.len()
        );
        generator
            .generate(
                credentials,
                &key.private_key_alias,
                &key.key_id,
                &did,
                &additional_data,
            )
            .await
    }
}

/// Builder struct for [PresentationCreatorRegistry].
#[derive(Debug, Clone, Default)]
pub struct PresentationCreatorRegistryBuilder {
    generators: HashMap<CredentialFormat, Arc<dyn PresentationGenerator>>,
    keys: Option<Arc<dyn KeyProvider>>,
    participants: Option<Arc<dyn ParticipantDirectory>>,
}

impl PresentationCreatorRegistryBuilder {
    pub fn build(self) -> anyhow::Result<PresentationCreatorRegistry> {
        let Some(keys) = self.keys else {
            bail!("key provider is required, see `with_key_provider`")
        };
        let Some(participants) = self.participants else {
            bail!("participant directory is required, see `with_participants`")
        };

        Ok(PresentationCreatorRegistry {
            generators: self.generators,
            keys,
            participants,
        })
    }

    pub fn with_generator(
        mut self,
        format: CredentialFormat,
        generator: Arc<dyn PresentationGenerator>,
    ) -> Self {
        self.generators.insert(format, generator);
        self
    }

    /// Register the generators for every supported format.
    pub fn with_default_generators(
        self,
        signer: Arc<dyn Signer>,
        clock: Arc<dyn Clock>,
        config: &HubConfig,
    ) -> Self {
        self.with_generator(
            CredentialFormat::Vc1Jwt,
            Arc::new(JwtPresentationGenerator::new(
                signer.clone(),
                clock.clone(),
                config.presentation_validity_secs,
            )),
        )
        .with_generator(
            CredentialFormat::Vc1Ld,
            Arc::new(LdpPresentationGenerator::new(signer.clone(), clock)),
        )
        .with_generator(
            CredentialFormat::Vc2Jose,
            Arc::new(JwtEnvelopedPresentationGenerator::new(signer)),
        )
    }

    pub fn with_key_provider(mut self, keys: Arc<dyn KeyProvider>) -> Self {
        self.keys = Some(keys);
        self
    }

    pub fn with_participants(mut self, participants: Arc<dyn ParticipantDirectory>) -> Self {
        self.participants = Some(participants);
        self
    }
}
