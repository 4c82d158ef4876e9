use std::{collections::BTreeMap, sync::Arc};

use anyhow::bail;
use chrono::Duration;
use tracing::debug;
use uuid::Uuid;

use crate::{
    config::HubConfig,
    core::{
        claims::{self, ClaimSet},
        jws,
        keys::{KeyProvider, KeyUsage, Signer, SigningKeyHandle},
        participant::{ParticipantDirectory, ParticipantIdentity},
        Error, Result,
    },
    utils::{Clock, SystemClock},
};

/// Claims of the input map that are copied into the nested access token.
const INHERITED_CLAIMS: &[&str] = &[claims::ISSUER];

/// Mints self-issued tokens on behalf of the participants hosted by the hub.
#[derive(Debug, Clone)]
pub struct TokenIssuer {
    participants: Arc<dyn ParticipantDirectory>,
    keys: Arc<dyn KeyProvider>,
    signer: Arc<dyn Signer>,
    clock: Arc<dyn Clock>,
    validity: Duration,
}

impl TokenIssuer {
    pub fn builder() -> TokenIssuerBuilder {
        TokenIssuerBuilder::default()
    }

    /// Create a self-issued token for `participant_context_id` carrying `claims`.
    ///
    /// If `bearer_access_scope` is given, an access token granting that scope is signed first and
    /// embedded under the `token` claim. Building it requires `iss` and `aud` in `claims`: the
    /// access token is issued to `aud`, with `iss` as its subject.
    ///
    /// Both tokens are signed with the participant's ACTIVATED token signing key.
    pub async fn issue(
        &self,
        participant_context_id: &str,
        claims: &BTreeMap<String, String>,
        bearer_access_scope: Option<&str>,
    ) -> Result<String> {
        self.participant(participant_context_id).await?;
        let key = self.signing_key(participant_context_id).await?;
        let now = self.clock.now();

        let mut self_issued: ClaimSet = claims
            .iter()
            .map(|(k, v)| (k.as_str(), v.as_str()))
            .collect();

        if let Some(scope) = bearer_access_scope {
            let access_token = self.access_token(&key, claims, scope).await?;
            self_issued.insert(claims::TOKEN, access_token);
        }

        let self_issued = self_issued
            .with_issued_at(now)
            .with_not_before(now)
            .with_expiration(now + self.validity)
            .with_jti(Uuid::new_v4().to_string());

        debug!("issuing self-issued token for participant '{participant_context_id}'");
        jws::sign(
            self.signer.as_ref(),
            &key.private_key_alias,
            &key.key_id,
            &self_issued,
        )
        .await
        .map_err(Error::Signing)
    }

    /// Create a self-issued token addressed to `audience`, with the participant's DID as issuer
    /// and subject.
    pub async fn token_for(
        &self,
        participant_context_id: &str,
        audience: &str,
        bearer_access_scope: Option<&str>,
    ) -> Result<String> {
        let participant = self.participant(participant_context_id).await?;
        let claims = BTreeMap::from([
            (claims::ISSUER.to_owned(), participant.did.clone()),
            (claims::SUBJECT.to_owned(), participant.did),
            (claims::AUDIENCE.to_owned(), audience.to_owned()),
        ]);
        self.issue(participant_context_id, &claims, bearer_access_scope)
            .await
    }

    async fn access_token(
        &self,
        key: &SigningKeyHandle,
        claims: &BTreeMap<String, String>,
        scope: &str,
    ) -> Result<String> {
        let Some(issuer) = claims.get(claims::ISSUER) else {
            return Err(Error::MissingClaim(claims::ISSUER.into()));
        };
        let Some(audience) = claims.get(claims::AUDIENCE) else {
            return Err(Error::MissingClaim(claims::AUDIENCE.into()));
        };
        let now = self.clock.now();

        let mut access: ClaimSet = claims
            .iter()
            .filter(|(name, _)| INHERITED_CLAIMS.contains(&name.as_str()))
            .map(|(k, v)| (k.as_str(), v.as_str()))
            .collect();
        access.insert(claims::SCOPE, scope);
        access.insert(claims::AUDIENCE, audience.as_str());
        access.insert(claims::SUBJECT, issuer.as_str());
        let access = access
            .with_jti(format!("accesstoken-{}", Uuid::new_v4()))
            .with_issued_at(now)
            .with_expiration(now + self.validity);

        jws::sign(
            self.signer.as_ref(),
            &key.private_key_alias,
            &key.key_id,
            &access,
        )
        .await
        .map_err(Error::Signing)
    }

    async fn participant(&self, participant_context_id: &str) -> Result<ParticipantIdentity> {
        self.participants
            .resolve(participant_context_id)
            .await
            .map_err(Error::Storage)?
            .ok_or_else(|| Error::AccountNotFound(participant_context_id.to_owned()))
    }

    async fn signing_key(&self, participant_context_id: &str) -> Result<SigningKeyHandle> {
        self.keys
            .active_key(participant_context_id, KeyUsage::TokenSigning)
            .await
            .map_err(Error::Storage)?
            .ok_or_else(|| Error::KeyNotFound {
                participant: participant_context_id.to_owned(),
                usage: KeyUsage::TokenSigning,
            })
    }
}

/// Builder struct for [TokenIssuer].
#[derive(Debug, Clone)]
pub struct TokenIssuerBuilder {
    participants: Option<Arc<dyn ParticipantDirectory>>,
    keys: Option<Arc<dyn KeyProvider>>,
    signer: Option<Arc<dyn Signer>>,
    clock: Arc<dyn Clock>,
    validity: Duration,
}

impl Default for TokenIssuerBuilder {
    fn default() -> Self {
        Self {
            participants: None,
            keys: None,
            signer: None,
            clock: Arc::new(SystemClock),
            validity: Duration::seconds(HubConfig::default().token_validity_secs),
        }
    }
}

impl TokenIssuerBuilder {
    pub fn build(self) -> anyhow::Result<TokenIssuer> {
        let Some(participants) = self.participants else {
            bail!("participant directory is required, see `with_participants`")
        };
        let Some(keys) = self.keys else {
            bail!("key provider is required, see `with_key_provider`")
        };
        let Some(signer) = self.signer else {
            bail!("signer is required, see `with_signer`")
        };

        Ok(TokenIssuer {
            participants,
            keys,
            signer,
            clock: self.clock,
            validity: self.validity,
        })
    }

    pub fn with_config(mut self, config: &HubConfig) -> Self {
        self.validity = Duration::seconds(config.token_validity_secs);
        self
    }

    pub fn with_participants(mut self, participants: Arc<dyn ParticipantDirectory>) -> Self {
        self.participants = Some(participants);
        self
    }

    pub fn with_key_provider(mut self, keys: Arc<dyn KeyProvider>) -> Self {
        self.keys = Some(keys);
        self
    }

    pub fn with_signer(mut self, signer: Arc<dyn Signer>) -> Self {
        self.signer = Some(signer);
        self
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }
}
