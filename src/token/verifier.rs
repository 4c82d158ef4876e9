use std::sync::Arc;

use anyhow::bail;
use tracing::{debug, warn};

use crate::{
    config::HubConfig,
    core::{
        claims,
        keys::{LocalPublicKeyResolver, PublicKeyResolver},
        participant::{ParticipantDirectory, ParticipantIdentity},
        Error, Result,
    },
    utils::{split_scopes, Clock, SystemClock},
};

use super::{
    rules::{
        AudienceContains, IssuerKeyId, RuleContext, RuleRegistry, SubjectMatches,
        TokenValidationRule,
    },
    validation::{key_id, validate},
};

/// Which identity of the relying participant the access token must be addressed to.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum AudiencePolicy {
    /// The participant's DID.
    #[default]
    ParticipantDid,
    /// The participant context id, for deployments that only ever see self-issued tokens.
    ParticipantId,
}

/// Verifies self-issued tokens and extracts the scopes granted by their nested access token.
#[derive(Debug, Clone)]
pub struct TokenVerifier {
    rules: RuleRegistry,
    public_keys: Arc<dyn PublicKeyResolver>,
    local_keys: Arc<dyn LocalPublicKeyResolver>,
    participants: Arc<dyn ParticipantDirectory>,
    audience_policy: AudiencePolicy,
}

impl TokenVerifier {
    pub fn builder() -> TokenVerifierBuilder {
        TokenVerifierBuilder::default()
    }

    /// Verify a self-issued token presented to `participant_context_id` and return the scopes
    /// its access token grants, in the order they appear in the `scope` claim.
    ///
    /// The outer token is verified with the key its `kid` resolves to, which must be a key of its
    /// `iss`, and must be addressed to the relying participant. The nested access token
    /// is verified independently with key material held for the relying participant, must be
    /// addressed to that participant, and must share its `sub` with the outer token.
    pub async fn verify(&self, token: &str, participant_context_id: &str) -> Result<Vec<String>> {
        let participant = self.participant(participant_context_id).await?;
        let audience = match self.audience_policy {
            AudiencePolicy::ParticipantDid => participant.did.clone(),
            AudiencePolicy::ParticipantId => participant.id.clone(),
        };

        let outer_kid = key_id(token)?;
        let outer_key = self
            .public_keys
            .resolve_public_key(&outer_kid)
            .await
            .map_err(|e| {
                Error::SignatureInvalid(format!("public key '{outer_kid}' not resolvable: {e:#}"))
            })?;
        let mut outer_rules: Vec<Arc<dyn TokenValidationRule>> =
            self.rules.rules(RuleContext::SelfIssued).to_vec();
        outer_rules.push(Arc::new(IssuerKeyId(outer_kid)));
        outer_rules.push(Arc::new(AudienceContains(audience.clone())));
        let outer = validate(token, &outer_key, &outer_rules).await?;

        let Some(access_token) = outer.get_str(claims::TOKEN) else {
            return Err(Error::MalformedToken(
                "'token' claim is not a string".into(),
            ));
        };
        let Some(subject) = outer.get_str(claims::SUBJECT) else {
            return Err(Error::TokenValidation(
                "self-issued token does not contain a 'sub' claim".into(),
            ));
        };

        let mut rules: Vec<Arc<dyn TokenValidationRule>> =
            self.rules.rules(RuleContext::AccessToken).to_vec();
        rules.push(Arc::new(AudienceContains(audience)));
        rules.push(Arc::new(SubjectMatches(subject.to_owned())));

        let inner_kid = key_id(access_token)?;
        let inner_key = self
            .local_keys
            .resolve_local_key(&inner_kid, participant_context_id)
            .await
            .map_err(|e| {
                Error::SignatureInvalid(format!("local key '{inner_kid}' not resolvable: {e:#}"))
            })?;
        let inner = validate(access_token, &inner_key, &rules)
            .await
            .inspect_err(|e| {
                if let Error::SubjectMismatch(reason) = e {
                    warn!("access token subject does not match self-issued token: {reason}");
                }
            })?;

        let Some(scope) = inner.get_str(claims::SCOPE) else {
            return Err(Error::MissingScopeClaim);
        };
        let scopes = split_scopes(scope);
        debug!(
            "verified token presented to '{participant_context_id}', {} scope(s) granted",
            scopes.len()
        );
        Ok(scopes)
    }

    async fn participant(&self, participant_context_id: &str) -> Result<ParticipantIdentity> {
        self.participants
            .resolve(participant_context_id)
            .await
            .map_err(Error::Storage)?
            .ok_or_else(|| Error::ParticipantNotFound(participant_context_id.to_owned()))
    }
}

/// Builder struct for [TokenVerifier].
#[derive(Debug, Clone, Default)]
pub struct TokenVerifierBuilder {
    rules: Option<RuleRegistry>,
    public_keys: Option<Arc<dyn PublicKeyResolver>>,
    local_keys: Option<Arc<dyn LocalPublicKeyResolver>>,
    participants: Option<Arc<dyn ParticipantDirectory>>,
    audience_policy: AudiencePolicy,
}

impl TokenVerifierBuilder {
    /// Build the verifier. Without explicit rules, the default rules of [HubConfig::default]
    /// evaluated against the system clock are used.
    pub fn build(self) -> anyhow::Result<TokenVerifier> {
        let Some(public_keys) = self.public_keys else {
            bail!("public key resolver is required, see `with_public_key_resolver`")
        };
        let Some(local_keys) = self.local_keys else {
            bail!("local public key resolver is required, see `with_local_key_resolver`")
        };
        let Some(participants) = self.participants else {
            bail!("participant directory is required, see `with_participants`")
        };
        let rules = self.rules.unwrap_or_else(|| {
            RuleRegistry::with_defaults(&HubConfig::default(), Arc::new(SystemClock), None)
        });

        Ok(TokenVerifier {
            rules,
            public_keys,
            local_keys,
            participants,
            audience_policy: self.audience_policy,
        })
    }

    pub fn with_rules(mut self, rules: RuleRegistry) -> Self {
        self.rules = Some(rules);
        self
    }

    /// Use the default rules for `config`, evaluated against `clock`.
    pub fn with_config(self, config: &HubConfig, clock: Arc<dyn Clock>) -> Self {
        self.with_rules(RuleRegistry::with_defaults(config, clock, None))
    }

    pub fn with_public_key_resolver(mut self, resolver: Arc<dyn PublicKeyResolver>) -> Self {
        self.public_keys = Some(resolver);
        self
    }

    pub fn with_local_key_resolver(mut self, resolver: Arc<dyn LocalPublicKeyResolver>) -> Self {
        self.local_keys = Some(resolver);
        self
    }

    pub fn with_participants(mut self, participants: Arc<dyn ParticipantDirectory>) -> Self {
        self.participants = Some(participants);
        self
    }

    pub fn with_audience_policy(mut self, policy: AudiencePolicy) -> Self {
        self.audience_policy = policy;
        self
    }
}
