//! Token validation rules and the registry that groups them per token context.

use std::{collections::HashMap, fmt::Debug, sync::Arc};

use anyhow::Context;
use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use tokio::sync::Mutex;

use crate::{
    config::HubConfig,
    core::{
        claims::{self, ClaimSet},
        Error, Result,
    },
    utils::Clock,
};

/// A single check applied to the claims of a token whose signature has been verified.
#[async_trait]
pub trait TokenValidationRule: Debug + Send + Sync {
    async fn check(&self, claims: &ClaimSet) -> Result<()>;
}

/// Requires a claim to be present.
#[derive(Debug, Clone)]
pub struct ClaimIsPresent(pub String);

#[async_trait]
impl TokenValidationRule for ClaimIsPresent {
    async fn check(&self, claims: &ClaimSet) -> Result<()> {
        if claims.contains(&self.0) {
            return Ok(());
        }
        if self.0 == claims::SCOPE {
            return Err(Error::MissingScopeClaim);
        }
        Err(Error::TokenValidation(format!(
            "required claim '{}' is not present",
            self.0
        )))
    }
}

/// Requires `exp` to lie in the future and `iat` to not lie after `exp`.
#[derive(Debug, Clone)]
pub struct ExpirationIssuedAt {
    clock: Arc<dyn Clock>,
    leeway: Duration,
    allow_missing_iat: bool,
}

impl ExpirationIssuedAt {
    pub fn new(clock: Arc<dyn Clock>, leeway_secs: i64) -> Self {
        Self {
            clock,
            leeway: Duration::seconds(leeway_secs),
            allow_missing_iat: true,
        }
    }

    pub fn require_issued_at(mut self) -> Self {
        self.allow_missing_iat = false;
        self
    }
}

#[async_trait]
impl TokenValidationRule for ExpirationIssuedAt {
    async fn check(&self, claims: &ClaimSet) -> Result<()> {
        let now = self.clock.now();
        let Some(expiration) = claims.expiration() else {
            return Err(Error::TokenValidation(
                "required claim 'exp' is not present".into(),
            ));
        };
        if expiration + self.leeway < now {
            return Err(Error::TokenExpired);
        }

        match claims.issued_at() {
            Some(issued_at) if issued_at > expiration => Err(Error::TokenValidation(
                "'iat' is after 'exp'".into(),
            )),
            Some(issued_at) if issued_at > now + self.leeway => Err(Error::TokenValidation(
                "'iat' lies in the future".into(),
            )),
            None if !self.allow_missing_iat => Err(Error::TokenValidation(
                "required claim 'iat' is not present".into(),
            )),
            _ => Ok(()),
        }
    }
}

/// Rejects tokens that are not valid yet. A missing `nbf` is accepted.
#[derive(Debug, Clone)]
pub struct NotBefore {
    clock: Arc<dyn Clock>,
    leeway: Duration,
}

impl NotBefore {
    pub fn new(clock: Arc<dyn Clock>, leeway_secs: i64) -> Self {
        Self {
            clock,
            leeway: Duration::seconds(leeway_secs),
        }
    }
}

#[async_trait]
impl TokenValidationRule for NotBefore {
    async fn check(&self, claims: &ClaimSet) -> Result<()> {
        match claims.not_before() {
            Some(not_before) if not_before > self.clock.now() + self.leeway => Err(
                Error::TokenValidation(format!("token is not valid before {not_before}")),
            ),
            _ => Ok(()),
        }
    }
}

/// Requires the `aud` claim to contain the expected audience.
#[derive(Debug, Clone)]
pub struct AudienceContains(pub String);

#[async_trait]
impl TokenValidationRule for AudienceContains {
    async fn check(&self, claims: &ClaimSet) -> Result<()> {
        let audience = claims.get_list(claims::AUDIENCE);
        if audience.iter().any(|aud| aud == &self.0) {
            Ok(())
        } else {
            Err(Error::AudienceMismatch(format!(
                "expected audience '{}' but token was issued for {audience:?}",
                self.0
            )))
        }
    }
}

/// Requires the `sub` claim to equal a given subject.
#[derive(Debug, Clone)]
pub struct SubjectMatches(pub String);

#[async_trait]
impl TokenValidationRule for SubjectMatches {
    async fn check(&self, claims: &ClaimSet) -> Result<()> {
        match claims.get_str(claims::SUBJECT) {
            Some(subject) if subject == self.0 => Ok(()),
            subject => Err(Error::SubjectMismatch(format!(
                "expected subject '{}' but found {subject:?}",
                self.0
            ))),
        }
    }
}

/// Requires the signing key id to be a DID URL under the `iss` claim, binding the issuer to the
/// key the token was verified with.
#[derive(Debug, Clone)]
pub struct IssuerKeyId(pub String);

#[async_trait]
impl TokenValidationRule for IssuerKeyId {
    async fn check(&self, claims: &ClaimSet) -> Result<()> {
        let Some(issuer) = claims.get_str(claims::ISSUER) else {
            return Err(Error::TokenValidation(
                "required claim 'iss' is not present".into(),
            ));
        };
        let owned = self.0 == issuer
            || self
                .0
                .strip_prefix(issuer)
                .is_some_and(|fragment| fragment.starts_with('#'));
        if owned {
            Ok(())
        } else {
            Err(Error::TokenValidation(format!(
                "key id '{}' does not belong to issuer '{issuer}'",
                self.0
            )))
        }
    }
}

/// Remembers token ids for replay detection.
#[async_trait]
pub trait JtiStore: Debug + Send + Sync {
    /// Record a token id. Returns `false` if it was already known and has not expired yet.
    async fn record(&self, jti: &str, expires_at: Option<DateTime<Utc>>) -> anyhow::Result<bool>;
}

/// A local in-memory JTI store. Not for production use!
///
/// # Warning
/// Entries are only evicted when a token id is seen again, the store grows without bound.
#[derive(Debug, Clone, Default)]
pub struct MemoryJtiStore {
    seen: Arc<Mutex<HashMap<String, Option<DateTime<Utc>>>>>,
    clock: Option<Arc<dyn Clock>>,
}

impl MemoryJtiStore {
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self {
            seen: Default::default(),
            clock: Some(clock),
        }
    }
}

#[async_trait]
impl JtiStore for MemoryJtiStore {
    async fn record(&self, jti: &str, expires_at: Option<DateTime<Utc>>) -> anyhow::Result<bool> {
        let now = self.clock.as_ref().map_or_else(Utc::now, |c| c.now());
        let mut seen = self.seen.lock().await;
        if let Some(previous) = seen.get(jti) {
            if previous.map_or(true, |exp| exp > now) {
                return Ok(false);
            }
        }
        seen.insert(jti.to_owned(), expires_at);
        Ok(true)
    }
}

/// Rejects tokens without a `jti`, or with a `jti` that has been seen before.
#[derive(Debug, Clone)]
pub struct JtiValidation(pub Arc<dyn JtiStore>);

#[async_trait]
impl TokenValidationRule for JtiValidation {
    async fn check(&self, claims: &ClaimSet) -> Result<()> {
        let Some(jti) = claims.get_str(claims::JWT_ID) else {
            return Err(Error::TokenValidation(
                "required claim 'jti' is not present".into(),
            ));
        };
        let fresh = self
            .0
            .record(jti, claims.expiration())
            .await
            .context("failed to record token id")
            .map_err(Error::Storage)?;
        if fresh {
            Ok(())
        } else {
            Err(Error::TokenValidation(format!(
                "token id '{jti}' has already been used"
            )))
        }
    }
}

/// The kind of token a set of rules applies to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RuleContext {
    /// The outer token, minted by the holder.
    SelfIssued,
    /// The access token nested in a self-issued token.
    AccessToken,
}

/// Immutable mapping from token context to the rules applied in that context.
#[derive(Debug, Clone, Default)]
pub struct RuleRegistry {
    rules: HashMap<RuleContext, Vec<Arc<dyn TokenValidationRule>>>,
}

impl RuleRegistry {
    pub fn builder() -> RuleRegistryBuilder {
        RuleRegistryBuilder::default()
    }

    /// The rules the hub applies unless configured otherwise.
    ///
    /// Self-issued tokens must embed a `token` claim and be within their validity window, access
    /// tokens must carry a `scope`. With `jti_validation` enabled, token ids are checked against
    /// `jti_store` in both contexts.
    pub fn with_defaults(
        config: &HubConfig,
        clock: Arc<dyn Clock>,
        jti_store: Option<Arc<dyn JtiStore>>,
    ) -> Self {
        let mut builder = Self::builder()
            .with_rule(
                RuleContext::SelfIssued,
                Arc::new(ClaimIsPresent(claims::TOKEN.into())),
            )
            .with_rule(
                RuleContext::SelfIssued,
                Arc::new(ExpirationIssuedAt::new(clock.clone(), config.clock_skew_secs)),
            )
            .with_rule(
                RuleContext::SelfIssued,
                Arc::new(NotBefore::new(clock.clone(), config.clock_skew_secs)),
            )
            .with_rule(
                RuleContext::AccessToken,
                Arc::new(ClaimIsPresent(claims::SCOPE.into())),
            );

        if config.jti_validation {
            let store = jti_store.unwrap_or_else(|| Arc::new(MemoryJtiStore::new(clock)));
            let rule: Arc<dyn TokenValidationRule> = Arc::new(JtiValidation(store));
            builder = builder
                .with_rule(RuleContext::SelfIssued, rule.clone())
                .with_rule(RuleContext::AccessToken, rule);
        }

        builder.build()
    }

    /// The rules registered for a context, in registration order.
    pub fn rules(&self, context: RuleContext) -> &[Arc<dyn TokenValidationRule>] {
        self.rules
            .get(&context)
            .map(Vec::as_slice)
            .unwrap_or_default()
    }
}

/// Builder struct for [RuleRegistry].
#[derive(Debug, Clone, Default)]
pub struct RuleRegistryBuilder {
    rules: HashMap<RuleContext, Vec<Arc<dyn TokenValidationRule>>>,
}

impl RuleRegistryBuilder {
    pub fn with_rule(mut self, context: RuleContext, rule: Arc<dyn TokenValidationRule>) -> Self {
        self.rules.entry(context).or_default().push(rule);
        self
    }

    pub fn build(self) -> RuleRegistry {
        RuleRegistry { rules: self.rules }
    }
}
