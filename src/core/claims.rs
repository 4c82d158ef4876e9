use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value as Json};

pub const ISSUER: &str = "iss";
pub const SUBJECT: &str = "sub";
pub const AUDIENCE: &str = "aud";
pub const ISSUED_AT: &str = "iat";
pub const NOT_BEFORE: &str = "nbf";
pub const EXPIRATION: &str = "exp";
pub const JWT_ID: &str = "jti";
/// Space-separated list of scopes granted by an access token.
pub const SCOPE: &str = "scope";
/// Reserved claim carrying the serialized access token inside a self-issued token.
pub const TOKEN: &str = "token";

/// The claim set of a JWT.
///
/// Both the issuing and the verifying side of the self-issued token protocol read and write
/// claims exclusively through this type.
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
#[serde(transparent)]
pub struct ClaimSet(pub(crate) Map<String, Json>);

impl ClaimSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, name: &str) -> Option<&Json> {
        self.0.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.0.contains_key(name)
    }

    /// Get a claim if it is a JSON string.
    pub fn get_str(&self, name: &str) -> Option<&str> {
        self.0.get(name)?.as_str()
    }

    /// Get a claim that may be either a single string or an array of strings, like `aud`.
    ///
    /// Non-string array members are skipped, a missing claim yields an empty list.
    pub fn get_list(&self, name: &str) -> Vec<String> {
        match self.0.get(name) {
            Some(Json::String(s)) => vec![s.clone()],
            Some(Json::Array(values)) => values
                .iter()
                .filter_map(Json::as_str)
                .map(ToOwned::to_owned)
                .collect(),
            _ => Vec::new(),
        }
    }

    /// Get a NumericDate claim (seconds since the epoch).
    pub fn get_timestamp(&self, name: &str) -> Option<DateTime<Utc>> {
        let secs = self.0.get(name)?.as_i64()?;
        DateTime::from_timestamp(secs, 0)
    }

    /// Insert a claim, returning the previous value if there was one.
    pub fn insert(&mut self, name: impl Into<String>, value: impl Into<Json>) -> Option<Json> {
        self.0.insert(name.into(), value.into())
    }

    /// Merge `other` into this claim set. Claims of `other` win on conflict.
    pub fn merge(&mut self, other: ClaimSet) {
        self.0.extend(other.0);
    }

    pub fn issued_at(&self) -> Option<DateTime<Utc>> {
        self.get_timestamp(ISSUED_AT)
    }

    pub fn not_before(&self) -> Option<DateTime<Utc>> {
        self.get_timestamp(NOT_BEFORE)
    }

    pub fn expiration(&self) -> Option<DateTime<Utc>> {
        self.get_timestamp(EXPIRATION)
    }

    pub fn with_issued_at(mut self, at: DateTime<Utc>) -> Self {
        self.insert(ISSUED_AT, at.timestamp());
        self
    }

    pub fn with_not_before(mut self, at: DateTime<Utc>) -> Self {
        self.insert(NOT_BEFORE, at.timestamp());
        self
    }

    pub fn with_expiration(mut self, at: DateTime<Utc>) -> Self {
        self.insert(EXPIRATION, at.timestamp());
        self
    }

    pub fn with_jti(mut self, jti: impl Into<String>) -> Self {
        self.insert(JWT_ID, jti.into());
        self
    }

    pub fn as_map(&self) -> &Map<String, Json> {
        &self.0
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for ClaimSet {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self(
            iter.into_iter()
                .map(|(k, v)| (k.into(), Json::String(v.into())))
                .collect(),
        )
    }
}

impl From<Map<String, Json>> for ClaimSet {
    fn from(value: Map<String, Json>) -> Self {
        Self(value)
    }
}

impl From<ClaimSet> for Json {
    fn from(value: ClaimSet) -> Self {
        value.0.into()
    }
}
