use serde::Deserialize;

/// Settings of the identity hub core.
///
/// Every field has a default, so an empty document deserializes into [HubConfig::default].
#[derive(Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(default, rename_all = "camelCase")]
pub struct HubConfig {
    /// Lifetime of issued self-issued and access tokens.
    pub token_validity_secs: i64,
    /// Leeway applied to `exp`, `iat` and `nbf` checks.
    pub clock_skew_secs: i64,
    /// Lifetime of JWT presentations.
    pub presentation_validity_secs: i64,
    /// Reject tokens whose `jti` has been seen before.
    pub jti_validation: bool,
    /// First segment every scope string must carry.
    pub scope_alias: String,
    /// Accepted third segments of a scope string.
    pub scope_actions: Vec<String>,
}

impl Default for HubConfig {
    fn default() -> Self {
        Self {
            token_validity_secs: 300,
            clock_skew_secs: 5,
            presentation_validity_secs: 60,
            jti_validation: false,
            scope_alias: crate::query::scope::DEFAULT_SCOPE_ALIAS.to_owned(),
            scope_actions: ["read", "*", "all"].map(ToOwned::to_owned).to_vec(),
        }
    }
}
