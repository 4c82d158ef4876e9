//! Scope string grammar.
//!
//! A scope is a colon-delimited triplet `<alias>:<credential type>:<action>`, for example
//! `org.eclipse.edc.vc.type:MembershipCredential:read`.

use std::fmt::Debug;

use serde_json::Value as Json;

use crate::{
    config::HubConfig,
    core::{
        criterion::{Criterion, Operator},
        Error, Result,
    },
};

/// Alias the first segment of a scope string must carry unless configured otherwise.
pub const DEFAULT_SCOPE_ALIAS: &str = "org.eclipse.edc.vc.type";

/// Left operand every scope criterion queries on.
pub const TYPE_OPERAND: &str = "verifiableCredential.credential.type";

/// Translates one scope string into a storage predicate.
pub trait ScopeTransformer: Debug + Send + Sync {
    /// On failure, returns a human readable message describing the problem.
    fn transform(&self, scope: &str) -> Result<Criterion, String>;
}

/// The scope grammar of the hub.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScopeResolver {
    alias: String,
    actions: Vec<String>,
}

impl Default for ScopeResolver {
    fn default() -> Self {
        Self::from_config(&HubConfig::default())
    }
}

impl ScopeResolver {
    pub fn new(alias: impl Into<String>, actions: Vec<String>) -> Self {
        Self {
            alias: alias.into(),
            actions,
        }
    }

    pub fn from_config(config: &HubConfig) -> Self {
        Self::new(config.scope_alias.clone(), config.scope_actions.clone())
    }

    /// Parse a single scope string.
    pub fn parse(&self, scope: &str) -> Result<Criterion> {
        self.transform(scope)
            .map_err(|message| Error::InvalidScope(vec![message]))
    }

    /// Parse every scope, failing with all parse errors if any scope is malformed.
    pub fn parse_all<S: AsRef<str>>(&self, scopes: &[S]) -> Result<Vec<Criterion>> {
        parse_all(self, scopes)
    }
}

impl ScopeTransformer for ScopeResolver {
    fn transform(&self, scope: &str) -> Result<Criterion, String> {
        let segments: Vec<&str> = scope.split(':').collect();
        let [alias, credential_type, action] = segments.as_slice() else {
            return Err("Scope string has invalid format.".into());
        };

        if !alias.eq_ignore_ascii_case(&self.alias) {
            return Err(format!(
                "Scope alias MUST be {} but was {alias}",
                self.alias
            ));
        }
        if !self.actions.iter().any(|a| a == action) {
            return Err(format!("Invalid scope operation: {action}"));
        }

        Ok(Criterion::new(
            TYPE_OPERAND,
            Operator::Contains,
            Json::String((*credential_type).to_owned()),
        ))
    }
}

/// Transform a list of scopes, collecting the messages of every failure.
pub(crate) fn parse_all<T, S>(transformer: &T, scopes: &[S]) -> Result<Vec<Criterion>>
where
    T: ScopeTransformer + ?Sized,
    S: AsRef<str>,
{
    let mut criteria = Vec::with_capacity(scopes.len());
    let mut failures = Vec::new();
    for scope in scopes {
        match transformer.transform(scope.as_ref()) {
            Ok(criterion) => criteria.push(criterion),
            Err(message) => failures.push(message),
        }
    }
    if failures.is_empty() {
        Ok(criteria)
    } else {
        Err(Error::InvalidScope(failures))
    }
}
