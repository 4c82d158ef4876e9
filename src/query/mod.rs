//! Scope parsing and authorization-aware credential resolution.

pub mod resolver;
pub mod scope;

pub use resolver::{CredentialResolver, CredentialResolverBuilder};
pub use scope::{ScopeResolver, ScopeTransformer};
