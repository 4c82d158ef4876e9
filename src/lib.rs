//! This library provides the trust core of a decentralized identity hub: self-issued token
//! issuance and verification, scope-gated credential resolution, and multi-format presentation
//! packaging.
//!
//! # Holder Usage
//!
//! A participant about to call another participant's endpoint mints a self-issued token with
//! the [`TokenIssuer`], embedding an access token that grants the counterparty a set of scopes:
//!
//! ```ignore
//! use identity_hub::token::TokenIssuer;
//!
//! let issuer = TokenIssuer::builder()
//!     .with_participants(participants)
//!     .with_key_provider(keys.clone())
//!     .with_signer(keys)
//!     .with_config(&config)
//!     .build()?;
//!
//! let token = issuer
//!     .token_for(
//!         "alice",
//!         "did:web:bob",
//!         Some("org.eclipse.edc.vc.type:MembershipCredential:read"),
//!     )
//!     .await?;
//! ```
//!
//! [`TokenIssuer`]: crate::token::TokenIssuer
//!
//! # Relying Party Usage
//!
//! The [`PresentationApi`] answers presentation queries. Mount it behind any HTTP server at
//! `POST /presentation/query`:
//!
//! ```ignore
//! use identity_hub::api::PresentationApi;
//!
//! let api = PresentationApi::builder()
//!     .with_participants(participants)
//!     .with_verifier(verifier)
//!     .with_resolver(resolver)
//!     .with_packager(packager)
//!     .build()?;
//!
//! let response = api
//!     .query_with_deadline("bob", authorization_header, &body, Duration::from_secs(5))
//!     .await;
//! ```
//!
//! Storage, key material and participant lookup are supplied by implementing the
//! [`CredentialStore`], [`KeyProvider`], [`Signer`], [`PublicKeyResolver`],
//! [`LocalPublicKeyResolver`] and [`ParticipantDirectory`] traits. In-memory implementations
//! are provided for testing.
//!
//! [`PresentationApi`]: crate::api::PresentationApi
//! [`CredentialStore`]: crate::core::store::CredentialStore
//! [`KeyProvider`]: crate::core::keys::KeyProvider
//! [`Signer`]: crate::core::keys::Signer
//! [`PublicKeyResolver`]: crate::core::keys::PublicKeyResolver
//! [`LocalPublicKeyResolver`]: crate::core::keys::LocalPublicKeyResolver
//! [`ParticipantDirectory`]: crate::core::participant::ParticipantDirectory
//!
//! # Protocol Overview
//!
//! ## Token Verification
//!
//! 1. *Outer token*: the self-issued token is verified with the key its `kid` header resolves
//!    to and checked against the rules registered for self-issued tokens.
//! 2. *Access token*: the token nested under the `token` claim is verified with key material
//!    held for the relying participant. It must be addressed to the relying participant and
//!    carry the same `sub` as the outer token.
//! 3. *Scopes*: the space-separated `scope` claim of the access token lists the granted scopes.
//!
//! All the code related to tokens is located in the [`token`] module.
//!
//! ## Credential Resolution
//!
//! 4. *Scope translation*: every scope `<alias>:<credential type>:<action>` is translated into a
//!    storage predicate by the [`ScopeResolver`].
//! 5. *Authorization*: the [`CredentialResolver`] only hands out credentials that the granted
//!    scopes cover, and drops credentials that are expired, not valid yet, or revoked.
//!
//! [`ScopeResolver`]: crate::query::ScopeResolver
//! [`CredentialResolver`]: crate::query::CredentialResolver
//!
//! ## Presentation
//!
//! 6. *Packaging*: the [`PresentationPackager`] creates one presentation per credential format,
//!    signed with the participant's presentation signing key.
//!
//! # Credential Formats
//!
//! - **VC 1.1 JWT** (`VC1_0_JWT`): packaged as a JWT presentation with a `vp` claim
//! - **VC 1.1 JSON-LD** (`VC1_0_LD`): packaged as a JSON-LD presentation with an embedded proof
//! - **VC 2.0 JOSE** (`VC2_0_JOSE`): packaged as an enveloped presentation
//!
//! [`PresentationPackager`]: crate::presentation::PresentationPackager

pub mod api;
pub mod config;
pub mod core;
pub mod presentation;
pub mod query;
pub mod revocation;
pub mod token;
pub mod utils;
