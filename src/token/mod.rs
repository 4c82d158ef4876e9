//! Self-issued token issuance and verification.
//!
//! A self-issued token is an ES256 JWT minted by the holder. It may embed, under the `token`
//! claim, an access token granting a space-separated list of scopes to the token's audience.

pub mod issuer;
pub mod rules;
pub mod validation;
pub mod verifier;

pub use issuer::{TokenIssuer, TokenIssuerBuilder};
pub use verifier::{AudiencePolicy, TokenVerifier, TokenVerifierBuilder};
