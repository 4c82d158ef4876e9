use std::sync::Arc;

use p256::ecdsa::VerifyingKey;
use tracing::debug;

use crate::core::{claims::ClaimSet, jws, Error, Result};

use super::rules::TokenValidationRule;

/// The `kid` header of a compact token.
pub fn key_id(token: &str) -> Result<String> {
    let header =
        jws::decode_header(token).map_err(|e| Error::MalformedToken(format!("{e:#}")))?;
    header
        .kid
        .ok_or_else(|| Error::MalformedToken("token header does not contain a 'kid'".into()))
}

/// Verify the signature of a token with `key`, then apply every rule in order.
///
/// The first failing rule aborts validation.
pub async fn validate(
    token: &str,
    key: &VerifyingKey,
    rules: &[Arc<dyn TokenValidationRule>],
) -> Result<ClaimSet> {
    jws::decode_unverified(token).map_err(|e| Error::MalformedToken(format!("{e:#}")))?;
    let claims = jws::verify(token, key).map_err(|e| Error::SignatureInvalid(format!("{e:#}")))?;

    for rule in rules {
        rule.check(&claims).await.inspect_err(|e| {
            debug!("token rejected by {rule:?}: {e}");
        })?;
    }

    Ok(claims)
}

#[cfg(test)]
mod test {
    use p256::ecdsa::SigningKey;

    use super::*;
    use crate::core::keys::{KeyUsage, MemoryKeyStore, PublicKeyResolver};
    use crate::token::rules::ClaimIsPresent;

    #[tokio::test]
    async fn rejects_foreign_signature() {
        let keys = MemoryKeyStore::new();
        let handle = keys
            .generate("alice", "did:web:alice", "key-1", KeyUsage::TokenSigning)
            .await
            .unwrap();
        let mut claims = ClaimSet::new();
        claims.insert("scope", "read");
        let token = jws::sign(&keys, &handle.private_key_alias, &handle.key_id, &claims)
            .await
            .unwrap();

        assert_eq!(key_id(&token).unwrap(), "did:web:alice#key-1");

        let key = keys.resolve_public_key(&handle.key_id).await.unwrap();
        let rules: Vec<Arc<dyn TokenValidationRule>> =
            vec![Arc::new(ClaimIsPresent("scope".into()))];
        assert_eq!(validate(&token, &key, &rules).await.unwrap(), claims);

        let other = VerifyingKey::from(&SigningKey::random(&mut rand::rngs::OsRng));
        assert!(matches!(
            validate(&token, &other, &rules).await,
            Err(Error::SignatureInvalid(_))
        ));
        assert!(matches!(
            validate("not-a-token", &key, &rules).await,
            Err(Error::MalformedToken(_))
        ));
    }
}
