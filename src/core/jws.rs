//! Compact JWS serialization (ES256).

use anyhow::{bail, Context, Result};
use base64::prelude::*;
use p256::ecdsa::{signature::Verifier, Signature, VerifyingKey};
use serde::{de::DeserializeOwned, Deserialize, Serialize};

use super::{claims::ClaimSet, keys::Signer};

pub const ES256: &str = "ES256";

/// JOSE header.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Header {
    pub alg: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub kid: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub typ: Option<String>,
}

impl Header {
    pub fn new(alg: impl Into<String>, kid: impl Into<String>) -> Self {
        Self {
            alg: alg.into(),
            kid: Some(kid.into()),
            typ: Some("JWT".into()),
        }
    }
}

/// Split a compact JWS into its header, payload and signature parts.
pub fn split(jws: &str) -> Result<(&str, &str, &str)> {
    let mut parts = jws.split('.');
    let (Some(header), Some(payload), Some(signature), None) =
        (parts.next(), parts.next(), parts.next(), parts.next())
    else {
        bail!("compact JWS must consist of exactly three parts")
    };
    Ok((header, payload, signature))
}

fn decode_part<T: DeserializeOwned>(part: &str, name: &str) -> Result<T> {
    let bytes = BASE64_URL_SAFE_NO_PAD
        .decode(part)
        .with_context(|| format!("jwt {name} was not valid base64url"))?;
    serde_json::from_slice(&bytes).with_context(|| format!("jwt {name} was not valid json"))
}

fn encode_part<T: Serialize>(value: &T) -> Result<String> {
    Ok(BASE64_URL_SAFE_NO_PAD.encode(serde_json::to_vec(value)?))
}

pub fn decode_header(jws: &str) -> Result<Header> {
    let (header, _, _) = split(jws)?;
    decode_part(header, "headers")
}

/// Decode header and claims without verifying the signature.
pub fn decode_unverified(jws: &str) -> Result<(Header, ClaimSet)> {
    let (header, payload, _) = split(jws)?;
    Ok((decode_part(header, "headers")?, decode_part(payload, "payload")?))
}

/// Verify the signature of a compact JWS and return its claims.
pub fn verify(jws: &str, key: &VerifyingKey) -> Result<ClaimSet> {
    let (header_b64, payload_b64, signature_b64) = split(jws)?;

    let header: Header = decode_part(header_b64, "headers")?;
    if header.alg != ES256 {
        bail!("unsupported signing algorithm: {}", header.alg)
    }

    let signature = BASE64_URL_SAFE_NO_PAD
        .decode(signature_b64)
        .context("jwt signature was not valid base64url")?;
    let signature =
        Signature::from_slice(&signature).context("jwt signature is not an ES256 signature")?;

    key.verify(format!("{header_b64}.{payload_b64}").as_bytes(), &signature)
        .context("jwt signature does not match")?;

    decode_part(payload_b64, "payload")
}

/// Sign a claim set as a compact JWS using the private key behind `private_key_alias`.
pub async fn sign(
    signer: &dyn Signer,
    private_key_alias: &str,
    key_id: &str,
    claims: &ClaimSet,
) -> Result<String> {
    let header = Header::new(signer.alg(), key_id);
    let signing_input = format!("{}.{}", encode_part(&header)?, encode_part(claims)?);
    let signature = signer
        .sign(private_key_alias, signing_input.as_bytes())
        .await?;
    Ok(format!(
        "{signing_input}.{}",
        BASE64_URL_SAFE_NO_PAD.encode(signature)
    ))
}

/// Produce a JWS with detached payload (`<header>..<signature>`).
pub async fn sign_detached(
    signer: &dyn Signer,
    private_key_alias: &str,
    key_id: &str,
    payload: &[u8],
) -> Result<String> {
    let header = Header {
        alg: signer.alg().to_owned(),
        kid: Some(key_id.to_owned()),
        typ: None,
    };
    let header_b64 = encode_part(&header)?;
    let signing_input = format!("{header_b64}.{}", BASE64_URL_SAFE_NO_PAD.encode(payload));
    let signature = signer
        .sign(private_key_alias, signing_input.as_bytes())
        .await?;
    Ok(format!(
        "{header_b64}..{}",
        BASE64_URL_SAFE_NO_PAD.encode(signature)
    ))
}

/// Verify a detached JWS against the payload it was computed over.
pub fn verify_detached(jws: &str, payload: &[u8], key: &VerifyingKey) -> Result<()> {
    let (header_b64, detached, signature_b64) = split(jws)?;
    if !detached.is_empty() {
        bail!("expected a detached payload")
    }
    let signature = BASE64_URL_SAFE_NO_PAD
        .decode(signature_b64)
        .context("jws signature was not valid base64url")?;
    let signature = Signature::from_slice(&signature).context("not an ES256 signature")?;
    let signing_input = format!("{header_b64}.{}", BASE64_URL_SAFE_NO_PAD.encode(payload));
    key.verify(signing_input.as_bytes(), &signature)
        .context("jws signature does not match")
}

#[cfg(test)]
mod test {
    use serde_json::json;

    use super::*;
    use crate::core::keys::{KeyUsage, MemoryKeyStore, PublicKeyResolver};

    async fn store_with_key() -> (MemoryKeyStore, String, String) {
        let store = MemoryKeyStore::new();
        let handle = store
            .generate("alice", "did:web:alice", "key-1", KeyUsage::TokenSigning)
            .await
            .unwrap();
        (store, handle.private_key_alias, handle.key_id)
    }

    #[tokio::test]
    async fn signed_token_carries_kid_and_verifies() {
        let (store, alias, kid) = store_with_key().await;
        let claims: ClaimSet = serde_json::from_value(json!({"iss": "did:web:alice"})).unwrap();

        let jwt = sign(&store, &alias, &kid, &claims).await.unwrap();

        assert_eq!(decode_header(&jwt).unwrap().kid.as_deref(), Some(kid.as_str()));
        let key = store.resolve_public_key(&kid).await.unwrap();
        assert_eq!(verify(&jwt, &key).unwrap(), claims);
    }

    #[tokio::test]
    async fn tampered_payload_is_rejected() {
        let (store, alias, kid) = store_with_key().await;
        let claims: ClaimSet = serde_json::from_value(json!({"scope": "read"})).unwrap();
        let jwt = sign(&store, &alias, &kid, &claims).await.unwrap();

        let (header, _, signature) = split(&jwt).unwrap();
        let forged = format!(
            "{header}.{}.{signature}",
            BASE64_URL_SAFE_NO_PAD.encode(br#"{"scope":"read write"}"#)
        );

        let key = store.resolve_public_key(&kid).await.unwrap();
        assert!(verify(&forged, &key).is_err());
    }

    #[tokio::test]
    async fn detached_signature_binds_payload() {
        let (store, alias, kid) = store_with_key().await;
        let jws = sign_detached(&store, &alias, &kid, b"document").await.unwrap();
        let key = store.resolve_public_key(&kid).await.unwrap();

        assert!(verify_detached(&jws, b"document", &key).is_ok());
        assert!(verify_detached(&jws, b"other document", &key).is_err());
    }

    #[test]
    fn rejects_non_compact_input() {
        assert!(split("a.b").is_err());
        assert!(split("a.b.c.d").is_err());
        assert!(decode_unverified("not-a-jwt").is_err());
    }
}
