use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value as Json};

/// Proof format of a stored verifiable credential.
///
/// The declaration order is the order in which presentations are packaged.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum CredentialFormat {
    /// Compact JWT, VC data model 1.1.
    #[serde(rename = "VC1_0_JWT")]
    Vc1Jwt,
    /// JSON-LD with embedded proof, VC data model 1.1.
    #[serde(rename = "VC1_0_LD")]
    Vc1Ld,
    /// Compact JOSE, VC data model 2.0.
    #[serde(rename = "VC2_0_JOSE")]
    Vc2Jose,
}

impl fmt::Display for CredentialFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CredentialFormat::Vc1Jwt => write!(f, "VC1_0_JWT"),
            CredentialFormat::Vc1Ld => write!(f, "VC1_0_LD"),
            CredentialFormat::Vc2Jose => write!(f, "VC2_0_JOSE"),
        }
    }
}

/// Lifecycle state of a stored credential. Transitions are owned by the issuance side.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum VcState {
    Initial,
    Requesting,
    Requested,
    Issuing,
    Issued,
    Revoked,
    Suspended,
    Expired,
    NotYetValid,
    Terminated,
    Error,
}

impl VcState {
    /// The value this state is persisted and queried as.
    pub fn code(self) -> Json {
        serde_json::to_value(self).unwrap_or(Json::Null)
    }
}

/// A `credentialStatus` entry of a credential, e.g. a status list reference.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CredentialStatusEntry {
    pub id: String,
    #[serde(rename = "type")]
    pub status_type: String,
    #[serde(flatten)]
    pub properties: Map<String, Json>,
}

/// The parts of the credential the hub needs to query on.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CredentialDescription {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(rename = "type")]
    pub types: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub issuer: Option<String>,
}

/// A credential in its original (signed) representation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CredentialContainer {
    /// The credential exactly as issued: a compact JWT, or a JSON-LD document.
    pub raw_vc: String,
    pub format: CredentialFormat,
    pub credential: CredentialDescription,
}

/// A credential as held by the credential store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CredentialRecord {
    pub id: String,
    pub participant_context_id: String,
    pub state: VcState,
    pub issuance_date: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expiration_date: Option<DateTime<Utc>>,
    #[serde(default)]
    pub credential_status: Vec<CredentialStatusEntry>,
    pub verifiable_credential: CredentialContainer,
}

impl CredentialRecord {
    /// Whether the credential is inside its validity period at `now`.
    ///
    /// Revocation status is not considered.
    pub fn is_within_validity_period(&self, now: DateTime<Utc>) -> bool {
        self.issuance_date <= now && self.expiration_date.map_or(true, |exp| exp > now)
    }
}

#[cfg(test)]
mod test {
    use chrono::Duration;
    use serde_json::json;

    use super::*;

    fn record(issued: DateTime<Utc>, expires: Option<DateTime<Utc>>) -> CredentialRecord {
        CredentialRecord {
            id: "cred-1".into(),
            participant_context_id: "alice".into(),
            state: VcState::Issued,
            issuance_date: issued,
            expiration_date: expires,
            credential_status: Vec::new(),
            verifiable_credential: CredentialContainer {
                raw_vc: "eyJ...".into(),
                format: CredentialFormat::Vc1Jwt,
                credential: CredentialDescription {
                    id: None,
                    types: vec!["VerifiableCredential".into()],
                    issuer: None,
                },
            },
        }
    }

    #[test]
    fn validity_period() {
        let now = Utc::now();
        assert!(record(now - Duration::days(1), None).is_within_validity_period(now));
        assert!(!record(now + Duration::days(1), None).is_within_validity_period(now));
        assert!(
            !record(now - Duration::days(2), Some(now - Duration::days(1)))
                .is_within_validity_period(now)
        );
        assert!(
            record(now - Duration::days(2), Some(now + Duration::days(1)))
                .is_within_validity_period(now)
        );
    }

    #[test]
    fn state_codes() {
        assert_eq!(VcState::Revoked.code(), json!("REVOKED"));
        assert_eq!(VcState::NotYetValid.code(), json!("NOT_YET_VALID"));
    }

    #[test]
    fn status_entry_keeps_extra_properties() {
        let entry: CredentialStatusEntry = serde_json::from_value(json!({
            "id": "https://example.com/status/1#94567",
            "type": "BitstringStatusListEntry",
            "statusPurpose": "revocation",
            "statusListIndex": "94567"
        }))
        .unwrap();

        assert_eq!(entry.status_type, "BitstringStatusListEntry");
        assert_eq!(entry.properties["statusPurpose"], json!("revocation"));
    }
}
