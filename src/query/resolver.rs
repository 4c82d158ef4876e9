use std::{
    collections::{BTreeMap, BTreeSet},
    sync::Arc,
};

use anyhow::bail;
use futures::future::{join_all, try_join_all};
use tracing::{debug, warn};

use crate::{
    core::{
        credential::{CredentialContainer, CredentialRecord, VcState},
        criterion::{Criterion, Operator, QuerySpec},
        store::CredentialStore,
        Error, Result,
    },
    revocation::RevocationChecker,
    utils::{Clock, SystemClock},
};

use super::scope::{parse_all, ScopeResolver, ScopeTransformer};

/// Decides which stored credentials a party may receive, given the scopes its token grants and
/// the scopes it asks for.
#[derive(Debug, Clone)]
pub struct CredentialResolver {
    store: Arc<dyn CredentialStore>,
    scopes: Arc<dyn ScopeTransformer>,
    revocation: Arc<dyn RevocationChecker>,
    clock: Arc<dyn Clock>,
}

impl CredentialResolver {
    pub fn builder() -> CredentialResolverBuilder {
        CredentialResolverBuilder::default()
    }

    /// Resolve the credentials of `participant_context_id` that may be presented.
    ///
    /// Every requested credential must also be reachable through a granted scope, otherwise the
    /// call fails with [Error::Unauthorized]. With no requested scopes, everything granted is
    /// returned. Credentials outside their validity period, or rejected by the revocation
    /// checker, are left out of the result.
    pub async fn query<R, G>(
        &self,
        participant_context_id: &str,
        requested_scopes: &[R],
        granted_scopes: &[G],
    ) -> Result<Vec<CredentialContainer>>
    where
        R: AsRef<str>,
        G: AsRef<str>,
    {
        let granted = parse_all(self.scopes.as_ref(), granted_scopes)?;

        if granted.is_empty() {
            if requested_scopes.is_empty() {
                return Ok(Vec::new());
            }
            warn!(
                "no scopes were granted to query credentials of '{participant_context_id}', \
                but {} were requested",
                requested_scopes.len()
            );
            return Err(Error::Unauthorized(
                "Permission was not granted on any credentials.".into(),
            ));
        }

        let allowed = self.query_all(participant_context_id, granted).await?;

        let candidates = if requested_scopes.is_empty() {
            allowed
        } else {
            let requested = parse_all(self.scopes.as_ref(), requested_scopes)?;
            let requested = self.query_all(participant_context_id, requested).await?;

            let allowed_ids: BTreeSet<&String> = allowed.keys().collect();
            if let Some(id) = requested.keys().find(|id| !allowed_ids.contains(id)) {
                debug!("requested credential '{id}' is not covered by the granted scopes");
                return Err(Error::Unauthorized(
                    "Not all requested credentials are covered by the granted scopes.".into(),
                ));
            }
            requested
        };

        Ok(self
            .filter_valid(candidates.into_values())
            .await
            .into_iter()
            .map(|record| record.verifiable_credential)
            .collect())
    }

    /// Run one store query per criterion concurrently and union the results by credential id.
    async fn query_all(
        &self,
        participant_context_id: &str,
        criteria: Vec<Criterion>,
    ) -> Result<BTreeMap<String, CredentialRecord>> {
        let queries = criteria.into_iter().map(|criterion| {
            let spec = QuerySpec::new(vec![
                criterion,
                Criterion::new(
                    "participantContextId",
                    Operator::Equal,
                    participant_context_id,
                ),
                Criterion::new("state", Operator::NotEqual, VcState::Revoked.code()),
                Criterion::new("state", Operator::NotEqual, VcState::Expired.code()),
            ]);
            async move { self.store.query(&spec).await }
        });

        let results = try_join_all(queries).await.map_err(Error::Storage)?;

        Ok(results
            .into_iter()
            .flatten()
            .map(|record| (record.id.clone(), record))
            .collect())
    }

    async fn filter_valid(
        &self,
        candidates: impl Iterator<Item = CredentialRecord>,
    ) -> Vec<CredentialRecord> {
        let now = self.clock.now();
        let checks = candidates.map(|record| async move {
            match self.check_validity(&record, now).await {
                Ok(()) => Some(record),
                Err(e) => {
                    warn!("Credential '{}' not valid: {e:#}", record.id);
                    None
                }
            }
        });
        join_all(checks).await.into_iter().flatten().collect()
    }

    async fn check_validity(
        &self,
        record: &CredentialRecord,
        now: chrono::DateTime<chrono::Utc>,
    ) -> anyhow::Result<()> {
        if record.issuance_date > now {
            bail!("issuance date {} is in the future", record.issuance_date)
        }
        if let Some(expiration) = record.expiration_date {
            if expiration < now {
                bail!("expired on {expiration}")
            }
        }
        if !record.credential_status.is_empty() {
            self.revocation.check_validity(record).await?;
        }
        Ok(())
    }
}

/// Builder struct for [CredentialResolver].
#[derive(Debug, Clone, Default)]
pub struct CredentialResolverBuilder {
    store: Option<Arc<dyn CredentialStore>>,
    scopes: Option<Arc<dyn ScopeTransformer>>,
    revocation: Option<Arc<dyn RevocationChecker>>,
    clock: Option<Arc<dyn Clock>>,
}

impl CredentialResolverBuilder {
    pub fn build(self) -> anyhow::Result<CredentialResolver> {
        let Some(store) = self.store else {
            bail!("credential store is required, see `with_store`")
        };
        let Some(revocation) = self.revocation else {
            bail!("revocation checker is required, see `with_revocation_checker`")
        };

        Ok(CredentialResolver {
            store,
            scopes: self
                .scopes
                .unwrap_or_else(|| Arc::new(ScopeResolver::default())),
            revocation,
            clock: self.clock.unwrap_or_else(|| Arc::new(SystemClock)),
        })
    }

    pub fn with_store(mut self, store: Arc<dyn CredentialStore>) -> Self {
        self.store = Some(store);
        self
    }

    /// Defaults to [ScopeResolver::default].
    pub fn with_scope_transformer(mut self, scopes: Arc<dyn ScopeTransformer>) -> Self {
        self.scopes = Some(scopes);
        self
    }

    pub fn with_revocation_checker(mut self, revocation: Arc<dyn RevocationChecker>) -> Self {
        self.revocation = Some(revocation);
        self
    }

    /// Defaults to [SystemClock].
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = Some(clock);
        self
    }
}

#[cfg(test)]
mod test {
    use chrono::{Duration, Utc};
    use serde_json::Map;

    use super::*;
    use crate::{
        core::{
            credential::{
                CredentialDescription, CredentialFormat, CredentialStatusEntry,
            },
            store::MemoryCredentialStore,
        },
        revocation::{MemoryStatusList, RevocationRegistry, BITSTRING_STATUS_LIST},
    };

    const MEMBERSHIP: &str = "org.eclipse.edc.vc.type:MembershipCredential:read";
    const DISMANTLER: &str = "org.eclipse.edc.vc.type:DismantlerCredential:read";

    fn record(id: &str, participant: &str, credential_type: &str) -> CredentialRecord {
        CredentialRecord {
            id: id.into(),
            participant_context_id: participant.into(),
            state: VcState::Issued,
            issuance_date: Utc::now() - Duration::days(1),
            expiration_date: None,
            credential_status: Vec::new(),
            verifiable_credential: CredentialContainer {
                raw_vc: format!("raw-{id}"),
                format: CredentialFormat::Vc1Jwt,
                credential: CredentialDescription {
                    id: Some(format!("urn:uuid:{id}")),
                    types: vec!["VerifiableCredential".into(), credential_type.into()],
                    issuer: Some("did:web:issuer".into()),
                },
            },
        }
    }

    async fn fixture() -> (MemoryCredentialStore, MemoryStatusList, CredentialResolver) {
        let store = MemoryCredentialStore::new();
        let status_list = MemoryStatusList::new();
        let resolver = CredentialResolver::builder()
            .with_store(Arc::new(store.clone()))
            .with_revocation_checker(Arc::new(
                RevocationRegistry::builder()
                    .with_checker(BITSTRING_STATUS_LIST, Arc::new(status_list.clone()))
                    .build(),
            ))
            .build()
            .unwrap();
        (store, status_list, resolver)
    }

    fn raw_ids(containers: &[CredentialContainer]) -> Vec<&str> {
        containers.iter().map(|c| c.raw_vc.as_str()).collect()
    }

    #[tokio::test]
    async fn returns_everything_granted_when_nothing_requested() {
        let (store, _, resolver) = fixture().await;
        store.insert(record("1", "alice", "MembershipCredential")).await;
        store.insert(record("2", "alice", "DismantlerCredential")).await;
        store.insert(record("3", "bob", "MembershipCredential")).await;

        let result = resolver
            .query::<&str, _>("alice", &[], &[MEMBERSHIP])
            .await
            .unwrap();

        assert_eq!(raw_ids(&result), vec!["raw-1"]);
    }

    #[tokio::test]
    async fn empty_grant_rejects_without_querying() {
        let (store, _, resolver) = fixture().await;

        let result = resolver
            .query::<_, &str>("alice", &[MEMBERSHIP], &[])
            .await;

        assert!(matches!(result, Err(Error::Unauthorized(_))));
        assert_eq!(store.query_count(), 0);
    }

    #[tokio::test]
    async fn empty_grant_and_request_is_empty() {
        let (store, _, resolver) = fixture().await;

        let result = resolver
            .query::<&str, &str>("alice", &[], &[])
            .await
            .unwrap();

        assert!(result.is_empty());
        assert_eq!(store.query_count(), 0);
    }

    #[tokio::test]
    async fn invalid_granted_scope_aborts() {
        let (store, _, resolver) = fixture().await;

        let result = resolver
            .query::<&str, _>("alice", &[], &[MEMBERSHIP, "membership:read"])
            .await;

        assert!(matches!(result, Err(Error::InvalidScope(_))));
        assert_eq!(store.query_count(), 0);
    }

    #[tokio::test]
    async fn requested_must_be_covered_by_granted() {
        let (store, _, resolver) = fixture().await;
        store.insert(record("1", "alice", "MembershipCredential")).await;
        store.insert(record("2", "alice", "DismantlerCredential")).await;

        let result = resolver
            .query("alice", &[DISMANTLER], &[MEMBERSHIP])
            .await;
        assert!(matches!(result, Err(Error::Unauthorized(_))));

        let result = resolver
            .query("alice", &[MEMBERSHIP], &[MEMBERSHIP, DISMANTLER])
            .await
            .unwrap();
        assert_eq!(raw_ids(&result), vec!["raw-1"]);
    }

    #[tokio::test]
    async fn containment_is_checked_on_credential_ids() {
        let (store, _, resolver) = fixture().await;
        let mut both = record("1", "alice", "MembershipCredential");
        both.verifiable_credential
            .credential
            .types
            .push("DismantlerCredential".into());
        store.insert(both).await;

        // different scope strings resolving to the same credential
        let result = resolver
            .query("alice", &[DISMANTLER], &[MEMBERSHIP])
            .await
            .unwrap();
        assert_eq!(raw_ids(&result), vec!["raw-1"]);
    }

    #[tokio::test]
    async fn granted_queries_are_merged_without_duplicates() {
        let (store, _, resolver) = fixture().await;
        let mut both = record("1", "alice", "MembershipCredential");
        both.verifiable_credential
            .credential
            .types
            .push("DismantlerCredential".into());
        store.insert(both).await;
        store.insert(record("2", "alice", "DismantlerCredential")).await;

        let result = resolver
            .query::<&str, _>("alice", &[], &[MEMBERSHIP, DISMANTLER])
            .await
            .unwrap();

        assert_eq!(raw_ids(&result), vec!["raw-1", "raw-2"]);
        assert_eq!(store.query_count(), 2);
    }

    #[tokio::test]
    async fn drops_invalid_credentials() {
        let (store, status_list, resolver) = fixture().await;
        let mut expired = record("1", "alice", "MembershipCredential");
        expired.expiration_date = Some(Utc::now() - Duration::hours(1));
        let mut not_yet_valid = record("2", "alice", "MembershipCredential");
        not_yet_valid.issuance_date = Utc::now() + Duration::hours(1);
        let mut revoked_state = record("3", "alice", "MembershipCredential");
        revoked_state.state = VcState::Revoked;
        let mut revoked_status = record("4", "alice", "MembershipCredential");
        revoked_status.credential_status = vec![CredentialStatusEntry {
            id: "https://example.com/status/1#4".into(),
            status_type: BITSTRING_STATUS_LIST.into(),
            properties: Map::new(),
        }];
        let mut good_status = record("5", "alice", "MembershipCredential");
        good_status.credential_status = vec![CredentialStatusEntry {
            id: "https://example.com/status/1#5".into(),
            status_type: BITSTRING_STATUS_LIST.into(),
            properties: Map::new(),
        }];
        let mut unknown_status = record("6", "alice", "MembershipCredential");
        unknown_status.credential_status = vec![CredentialStatusEntry {
            id: "https://example.com/status/2#6".into(),
            status_type: "StatusList2021Entry".into(),
            properties: Map::new(),
        }];
        for r in [
            expired,
            not_yet_valid,
            revoked_state,
            revoked_status,
            good_status,
            unknown_status,
            record("7", "alice", "MembershipCredential"),
        ] {
            store.insert(r).await;
        }
        status_list.revoke("https://example.com/status/1#4").await;

        let result = resolver
            .query::<&str, _>("alice", &[], &[MEMBERSHIP])
            .await
            .unwrap();

        assert_eq!(raw_ids(&result), vec!["raw-5", "raw-7"]);
    }

    #[tokio::test]
    async fn missing_store_is_a_build_error() {
        let result = CredentialResolver::builder()
            .with_revocation_checker(Arc::new(RevocationRegistry::default()))
            .build();
        assert!(result.is_err());
    }
}
