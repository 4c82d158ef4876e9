//! Transport-agnostic presentation query endpoint (`POST /presentation/query`).
//!
//! [PresentationApi] turns a request into an [http::Response] carrying a JSON body, so that any
//! HTTP server can mount it.

use std::{future::Future, pin::pin, sync::Arc, time::Duration};

use anyhow::bail;
use futures::future::{select, Either};
use http::{header::CONTENT_TYPE, HeaderValue, Response, StatusCode};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value as Json};
use tracing::{debug, warn};

use crate::{
    core::{
        claims, jws,
        participant::ParticipantDirectory,
        Error, ErrorKind, Result,
    },
    presentation::{PresentationPackager, PresentationResponse},
    query::CredentialResolver,
    token::TokenVerifier,
};

const BEARER: &str = "Bearer ";

/// Body of a presentation query.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PresentationQueryMessage {
    #[serde(default)]
    pub scope: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub presentation_definition: Option<Json>,
}

impl PresentationQueryMessage {
    /// Scopes and a presentation definition are mutually exclusive.
    pub fn validate(&self) -> Result<()> {
        if !self.scope.is_empty() && self.presentation_definition.is_some() {
            return Err(Error::InvalidRequest(
                "scope and presentationDefinition are mutually exclusive".into(),
            ));
        }
        Ok(())
    }
}

/// Answers presentation queries of counterparties on behalf of the hub's participants.
#[derive(Debug, Clone)]
pub struct PresentationApi {
    participants: Arc<dyn ParticipantDirectory>,
    verifier: TokenVerifier,
    resolver: CredentialResolver,
    packager: PresentationPackager,
}

impl PresentationApi {
    pub fn builder() -> PresentationApiBuilder {
        PresentationApiBuilder::default()
    }

    /// Handle a presentation query addressed to `participant_context_id`.
    ///
    /// `authorization` is the raw value of the `Authorization` header, if any.
    pub async fn query(
        &self,
        participant_context_id: &str,
        authorization: Option<&str>,
        body: &Json,
    ) -> Response<Json> {
        respond(
            self.handle(participant_context_id, authorization, body)
                .await,
        )
    }

    /// Like [PresentationApi::query], but gives up once `deadline` has elapsed.
    ///
    /// In-flight store, key and signing calls are dropped.
    pub async fn query_with_deadline(
        &self,
        participant_context_id: &str,
        authorization: Option<&str>,
        body: &Json,
        deadline: Duration,
    ) -> Response<Json> {
        let result = tokio::time::timeout(
            deadline,
            self.handle(participant_context_id, authorization, body),
        )
        .await
        .unwrap_or_else(|_| {
            debug!("presentation query for '{participant_context_id}' exceeded its deadline");
            Err(Error::DeadlineExceeded)
        });
        respond(result)
    }

    /// Like [PresentationApi::query], but aborts as soon as `cancel` completes.
    pub async fn query_with_cancellation<C>(
        &self,
        participant_context_id: &str,
        authorization: Option<&str>,
        body: &Json,
        cancel: C,
    ) -> Response<Json>
    where
        C: Future<Output = ()>,
    {
        let work = pin!(self.handle(participant_context_id, authorization, body));
        let cancel = pin!(cancel);
        let result = match select(work, cancel).await {
            Either::Left((result, _)) => result,
            Either::Right(((), _)) => {
                debug!("presentation query for '{participant_context_id}' was canceled");
                Err(Error::Canceled)
            }
        };
        respond(result)
    }

    /// Verify the bearer token, resolve the credentials it grants access to and package them.
    pub async fn query_presentation(
        &self,
        participant_context_id: &str,
        authorization: Option<&str>,
        message: PresentationQueryMessage,
    ) -> Result<PresentationResponse> {
        let token = bearer_token(authorization)?;
        message.validate()?;

        if message.presentation_definition.is_some() {
            warn!("presentation definition queries are not supported");
            return Err(Error::NotImplemented(
                "Querying with a DIF Presentation Exchange definition".into(),
            ));
        }

        self.participants
            .resolve(participant_context_id)
            .await
            .map_err(Error::Storage)?
            .ok_or_else(|| Error::ParticipantNotFound(participant_context_id.to_owned()))?;

        let granted = self.verifier.verify(token, participant_context_id).await?;

        // signature and claims were verified above
        let (_, token_claims) =
            jws::decode_unverified(token).map_err(|e| Error::MalformedToken(format!("{e:#}")))?;
        let audience = token_claims.get_str(claims::ISSUER);

        let credentials = self
            .resolver
            .query(participant_context_id, &message.scope, &granted)
            .await?;

        self.packager
            .create_presentation(participant_context_id, credentials, None, audience)
            .await
    }

    async fn handle(
        &self,
        participant_context_id: &str,
        authorization: Option<&str>,
        body: &Json,
    ) -> Result<PresentationResponse> {
        // an unauthenticated caller learns nothing about the body
        bearer_token(authorization)?;
        let message = PresentationQueryMessage::deserialize(body)
            .map_err(|e| Error::InvalidRequest(e.to_string()))?;
        self.query_presentation(participant_context_id, authorization, message)
            .await
    }
}

fn bearer_token(authorization: Option<&str>) -> Result<&str> {
    let Some(header) = authorization else {
        return Err(Error::Unauthenticated(
            "Authorization header missing".into(),
        ));
    };
    let Some(token) = header.strip_prefix(BEARER) else {
        return Err(Error::Unauthenticated(
            "Authorization header must be a bearer token".into(),
        ));
    };
    let token = token.trim();
    if token.is_empty() {
        return Err(Error::Unauthenticated("bearer token is empty".into()));
    }
    Ok(token)
}

/// An error body `{"message", "type"}`.
///
/// Authentication, authorization and internal failures only reveal their category.
pub fn error_response(error: &Error) -> Response<Json> {
    let kind = error.kind();
    let message = match kind {
        ErrorKind::Authentication => "Authentication failed.".to_owned(),
        ErrorKind::Authorization => "Not authorized.".to_owned(),
        ErrorKind::Storage | ErrorKind::Unexpected => "Internal error.".to_owned(),
        _ => error.to_string(),
    };
    warn!("presentation query failed: {error}");
    json_response(
        kind.status(),
        json!({"message": message, "type": kind.tag()}),
    )
}

fn respond(result: Result<PresentationResponse>) -> Response<Json> {
    match result.and_then(|response| {
        serde_json::to_value(response)
            .map_err(|e| Error::illegal_argument(format!("response not serializable: {e}")))
    }) {
        Ok(body) => json_response(StatusCode::OK, body),
        Err(error) => error_response(&error),
    }
}

fn json_response(status: StatusCode, body: Json) -> Response<Json> {
    let mut response = Response::new(body);
    *response.status_mut() = status;
    response
        .headers_mut()
        .insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
    response
}

/// Builder struct for [PresentationApi].
#[derive(Debug, Clone, Default)]
pub struct PresentationApiBuilder {
    participants: Option<Arc<dyn ParticipantDirectory>>,
    verifier: Option<TokenVerifier>,
    resolver: Option<CredentialResolver>,
    packager: Option<PresentationPackager>,
}

impl PresentationApiBuilder {
    pub fn build(self) -> anyhow::Result<PresentationApi> {
        let Some(participants) = self.participants else {
            bail!("participant directory is required, see `with_participants`")
        };
        let Some(verifier) = self.verifier else {
            bail!("token verifier is required, see `with_verifier`")
        };
        let Some(resolver) = self.resolver else {
            bail!("credential resolver is required, see `with_resolver`")
        };
        let Some(packager) = self.packager else {
            bail!("presentation packager is required, see `with_packager`")
        };

        Ok(PresentationApi {
            participants,
            verifier,
            resolver,
            packager,
        })
    }

    pub fn with_participants(mut self, participants: Arc<dyn ParticipantDirectory>) -> Self {
        self.participants = Some(participants);
        self
    }

    pub fn with_verifier(mut self, verifier: TokenVerifier) -> Self {
        self.verifier = Some(verifier);
        self
    }

    pub fn with_resolver(mut self, resolver: CredentialResolver) -> Self {
        self.resolver = Some(resolver);
        self
    }

    pub fn with_packager(mut self, packager: PresentationPackager) -> Self {
        self.packager = Some(packager);
        self
    }
}
