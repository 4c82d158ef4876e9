use http::StatusCode;

use super::{credential::CredentialFormat, keys::KeyUsage};

/// Failure category of an [Error], independent of the component that raised it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// Bad, expired or missing token, or a bad signature.
    Authentication,
    /// The request exceeds what the token grants.
    Authorization,
    /// Malformed request body or scope string.
    Validation,
    /// Presentation definition queries.
    NotImplemented,
    /// Store failures not attributable to the caller.
    Storage,
    /// Signer failures, misconfiguration and other internal faults.
    Unexpected,
    /// The caller canceled the operation.
    Canceled,
    /// The caller-supplied deadline elapsed.
    DeadlineExceeded,
}

impl ErrorKind {
    /// The HTTP status code a transport should answer with.
    pub fn status(self) -> StatusCode {
        match self {
            ErrorKind::Authentication => StatusCode::UNAUTHORIZED,
            ErrorKind::Authorization => StatusCode::FORBIDDEN,
            ErrorKind::Validation => StatusCode::BAD_REQUEST,
            ErrorKind::NotImplemented => StatusCode::NOT_IMPLEMENTED,
            ErrorKind::Storage | ErrorKind::Unexpected => StatusCode::INTERNAL_SERVER_ERROR,
            ErrorKind::Canceled => StatusCode::SERVICE_UNAVAILABLE,
            ErrorKind::DeadlineExceeded => StatusCode::GATEWAY_TIMEOUT,
        }
    }

    /// Stable type tag carried in API error bodies.
    pub fn tag(self) -> &'static str {
        match self {
            ErrorKind::Authentication => "AuthenticationFailed",
            ErrorKind::Authorization => "NotAuthorized",
            ErrorKind::Validation => "InvalidRequest",
            ErrorKind::NotImplemented => "NotImplemented",
            ErrorKind::Storage => "StorageFailure",
            ErrorKind::Unexpected => "Unexpected",
            ErrorKind::Canceled => "Canceled",
            ErrorKind::DeadlineExceeded => "DeadlineExceeded",
        }
    }
}

/// Identity hub error.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// No account exists for the participant context.
    #[error("no account found for participant context '{0}'")]
    AccountNotFound(String),

    /// The participant context could not be resolved.
    #[error("participant context '{0}' could not be resolved")]
    ParticipantNotFound(String),

    /// No activated key exists for the participant and key usage.
    #[error("no active {usage} key found for participant context '{participant}'")]
    KeyNotFound {
        participant: String,
        usage: KeyUsage,
    },

    /// A claim required to build a token is absent from the input claims.
    #[error("missing {0} in the input claims")]
    MissingClaim(String),

    /// No usable bearer credentials were presented.
    #[error("{0}")]
    Unauthenticated(String),

    /// The token could not be decoded.
    #[error("malformed token: {0}")]
    MalformedToken(String),

    /// The token signature could not be verified.
    #[error("token signature could not be verified: {0}")]
    SignatureInvalid(String),

    #[error("token has expired")]
    TokenExpired,

    /// A registered validation rule rejected the token.
    #[error("token validation failed: {0}")]
    TokenValidation(String),

    #[error("audience mismatch: {0}")]
    AudienceMismatch(String),

    /// Proof-of-possession could not be established between outer and inner token.
    #[error("subject mismatch: {0}")]
    SubjectMismatch(String),

    #[error("access token does not contain a 'scope' claim")]
    MissingScopeClaim,

    /// One or more scope strings could not be parsed.
    #[error("invalid scope: {}", .0.join(", "))]
    InvalidScope(Vec<String>),

    /// The request reaches beyond what was granted.
    #[error("unauthorized: {0}")]
    Unauthorized(String),

    #[error("storage failure: {0:#}")]
    Storage(anyhow::Error),

    #[error("signing failed: {0:#}")]
    Signing(anyhow::Error),

    #[error("no presentation generator registered for credential format {0}")]
    NoGeneratorForFormat(CredentialFormat),

    #[error("illegal argument: {0}")]
    IllegalArgument(String),

    /// The request body is malformed.
    #[error("invalid request: {0}")]
    InvalidRequest(String),

    #[error("{0} is not implemented")]
    NotImplemented(String),

    #[error("operation was canceled")]
    Canceled,

    #[error("deadline exceeded")]
    DeadlineExceeded,
}

impl Error {
    /// Returns the taxonomy category of this error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::Unauthenticated(_)
            | Error::ParticipantNotFound(_)
            | Error::MalformedToken(_)
            | Error::SignatureInvalid(_)
            | Error::TokenExpired
            | Error::TokenValidation(_)
            | Error::AudienceMismatch(_)
            | Error::SubjectMismatch(_)
            | Error::MissingScopeClaim => ErrorKind::Authentication,
            Error::Unauthorized(_) => ErrorKind::Authorization,
            Error::AccountNotFound(_)
            | Error::MissingClaim(_)
            | Error::InvalidScope(_)
            | Error::InvalidRequest(_) => ErrorKind::Validation,
            Error::NotImplemented(_) => ErrorKind::NotImplemented,
            Error::Storage(_) => ErrorKind::Storage,
            Error::KeyNotFound { .. }
            | Error::Signing(_)
            | Error::NoGeneratorForFormat(_)
            | Error::IllegalArgument(_) => ErrorKind::Unexpected,
            Error::Canceled => ErrorKind::Canceled,
            Error::DeadlineExceeded => ErrorKind::DeadlineExceeded,
        }
    }

    pub(crate) fn illegal_argument(msg: impl ToString) -> Self {
        Self::IllegalArgument(msg.to_string())
    }
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
