//! Error taxonomy shared by both platform clients.
//!
//! Each component boundary reports failures as an enum variant rather than a
//! message string, so callers can pattern-match on the kind instead of
//! inspecting `error.message` text. Authentication and network errors abort
//! the whole operation; row-level parse failures never reach this type (they
//! are logged and skipped inside the extractor).
//!
//! All variants are `Clone` because the request cache shares one settled
//! result between concurrent callers.

use crate::models::Platform;
use std::time::Duration;
use thiserror::Error;

/// Failures of the Gradescope login sequence.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AuthError {
    /// The login page did not carry a CSRF meta tag. The login POST is never
    /// attempted with an empty token.
    #[error("CSRF token not found on login page")]
    CsrfNotFound,

    /// The platform rejected the email/password pair.
    #[error("invalid email or password")]
    InvalidCredentials,

    /// A 2FA/CAPTCHA/verification wall was detected. Terminal: the engine
    /// never attempts to guess around it.
    #[error("platform requires additional verification (2FA or CAPTCHA)")]
    VerificationRequired,

    /// The login flow produced a response outside the known state machine.
    #[error("unexpected login response: {0}")]
    UnexpectedResponse(String),
}

/// Transport-level failures.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum NetworkError {
    /// The bounded per-call timeout elapsed before the response arrived.
    #[error("request timed out after {0:?}")]
    Timeout(Duration),

    /// DNS, TLS, or socket failure before a response was produced.
    #[error("connection failed: {0}")]
    ConnectionFailed(String),
}

/// The remote platform answered, but not usefully.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum UpstreamError {
    /// A status code outside the expected set for this endpoint.
    #[error("unexpected status {status} from {endpoint}")]
    UnexpectedStatus { status: u16, endpoint: String },

    /// The platform no longer accepts the supplied credentials or session.
    #[error("{platform} rejected the supplied credentials or session")]
    UnauthorizedResponse { platform: Platform },
}

/// Top-level error surfaced to callers of the crate facade.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum Error {
    #[error("authentication failed: {0}")]
    Auth(#[from] AuthError),

    #[error("network error: {0}")]
    Network(#[from] NetworkError),

    #[error("upstream error: {0}")]
    Upstream(#[from] UpstreamError),

    /// The credential variant does not match the requested platform, e.g. a
    /// bearer token handed to the Gradescope client. Caller error, never a
    /// silent fallback.
    #[error("credential shape does not match platform {0}")]
    CredentialMismatch(Platform),

    /// A session built from externally captured cookies is missing the
    /// cookies required for authenticated requests.
    #[error("session is missing required cookies: {0}")]
    UnusableSession(String),
}

impl Error {
    /// Whether a retry with backoff is worthwhile. Only transient transport
    /// failures and upstream 429/5xx qualify; authentication outcomes and
    /// timeouts are final for the current attempt chain.
    pub fn is_retryable(&self) -> bool {
        match self {
            Error::Network(NetworkError::ConnectionFailed(_)) => true,
            Error::Upstream(UpstreamError::UnexpectedStatus { status, .. }) => {
                *status == 429 || *status >= 500
            }
            _ => false,
        }
    }
}

/// Map a `reqwest` failure onto the taxonomy. Timeouts configured on the
/// client surface as `is_timeout`; everything else pre-response is a
/// connection failure.
pub fn from_reqwest(e: reqwest::Error, timeout: Duration) -> Error {
    if e.is_timeout() {
        Error::Network(NetworkError::Timeout(timeout))
    } else {
        Error::Network(NetworkError::ConnectionFailed(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_retryable_statuses() {
        let too_many = Error::Upstream(UpstreamError::UnexpectedStatus {
            status: 429,
            endpoint: "/api/v1/courses".to_string(),
        });
        let server = Error::Upstream(UpstreamError::UnexpectedStatus {
            status: 503,
            endpoint: "/api/v1/courses".to_string(),
        });
        let not_found = Error::Upstream(UpstreamError::UnexpectedStatus {
            status: 404,
            endpoint: "/api/v1/courses".to_string(),
        });
        assert!(too_many.is_retryable());
        assert!(server.is_retryable());
        assert!(!not_found.is_retryable());
    }

    #[test]
    fn test_auth_errors_never_retryable() {
        assert!(!Error::Auth(AuthError::InvalidCredentials).is_retryable());
        assert!(!Error::Auth(AuthError::VerificationRequired).is_retryable());
    }

    #[test]
    fn test_timeout_not_retryable() {
        let e = Error::Network(NetworkError::Timeout(Duration::from_secs(4)));
        assert!(!e.is_retryable());
    }

    #[test]
    fn test_error_messages_are_actionable() {
        let wrong = Error::Auth(AuthError::InvalidCredentials);
        let wall = Error::Auth(AuthError::VerificationRequired);
        assert_ne!(wrong.to_string(), wall.to_string());
        assert!(wall.to_string().contains("verification"));
    }
}
