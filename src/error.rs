//! Error taxonomy for the synchronization pipeline.
//!
//! The transport layer resolves retryable failures (rate limits, server errors)
//! internally. Everything that reaches a caller is fatal for the current run and
//! is surfaced through [`SyncError`]; authentication problems are grouped in
//! [`AuthError`] so the CLI can point the user back to `spurge auth`.

use std::time::Duration;

/// Authentication and authorization failures. All of them are fatal.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AuthError {
    /// No token is stored, or the API rejected it even after a refresh.
    #[error("not authenticated, run `spurge auth`")]
    Unauthenticated,

    /// The token lacks a scope required by the endpoint.
    #[error("insufficient client scope, run `spurge auth` again")]
    InsufficientScope,

    /// A refresh was needed but `SPOTIFY_API_AUTH_CLIENT_ID` is not configured.
    #[error("missing client id, set SPOTIFY_API_AUTH_CLIENT_ID")]
    MissingClientId,

    /// The refresh token was revoked or expired; the stored token was discarded.
    #[error("refresh token rejected (invalid_grant), run `spurge auth`")]
    InvalidGrant,

    /// The token endpoint failed for any other reason.
    #[error("token request failed: {message}")]
    TokenRequestFailed { message: String },
}

/// Errors surfaced by the transport, resolver, planner and executor.
#[derive(Debug, thiserror::Error)]
pub enum SyncError {
    #[error(transparent)]
    Auth(#[from] AuthError),

    /// 429 from the API. Only used inside the transport retry loop.
    #[error("rate limited: retry after {retry_after:?}")]
    RateLimited { retry_after: Duration },

    /// 5xx that persisted after every retry attempt.
    #[error("server error after retries: HTTP {status}: {body}")]
    Server { status: u16, body: String },

    /// Any other non-success status.
    #[error("HTTP {status}: {body}")]
    Http { status: u16, body: String },

    #[error("network error: {message}")]
    Network { message: String },

    #[error("invalid response: {message}")]
    Decode { message: String },

    #[error("storage error: {message}")]
    Storage { message: String },

    /// Another resolve/plan/apply run is already in flight.
    #[error("another run is already in progress")]
    Busy,

    #[error("invalid input: {message}")]
    Input { message: String },
}

impl SyncError {
    /// Exit code for the CLI.
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::Input { .. } | Self::Busy => 1,
            Self::Auth(_) => 2,
            Self::RateLimited { .. } | Self::Server { .. } | Self::Network { .. } => 3,
            Self::Http { .. } | Self::Decode { .. } => 4,
            Self::Storage { .. } => 5,
        }
    }

    /// Whether the error forces the user to log in again.
    pub fn requires_login(&self) -> bool {
        matches!(
            self,
            Self::Auth(AuthError::Unauthenticated)
                | Self::Auth(AuthError::InvalidGrant)
                | Self::Auth(AuthError::InsufficientScope)
        )
    }
}

impl From<reqwest::Error> for SyncError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_decode() {
            Self::Decode {
                message: err.to_string(),
            }
        } else {
            Self::Network {
                message: err.to_string(),
            }
        }
    }
}

impl From<serde_json::Error> for SyncError {
    fn from(err: serde_json::Error) -> Self {
        Self::Decode {
            message: err.to_string(),
        }
    }
}

impl From<std::io::Error> for SyncError {
    fn from(err: std::io::Error) -> Self {
        Self::Storage {
            message: err.to_string(),
        }
    }
}
