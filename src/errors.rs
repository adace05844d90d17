// ABOUTME: Unified error handling with OAuth-standard error codes and HTTP statuses
// ABOUTME: Defines AuthError, the RecordFault consume-failure kinds, and the wire error body
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 idbridge contributors

//! # Error Handling
//!
//! Every failure in the auth subsystem surfaces as an [`AuthError`] carrying
//! an OAuth-standard `error` code and an HTTP status. Callers never have to
//! string-match: the variant is the code, and consume failures additionally
//! carry a [`RecordFault`] so "not found", "expired", and "wrong binding" are
//! distinguishable without parsing messages.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Why a single-use record could not be consumed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecordFault {
    /// No record under that key (never existed, already consumed, or swept)
    NotFound,
    /// The record existed but its TTL had elapsed
    Expired,
    /// The record existed but was bound to different parameters
    /// (redirect URI or PKCE challenge mismatch)
    Mismatch,
}

impl RecordFault {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::NotFound => "not found",
            Self::Expired => "expired",
            Self::Mismatch => "mismatch",
        }
    }
}

/// Unified error type for the auth subsystem.
///
/// The variants are exactly the OAuth-standard error codes this broker can
/// return; nothing else escapes to callers.
#[derive(Debug, Error)]
pub enum AuthError {
    /// Callback state missing, expired, or already consumed (HTTP 400)
    #[error("invalid_state: {0}")]
    InvalidState(String),

    /// Authorization code or upstream code/PKCE verifier invalid, expired,
    /// or already consumed (HTTP 400)
    #[error("invalid_grant: {0}")]
    InvalidGrant(String),

    /// Access token unknown, expired, or revoked (HTTP 401)
    #[error("invalid_token: {0}")]
    InvalidToken(String),

    /// Upstream provider unreachable, returned a malformed response, or the
    /// persistent store failed (HTTP 502)
    #[error("server_error: {0}")]
    ServerError(String),
}

impl AuthError {
    /// Invalid state with a consume-failure kind
    #[must_use]
    pub fn invalid_state(fault: RecordFault) -> Self {
        Self::InvalidState(format!("state {}", fault.as_str()))
    }

    /// Invalid grant with a consume-failure kind
    #[must_use]
    pub fn invalid_grant(fault: RecordFault, what: &str) -> Self {
        Self::InvalidGrant(format!("{what} {}", fault.as_str()))
    }

    /// Invalid access token
    #[must_use]
    pub fn invalid_token(message: impl Into<String>) -> Self {
        Self::InvalidToken(message.into())
    }

    /// Persistent-store failure
    #[must_use]
    pub fn storage(message: impl std::fmt::Display) -> Self {
        Self::ServerError(format!("storage failure: {message}"))
    }

    /// Upstream provider failure. The detail goes to the log, not the client.
    #[must_use]
    pub fn upstream(provider: &str, message: impl std::fmt::Display) -> Self {
        tracing::warn!(provider, error = %message, "upstream provider call failed");
        Self::ServerError(format!("{provider} provider request failed"))
    }

    /// The OAuth-standard `error` code for this failure
    #[must_use]
    pub const fn oauth_code(&self) -> &'static str {
        match self {
            Self::InvalidState(_) => "invalid_state",
            Self::InvalidGrant(_) => "invalid_grant",
            Self::InvalidToken(_) => "invalid_token",
            Self::ServerError(_) => "server_error",
        }
    }

    /// The HTTP status code for this failure
    #[must_use]
    pub const fn http_status(&self) -> u16 {
        match self {
            Self::InvalidState(_) | Self::InvalidGrant(_) => 400,
            Self::InvalidToken(_) => 401,
            Self::ServerError(_) => 502,
        }
    }
}

/// Result type alias for the auth subsystem
pub type AuthResult<T> = Result<T, AuthError>;

/// OAuth 2.0 error body returned to clients (RFC 6749 §5.2 shape)
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorBody {
    pub error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_description: Option<String>,
}

impl From<&AuthError> for ErrorBody {
    fn from(err: &AuthError) -> Self {
        Self {
            error: err.oauth_code().to_owned(),
            error_description: Some(err.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn http_status_follows_taxonomy() {
        assert_eq!(AuthError::invalid_state(RecordFault::NotFound).http_status(), 400);
        assert_eq!(
            AuthError::invalid_grant(RecordFault::Expired, "authorization code").http_status(),
            400
        );
        assert_eq!(AuthError::invalid_token("unknown").http_status(), 401);
        assert_eq!(AuthError::storage("disk gone").http_status(), 502);
    }

    #[test]
    fn error_body_carries_oauth_code() {
        let err = AuthError::invalid_grant(RecordFault::Mismatch, "code_verifier");
        let body = ErrorBody::from(&err);
        assert_eq!(body.error, "invalid_grant");
        assert!(body.error_description.unwrap().contains("mismatch"));
    }
}
