// ABOUTME: Core data model for the identity broker - state, auth code, and session records
// ABOUTME: Plus the normalized UserInfo, upstream GrantResult, and request-scoped UserContext
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 idbridge contributors

//! # Broker Data Model
//!
//! Three persisted record kinds drive the broker flow:
//!
//! - [`StateRecord`] binds an upstream callback to the authorize request that
//!   started it (CSRF protection), consumed exactly once.
//! - [`AuthCodeRecord`] is the broker-issued code handed back to the client
//!   after upstream login, consumed exactly once.
//! - [`StoredSession`] is the logical login: the broker token pair plus the
//!   bound upstream credentials and normalized identity.
//!
//! [`UserInfo`] and [`GrantResult`] are produced by provider adapters and are
//! independent of any upstream schema.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A pending authorize request awaiting the upstream callback.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StateRecord {
    /// Opaque random state value round-tripped through the upstream provider
    pub state: String,
    /// Client that initiated the authorize request
    pub client_id: String,
    /// The client's redirect URI, where the broker auth code will be delivered
    pub redirect_uri: String,
    /// PKCE challenge supplied by the client, verified at the token endpoint
    pub code_challenge: Option<String>,
    /// PKCE challenge method (`S256` or `plain`)
    pub code_challenge_method: Option<String>,
    /// The broker's own PKCE verifier for the upstream leg. The client's
    /// verifier is unknown at callback time, so the broker binds the upstream
    /// code to a pair it generates itself.
    pub upstream_code_verifier: Option<String>,
    /// The client's own `state` parameter, round-tripped on the final
    /// redirect. `None` means the redirect must omit the parameter entirely.
    pub client_state: Option<String>,
    /// Scopes requested by the client
    pub scopes: Vec<String>,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

impl StateRecord {
    #[must_use]
    pub fn is_expired(&self) -> bool {
        Utc::now() > self.expires_at
    }
}

/// A broker-issued authorization code bound to a freshly minted session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthCodeRecord {
    /// Opaque random code value
    pub code: String,
    /// Session the code redeems into
    pub session_id: String,
    /// The client redirect URI the code was delivered to
    pub redirect_uri: String,
    /// PKCE challenge carried over from the consumed state, verified at the
    /// token endpoint
    pub code_challenge: Option<String>,
    /// PKCE challenge method carried over from the consumed state
    pub code_challenge_method: Option<String>,
    /// Scopes granted to the session
    pub scopes: Vec<String>,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

impl AuthCodeRecord {
    #[must_use]
    pub fn is_expired(&self) -> bool {
        Utc::now() > self.expires_at
    }
}

/// A logical login session: broker token pair plus upstream credentials.
#[derive(Debug, Clone)]
pub struct StoredSession {
    pub session_id: String,
    /// Which provider adapter authenticated this session
    pub provider: String,
    /// Normalized identity fetched from the provider at login
    pub user_info: UserInfo,
    /// Broker access token presented by the client on every request
    pub access_token: String,
    /// Broker refresh token, stable across access-token rotations
    pub refresh_token: String,
    /// Upstream provider access token, for pass-through calls
    pub provider_access_token: Option<String>,
    /// Upstream provider refresh token, if the provider issued one
    pub provider_refresh_token: Option<String>,
    /// When the upstream access token expires, if known
    pub provider_expires_at: Option<DateTime<Utc>>,
    pub scopes: Vec<String>,
    pub created_at: DateTime<Utc>,
    /// When the current broker access token was minted; moves on refresh
    pub issued_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

impl StoredSession {
    #[must_use]
    pub fn is_expired(&self) -> bool {
        Utc::now() > self.expires_at
    }

    /// Whether the upstream access token has run out and a refresh against
    /// the provider is due.
    #[must_use]
    pub fn provider_token_expired(&self) -> bool {
        self.provider_expires_at
            .is_some_and(|expires_at| Utc::now() > expires_at)
    }
}

/// Normalized identity returned by any provider adapter.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct UserInfo {
    /// Provider that authenticated the user
    pub provider: String,
    /// Stable user identifier within the provider
    pub user_id: String,
    /// Login/handle within the provider
    pub username: String,
    /// Display name, if the provider exposes one
    pub name: Option<String>,
    /// Verified email, if the provider exposes one
    pub email: Option<String>,
    /// Scopes the provider actually granted
    pub provider_scopes_granted: Vec<String>,
    /// The raw profile document, kept for collaborators that need
    /// provider-specific claims
    pub raw_profile: Option<serde_json::Value>,
}

/// Result of a code exchange or refresh against the upstream provider.
///
/// Transient: feeds a [`StoredSession`], never persisted directly.
#[derive(Debug, Clone)]
pub struct GrantResult {
    pub access_token: String,
    pub refresh_token: Option<String>,
    pub expires_at: Option<DateTime<Utc>>,
    pub provider_scopes_granted: Option<Vec<String>>,
}

/// Token endpoint response handed to the client.
///
/// The upstream tokens ride along for in-process collaborators that call the
/// provider API on the user's behalf; `#[serde(skip)]` keeps them off the
/// wire unconditionally.
#[derive(Debug, Clone, Serialize)]
pub struct AccessTokenResponse {
    pub access_token: String,
    pub token_type: String,
    pub expires_in: i64,
    pub refresh_token: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub scope: Option<String>,
    #[serde(skip)]
    pub provider_access_token: Option<String>,
    #[serde(skip)]
    pub provider_refresh_token: Option<String>,
}

/// Identity resolved for one request, passed explicitly to downstream
/// collaborators for the duration of that request only.
#[derive(Debug, Clone)]
pub struct UserContext {
    pub session_id: String,
    pub provider: String,
    pub user_id: String,
    pub username: String,
    pub email: Option<String>,
    /// Upstream access token for pass-through provider calls
    pub provider_access_token: Option<String>,
    pub scopes: Vec<String>,
}

impl UserContext {
    /// Build a request context from a validated session.
    #[must_use]
    pub fn from_session(session: &StoredSession) -> Self {
        Self {
            session_id: session.session_id.clone(),
            provider: session.provider.clone(),
            user_id: session.user_info.user_id.clone(),
            username: session.user_info.username.clone(),
            email: session.user_info.email.clone(),
            provider_access_token: session.provider_access_token.clone(),
            scopes: session.scopes.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn sample_session(expires_in: Duration) -> StoredSession {
        let now = Utc::now();
        StoredSession {
            session_id: "sess-1".into(),
            provider: "synthetic".into(),
            user_info: UserInfo {
                provider: "synthetic".into(),
                user_id: "u1".into(),
                username: "testuser".into(),
                name: None,
                email: Some("test@example.com".into()),
                provider_scopes_granted: vec!["read".into()],
                raw_profile: None,
            },
            access_token: "bat_x".into(),
            refresh_token: "brt_x".into(),
            provider_access_token: Some("upstream".into()),
            provider_refresh_token: None,
            provider_expires_at: None,
            scopes: vec!["read".into()],
            created_at: now,
            issued_at: now,
            expires_at: now + expires_in,
        }
    }

    #[test]
    fn session_expiry() {
        assert!(!sample_session(Duration::hours(1)).is_expired());
        assert!(sample_session(Duration::seconds(-1)).is_expired());
    }

    #[test]
    fn access_token_response_never_serializes_upstream_tokens() {
        let response = AccessTokenResponse {
            access_token: "bat_x".into(),
            token_type: "Bearer".into(),
            expires_in: 3600,
            refresh_token: Some("brt_x".into()),
            scope: Some("read".into()),
            provider_access_token: Some("upstream-secret".into()),
            provider_refresh_token: Some("upstream-refresh".into()),
        };
        let json = serde_json::to_string(&response).unwrap();
        assert!(json.contains("bat_x"));
        assert!(!json.contains("upstream-secret"));
        assert!(!json.contains("upstream-refresh"));
    }

    #[test]
    fn user_context_mirrors_session_identity() {
        let session = sample_session(Duration::hours(1));
        let ctx = UserContext::from_session(&session);
        assert_eq!(ctx.username, "testuser");
        assert_eq!(ctx.provider_access_token.as_deref(), Some("upstream"));
    }
}
