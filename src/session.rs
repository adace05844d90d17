// ABOUTME: Session and token lifecycle management over the TokenStore
// ABOUTME: Owns CSPRNG token generation, default TTLs, and single-use consumption
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 idbridge contributors

//! # Session Manager
//!
//! Thin orchestration layer over a [`TokenStore`]: mints every opaque value
//! the broker hands out (state, auth code, session id, access/refresh token),
//! applies default TTLs, and turns store-level "not found" into the typed
//! OAuth failures callers return to clients.

use chrono::{Duration, Utc};
use std::sync::Arc;
use uuid::Uuid;

use crate::constants::{token_prefixes, ttl};
use crate::crypto;
use crate::errors::{AuthError, AuthResult, RecordFault};
use crate::models::{AuthCodeRecord, GrantResult, StateRecord, StoredSession, UserInfo};
use crate::store::{CleanupReport, TokenStore};

/// Default lifetimes applied when a call does not override them.
#[derive(Debug, Clone, Copy)]
pub struct SessionTtls {
    pub state: Duration,
    pub auth_code: Duration,
    pub access_token: Duration,
}

impl Default for SessionTtls {
    fn default() -> Self {
        Self {
            state: Duration::seconds(ttl::STATE_SECS),
            auth_code: Duration::seconds(ttl::AUTH_CODE_SECS),
            access_token: Duration::seconds(ttl::ACCESS_TOKEN_SECS),
        }
    }
}

/// Parameters for [`SessionManager::create_state`].
#[derive(Debug, Clone)]
pub struct NewState {
    pub client_id: String,
    pub redirect_uri: String,
    pub scopes: Vec<String>,
    pub code_challenge: Option<String>,
    pub code_challenge_method: Option<String>,
    /// Broker-side PKCE verifier for the upstream exchange
    pub upstream_code_verifier: Option<String>,
    /// The client's own `state` parameter, round-tripped on the final redirect
    pub client_state: Option<String>,
    /// TTL override; defaults to the manager's state TTL
    pub ttl: Option<Duration>,
}

/// Parameters for [`SessionManager::create_auth_code`].
#[derive(Debug, Clone)]
pub struct NewAuthCode {
    pub session_id: String,
    pub redirect_uri: String,
    pub scopes: Vec<String>,
    pub code_challenge: Option<String>,
    pub code_challenge_method: Option<String>,
    pub ttl: Option<Duration>,
}

/// Lifecycle manager for states, auth codes, and sessions.
#[derive(Clone)]
pub struct SessionManager {
    store: Arc<dyn TokenStore>,
    ttls: SessionTtls,
}

impl SessionManager {
    #[must_use]
    pub fn new(store: Arc<dyn TokenStore>) -> Self {
        Self::with_ttls(store, SessionTtls::default())
    }

    #[must_use]
    pub fn with_ttls(store: Arc<dyn TokenStore>, ttls: SessionTtls) -> Self {
        Self { store, ttls }
    }

    /// Mint an opaque value: 32 CSPRNG bytes, URL-safe base64, type prefix.
    fn generate_value(prefix: &str) -> AuthResult<String> {
        Ok(format!("{prefix}{}", crypto::random_token()?))
    }

    /// Create and persist a pending authorize state.
    pub async fn create_state(&self, request: NewState) -> AuthResult<StateRecord> {
        let now = Utc::now();
        let record = StateRecord {
            state: Self::generate_value(token_prefixes::STATE)?,
            client_id: request.client_id,
            redirect_uri: request.redirect_uri,
            code_challenge: request.code_challenge,
            code_challenge_method: request.code_challenge_method,
            upstream_code_verifier: request.upstream_code_verifier,
            client_state: request.client_state,
            scopes: request.scopes,
            created_at: now,
            expires_at: now + request.ttl.unwrap_or(self.ttls.state),
        };
        self.store.store_state(&record).await?;
        tracing::debug!(client_id = %record.client_id, "created authorize state");
        Ok(record)
    }

    /// Consume a state exactly once. A second call with the same value, or a
    /// call with an expired value, fails with `invalid_state`.
    pub async fn consume_state(&self, state: &str) -> AuthResult<StateRecord> {
        self.store
            .consume_state(state)
            .await?
            .ok_or_else(|| AuthError::invalid_state(RecordFault::NotFound))
    }

    /// Mint a broker authorization code bound to a session.
    pub async fn create_auth_code(&self, request: NewAuthCode) -> AuthResult<AuthCodeRecord> {
        let now = Utc::now();
        let record = AuthCodeRecord {
            code: Self::generate_value(token_prefixes::AUTH_CODE)?,
            session_id: request.session_id,
            redirect_uri: request.redirect_uri,
            code_challenge: request.code_challenge,
            code_challenge_method: request.code_challenge_method,
            scopes: request.scopes,
            created_at: now,
            expires_at: now + request.ttl.unwrap_or(self.ttls.auth_code),
        };
        self.store.store_auth_code(&record).await?;
        Ok(record)
    }

    /// Consume an auth code exactly once; replays fail with `invalid_grant`.
    pub async fn consume_auth_code(&self, code: &str) -> AuthResult<AuthCodeRecord> {
        self.store
            .consume_auth_code(code)
            .await?
            .ok_or_else(|| AuthError::invalid_grant(RecordFault::NotFound, "authorization code"))
    }

    /// Create a session from a successful upstream grant, minting the broker
    /// token pair.
    pub async fn issue_session(
        &self,
        provider: &str,
        user_info: UserInfo,
        grant: &GrantResult,
        scopes: Vec<String>,
        ttl_override: Option<Duration>,
    ) -> AuthResult<StoredSession> {
        let now = Utc::now();
        let session = StoredSession {
            session_id: Uuid::new_v4().to_string(),
            provider: provider.to_owned(),
            user_info,
            access_token: Self::generate_value(token_prefixes::ACCESS_TOKEN)?,
            refresh_token: Self::generate_value(token_prefixes::REFRESH_TOKEN)?,
            provider_access_token: Some(grant.access_token.clone()),
            provider_refresh_token: grant.refresh_token.clone(),
            provider_expires_at: grant.expires_at,
            scopes,
            created_at: now,
            issued_at: now,
            expires_at: now + ttl_override.unwrap_or(self.ttls.access_token),
        };
        self.store.store_session(&session).await?;
        tracing::info!(
            session_id = %session.session_id,
            provider,
            user = %session.user_info.username,
            "issued broker session"
        );
        Ok(session)
    }

    /// Look up the session behind a broker access token.
    pub async fn get_session(&self, access_token: &str) -> AuthResult<Option<StoredSession>> {
        self.store.load_session_by_token(access_token).await
    }

    /// Look up a session by its id.
    pub async fn get_session_by_id(&self, session_id: &str) -> AuthResult<Option<StoredSession>> {
        self.store.load_session_by_id(session_id).await
    }

    /// Rotate the broker access token behind a refresh token.
    ///
    /// The session id and the refresh token value are stable; only the access
    /// token and the expiry window move.
    pub async fn refresh_session(&self, refresh_token: &str) -> AuthResult<StoredSession> {
        let mut session = self
            .store
            .load_session_by_refresh_token(refresh_token)
            .await?
            .ok_or_else(|| AuthError::invalid_grant(RecordFault::NotFound, "refresh token"))?;

        let now = Utc::now();
        session.access_token = Self::generate_value(token_prefixes::ACCESS_TOKEN)?;
        session.issued_at = now;
        session.expires_at = now + self.ttls.access_token;
        self.store.update_session(&session).await?;

        tracing::debug!(session_id = %session.session_id, "rotated broker access token");
        Ok(session)
    }

    /// Persist refreshed upstream credentials on an existing session.
    pub async fn update_provider_grant(
        &self,
        session_id: &str,
        grant: &GrantResult,
    ) -> AuthResult<StoredSession> {
        let mut session = self
            .store
            .load_session_by_id(session_id)
            .await?
            .ok_or_else(|| AuthError::invalid_token("session no longer exists"))?;

        session.provider_access_token = Some(grant.access_token.clone());
        if grant.refresh_token.is_some() {
            session.provider_refresh_token = grant.refresh_token.clone();
        }
        session.provider_expires_at = grant.expires_at;
        self.store.update_session(&session).await?;
        Ok(session)
    }

    /// Delete the session behind an access token. Returns whether a session
    /// was actually removed.
    pub async fn revoke_session(&self, access_token: &str) -> AuthResult<bool> {
        let removed = self.store.delete_session_by_token(access_token).await?;
        if removed {
            tracing::info!("revoked broker session");
        }
        Ok(removed)
    }

    /// Sweep expired records. Exposed for an external scheduler; the manager
    /// owns no timer itself.
    pub async fn cleanup(&self) -> AuthResult<CleanupReport> {
        self.store.cleanup_expired().await
    }
}
