// ABOUTME: AuthService - the three-step broker flow from authorize to token exchange
// ABOUTME: Orchestrates one provider adapter and the session manager; stateless per call
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 idbridge contributors

//! # Auth Service
//!
//! The broker flow as a finite sequence, each call stateless given the token
//! store:
//!
//! 1. [`AuthService::authorize`] - record a state, build the upstream
//!    authorize URL against the broker's own fixed callback. The upstream
//!    provider only ever learns the broker's callback, never the client's
//!    redirect URI.
//! 2. [`AuthService::handle_callback`] - consume the state, exchange the
//!    upstream code, fetch the normalized identity, issue a session, mint a
//!    broker auth code bound to the client's original redirect URI.
//! 3. [`AuthService::exchange_token`] - consume the auth code and hand out
//!    the broker token pair.

use chrono::Utc;
use std::sync::Arc;
use tracing::{info, warn};
use url::Url;

use crate::constants::oauth;
use crate::crypto;
use crate::errors::{AuthError, AuthResult, RecordFault};
use crate::models::{AccessTokenResponse, AuthCodeRecord, StateRecord, StoredSession};
use crate::providers::{AuthorizeUrlParams, ProviderAdapter};
use crate::session::{NewAuthCode, NewState, SessionManager};

/// Parameters for [`AuthService::authorize`].
#[derive(Debug, Clone, Default)]
pub struct AuthorizeRequest {
    pub client_id: String,
    /// The client's redirect URI; the broker auth code returns here
    pub redirect_uri: String,
    pub scopes: Vec<String>,
    pub code_challenge: Option<String>,
    pub code_challenge_method: Option<String>,
    /// The client's own CSRF state, round-tripped untouched
    pub client_state: Option<String>,
    /// Extra upstream authorize parameters for this request
    pub extra_params: Vec<(String, String)>,
}

/// Everything a callback produces: the minted code and session plus the
/// redirect data the protocol façade needs to send the client home.
#[derive(Debug, Clone)]
pub struct CallbackOutcome {
    pub auth_code: AuthCodeRecord,
    pub session: StoredSession,
    /// The client's original redirect URI from the consumed state
    pub redirect_uri: String,
    /// The client's original `state`, `None` when the client sent none
    pub client_state: Option<String>,
}

/// Orchestrates one provider adapter and the session manager.
pub struct AuthService {
    adapter: Arc<dyn ProviderAdapter>,
    sessions: SessionManager,
    /// The broker's public callback URL registered with the provider
    callback_url: String,
    /// Extra authorize parameters applied to every request (deployment
    /// config, e.g. Google's `access_type=offline`)
    extra_authorize_params: Vec<(String, String)>,
}

impl AuthService {
    #[must_use]
    pub fn new(
        adapter: Arc<dyn ProviderAdapter>,
        sessions: SessionManager,
        callback_url: String,
    ) -> Self {
        Self {
            adapter,
            sessions,
            callback_url,
            extra_authorize_params: Vec::new(),
        }
    }

    /// Attach deployment-wide upstream authorize parameters.
    #[must_use]
    pub fn with_extra_authorize_params(mut self, params: Vec<(String, String)>) -> Self {
        self.extra_authorize_params = params;
        self
    }

    #[must_use]
    pub fn provider_name(&self) -> &'static str {
        self.adapter.provider_name()
    }

    #[must_use]
    pub const fn sessions(&self) -> &SessionManager {
        &self.sessions
    }

    #[must_use]
    pub fn callback_url(&self) -> &str {
        &self.callback_url
    }

    /// Step 1: create the pending state and build the upstream authorize URL.
    ///
    /// The upstream leg carries a broker-generated PKCE pair: the client's
    /// verifier is unknown at callback time, so the client's challenge cannot
    /// be forwarded. The client's PKCE binding is instead carried through to
    /// the broker's own token endpoint.
    pub async fn authorize(&self, request: AuthorizeRequest) -> AuthResult<(Url, StateRecord)> {
        let (upstream_verifier, upstream_challenge) = crypto::generate_pkce_pair()?;

        let state = self
            .sessions
            .create_state(NewState {
                client_id: request.client_id,
                redirect_uri: request.redirect_uri,
                scopes: request.scopes,
                code_challenge: request.code_challenge,
                code_challenge_method: request.code_challenge_method,
                upstream_code_verifier: Some(upstream_verifier),
                client_state: request.client_state,
                ttl: None,
            })
            .await?;

        let mut extra = self.extra_authorize_params.clone();
        extra.extend(request.extra_params);

        let url = self.adapter.build_authorize_url(&AuthorizeUrlParams {
            redirect_uri: &self.callback_url,
            state: &state.state,
            scopes: &state.scopes,
            code_challenge: Some(&upstream_challenge),
            code_challenge_method: Some(oauth::PKCE_METHOD_S256),
            extra_params: &extra,
        })?;

        info!(
            provider = self.provider_name(),
            client_id = %state.client_id,
            "authorize request redirected upstream"
        );
        Ok((url, state))
    }

    /// Step 2: resolve the upstream callback into a session and a fresh
    /// broker auth code.
    ///
    /// Consuming the state first guards against replayed and forged
    /// callbacks: an unknown, expired, or second-use state fails with
    /// `invalid_state` before any upstream call is made.
    ///
    /// An explicitly passed `code_verifier` overrides the broker's stored
    /// one, for hosts that ran the upstream authorize leg themselves.
    pub async fn handle_callback(
        &self,
        code: &str,
        state: &str,
        code_verifier: Option<&str>,
    ) -> AuthResult<CallbackOutcome> {
        let state_record = self.sessions.consume_state(state).await?;

        let verifier = code_verifier.or(state_record.upstream_code_verifier.as_deref());
        let grant = self
            .adapter
            .exchange_code(code, &self.callback_url, verifier, Some(&state_record.scopes))
            .await?;

        let user_info = self.adapter.fetch_user_info(&grant.access_token).await?;

        let session = self
            .sessions
            .issue_session(
                self.provider_name(),
                user_info,
                &grant,
                state_record.scopes.clone(),
                None,
            )
            .await?;

        // The broker code is bound to the client's original redirect URI and
        // carries the client's PKCE challenge for verification at /token.
        let auth_code = self
            .sessions
            .create_auth_code(NewAuthCode {
                session_id: session.session_id.clone(),
                redirect_uri: state_record.redirect_uri.clone(),
                scopes: state_record.scopes,
                code_challenge: state_record.code_challenge,
                code_challenge_method: state_record.code_challenge_method,
                ttl: None,
            })
            .await?;

        Ok(CallbackOutcome {
            auth_code,
            session,
            redirect_uri: state_record.redirect_uri,
            client_state: state_record.client_state,
        })
    }

    /// Step 3: redeem a broker auth code for the broker token pair.
    pub async fn exchange_token(&self, auth_code: &str) -> AuthResult<AccessTokenResponse> {
        let record = self.sessions.consume_auth_code(auth_code).await?;
        self.redeem_auth_code(&record).await
    }

    /// Build the token response for an already consumed auth code. The
    /// protocol façade consumes the code itself so it can verify the client's
    /// PKCE binding in between.
    pub async fn redeem_auth_code(
        &self,
        record: &AuthCodeRecord,
    ) -> AuthResult<AccessTokenResponse> {
        let session = self
            .sessions
            .get_session_by_id(&record.session_id)
            .await?
            .ok_or_else(|| {
                AuthError::invalid_grant(RecordFault::NotFound, "session behind authorization code")
            })?;

        Ok(Self::token_response(&session))
    }

    /// Rotate the broker access token behind a refresh token, refreshing the
    /// upstream credentials first when they have expired.
    pub async fn refresh_token(&self, refresh_token: &str) -> AuthResult<AccessTokenResponse> {
        let current = self
            .sessions
            .refresh_session(refresh_token)
            .await?;

        let session = if current.provider_token_expired() {
            let provider_refresh = current.provider_refresh_token.as_deref().ok_or_else(|| {
                AuthError::invalid_grant(RecordFault::Expired, "provider access token")
            })?;
            let grant = self
                .adapter
                .refresh_token(provider_refresh, Some(&current.scopes))
                .await?;
            self.sessions
                .update_provider_grant(&current.session_id, &grant)
                .await?
        } else {
            current
        };

        Ok(Self::token_response(&session))
    }

    /// Revoke a broker access token: best-effort upstream revocation, then
    /// local deletion. Upstream failure never blocks the local revoke.
    pub async fn revoke(&self, access_token: &str) -> AuthResult<bool> {
        if let Some(session) = self.sessions.get_session(access_token).await? {
            if let Some(provider_token) = session.provider_access_token.as_deref() {
                if let Err(err) = self.adapter.revoke_token(provider_token).await {
                    warn!(
                        provider = self.provider_name(),
                        error = %err,
                        "upstream revocation failed; deleting local session anyway"
                    );
                }
            }
        }
        self.sessions.revoke_session(access_token).await
    }

    fn token_response(session: &StoredSession) -> AccessTokenResponse {
        AccessTokenResponse {
            access_token: session.access_token.clone(),
            token_type: oauth::TOKEN_TYPE_BEARER.to_owned(),
            expires_in: (session.expires_at - Utc::now()).num_seconds().max(0),
            refresh_token: Some(session.refresh_token.clone()),
            scope: if session.scopes.is_empty() {
                None
            } else {
                Some(session.scopes.join(" "))
            },
            provider_access_token: session.provider_access_token.clone(),
            provider_refresh_token: session.provider_refresh_token.clone(),
        }
    }
}
