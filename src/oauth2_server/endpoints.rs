// ABOUTME: Authorization server endpoint logic - authorize, callback, token, revocation
// ABOUTME: Validates registered clients and PKCE, never leaks internal state to clients
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 idbridge contributors

use base64::{engine::general_purpose, Engine as _};
use sha2::{Digest, Sha256};
use std::sync::Arc;
use tracing::warn;
use url::Url;

use super::clients::ClientRegistry;
use super::models::{AuthorizeParams, CallbackParams, TokenRequestForm};
use crate::constants::oauth;
use crate::errors::{AuthError, AuthResult, RecordFault};
use crate::models::{AccessTokenResponse, StoredSession};
use crate::service::{AuthService, AuthorizeRequest};

/// Issuer-mode OAuth 2.0 authorization server.
///
/// The broker is the authorization server its clients see; the upstream
/// provider is an implementation detail behind it.
pub struct OAuth2AuthorizationServer {
    service: Arc<AuthService>,
    clients: ClientRegistry,
}

impl OAuth2AuthorizationServer {
    #[must_use]
    pub fn new(service: Arc<AuthService>, clients: ClientRegistry) -> Self {
        Self { service, clients }
    }

    #[must_use]
    pub fn provider_name(&self) -> &'static str {
        self.service.provider_name()
    }

    /// Handle `GET /authorize`: validate the client and its parameters, then
    /// return the upstream redirect target.
    pub async fn authorize(&self, params: &AuthorizeParams) -> AuthResult<Url> {
        let client = self
            .clients
            .get(&params.client_id)
            .ok_or_else(|| AuthError::InvalidGrant("unknown client_id".into()))?;

        if params.response_type != oauth::RESPONSE_TYPE_CODE {
            return Err(AuthError::InvalidGrant(
                "only response_type=code is supported".into(),
            ));
        }
        if !client.redirect_uri_registered(&params.redirect_uri) {
            return Err(AuthError::InvalidGrant(
                "redirect_uri is not registered for this client".into(),
            ));
        }
        if client.require_pkce && params.code_challenge.is_none() {
            return Err(AuthError::InvalidGrant(
                "code_challenge is required for this client".into(),
            ));
        }
        if let Some(method) = params.code_challenge_method.as_deref() {
            if method != oauth::PKCE_METHOD_S256 && method != oauth::PKCE_METHOD_PLAIN {
                return Err(AuthError::InvalidGrant(
                    "unsupported code_challenge_method".into(),
                ));
            }
        }

        let (url, _state) = self
            .service
            .authorize(AuthorizeRequest {
                client_id: params.client_id.clone(),
                redirect_uri: params.redirect_uri.clone(),
                scopes: params.scopes(),
                code_challenge: params.code_challenge.clone(),
                code_challenge_method: params.code_challenge_method.clone(),
                client_state: params.state.clone(),
                extra_params: Vec::new(),
            })
            .await?;
        Ok(url)
    }

    /// Handle the upstream callback: complete the broker flow and build the
    /// redirect back to the client.
    ///
    /// The redirect carries the new broker code and the client's original
    /// `state` - and only that. The broker's internal state value never
    /// appears; when the client supplied no state of its own, the parameter
    /// is omitted entirely.
    pub async fn handle_callback(&self, params: &CallbackParams) -> AuthResult<Url> {
        if let Some(error) = params.error.as_deref() {
            warn!(
                error,
                description = params.error_description.as_deref().unwrap_or(""),
                "upstream provider reported an authorization failure"
            );
            return Err(AuthError::InvalidGrant(
                "upstream provider denied the authorization".into(),
            ));
        }

        let state = params
            .state
            .as_deref()
            .ok_or_else(|| AuthError::invalid_state(RecordFault::NotFound))?;
        let code = params
            .code
            .as_deref()
            .ok_or_else(|| AuthError::InvalidGrant("callback carried no code".into()))?;

        let outcome = self.service.handle_callback(code, state, None).await?;

        let mut redirect = Url::parse(&outcome.redirect_uri)
            .map_err(|e| AuthError::ServerError(format!("stored redirect URI invalid: {e}")))?;
        {
            let mut query = redirect.query_pairs_mut();
            query.append_pair("code", &outcome.auth_code.code);
            if let Some(client_state) = outcome.client_state.as_deref() {
                query.append_pair("state", client_state);
            }
        }
        Ok(redirect)
    }

    /// Handle `POST /token`: dispatch on grant type after authenticating the
    /// client.
    pub async fn token(&self, form: &TokenRequestForm) -> AuthResult<AccessTokenResponse> {
        self.authenticate_client(form)?;

        match form.grant_type.as_str() {
            oauth::GRANT_TYPE_AUTHORIZATION_CODE => self.exchange_authorization_code(form).await,
            oauth::GRANT_TYPE_REFRESH_TOKEN => {
                let refresh_token = form
                    .refresh_token
                    .as_deref()
                    .ok_or_else(|| AuthError::InvalidGrant("missing refresh_token".into()))?;
                self.service.refresh_token(refresh_token).await
            }
            other => Err(AuthError::InvalidGrant(format!(
                "unsupported grant_type: {other}"
            ))),
        }
    }

    /// Authorization-code grant: consume the code, verify the client's PKCE
    /// binding and redirect URI, then redeem.
    ///
    /// The code is consumed before verification, so a failed attempt burns it
    /// - a verifier-guessing attacker gets exactly one try per code.
    pub async fn exchange_authorization_code(
        &self,
        form: &TokenRequestForm,
    ) -> AuthResult<AccessTokenResponse> {
        let code = form
            .code
            .as_deref()
            .ok_or_else(|| AuthError::InvalidGrant("missing code".into()))?;

        let record = self.service.sessions().consume_auth_code(code).await?;

        if let Some(redirect_uri) = form.redirect_uri.as_deref() {
            if redirect_uri != record.redirect_uri {
                return Err(AuthError::invalid_grant(RecordFault::Mismatch, "redirect_uri"));
            }
        }

        if let Some(challenge) = record.code_challenge.as_deref() {
            let verifier = form
                .code_verifier
                .as_deref()
                .ok_or_else(|| AuthError::InvalidGrant("missing code_verifier".into()))?;
            let method = record
                .code_challenge_method
                .as_deref()
                .unwrap_or(oauth::PKCE_METHOD_S256);
            if !verify_pkce(challenge, method, verifier) {
                return Err(AuthError::invalid_grant(RecordFault::Mismatch, "code_verifier"));
            }
        }

        self.service.redeem_auth_code(&record).await
    }

    /// Load the session behind a broker access token, for host request
    /// handling.
    pub async fn load_access_token(&self, access_token: &str) -> AuthResult<Option<StoredSession>> {
        self.service.sessions().get_session(access_token).await
    }

    /// Revoke a broker access token. Per RFC 7009 revocation is idempotent:
    /// revoking an unknown token still succeeds.
    pub async fn revoke_token(&self, access_token: &str) -> AuthResult<()> {
        self.service.revoke(access_token).await.map(|_| ())
    }
}

/// Check a PKCE verifier against the recorded challenge.
fn verify_pkce(challenge: &str, method: &str, verifier: &str) -> bool {
    match method {
        oauth::PKCE_METHOD_PLAIN => challenge == verifier,
        _ => {
            let digest = Sha256::digest(verifier.as_bytes());
            general_purpose::URL_SAFE_NO_PAD.encode(digest) == challenge
        }
    }
}

impl OAuth2AuthorizationServer {
    /// Authenticate the requesting client when it identifies itself.
    ///
    /// Public clients pass (their proof is PKCE); confidential clients must
    /// present their secret. A token request without a client_id is allowed
    /// only because the code itself is an unguessable single-use credential.
    fn authenticate_client(&self, form: &TokenRequestForm) -> AuthResult<()> {
        let Some(client_id) = form.client_id.as_deref() else {
            return Ok(());
        };
        let client = self
            .clients
            .get(client_id)
            .ok_or_else(|| AuthError::InvalidGrant("unknown client_id".into()))?;
        if !client.validate_secret(form.client_secret.as_deref()) {
            return Err(AuthError::InvalidGrant("client authentication failed".into()));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn s256_verification_matches_rfc_example() {
        // RFC 7636 appendix B verifier/challenge pair
        let verifier = "dBjftJeZ4CVP-mB92K27uhbUJU1p1r_wW1gFWFOEjXk";
        let challenge = "E9Melhoa2OwvFrEMTJguCHaoeK1t8URWbuGJSstw-cM";
        assert!(verify_pkce(challenge, "S256", verifier));
        assert!(!verify_pkce(challenge, "S256", "wrong"));
    }

    #[test]
    fn plain_verification_is_equality() {
        assert!(verify_pkce("abc", "plain", "abc"));
        assert!(!verify_pkce("abc", "plain", "abd"));
    }
}
