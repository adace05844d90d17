// ABOUTME: Deterministic in-memory provider adapter for development and integration tests
// ABOUTME: Issues predictable token values and enforces real PKCE checks without any network
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 idbridge contributors

//! # Synthetic Provider
//!
//! A fully deterministic stand-in for an upstream IdP. Unlike the HTTP
//! adapters it never leaves the process, which makes end-to-end tests of the
//! broker flow realistic (real state, real single-use codes, real S256
//! verification) without OAuth credentials or a network.
//!
//! The consent step is simulated by [`SyntheticAdapter::issue_code`]: after
//! `build_authorize_url` records a pending state, `issue_code` mints the
//! upstream authorization code the "user" would bring back on the callback.

use async_trait::async_trait;
use base64::{engine::general_purpose, Engine as _};
use sha2::{Digest, Sha256};
use std::collections::{HashMap, HashSet};
use std::sync::Mutex;
use url::Url;

use super::common;
use super::{AuthorizeUrlParams, ProviderAdapter};
use crate::constants::{oauth, providers};
use crate::errors::{AuthError, AuthResult, RecordFault};
use crate::models::{GrantResult, UserInfo};

const AUTH_URL: &str = "https://idp.synthetic.test/authorize";

/// PKCE challenge recorded for a pending state or issued code.
#[derive(Debug, Clone)]
struct PkceChallenge {
    challenge: String,
    method: String,
}

#[derive(Debug, Default)]
struct SyntheticState {
    /// states announced via `build_authorize_url`, with their PKCE binding
    pending: HashMap<String, Option<PkceChallenge>>,
    /// upstream codes minted by `issue_code`, single-use
    codes: HashMap<String, Option<PkceChallenge>>,
    access_tokens: HashSet<String>,
    refresh_tokens: HashSet<String>,
    sequence: u64,
}

/// Deterministic test double for the [`ProviderAdapter`] contract.
pub struct SyntheticAdapter {
    state: Mutex<SyntheticState>,
}

impl Default for SyntheticAdapter {
    fn default() -> Self {
        Self::new()
    }
}

impl SyntheticAdapter {
    #[must_use]
    pub fn new() -> Self {
        Self {
            state: Mutex::new(SyntheticState::default()),
        }
    }

    /// Compute the S256 challenge for a verifier, exposed so tests can build
    /// matching challenge/verifier pairs.
    #[must_use]
    pub fn s256_challenge(verifier: &str) -> String {
        let digest = Sha256::digest(verifier.as_bytes());
        general_purpose::URL_SAFE_NO_PAD.encode(digest)
    }

    /// Simulate the user approving the consent screen: mint the upstream
    /// authorization code for a previously announced state.
    ///
    /// Returns `None` for a state this adapter never saw.
    pub fn issue_code(&self, state: &str) -> Option<String> {
        let mut inner = self.state.lock().ok()?;
        let challenge = inner.pending.get(state)?.clone();
        inner.sequence += 1;
        let code = format!("synthetic-code-{}", inner.sequence);
        inner.codes.insert(code.clone(), challenge);
        Some(code)
    }

    fn lock(&self) -> AuthResult<std::sync::MutexGuard<'_, SyntheticState>> {
        self.state
            .lock()
            .map_err(|_| AuthError::ServerError("synthetic adapter state poisoned".into()))
    }

    fn verify_pkce(recorded: Option<&PkceChallenge>, verifier: Option<&str>) -> bool {
        match recorded {
            None => true,
            Some(pkce) => match verifier {
                None => false,
                Some(verifier) if pkce.method == oauth::PKCE_METHOD_PLAIN => {
                    pkce.challenge == verifier
                }
                Some(verifier) => Self::s256_challenge(verifier) == pkce.challenge,
            },
        }
    }
}

#[async_trait]
impl ProviderAdapter for SyntheticAdapter {
    fn provider_name(&self) -> &'static str {
        providers::SYNTHETIC
    }

    fn build_authorize_url(&self, params: &AuthorizeUrlParams<'_>) -> AuthResult<Url> {
        let mut inner = self.lock()?;
        let challenge = params.code_challenge.map(|challenge| PkceChallenge {
            challenge: challenge.to_owned(),
            method: params
                .code_challenge_method
                .unwrap_or(oauth::PKCE_METHOD_S256)
                .to_owned(),
        });
        inner.pending.insert(params.state.to_owned(), challenge);
        drop(inner);

        common::build_authorize_url(AUTH_URL, "synthetic-client", params, &[])
    }

    async fn exchange_code(
        &self,
        code: &str,
        _redirect_uri: &str,
        code_verifier: Option<&str>,
        scopes: Option<&[String]>,
    ) -> AuthResult<GrantResult> {
        let mut inner = self.lock()?;

        // Codes are single-use upstream too.
        let Some(challenge) = inner.codes.remove(code) else {
            return Err(AuthError::invalid_grant(
                RecordFault::NotFound,
                "upstream authorization code",
            ));
        };
        if !Self::verify_pkce(challenge.as_ref(), code_verifier) {
            return Err(AuthError::invalid_grant(
                RecordFault::Mismatch,
                "code_verifier",
            ));
        }

        inner.sequence += 1;
        let access_token = format!("synthetic-access-{}", inner.sequence);
        let refresh_token = format!("synthetic-refresh-{}", inner.sequence);
        inner.access_tokens.insert(access_token.clone());
        inner.refresh_tokens.insert(refresh_token.clone());

        Ok(GrantResult {
            access_token,
            refresh_token: Some(refresh_token),
            expires_at: Some(chrono::Utc::now() + chrono::Duration::hours(1)),
            provider_scopes_granted: scopes.map(<[String]>::to_vec),
        })
    }

    async fn refresh_token(
        &self,
        refresh_token: &str,
        scopes: Option<&[String]>,
    ) -> AuthResult<GrantResult> {
        let mut inner = self.lock()?;
        if !inner.refresh_tokens.contains(refresh_token) {
            return Err(AuthError::invalid_grant(
                RecordFault::NotFound,
                "refresh token",
            ));
        }

        // Rotate the access token, keep the refresh token value stable.
        inner.sequence += 1;
        let access_token = format!("synthetic-access-{}", inner.sequence);
        inner.access_tokens.insert(access_token.clone());

        Ok(GrantResult {
            access_token,
            refresh_token: Some(refresh_token.to_owned()),
            expires_at: Some(chrono::Utc::now() + chrono::Duration::hours(1)),
            provider_scopes_granted: scopes.map(<[String]>::to_vec),
        })
    }

    async fn fetch_user_info(&self, access_token: &str) -> AuthResult<UserInfo> {
        let inner = self.lock()?;
        if !inner.access_tokens.contains(access_token) {
            return Err(AuthError::invalid_token("unknown synthetic access token"));
        }

        Ok(UserInfo {
            provider: providers::SYNTHETIC.to_owned(),
            user_id: "synthetic-user-1".to_owned(),
            username: "testuser".to_owned(),
            name: Some("Test User".to_owned()),
            email: Some("testuser@example.com".to_owned()),
            provider_scopes_granted: vec!["read".to_owned()],
            raw_profile: Some(serde_json::json!({ "id": "synthetic-user-1" })),
        })
    }

    async fn revoke_token(&self, token: &str) -> AuthResult<bool> {
        let mut inner = self.lock()?;
        let removed = inner.access_tokens.remove(token) | inner.refresh_tokens.remove(token);
        if removed {
            Ok(true)
        } else {
            Err(AuthError::invalid_token(
                "token was never issued by the synthetic provider",
            ))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn authorize_params<'a>(
        state: &'a str,
        challenge: Option<&'a str>,
    ) -> AuthorizeUrlParams<'a> {
        AuthorizeUrlParams {
            redirect_uri: "https://broker.example/synthetic/callback",
            state,
            scopes: &[],
            code_challenge: challenge,
            code_challenge_method: None,
            extra_params: &[],
        }
    }

    #[tokio::test]
    async fn exchange_is_single_use() {
        let adapter = SyntheticAdapter::new();
        adapter
            .build_authorize_url(&authorize_params("bst_1", None))
            .unwrap();
        let code = adapter.issue_code("bst_1").unwrap();

        assert!(adapter.exchange_code(&code, "r", None, None).await.is_ok());
        let second = adapter.exchange_code(&code, "r", None, None).await;
        assert!(matches!(second, Err(AuthError::InvalidGrant(_))));
    }

    #[tokio::test]
    async fn pkce_mismatch_fails_with_invalid_grant() {
        let adapter = SyntheticAdapter::new();
        let challenge = SyntheticAdapter::s256_challenge("right-verifier");
        adapter
            .build_authorize_url(&authorize_params("bst_2", Some(&challenge)))
            .unwrap();
        let code = adapter.issue_code("bst_2").unwrap();

        let wrong = adapter
            .exchange_code(&code, "r", Some("wrong-verifier"), None)
            .await;
        assert!(matches!(wrong, Err(AuthError::InvalidGrant(_))));
    }

    #[tokio::test]
    async fn refresh_rotates_access_but_not_refresh_token() {
        let adapter = SyntheticAdapter::new();
        adapter
            .build_authorize_url(&authorize_params("bst_3", None))
            .unwrap();
        let code = adapter.issue_code("bst_3").unwrap();
        let grant = adapter.exchange_code(&code, "r", None, None).await.unwrap();
        let refresh = grant.refresh_token.unwrap();

        let first = adapter.refresh_token(&refresh, None).await.unwrap();
        let second = adapter.refresh_token(&refresh, None).await.unwrap();
        assert_ne!(first.access_token, second.access_token);
        assert_eq!(first.refresh_token.as_deref(), Some(refresh.as_str()));
        assert_eq!(second.refresh_token.as_deref(), Some(refresh.as_str()));
    }

    #[tokio::test]
    async fn unknown_access_token_is_rejected() {
        let adapter = SyntheticAdapter::new();
        let result = adapter.fetch_user_info("never-issued").await;
        assert!(matches!(result, Err(AuthError::InvalidToken(_))));
    }
}
