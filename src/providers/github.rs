// ABOUTME: GitHub provider adapter - authorize URL, code exchange, user profile, revocation
// ABOUTME: Normalizes GitHub's comma scopes, numeric ids, and non-expiring tokens
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 idbridge contributors

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::Deserialize;
use url::Url;

use super::common;
use super::{AuthorizeUrlParams, ProviderAdapter};
use crate::constants::providers;
use crate::errors::{AuthError, AuthResult};
use crate::models::{GrantResult, UserInfo};

const AUTH_URL: &str = "https://github.com/login/oauth/authorize";
const TOKEN_URL: &str = "https://github.com/login/oauth/access_token";
const USERINFO_URL: &str = "https://api.github.com/user";
const API_BASE: &str = "https://api.github.com";

/// GitHub OAuth app adapter.
///
/// GitHub tokens do not expire unless the app opts into expiring tokens, so
/// `expires_at` is frequently `None`; the session manager treats that as
/// "no upstream refresh needed".
pub struct GithubAdapter {
    client: Client,
    client_id: String,
    client_secret: String,
}

#[derive(Debug, Deserialize)]
struct GithubUser {
    id: i64,
    login: String,
    name: Option<String>,
    email: Option<String>,
}

impl GithubAdapter {
    #[must_use]
    pub fn new(client_id: String, client_secret: String) -> Self {
        Self {
            client: common::http_client(),
            client_id,
            client_secret,
        }
    }
}

#[async_trait]
impl ProviderAdapter for GithubAdapter {
    fn provider_name(&self) -> &'static str {
        providers::GITHUB
    }

    fn build_authorize_url(&self, params: &AuthorizeUrlParams<'_>) -> AuthResult<Url> {
        common::build_authorize_url(AUTH_URL, &self.client_id, params, &[])
    }

    async fn exchange_code(
        &self,
        code: &str,
        redirect_uri: &str,
        code_verifier: Option<&str>,
        _scopes: Option<&[String]>,
    ) -> AuthResult<GrantResult> {
        let mut form = vec![
            ("client_id", self.client_id.as_str()),
            ("client_secret", self.client_secret.as_str()),
            ("code", code),
            ("redirect_uri", redirect_uri),
            ("grant_type", "authorization_code"),
        ];
        if let Some(verifier) = code_verifier {
            form.push(("code_verifier", verifier));
        }
        common::post_token_form(&self.client, self.provider_name(), TOKEN_URL, &form).await
    }

    async fn refresh_token(
        &self,
        refresh_token: &str,
        _scopes: Option<&[String]>,
    ) -> AuthResult<GrantResult> {
        let form = [
            ("client_id", self.client_id.as_str()),
            ("client_secret", self.client_secret.as_str()),
            ("refresh_token", refresh_token),
            ("grant_type", "refresh_token"),
        ];
        let mut grant =
            common::post_token_form(&self.client, self.provider_name(), TOKEN_URL, &form).await?;
        // GitHub only rotates refresh tokens for apps with expiring tokens
        // enabled; preserve the old value otherwise.
        if grant.refresh_token.is_none() {
            grant.refresh_token = Some(refresh_token.to_owned());
        }
        Ok(grant)
    }

    async fn fetch_user_info(&self, access_token: &str) -> AuthResult<UserInfo> {
        let (user, raw) = common::get_user_profile::<GithubUser>(
            &self.client,
            self.provider_name(),
            USERINFO_URL,
            access_token,
        )
        .await?;

        Ok(UserInfo {
            provider: self.provider_name().to_owned(),
            user_id: user.id.to_string(),
            username: user.login,
            name: user.name,
            email: user.email,
            provider_scopes_granted: Vec::new(),
            raw_profile: Some(raw),
        })
    }

    async fn revoke_token(&self, token: &str) -> AuthResult<bool> {
        // GitHub revokes a single authorization via the app-grant endpoint,
        // authenticated with the app's basic credentials.
        let url = format!("{API_BASE}/applications/{}/grant", self.client_id);
        let response = self
            .client
            .delete(&url)
            .basic_auth(&self.client_id, Some(&self.client_secret))
            .header(reqwest::header::USER_AGENT, "idbridge")
            .header(reqwest::header::ACCEPT, "application/vnd.github+json")
            .json(&serde_json::json!({ "access_token": token }))
            .send()
            .await
            .map_err(|e| AuthError::upstream(self.provider_name(), e))?;

        match response.status() {
            StatusCode::NO_CONTENT => Ok(true),
            StatusCode::NOT_FOUND | StatusCode::UNPROCESSABLE_ENTITY => Err(
                AuthError::invalid_token("token was not issued by this GitHub app"),
            ),
            status => Err(AuthError::upstream(
                self.provider_name(),
                format!("grant revocation returned {status}"),
            )),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn authorize_url_targets_github() {
        let adapter = GithubAdapter::new("id".into(), "secret".into());
        let url = adapter
            .build_authorize_url(&AuthorizeUrlParams {
                redirect_uri: "https://broker.example/github/callback",
                state: "bst_s",
                scopes: &["read:user".to_owned()],
                code_challenge: None,
                code_challenge_method: None,
                extra_params: &[],
            })
            .unwrap();
        assert_eq!(url.host_str(), Some("github.com"));
        assert!(url.query().unwrap().contains("scope=read%3Auser"));
    }
}
