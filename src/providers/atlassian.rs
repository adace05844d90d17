// ABOUTME: Atlassian provider adapter - JSON token endpoint and rotating refresh tokens
// ABOUTME: Normalizes account_id identity from api.atlassian.com/me
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 idbridge contributors

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use serde_json::json;
use url::Url;

use super::common;
use super::{AuthorizeUrlParams, ProviderAdapter};
use crate::constants::providers;
use crate::errors::AuthResult;
use crate::models::{GrantResult, UserInfo};

const AUTH_URL: &str = "https://auth.atlassian.com/authorize";
const TOKEN_URL: &str = "https://auth.atlassian.com/oauth/token";
const USERINFO_URL: &str = "https://api.atlassian.com/me";

/// Atlassian (Jira/Confluence cloud) OAuth 2.0 (3LO) adapter.
///
/// Atlassian deviates from the usual shape twice: the token endpoint takes a
/// JSON body instead of a form, and refresh tokens rotate on every use - the
/// value from the latest response always replaces the stored one.
pub struct AtlassianAdapter {
    client: Client,
    client_id: String,
    client_secret: String,
}

#[derive(Debug, Deserialize)]
struct AtlassianAccount {
    account_id: String,
    email: Option<String>,
    name: Option<String>,
    nickname: Option<String>,
}

impl AtlassianAdapter {
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
impl ProviderAdapter for AtlassianAdapter {
    fn provider_name(&self) -> &'static str {
        providers::ATLASSIAN
    }

    fn build_authorize_url(&self, params: &AuthorizeUrlParams<'_>) -> AuthResult<Url> {
        // audience and prompt are required by the 3LO flow.
        common::build_authorize_url(
            AUTH_URL,
            &self.client_id,
            params,
            &[("audience", "api.atlassian.com"), ("prompt", "consent")],
        )
    }

    async fn exchange_code(
        &self,
        code: &str,
        redirect_uri: &str,
        code_verifier: Option<&str>,
        _scopes: Option<&[String]>,
    ) -> AuthResult<GrantResult> {
        let mut body = json!({
            "grant_type": "authorization_code",
            "client_id": self.client_id,
            "client_secret": self.client_secret,
            "code": code,
            "redirect_uri": redirect_uri,
        });
        if let Some(verifier) = code_verifier {
            body["code_verifier"] = json!(verifier);
        }
        common::post_token_json(&self.client, self.provider_name(), TOKEN_URL, &body).await
    }

    async fn refresh_token(
        &self,
        refresh_token: &str,
        _scopes: Option<&[String]>,
    ) -> AuthResult<GrantResult> {
        let body = json!({
            "grant_type": "refresh_token",
            "client_id": self.client_id,
            "client_secret": self.client_secret,
            "refresh_token": refresh_token,
        });
        // Rotation is mandatory here: the response carries the replacement
        // refresh token and the presented one is dead.
        common::post_token_json(&self.client, self.provider_name(), TOKEN_URL, &body).await
    }

    async fn fetch_user_info(&self, access_token: &str) -> AuthResult<UserInfo> {
        let (account, raw) = common::get_user_profile::<AtlassianAccount>(
            &self.client,
            self.provider_name(),
            USERINFO_URL,
            access_token,
        )
        .await?;

        let username = account
            .nickname
            .clone()
            .or_else(|| account.email.clone())
            .unwrap_or_else(|| account.account_id.clone());
        Ok(UserInfo {
            provider: self.provider_name().to_owned(),
            user_id: account.account_id,
            username,
            name: account.name,
            email: account.email,
            provider_scopes_granted: Vec::new(),
            raw_profile: Some(raw),
        })
    }

    async fn revoke_token(&self, _token: &str) -> AuthResult<bool> {
        // Atlassian exposes no token revocation endpoint; grants are managed
        // from the user's connected-apps page. Local session deletion still
        // cuts off broker access.
        tracing::debug!("atlassian has no revocation endpoint; skipping upstream revoke");
        Ok(false)
    }
}
