// ABOUTME: Google provider adapter built on the OIDC userinfo endpoint
// ABOUTME: Refresh responses omit the refresh token, so the old value is preserved
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 idbridge contributors

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use url::Url;

use super::common;
use super::{AuthorizeUrlParams, ProviderAdapter};
use crate::constants::providers;
use crate::errors::{AuthError, AuthResult};
use crate::models::{GrantResult, UserInfo};

const AUTH_URL: &str = "https://accounts.google.com/o/oauth2/v2/auth";
const TOKEN_URL: &str = "https://oauth2.googleapis.com/token";
const USERINFO_URL: &str = "https://openidconnect.googleapis.com/v1/userinfo";
const REVOKE_URL: &str = "https://oauth2.googleapis.com/revoke";

/// Google OAuth adapter.
///
/// A refresh token is only issued when the authorize request carries
/// `access_type=offline`; deployments set that through the pass-through
/// extra parameters.
pub struct GoogleAdapter {
    client: Client,
    client_id: String,
    client_secret: String,
}

#[derive(Debug, Deserialize)]
struct GoogleClaims {
    sub: String,
    email: Option<String>,
    name: Option<String>,
}

impl GoogleAdapter {
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
impl ProviderAdapter for GoogleAdapter {
    fn provider_name(&self) -> &'static str {
        providers::GOOGLE
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
        // Google never returns the refresh token on a refresh grant.
        if grant.refresh_token.is_none() {
            grant.refresh_token = Some(refresh_token.to_owned());
        }
        Ok(grant)
    }

    async fn fetch_user_info(&self, access_token: &str) -> AuthResult<UserInfo> {
        let (claims, raw) = common::get_user_profile::<GoogleClaims>(
            &self.client,
            self.provider_name(),
            USERINFO_URL,
            access_token,
        )
        .await?;

        // Google has no separate handle; the email doubles as the username.
        let username = claims.email.clone().unwrap_or_else(|| claims.sub.clone());
        Ok(UserInfo {
            provider: self.provider_name().to_owned(),
            user_id: claims.sub,
            username,
            name: claims.name,
            email: claims.email,
            provider_scopes_granted: Vec::new(),
            raw_profile: Some(raw),
        })
    }

    async fn revoke_token(&self, token: &str) -> AuthResult<bool> {
        let response = self
            .client
            .post(REVOKE_URL)
            .form(&[("token", token)])
            .send()
            .await
            .map_err(|e| AuthError::upstream(self.provider_name(), e))?;

        if response.status().is_success() {
            Ok(true)
        } else if response.status() == reqwest::StatusCode::BAD_REQUEST {
            Err(AuthError::invalid_token(
                "token is not valid for revocation",
            ))
        } else {
            Err(AuthError::upstream(
                self.provider_name(),
                format!("revocation returned {}", response.status()),
            ))
        }
    }
}
