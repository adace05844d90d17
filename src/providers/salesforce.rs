// ABOUTME: Salesforce provider adapter with configurable login host for sandboxes
// ABOUTME: Uses the standard /services/oauth2 endpoints and preserved refresh tokens
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

const DEFAULT_LOGIN_URL: &str = "https://login.salesforce.com";

/// Salesforce connected-app adapter.
///
/// Production orgs authenticate against `login.salesforce.com`; sandboxes
/// use `test.salesforce.com`, so the login host is configurable.
pub struct SalesforceAdapter {
    client: Client,
    client_id: String,
    client_secret: String,
    login_url: String,
}

#[derive(Debug, Deserialize)]
struct SalesforceIdentity {
    user_id: String,
    preferred_username: Option<String>,
    name: Option<String>,
    email: Option<String>,
}

impl SalesforceAdapter {
    #[must_use]
    pub fn new(client_id: String, client_secret: String, login_url: Option<String>) -> Self {
        Self {
            client: common::http_client(),
            client_id,
            client_secret,
            login_url: login_url.unwrap_or_else(|| DEFAULT_LOGIN_URL.to_owned()),
        }
    }

    fn endpoint(&self, suffix: &str) -> String {
        format!("{}/services/oauth2/{suffix}", self.login_url.trim_end_matches('/'))
    }
}

#[async_trait]
impl ProviderAdapter for SalesforceAdapter {
    fn provider_name(&self) -> &'static str {
        providers::SALESFORCE
    }

    fn build_authorize_url(&self, params: &AuthorizeUrlParams<'_>) -> AuthResult<Url> {
        common::build_authorize_url(&self.endpoint("authorize"), &self.client_id, params, &[])
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
        common::post_token_form(&self.client, self.provider_name(), &self.endpoint("token"), &form)
            .await
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
        let mut grant = common::post_token_form(
            &self.client,
            self.provider_name(),
            &self.endpoint("token"),
            &form,
        )
        .await?;
        if grant.refresh_token.is_none() {
            grant.refresh_token = Some(refresh_token.to_owned());
        }
        Ok(grant)
    }

    async fn fetch_user_info(&self, access_token: &str) -> AuthResult<UserInfo> {
        let (identity, raw) = common::get_user_profile::<SalesforceIdentity>(
            &self.client,
            self.provider_name(),
            &self.endpoint("userinfo"),
            access_token,
        )
        .await?;

        let username = identity
            .preferred_username
            .clone()
            .unwrap_or_else(|| identity.user_id.clone());
        Ok(UserInfo {
            provider: self.provider_name().to_owned(),
            user_id: identity.user_id,
            username,
            name: identity.name,
            email: identity.email,
            provider_scopes_granted: Vec::new(),
            raw_profile: Some(raw),
        })
    }

    async fn revoke_token(&self, token: &str) -> AuthResult<bool> {
        let response = self
            .client
            .post(self.endpoint("revoke"))
            .form(&[("token", token)])
            .send()
            .await
            .map_err(|e| AuthError::upstream(self.provider_name(), e))?;

        if response.status().is_success() {
            Ok(true)
        } else if response.status() == reqwest::StatusCode::BAD_REQUEST {
            Err(AuthError::invalid_token("token unknown to salesforce"))
        } else {
            Err(AuthError::upstream(
                self.provider_name(),
                format!("revocation returned {}", response.status()),
            ))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sandbox_login_host_is_respected() {
        let adapter = SalesforceAdapter::new(
            "id".into(),
            "secret".into(),
            Some("https://test.salesforce.com/".into()),
        );
        assert_eq!(
            adapter.endpoint("token"),
            "https://test.salesforce.com/services/oauth2/token"
        );
    }
}
