// ABOUTME: Keycloak provider adapter deriving OIDC endpoints from base URL plus realm
// ABOUTME: Standard openid-connect protocol endpoints including token revocation
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

/// Keycloak realm adapter.
///
/// Endpoints follow the fixed `realms/{realm}/protocol/openid-connect/*`
/// layout, so no discovery fetch is needed.
pub struct KeycloakAdapter {
    client: Client,
    client_id: String,
    client_secret: String,
    auth_url: String,
    token_url: String,
    userinfo_url: String,
    revoke_url: String,
}

#[derive(Debug, Deserialize)]
struct KeycloakClaims {
    sub: String,
    preferred_username: Option<String>,
    name: Option<String>,
    email: Option<String>,
}

impl KeycloakAdapter {
    #[must_use]
    pub fn new(base_url: &str, realm: &str, client_id: String, client_secret: String) -> Self {
        let realm_base = format!(
            "{}/realms/{realm}/protocol/openid-connect",
            base_url.trim_end_matches('/')
        );
        Self {
            client: common::http_client(),
            client_id,
            client_secret,
            auth_url: format!("{realm_base}/auth"),
            token_url: format!("{realm_base}/token"),
            userinfo_url: format!("{realm_base}/userinfo"),
            revoke_url: format!("{realm_base}/revoke"),
        }
    }
}

#[async_trait]
impl ProviderAdapter for KeycloakAdapter {
    fn provider_name(&self) -> &'static str {
        providers::KEYCLOAK
    }

    fn build_authorize_url(&self, params: &AuthorizeUrlParams<'_>) -> AuthResult<Url> {
        common::build_authorize_url(&self.auth_url, &self.client_id, params, &[])
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
        common::post_token_form(&self.client, self.provider_name(), &self.token_url, &form).await
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
            common::post_token_form(&self.client, self.provider_name(), &self.token_url, &form)
                .await?;
        if grant.refresh_token.is_none() {
            grant.refresh_token = Some(refresh_token.to_owned());
        }
        Ok(grant)
    }

    async fn fetch_user_info(&self, access_token: &str) -> AuthResult<UserInfo> {
        let (claims, raw) = common::get_user_profile::<KeycloakClaims>(
            &self.client,
            self.provider_name(),
            &self.userinfo_url,
            access_token,
        )
        .await?;

        let username = claims
            .preferred_username
            .clone()
            .unwrap_or_else(|| claims.sub.clone());
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
            .post(&self.revoke_url)
            .form(&[
                ("client_id", self.client_id.as_str()),
                ("client_secret", self.client_secret.as_str()),
                ("token", token),
            ])
            .send()
            .await
            .map_err(|e| AuthError::upstream(self.provider_name(), e))?;

        if response.status().is_success() {
            Ok(true)
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
    fn endpoints_derive_from_realm() {
        let adapter = KeycloakAdapter::new(
            "https://sso.example.com/",
            "tools",
            "id".into(),
            "secret".into(),
        );
        assert_eq!(
            adapter.token_url,
            "https://sso.example.com/realms/tools/protocol/openid-connect/token"
        );
    }
}
