// ABOUTME: Generic OIDC provider adapter with one-time discovery-document fetch
// ABOUTME: Works against any compliant issuer exposing .well-known/openid-configuration
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

/// Discovery document fields this adapter needs (RFC 8414 / OIDC discovery).
#[derive(Debug, Clone, Deserialize)]
struct DiscoveryDocument {
    authorization_endpoint: String,
    token_endpoint: String,
    userinfo_endpoint: Option<String>,
    revocation_endpoint: Option<String>,
}

/// Generic OpenID Connect adapter.
///
/// [`OidcAdapter::discover`] fetches the issuer's discovery document exactly
/// once, at startup; after that every operation is as static as the
/// fixed-endpoint adapters.
pub struct OidcAdapter {
    client: Client,
    client_id: String,
    client_secret: String,
    endpoints: DiscoveryDocument,
}

#[derive(Debug, Deserialize)]
struct OidcClaims {
    sub: String,
    preferred_username: Option<String>,
    name: Option<String>,
    email: Option<String>,
}

impl OidcAdapter {
    /// Fetch the issuer's discovery document and build the adapter.
    ///
    /// # Errors
    ///
    /// Returns `server_error` when the document cannot be fetched or parsed.
    pub async fn discover(
        issuer: &str,
        client_id: String,
        client_secret: String,
    ) -> AuthResult<Self> {
        let client = common::http_client();
        let discovery_url = format!(
            "{}/.well-known/openid-configuration",
            issuer.trim_end_matches('/')
        );

        let response = client
            .get(&discovery_url)
            .send()
            .await
            .map_err(|e| AuthError::upstream(providers::OIDC, e))?;
        if !response.status().is_success() {
            return Err(AuthError::upstream(
                providers::OIDC,
                format!("discovery returned {}", response.status()),
            ));
        }
        let endpoints: DiscoveryDocument = response.json().await.map_err(|e| {
            AuthError::upstream(providers::OIDC, format!("malformed discovery document: {e}"))
        })?;

        tracing::info!(
            issuer,
            authorization_endpoint = %endpoints.authorization_endpoint,
            "oidc discovery complete"
        );
        Ok(Self {
            client,
            client_id,
            client_secret,
            endpoints,
        })
    }
}

#[async_trait]
impl ProviderAdapter for OidcAdapter {
    fn provider_name(&self) -> &'static str {
        providers::OIDC
    }

    fn build_authorize_url(&self, params: &AuthorizeUrlParams<'_>) -> AuthResult<Url> {
        common::build_authorize_url(
            &self.endpoints.authorization_endpoint,
            &self.client_id,
            params,
            &[],
        )
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
        common::post_token_form(
            &self.client,
            self.provider_name(),
            &self.endpoints.token_endpoint,
            &form,
        )
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
            &self.endpoints.token_endpoint,
            &form,
        )
        .await?;
        if grant.refresh_token.is_none() {
            grant.refresh_token = Some(refresh_token.to_owned());
        }
        Ok(grant)
    }

    async fn fetch_user_info(&self, access_token: &str) -> AuthResult<UserInfo> {
        let userinfo_url = self.endpoints.userinfo_endpoint.as_deref().ok_or_else(|| {
            AuthError::ServerError("issuer exposes no userinfo endpoint".into())
        })?;

        let (claims, raw) = common::get_user_profile::<OidcClaims>(
            &self.client,
            self.provider_name(),
            userinfo_url,
            access_token,
        )
        .await?;

        let username = claims
            .preferred_username
            .clone()
            .or_else(|| claims.email.clone())
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
        let Some(revoke_url) = self.endpoints.revocation_endpoint.as_deref() else {
            tracing::debug!("issuer advertises no revocation endpoint; skipping upstream revoke");
            return Ok(false);
        };

        let response = self
            .client
            .post(revoke_url)
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
