// ABOUTME: Provider adapter contract and startup registry for upstream identity providers
// ABOUTME: One concrete adapter per IdP plus a deterministic synthetic test double
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 idbridge contributors

//! # Provider Adapters
//!
//! Every upstream identity provider sits behind the [`ProviderAdapter`]
//! contract: build an authorize URL, exchange a code, refresh, fetch
//! normalized user info, revoke. Upstream differences (claim names, scope
//! syntax, token rotation rules, endpoint discovery) are normalized away
//! inside each adapter so the rest of the broker never branches on the
//! provider name.
//!
//! Adapters are selected exactly once at startup via [`create_adapter`];
//! request-handling code only ever sees `Arc<dyn ProviderAdapter>`.

pub mod atlassian;
mod common;
pub mod github;
pub mod google;
pub mod keycloak;
pub mod oidc;
pub mod salesforce;
pub mod synthetic;

pub use atlassian::AtlassianAdapter;
pub use github::GithubAdapter;
pub use google::GoogleAdapter;
pub use keycloak::KeycloakAdapter;
pub use oidc::OidcAdapter;
pub use salesforce::SalesforceAdapter;
pub use synthetic::SyntheticAdapter;

use async_trait::async_trait;
use std::sync::Arc;
use url::Url;

use crate::config::BrokerConfig;
use crate::constants::providers as provider_names;
use crate::errors::AuthResult;
use crate::models::{GrantResult, UserInfo};

/// Parameters for building an upstream authorize URL.
///
/// Grouped into a struct so adapters share one signature; `extra_params` is
/// passed through verbatim for provider-specific switches such as Google's
/// `access_type` or a Keycloak `kc_idp_hint`.
#[derive(Debug, Clone, Copy)]
pub struct AuthorizeUrlParams<'a> {
    /// The broker's callback URL (never the client's redirect URI)
    pub redirect_uri: &'a str,
    /// CSRF state round-tripped through the provider
    pub state: &'a str,
    /// Scopes to request, space-joined into the `scope` parameter
    pub scopes: &'a [String],
    /// PKCE challenge forwarded to the provider
    pub code_challenge: Option<&'a str>,
    /// PKCE challenge method; defaults to `S256` when a challenge is present
    pub code_challenge_method: Option<&'a str>,
    /// Arbitrary extra query parameters, appended last
    pub extra_params: &'a [(String, String)],
}

/// Contract for talking to exactly one upstream identity provider.
#[async_trait]
pub trait ProviderAdapter: Send + Sync {
    /// Stable identifier stored on issued sessions
    fn provider_name(&self) -> &'static str;

    /// Build the upstream authorize URL. Pure string construction.
    fn build_authorize_url(&self, params: &AuthorizeUrlParams<'_>) -> AuthResult<Url>;

    /// Exchange an upstream authorization code for tokens.
    ///
    /// Fails with `invalid_grant` on an unknown code or a PKCE verifier
    /// mismatch.
    async fn exchange_code(
        &self,
        code: &str,
        redirect_uri: &str,
        code_verifier: Option<&str>,
        scopes: Option<&[String]>,
    ) -> AuthResult<GrantResult>;

    /// Rotate the upstream access token. The refresh token value is preserved
    /// across rotations unless the upstream protocol mandates rotation.
    async fn refresh_token(
        &self,
        refresh_token: &str,
        scopes: Option<&[String]>,
    ) -> AuthResult<GrantResult>;

    /// Fetch the normalized identity behind an upstream access token.
    ///
    /// Fails with `invalid_token` for unrecognized tokens.
    async fn fetch_user_info(&self, access_token: &str) -> AuthResult<UserInfo>;

    /// Revoke an upstream token. Returns whether the provider confirmed the
    /// revocation; providers without a revocation endpoint return `false`.
    async fn revoke_token(&self, token: &str) -> AuthResult<bool>;
}

/// Instantiate the configured provider adapter.
///
/// Called once at startup; the generic OIDC adapter performs its one-time
/// discovery-document fetch here so URL building stays pure afterwards.
///
/// # Errors
///
/// Returns an error for an unknown provider name, missing provider-specific
/// settings, or a failed OIDC discovery fetch.
pub async fn create_adapter(config: &BrokerConfig) -> anyhow::Result<Arc<dyn ProviderAdapter>> {
    let adapter: Arc<dyn ProviderAdapter> = match config.provider.as_str() {
        provider_names::GITHUB => Arc::new(GithubAdapter::new(
            config.client_id.clone(),
            config.client_secret.clone(),
        )),
        provider_names::GOOGLE => Arc::new(GoogleAdapter::new(
            config.client_id.clone(),
            config.client_secret.clone(),
        )),
        provider_names::ATLASSIAN => Arc::new(AtlassianAdapter::new(
            config.client_id.clone(),
            config.client_secret.clone(),
        )),
        provider_names::SALESFORCE => Arc::new(SalesforceAdapter::new(
            config.client_id.clone(),
            config.client_secret.clone(),
            config.salesforce_login_url.clone(),
        )),
        provider_names::KEYCLOAK => {
            let base_url = config
                .keycloak_base_url
                .as_deref()
                .ok_or_else(|| anyhow::anyhow!("BROKER_KEYCLOAK_BASE_URL not set"))?;
            let realm = config
                .keycloak_realm
                .as_deref()
                .ok_or_else(|| anyhow::anyhow!("BROKER_KEYCLOAK_REALM not set"))?;
            Arc::new(KeycloakAdapter::new(
                base_url,
                realm,
                config.client_id.clone(),
                config.client_secret.clone(),
            ))
        }
        provider_names::OIDC => {
            let issuer = config
                .oidc_issuer
                .as_deref()
                .ok_or_else(|| anyhow::anyhow!("BROKER_OIDC_ISSUER not set"))?;
            Arc::new(
                OidcAdapter::discover(
                    issuer,
                    config.client_id.clone(),
                    config.client_secret.clone(),
                )
                .await?,
            )
        }
        provider_names::SYNTHETIC => Arc::new(SyntheticAdapter::new()),
        other => anyhow::bail!("unsupported provider: {other}"),
    };

    tracing::info!(provider = adapter.provider_name(), "provider adapter ready");
    Ok(adapter)
}
