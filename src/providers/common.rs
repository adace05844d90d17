// ABOUTME: Shared HTTP plumbing for provider adapters - token endpoint calls and userinfo fetches
// ABOUTME: One pooled client with bounded timeouts, uniform error mapping to the OAuth taxonomy
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 idbridge contributors

use chrono::{Duration, Utc};
use reqwest::{Client, ClientBuilder, StatusCode};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use std::sync::OnceLock;
use url::Url;

use super::AuthorizeUrlParams;
use crate::constants::oauth;
use crate::errors::{AuthError, AuthResult, RecordFault};
use crate::models::GrantResult;

/// Global shared HTTP client with connection pooling and bounded timeouts.
///
/// A timed-out upstream call surfaces as a `server_error`; nothing here
/// retries, because replaying a code exchange is exactly the failure mode the
/// protocol defends against.
static SHARED_CLIENT: OnceLock<Client> = OnceLock::new();

pub(crate) fn http_client() -> Client {
    SHARED_CLIENT
        .get_or_init(|| {
            ClientBuilder::new()
                .timeout(std::time::Duration::from_secs(30))
                .connect_timeout(std::time::Duration::from_secs(10))
                .build()
                .unwrap_or_else(|_| Client::new())
        })
        .clone()
}

/// Standard token endpoint response body (RFC 6749 §5.1).
#[derive(Debug, Deserialize)]
pub(crate) struct TokenEndpointResponse {
    pub access_token: String,
    #[allow(dead_code)]
    pub token_type: Option<String>,
    pub expires_in: Option<i64>,
    pub refresh_token: Option<String>,
    pub scope: Option<String>,
}

impl TokenEndpointResponse {
    pub(crate) fn into_grant(self) -> GrantResult {
        GrantResult {
            access_token: self.access_token,
            refresh_token: self.refresh_token,
            expires_at: self.expires_in.map(|secs| Utc::now() + Duration::seconds(secs)),
            provider_scopes_granted: self.scope.map(|raw| split_scopes(&raw)),
        }
    }
}

/// Split a granted-scope string on spaces or commas (GitHub uses commas,
/// everyone else spaces).
pub(crate) fn split_scopes(raw: &str) -> Vec<String> {
    raw.split([' ', ','])
        .filter(|part| !part.is_empty())
        .map(ToOwned::to_owned)
        .collect()
}

/// Build a standard authorization-code authorize URL.
///
/// `fixed` holds the adapter's provider-mandated parameters (for example
/// Atlassian's `audience`); caller-supplied `extra_params` append last so a
/// deployment can override nothing but add anything.
pub(crate) fn build_authorize_url(
    auth_url: &str,
    client_id: &str,
    params: &AuthorizeUrlParams<'_>,
    fixed: &[(&str, &str)],
) -> AuthResult<Url> {
    let mut url = Url::parse(auth_url)
        .map_err(|e| AuthError::ServerError(format!("malformed authorize endpoint: {e}")))?;
    {
        let mut query = url.query_pairs_mut();
        query
            .append_pair("client_id", client_id)
            .append_pair("redirect_uri", params.redirect_uri)
            .append_pair("response_type", oauth::RESPONSE_TYPE_CODE)
            .append_pair("state", params.state);
        if !params.scopes.is_empty() {
            query.append_pair("scope", &params.scopes.join(" "));
        }
        if let Some(challenge) = params.code_challenge {
            query.append_pair("code_challenge", challenge);
            query.append_pair(
                "code_challenge_method",
                params.code_challenge_method.unwrap_or(oauth::PKCE_METHOD_S256),
            );
        }
        for (key, value) in fixed {
            query.append_pair(key, value);
        }
        for (key, value) in params.extra_params {
            query.append_pair(key, value);
        }
    }
    Ok(url)
}

/// POST a form-encoded request to a token endpoint and map the response.
pub(crate) async fn post_token_form(
    client: &Client,
    provider: &str,
    token_url: &str,
    form: &[(&str, &str)],
) -> AuthResult<GrantResult> {
    let response = client
        .post(token_url)
        .header(reqwest::header::ACCEPT, "application/json")
        .form(form)
        .send()
        .await
        .map_err(|e| AuthError::upstream(provider, e))?;

    decode_token_response(provider, response).await
}

/// POST a JSON body to a token endpoint (Atlassian insists on JSON).
pub(crate) async fn post_token_json(
    client: &Client,
    provider: &str,
    token_url: &str,
    body: &serde_json::Value,
) -> AuthResult<GrantResult> {
    let response = client
        .post(token_url)
        .json(body)
        .send()
        .await
        .map_err(|e| AuthError::upstream(provider, e))?;

    decode_token_response(provider, response).await
}

async fn decode_token_response(
    provider: &str,
    response: reqwest::Response,
) -> AuthResult<GrantResult> {
    let status = response.status();
    if status == StatusCode::BAD_REQUEST || status == StatusCode::UNAUTHORIZED {
        // The provider body can carry its own error JSON; log it, return the
        // generic grant failure so upstream detail never reaches the client.
        let body = response.text().await.unwrap_or_default();
        tracing::warn!(provider, %status, body = %body, "provider rejected token request");
        return Err(AuthError::invalid_grant(
            RecordFault::NotFound,
            "upstream authorization grant",
        ));
    }
    if !status.is_success() {
        return Err(AuthError::upstream(
            provider,
            format!("token endpoint returned {status}"),
        ));
    }

    let parsed: TokenEndpointResponse = response
        .json()
        .await
        .map_err(|e| AuthError::upstream(provider, format!("malformed token response: {e}")))?;
    Ok(parsed.into_grant())
}

/// GET a userinfo endpoint with a bearer token; returns the typed claims plus
/// the raw profile document.
pub(crate) async fn get_user_profile<T: DeserializeOwned>(
    client: &Client,
    provider: &str,
    userinfo_url: &str,
    access_token: &str,
) -> AuthResult<(T, serde_json::Value)> {
    let response = client
        .get(userinfo_url)
        .bearer_auth(access_token)
        .header(reqwest::header::USER_AGENT, "idbridge")
        .send()
        .await
        .map_err(|e| AuthError::upstream(provider, e))?;

    let status = response.status();
    if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
        return Err(AuthError::invalid_token("provider rejected access token"));
    }
    if !status.is_success() {
        return Err(AuthError::upstream(
            provider,
            format!("userinfo endpoint returned {status}"),
        ));
    }

    let raw: serde_json::Value = response
        .json()
        .await
        .map_err(|e| AuthError::upstream(provider, format!("malformed userinfo response: {e}")))?;
    let claims: T = serde_json::from_value(raw.clone())
        .map_err(|e| AuthError::upstream(provider, format!("unexpected userinfo shape: {e}")))?;
    Ok((claims, raw))
}
