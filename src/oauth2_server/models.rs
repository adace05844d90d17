// ABOUTME: OAuth 2.0 wire types for the authorization server endpoints
// ABOUTME: Authorize query parameters, callback parameters, and token/revoke form bodies
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 idbridge contributors

use serde::Deserialize;

/// Query parameters of `GET /authorize` (RFC 6749 §4.1.1 plus PKCE).
#[derive(Debug, Clone, Deserialize)]
pub struct AuthorizeParams {
    pub response_type: String,
    pub client_id: String,
    pub redirect_uri: String,
    /// Space-separated scope list
    pub scope: Option<String>,
    /// The client's own CSRF state
    pub state: Option<String>,
    pub code_challenge: Option<String>,
    pub code_challenge_method: Option<String>,
}

impl AuthorizeParams {
    /// Scopes as a list; absent or empty `scope` yields an empty list.
    #[must_use]
    pub fn scopes(&self) -> Vec<String> {
        self.scope
            .as_deref()
            .unwrap_or_default()
            .split_whitespace()
            .map(ToOwned::to_owned)
            .collect()
    }
}

/// Query parameters the upstream provider sends to the callback.
#[derive(Debug, Clone, Deserialize)]
pub struct CallbackParams {
    pub code: Option<String>,
    pub state: Option<String>,
    /// Providers report consent failures as error parameters instead of a code
    pub error: Option<String>,
    pub error_description: Option<String>,
}

/// Form body of `POST /token`.
#[derive(Debug, Clone, Deserialize)]
pub struct TokenRequestForm {
    pub grant_type: String,
    pub code: Option<String>,
    pub code_verifier: Option<String>,
    pub redirect_uri: Option<String>,
    pub refresh_token: Option<String>,
    pub client_id: Option<String>,
    pub client_secret: Option<String>,
}

/// Form body of the revocation endpoint (RFC 7009).
#[derive(Debug, Clone, Deserialize)]
pub struct RevokeForm {
    pub token: String,
}
