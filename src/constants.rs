// ABOUTME: Application constants for token prefixes, default lifetimes, and provider names
// ABOUTME: Centralizes the magic values shared by the session manager and the OAuth server
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 idbridge contributors

/// Prefixes for broker-issued opaque values.
///
/// Every value the broker mints carries a distinct prefix so that a pasted
/// token can be identified at a glance and token-type confusion (an auth code
/// presented as an access token, or vice versa) is immediately visible in
/// logs and bug reports.
pub mod token_prefixes {
    /// CSRF state round-tripped through the upstream provider
    pub const STATE: &str = "bst_";
    /// Broker-issued authorization code
    pub const AUTH_CODE: &str = "bac_";
    /// Broker-issued access token
    pub const ACCESS_TOKEN: &str = "bat_";
    /// Broker-issued refresh token
    pub const REFRESH_TOKEN: &str = "brt_";
}

/// Default record lifetimes in seconds, overridable per call.
pub mod ttl {
    /// Pending authorize state: 5 minutes
    pub const STATE_SECS: i64 = 300;
    /// Broker authorization code: 5 minutes
    pub const AUTH_CODE_SECS: i64 = 300;
    /// Broker access token: 1 hour
    pub const ACCESS_TOKEN_SECS: i64 = 3600;
}

/// OAuth 2.0 protocol literals.
pub mod oauth {
    pub const TOKEN_TYPE_BEARER: &str = "Bearer";
    pub const RESPONSE_TYPE_CODE: &str = "code";
    pub const GRANT_TYPE_AUTHORIZATION_CODE: &str = "authorization_code";
    pub const GRANT_TYPE_REFRESH_TOKEN: &str = "refresh_token";
    pub const PKCE_METHOD_S256: &str = "S256";
    pub const PKCE_METHOD_PLAIN: &str = "plain";
}

/// Stable provider identifiers stored on issued sessions.
pub mod providers {
    pub const GITHUB: &str = "github";
    pub const GOOGLE: &str = "google";
    pub const ATLASSIAN: &str = "atlassian";
    pub const SALESFORCE: &str = "salesforce";
    pub const KEYCLOAK: &str = "keycloak";
    pub const OIDC: &str = "oidc";
    pub const SYNTHETIC: &str = "synthetic";
}
