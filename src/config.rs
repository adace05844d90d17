// ABOUTME: Environment-based broker configuration for provider credentials and storage
// ABOUTME: Loads client id/secret, scopes, callback URL, database path, and encryption key
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 idbridge contributors

//! # Broker Configuration
//!
//! Environment-only configuration: each deployment profile sets the upstream
//! provider, its OAuth app credentials, the broker's public callback URL, and
//! the persistence settings through `BROKER_*` variables. The host's own
//! configuration format stays out of scope; hosts that already parse a config
//! file can construct [`BrokerConfig`] directly.

use anyhow::{anyhow, Context, Result};
use base64::{engine::general_purpose, Engine as _};
use std::env;

use crate::crypto::generate_encryption_key;

/// Complete configuration for one broker instance.
#[derive(Debug, Clone)]
pub struct BrokerConfig {
    /// Upstream provider name (`github`, `google`, `atlassian`, `salesforce`,
    /// `keycloak`, `oidc`, or `synthetic` for tests)
    pub provider: String,
    /// OAuth client id registered with the upstream provider
    pub client_id: String,
    /// OAuth client secret registered with the upstream provider
    pub client_secret: String,
    /// Scopes requested from the upstream provider by default
    pub scopes: Vec<String>,
    /// The broker's own public callback URL, registered with the provider.
    /// This is the only redirect URI the upstream ever learns.
    pub callback_url: String,
    /// Public base URL of this broker, used in discovery metadata
    pub issuer_url: String,
    /// SQLite database URL for the token store
    pub database_url: String,
    /// 32-byte AES-256 key for secrets at rest
    pub encryption_key: Vec<u8>,
    /// Provider-specific authorize parameters passed through verbatim
    /// (for example `access_type=offline` for Google)
    pub extra_authorize_params: Vec<(String, String)>,
    /// Salesforce login host override (sandboxes use `test.salesforce.com`)
    pub salesforce_login_url: Option<String>,
    /// Keycloak server base URL
    pub keycloak_base_url: Option<String>,
    /// Keycloak realm name
    pub keycloak_realm: Option<String>,
    /// Issuer URL for the generic OIDC provider
    pub oidc_issuer: Option<String>,
}

impl BrokerConfig {
    /// Load configuration from `BROKER_*` environment variables.
    ///
    /// # Errors
    ///
    /// Returns an error when a required variable is missing or the encryption
    /// key is not valid base64 for 32 bytes.
    pub fn from_env() -> Result<Self> {
        let provider = require_env("BROKER_PROVIDER")?;

        Ok(Self {
            provider,
            client_id: require_env("BROKER_CLIENT_ID")?,
            client_secret: require_env("BROKER_CLIENT_SECRET")?,
            scopes: env::var("BROKER_SCOPES")
                .map(|raw| split_list(&raw))
                .unwrap_or_default(),
            callback_url: require_env("BROKER_CALLBACK_URL")?,
            issuer_url: env::var("BROKER_ISSUER_URL")
                .unwrap_or_else(|_| "http://localhost:8080".to_owned()),
            database_url: env::var("BROKER_DATABASE_URL")
                .unwrap_or_else(|_| "sqlite:idbridge.db".to_owned()),
            encryption_key: load_encryption_key()?,
            extra_authorize_params: env::var("BROKER_EXTRA_AUTHORIZE_PARAMS")
                .map(|raw| parse_pairs(&raw))
                .unwrap_or_default(),
            salesforce_login_url: env::var("BROKER_SALESFORCE_LOGIN_URL").ok(),
            keycloak_base_url: env::var("BROKER_KEYCLOAK_BASE_URL").ok(),
            keycloak_realm: env::var("BROKER_KEYCLOAK_REALM").ok(),
            oidc_issuer: env::var("BROKER_OIDC_ISSUER").ok(),
        })
    }
}

fn require_env(name: &str) -> Result<String> {
    env::var(name).map_err(|_| anyhow!("{name} not set"))
}

/// Decode `BROKER_ENCRYPTION_KEY` (base64, 32 bytes). When unset, generate an
/// ephemeral key: sessions then survive only until restart, which is
/// acceptable for development but warned about loudly.
fn load_encryption_key() -> Result<Vec<u8>> {
    match env::var("BROKER_ENCRYPTION_KEY") {
        Ok(encoded) => {
            let key = general_purpose::STANDARD
                .decode(encoded.trim())
                .context("BROKER_ENCRYPTION_KEY is not valid base64")?;
            if key.len() != 32 {
                return Err(anyhow!(
                    "BROKER_ENCRYPTION_KEY must decode to 32 bytes, got {}",
                    key.len()
                ));
            }
            Ok(key)
        }
        Err(_) => {
            tracing::warn!(
                "BROKER_ENCRYPTION_KEY not set; using an ephemeral key, stored sessions will not survive restart"
            );
            Ok(generate_encryption_key().to_vec())
        }
    }
}

/// Split a scope list on commas and whitespace.
fn split_list(raw: &str) -> Vec<String> {
    raw.split([',', ' '])
        .map(str::trim)
        .filter(|part| !part.is_empty())
        .map(ToOwned::to_owned)
        .collect()
}

/// Parse `key=value,key=value` pairs.
fn parse_pairs(raw: &str) -> Vec<(String, String)> {
    raw.split(',')
        .filter_map(|pair| {
            let (key, value) = pair.split_once('=')?;
            let key = key.trim();
            if key.is_empty() {
                return None;
            }
            Some((key.to_owned(), value.trim().to_owned()))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn split_list_handles_commas_and_spaces() {
        assert_eq!(split_list("read, write profile"), vec!["read", "write", "profile"]);
        assert!(split_list("").is_empty());
    }

    #[test]
    fn parse_pairs_ignores_malformed_entries() {
        let pairs = parse_pairs("access_type=offline,prompt=consent,broken");
        assert_eq!(
            pairs,
            vec![
                ("access_type".to_owned(), "offline".to_owned()),
                ("prompt".to_owned(), "consent".to_owned())
            ]
        );
    }
}
