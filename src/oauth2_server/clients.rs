// ABOUTME: Statically configured OAuth client registry with constant-time secret checks
// ABOUTME: Public clients authenticate with PKCE; confidential clients carry a secret
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 idbridge contributors

use std::collections::HashMap;
use subtle::ConstantTimeEq;

/// One client allowed to talk to this broker.
#[derive(Debug, Clone)]
pub struct RegisteredClient {
    pub client_id: String,
    /// `None` marks a public client, which must use PKCE instead
    pub client_secret: Option<String>,
    /// Exact-match redirect URIs accepted at `/authorize`
    pub redirect_uris: Vec<String>,
    /// Whether `/authorize` rejects requests without a PKCE challenge.
    /// Defaults to true; confidential clients may opt out.
    pub require_pkce: bool,
}

impl RegisteredClient {
    /// A public client: no secret, PKCE mandatory.
    #[must_use]
    pub fn public(client_id: impl Into<String>, redirect_uris: Vec<String>) -> Self {
        Self {
            client_id: client_id.into(),
            client_secret: None,
            redirect_uris,
            require_pkce: true,
        }
    }

    /// A confidential client holding a secret.
    #[must_use]
    pub fn confidential(
        client_id: impl Into<String>,
        client_secret: impl Into<String>,
        redirect_uris: Vec<String>,
    ) -> Self {
        Self {
            client_id: client_id.into(),
            client_secret: Some(client_secret.into()),
            redirect_uris,
            require_pkce: true,
        }
    }

    #[must_use]
    pub fn allow_plain_clients(mut self) -> Self {
        self.require_pkce = false;
        self
    }

    #[must_use]
    pub fn redirect_uri_registered(&self, redirect_uri: &str) -> bool {
        self.redirect_uris.iter().any(|uri| uri == redirect_uri)
    }

    /// Constant-time secret comparison. Public clients validate only when no
    /// secret was presented.
    #[must_use]
    pub fn validate_secret(&self, presented: Option<&str>) -> bool {
        match (&self.client_secret, presented) {
            (None, _) => true,
            (Some(_), None) => false,
            (Some(expected), Some(presented)) => {
                bool::from(expected.as_bytes().ct_eq(presented.as_bytes()))
            }
        }
    }
}

/// Static lookup table of registered clients, built once at startup.
#[derive(Debug, Clone, Default)]
pub struct ClientRegistry {
    clients: HashMap<String, RegisteredClient>,
}

impl ClientRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_client(mut self, client: RegisteredClient) -> Self {
        self.register(client);
        self
    }

    pub fn register(&mut self, client: RegisteredClient) {
        tracing::info!(client_id = %client.client_id, "registered OAuth client");
        self.clients.insert(client.client_id.clone(), client);
    }

    #[must_use]
    pub fn get(&self, client_id: &str) -> Option<&RegisteredClient> {
        self.clients.get(client_id)
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.clients.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn secret_validation_is_exact() {
        let client = RegisteredClient::confidential("c1", "s3cret", vec!["https://c/cb".into()]);
        assert!(client.validate_secret(Some("s3cret")));
        assert!(!client.validate_secret(Some("s3creT")));
        assert!(!client.validate_secret(None));
    }

    #[test]
    fn public_clients_carry_no_secret() {
        let client = RegisteredClient::public("c2", vec!["https://c/cb".into()]);
        assert!(client.validate_secret(None));
        assert!(client.require_pkce);
    }
}
