// ABOUTME: Shared test utilities for integration tests - store, broker, and identity fixtures
// ABOUTME: Builds in-memory brokers around the deterministic synthetic provider
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 idbridge contributors
#![allow(dead_code)]

use std::sync::{Arc, Once};

use idbridge::crypto::generate_encryption_key;
use idbridge::models::{GrantResult, UserInfo};
use idbridge::oauth2_server::{ClientRegistry, OAuth2AuthorizationServer, RegisteredClient};
use idbridge::providers::SyntheticAdapter;
use idbridge::service::{AuthService, AuthorizeRequest, CallbackOutcome};
use idbridge::session::SessionManager;
use idbridge::store::SqlTokenStore;

pub const CLIENT_ID: &str = "c1";
pub const CLIENT_REDIRECT: &str = "https://client.example/app";
pub const BROKER_CALLBACK: &str = "https://broker.example/synthetic/callback";

static INIT_LOGGER: Once = Once::new();

/// Initialize quiet logging for tests (call once per test process)
pub fn init_test_logging() {
    INIT_LOGGER.call_once(|| {
        tracing_subscriber::fmt()
            .with_max_level(tracing::Level::WARN)
            .with_test_writer()
            .init();
    });
}

/// Standard in-memory store with a fresh random key
pub async fn create_test_store() -> Arc<SqlTokenStore> {
    init_test_logging();
    Arc::new(
        SqlTokenStore::connect("sqlite::memory:", generate_encryption_key().to_vec())
            .await
            .expect("in-memory store"),
    )
}

/// Session manager over a fresh in-memory store
pub async fn create_test_session_manager() -> SessionManager {
    SessionManager::new(create_test_store().await)
}

/// A broker wired to the deterministic synthetic provider.
pub struct TestBroker {
    pub adapter: Arc<SyntheticAdapter>,
    pub service: Arc<AuthService>,
}

pub async fn create_test_broker() -> TestBroker {
    let store = create_test_store().await;
    let adapter = Arc::new(SyntheticAdapter::new());
    let service = AuthService::new(
        adapter.clone(),
        SessionManager::new(store),
        BROKER_CALLBACK.to_owned(),
    );
    TestBroker {
        adapter,
        service: Arc::new(service),
    }
}

/// Default client registry: one public PKCE client and one confidential one.
pub fn create_test_client_registry() -> ClientRegistry {
    ClientRegistry::new()
        .with_client(RegisteredClient::public(
            CLIENT_ID,
            vec![CLIENT_REDIRECT.to_owned()],
        ))
        .with_client(RegisteredClient::confidential(
            "c2",
            "c2-secret",
            vec!["https://confidential.example/cb".to_owned()],
        ))
}

/// Broker plus the issuer-mode authorization server facade.
pub struct TestAuthorizationServer {
    pub adapter: Arc<SyntheticAdapter>,
    pub service: Arc<AuthService>,
    pub server: OAuth2AuthorizationServer,
}

pub async fn create_test_authorization_server() -> TestAuthorizationServer {
    let broker = create_test_broker().await;
    let server =
        OAuth2AuthorizationServer::new(broker.service.clone(), create_test_client_registry());
    TestAuthorizationServer {
        adapter: broker.adapter,
        service: broker.service,
        server,
    }
}

/// A plain authorize request from the default client
pub fn authorize_request() -> AuthorizeRequest {
    AuthorizeRequest {
        client_id: CLIENT_ID.to_owned(),
        redirect_uri: CLIENT_REDIRECT.to_owned(),
        scopes: vec!["read".to_owned()],
        ..AuthorizeRequest::default()
    }
}

/// Drive a full login against the synthetic provider: authorize, simulated
/// consent, callback.
pub async fn complete_login(broker: &TestBroker, request: AuthorizeRequest) -> CallbackOutcome {
    let (_url, state) = broker.service.authorize(request).await.expect("authorize");
    let code = broker
        .adapter
        .issue_code(&state.state)
        .expect("upstream code for announced state");
    broker
        .service
        .handle_callback(&code, &state.state, None)
        .await
        .expect("callback")
}

/// Normalized identity fixture matching the synthetic provider's answer
pub fn test_user_info() -> UserInfo {
    UserInfo {
        provider: "synthetic".to_owned(),
        user_id: "synthetic-user-1".to_owned(),
        username: "testuser".to_owned(),
        name: Some("Test User".to_owned()),
        email: Some("testuser@example.com".to_owned()),
        provider_scopes_granted: vec!["read".to_owned()],
        raw_profile: None,
    }
}

/// Upstream grant fixture
pub fn test_grant() -> GrantResult {
    GrantResult {
        access_token: "upstream-access".to_owned(),
        refresh_token: Some("upstream-refresh".to_owned()),
        expires_at: Some(chrono::Utc::now() + chrono::Duration::hours(1)),
        provider_scopes_granted: Some(vec!["read".to_owned()]),
    }
}
