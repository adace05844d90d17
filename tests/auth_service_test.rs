// ABOUTME: End-to-end tests of the three-step broker flow against the synthetic provider
// ABOUTME: Covers the full login, replay protection, refresh rotation, and revocation
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 idbridge contributors

mod common;

use chrono::Duration;
use idbridge::errors::AuthError;
use idbridge::providers::{ProviderAdapter, SyntheticAdapter};
use idbridge::service::AuthorizeRequest;
use idbridge::session::NewAuthCode;

#[tokio::test]
async fn end_to_end_broker_flow() {
    let broker = common::create_test_broker().await;

    let request = AuthorizeRequest {
        code_challenge: Some(SyntheticAdapter::s256_challenge("client-verifier")),
        code_challenge_method: Some("S256".to_owned()),
        ..common::authorize_request()
    };
    let (url, state) = broker.service.authorize(request).await.unwrap();

    // The upstream URL carries the broker's state and callback, never the
    // client's redirect URI.
    let query: Vec<(String, String)> = url
        .query_pairs()
        .map(|(k, v)| (k.into_owned(), v.into_owned()))
        .collect();
    assert!(query.contains(&("state".to_owned(), state.state.clone())));
    assert!(query.contains(&("redirect_uri".to_owned(), common::BROKER_CALLBACK.to_owned())));
    assert!(!url.as_str().contains("client.example"));

    // Simulated consent, then the callback mints a session and a broker code.
    let code = broker.adapter.issue_code(&state.state).unwrap();
    let outcome = broker
        .service
        .handle_callback(&code, &state.state, None)
        .await
        .unwrap();
    assert!(outcome.session.provider_access_token.is_some());
    assert_eq!(outcome.redirect_uri, common::CLIENT_REDIRECT);
    assert_eq!(
        outcome.auth_code.code_challenge.as_deref(),
        Some(SyntheticAdapter::s256_challenge("client-verifier").as_str())
    );

    // The broker code redeems into exactly the session's token pair.
    let token = broker
        .service
        .exchange_token(&outcome.auth_code.code)
        .await
        .unwrap();
    assert_eq!(token.access_token, outcome.session.access_token);
    assert_eq!(token.refresh_token.as_deref(), Some(outcome.session.refresh_token.as_str()));
    assert_eq!(
        token.provider_access_token,
        outcome.session.provider_access_token
    );
    assert!(token.expires_in > 0);

    // Second redemption of the same code fails.
    let replay = broker.service.exchange_token(&outcome.auth_code.code).await;
    assert!(matches!(replay, Err(AuthError::InvalidGrant(_))));
}

#[tokio::test]
async fn state_cannot_be_replayed() {
    let broker = common::create_test_broker().await;
    let (_url, state) = broker
        .service
        .authorize(common::authorize_request())
        .await
        .unwrap();
    let code = broker.adapter.issue_code(&state.state).unwrap();

    broker
        .service
        .handle_callback(&code, &state.state, None)
        .await
        .unwrap();

    // A forged or replayed callback with the same state dies before any
    // upstream call.
    let second_code = broker.adapter.issue_code(&state.state).unwrap();
    let replay = broker
        .service
        .handle_callback(&second_code, &state.state, None)
        .await;
    assert!(matches!(replay, Err(AuthError::InvalidState(_))));
}

#[tokio::test]
async fn callback_with_unknown_state_fails() {
    let broker = common::create_test_broker().await;
    let result = broker
        .service
        .handle_callback("any-code", "bst_forged", None)
        .await;
    assert!(matches!(result, Err(AuthError::InvalidState(_))));
}

#[tokio::test]
async fn callback_with_unknown_upstream_code_fails() {
    let broker = common::create_test_broker().await;
    let (_url, state) = broker
        .service
        .authorize(common::authorize_request())
        .await
        .unwrap();

    let result = broker
        .service
        .handle_callback("never-issued", &state.state, None)
        .await;
    assert!(matches!(result, Err(AuthError::InvalidGrant(_))));
}

#[tokio::test]
async fn explicit_verifier_overrides_stored_one() {
    let broker = common::create_test_broker().await;
    let (_url, state) = broker
        .service
        .authorize(common::authorize_request())
        .await
        .unwrap();
    let code = broker.adapter.issue_code(&state.state).unwrap();

    // The upstream code is bound to the broker's generated challenge, so an
    // explicit verifier that doesn't match it must fail the exchange.
    let result = broker
        .service
        .handle_callback(&code, &state.state, Some("some-other-verifier"))
        .await;
    assert!(matches!(result, Err(AuthError::InvalidGrant(_))));
}

#[tokio::test]
async fn expired_auth_code_cannot_be_redeemed() {
    let broker = common::create_test_broker().await;
    let outcome = common::complete_login(&broker, common::authorize_request()).await;

    let stale = broker
        .service
        .sessions()
        .create_auth_code(NewAuthCode {
            session_id: outcome.session.session_id.clone(),
            redirect_uri: common::CLIENT_REDIRECT.to_owned(),
            scopes: vec![],
            code_challenge: None,
            code_challenge_method: None,
            ttl: Some(Duration::seconds(-5)),
        })
        .await
        .unwrap();

    let result = broker.service.exchange_token(&stale.code).await;
    assert!(matches!(result, Err(AuthError::InvalidGrant(_))));
}

#[tokio::test]
async fn refresh_rotates_broker_access_token() {
    let broker = common::create_test_broker().await;
    let outcome = common::complete_login(&broker, common::authorize_request()).await;
    let token = broker
        .service
        .exchange_token(&outcome.auth_code.code)
        .await
        .unwrap();
    let refresh = token.refresh_token.clone().unwrap();

    let renewed = broker.service.refresh_token(&refresh).await.unwrap();
    assert_ne!(renewed.access_token, token.access_token);
    assert_eq!(renewed.refresh_token.as_deref(), Some(refresh.as_str()));

    // The superseded access token stops resolving.
    assert!(broker
        .service
        .sessions()
        .get_session(&token.access_token)
        .await
        .unwrap()
        .is_none());
}

#[tokio::test]
async fn refresh_with_unknown_token_fails() {
    let broker = common::create_test_broker().await;
    let result = broker.service.refresh_token("brt_unknown").await;
    assert!(matches!(result, Err(AuthError::InvalidGrant(_))));
}

#[tokio::test]
async fn revocation_removes_session_and_reaches_upstream() {
    let broker = common::create_test_broker().await;
    let outcome = common::complete_login(&broker, common::authorize_request()).await;
    let access_token = outcome.session.access_token.clone();
    let provider_token = outcome.session.provider_access_token.clone().unwrap();

    assert!(broker.service.revoke(&access_token).await.unwrap());
    assert!(broker
        .service
        .sessions()
        .get_session(&access_token)
        .await
        .unwrap()
        .is_none());

    // The upstream token was revoked with the provider too.
    let upstream = broker.adapter.fetch_user_info(&provider_token).await;
    assert!(matches!(upstream, Err(AuthError::InvalidToken(_))));

    // Revoking again reports nothing removed but does not error.
    assert!(!broker.service.revoke(&access_token).await.unwrap());
}
