// ABOUTME: Integration tests for the authentication middleware gate
// ABOUTME: Downgrade-to-None semantics, bearer parsing, and scoped require_auth
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 idbridge contributors

mod common;

use chrono::Duration;
use idbridge::errors::AuthError;
use idbridge::middleware::AuthenticationMiddleware;

#[tokio::test]
async fn disabled_middleware_resolves_no_identity() {
    common::init_test_logging();
    let middleware = AuthenticationMiddleware::disabled();
    assert!(!middleware.is_enabled());
    assert!(middleware.check_authentication(Some("bat_whatever")).await.is_none());
}

#[tokio::test]
async fn missing_and_unknown_tokens_resolve_to_none() {
    let sessions = common::create_test_session_manager().await;
    let middleware = AuthenticationMiddleware::new(sessions);

    assert!(middleware.check_authentication(None).await.is_none());
    assert!(middleware.check_authentication(Some("")).await.is_none());
    assert!(middleware.check_authentication(Some("bat_unknown")).await.is_none());
    assert!(middleware
        .check_authentication(Some("Bearer bat_unknown"))
        .await
        .is_none());
}

#[tokio::test]
async fn valid_token_resolves_user_context() {
    let sessions = common::create_test_session_manager().await;
    let session = sessions
        .issue_session(
            "synthetic",
            common::test_user_info(),
            &common::test_grant(),
            vec!["read".to_owned()],
            None,
        )
        .await
        .unwrap();
    let middleware = AuthenticationMiddleware::new(sessions);

    // Raw token and Bearer-prefixed header both resolve.
    let context = middleware
        .check_authentication(Some(&session.access_token))
        .await
        .unwrap();
    assert_eq!(context.username, "testuser");
    assert_eq!(context.provider, "synthetic");
    assert_eq!(context.session_id, session.session_id);
    assert_eq!(context.provider_access_token.as_deref(), Some("upstream-access"));

    let prefixed = format!("Bearer {}", session.access_token);
    assert!(middleware.check_authentication(Some(&prefixed)).await.is_some());
}

#[tokio::test]
async fn expired_session_resolves_to_none() {
    let sessions = common::create_test_session_manager().await;
    let session = sessions
        .issue_session(
            "synthetic",
            common::test_user_info(),
            &common::test_grant(),
            vec![],
            Some(Duration::seconds(-5)),
        )
        .await
        .unwrap();
    let middleware = AuthenticationMiddleware::new(sessions);

    assert!(middleware
        .check_authentication(Some(&session.access_token))
        .await
        .is_none());
}

#[tokio::test]
async fn require_auth_passes_context_into_scope() {
    let sessions = common::create_test_session_manager().await;
    let session = sessions
        .issue_session("synthetic", common::test_user_info(), &common::test_grant(), vec![], None)
        .await
        .unwrap();
    let middleware = AuthenticationMiddleware::new(sessions);

    let username = middleware
        .require_auth(Some(&session.access_token), |context| async move {
            Ok(context.username)
        })
        .await
        .unwrap();
    assert_eq!(username, "testuser");
}

#[tokio::test]
async fn require_auth_rejects_unauthenticated_requests() {
    let sessions = common::create_test_session_manager().await;
    let middleware = AuthenticationMiddleware::new(sessions);

    let result = middleware
        .require_auth(None, |_context| async move { Ok(()) })
        .await;
    assert!(matches!(result, Err(AuthError::InvalidToken(_))));
}
