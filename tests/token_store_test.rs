// ABOUTME: Integration tests for the SQL token store - single use, expiry, encryption
// ABOUTME: Verifies atomic consume semantics and that wrong keys read as not-found
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 idbridge contributors

mod common;

use chrono::{Duration, Utc};
use idbridge::crypto::generate_encryption_key;
use idbridge::models::{AuthCodeRecord, StateRecord, StoredSession};
use idbridge::store::{SqlTokenStore, TokenStore};

fn state_record(state: &str, ttl_secs: i64) -> StateRecord {
    let now = Utc::now();
    StateRecord {
        state: state.to_owned(),
        client_id: "c1".to_owned(),
        redirect_uri: common::CLIENT_REDIRECT.to_owned(),
        code_challenge: Some("challenge".to_owned()),
        code_challenge_method: Some("S256".to_owned()),
        upstream_code_verifier: Some("upstream-verifier".to_owned()),
        client_state: Some("client-state".to_owned()),
        scopes: vec!["read".to_owned()],
        created_at: now,
        expires_at: now + Duration::seconds(ttl_secs),
    }
}

fn auth_code_record(code: &str, ttl_secs: i64) -> AuthCodeRecord {
    let now = Utc::now();
    AuthCodeRecord {
        code: code.to_owned(),
        session_id: "sess-1".to_owned(),
        redirect_uri: common::CLIENT_REDIRECT.to_owned(),
        code_challenge: None,
        code_challenge_method: None,
        scopes: vec!["read".to_owned()],
        created_at: now,
        expires_at: now + Duration::seconds(ttl_secs),
    }
}

fn session_record(access: &str, refresh: &str, ttl_secs: i64) -> StoredSession {
    let now = Utc::now();
    StoredSession {
        session_id: format!("sess-{access}"),
        provider: "synthetic".to_owned(),
        user_info: common::test_user_info(),
        access_token: access.to_owned(),
        refresh_token: refresh.to_owned(),
        provider_access_token: Some("upstream-access".to_owned()),
        provider_refresh_token: Some("upstream-refresh".to_owned()),
        provider_expires_at: Some(now + Duration::hours(1)),
        scopes: vec!["read".to_owned()],
        created_at: now,
        issued_at: now,
        expires_at: now + Duration::seconds(ttl_secs),
    }
}

#[tokio::test]
async fn consume_state_is_single_use() {
    let store = common::create_test_store().await;
    store.store_state(&state_record("bst_one", 300)).await.unwrap();

    let first = store.consume_state("bst_one").await.unwrap();
    assert!(first.is_some());
    let record = first.unwrap();
    assert_eq!(record.client_state.as_deref(), Some("client-state"));
    assert_eq!(record.upstream_code_verifier.as_deref(), Some("upstream-verifier"));

    assert!(store.consume_state("bst_one").await.unwrap().is_none());
}

#[tokio::test]
async fn expired_state_reads_as_missing() {
    let store = common::create_test_store().await;
    store.store_state(&state_record("bst_old", -5)).await.unwrap();
    assert!(store.consume_state("bst_old").await.unwrap().is_none());
}

#[tokio::test]
async fn concurrent_state_consumers_single_winner() {
    let store = common::create_test_store().await;
    store.store_state(&state_record("bst_race", 300)).await.unwrap();

    let (a, b) = tokio::join!(store.consume_state("bst_race"), store.consume_state("bst_race"));
    let winners = [a.unwrap(), b.unwrap()]
        .iter()
        .filter(|result| result.is_some())
        .count();
    assert_eq!(winners, 1);
}

#[tokio::test]
async fn auth_code_consume_load_delete() {
    let store = common::create_test_store().await;
    store.store_auth_code(&auth_code_record("bac_one", 300)).await.unwrap();

    assert!(store.load_auth_code("bac_one").await.unwrap().is_some());
    assert!(store.consume_auth_code("bac_one").await.unwrap().is_some());
    assert!(store.load_auth_code("bac_one").await.unwrap().is_none());
    assert!(store.consume_auth_code("bac_one").await.unwrap().is_none());

    store.store_auth_code(&auth_code_record("bac_two", 300)).await.unwrap();
    assert!(store.delete_auth_code("bac_two").await.unwrap());
    assert!(!store.delete_auth_code("bac_two").await.unwrap());
}

#[tokio::test]
async fn expired_auth_code_reads_as_missing() {
    let store = common::create_test_store().await;
    store.store_auth_code(&auth_code_record("bac_old", -5)).await.unwrap();
    assert!(store.consume_auth_code("bac_old").await.unwrap().is_none());
}

#[tokio::test]
async fn session_round_trip_by_token_and_id() {
    let store = common::create_test_store().await;
    let session = session_record("bat_a", "brt_a", 3600);
    store.store_session(&session).await.unwrap();

    let by_token = store.load_session_by_token("bat_a").await.unwrap().unwrap();
    assert_eq!(by_token.session_id, session.session_id);
    assert_eq!(by_token.access_token, "bat_a");
    assert_eq!(by_token.provider_access_token.as_deref(), Some("upstream-access"));
    assert_eq!(by_token.user_info, common::test_user_info());

    let by_id = store
        .load_session_by_id(&session.session_id)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(by_id.refresh_token, "brt_a");

    let by_refresh = store
        .load_session_by_refresh_token("brt_a")
        .await
        .unwrap()
        .unwrap();
    assert_eq!(by_refresh.session_id, session.session_id);

    assert!(store.load_session_by_token("bat_other").await.unwrap().is_none());
}

#[tokio::test]
async fn expired_session_reads_as_missing() {
    let store = common::create_test_store().await;
    store.store_session(&session_record("bat_old", "brt_old", -5)).await.unwrap();
    assert!(store.load_session_by_token("bat_old").await.unwrap().is_none());
}

#[tokio::test]
async fn delete_session_by_token_reports_removal() {
    let store = common::create_test_store().await;
    store.store_session(&session_record("bat_del", "brt_del", 3600)).await.unwrap();

    assert!(store.delete_session_by_token("bat_del").await.unwrap());
    assert!(!store.delete_session_by_token("bat_del").await.unwrap());
    assert!(store.load_session_by_token("bat_del").await.unwrap().is_none());
}

#[tokio::test]
async fn cleanup_is_idempotent() {
    let store = common::create_test_store().await;
    store.store_state(&state_record("bst_exp", -5)).await.unwrap();
    store.store_auth_code(&auth_code_record("bac_exp", -5)).await.unwrap();
    store.store_session(&session_record("bat_exp", "brt_exp", -5)).await.unwrap();
    store.store_session(&session_record("bat_live", "brt_live", 3600)).await.unwrap();

    let first = store.cleanup_expired().await.unwrap();
    assert_eq!(first.states, 1);
    assert_eq!(first.auth_codes, 1);
    assert_eq!(first.sessions, 1);

    let second = store.cleanup_expired().await.unwrap();
    assert_eq!(second.total(), 0);

    // The live session survives the sweep.
    assert!(store.load_session_by_token("bat_live").await.unwrap().is_some());
}

#[tokio::test]
async fn wrong_encryption_key_reads_as_not_found() {
    common::init_test_logging();
    let dir = tempfile::tempdir().unwrap();
    let url = format!("sqlite:{}", dir.path().join("broker.db").display());

    let writer = SqlTokenStore::connect(&url, generate_encryption_key().to_vec())
        .await
        .unwrap();
    let session = session_record("bat_k", "brt_k", 3600);
    writer.store_session(&session).await.unwrap();
    assert!(writer
        .load_session_by_id(&session.session_id)
        .await
        .unwrap()
        .is_some());

    // Same database, different key: decryption failures must read as
    // not-found, never as a propagated error.
    let reader = SqlTokenStore::connect(&url, generate_encryption_key().to_vec())
        .await
        .unwrap();
    assert!(reader
        .load_session_by_id(&session.session_id)
        .await
        .unwrap()
        .is_none());
}
