// ABOUTME: TokenStore contract for durable state, auth code, and session records
// ABOUTME: Consume operations are atomic check-and-delete; cleanup is idempotent
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 idbridge contributors

//! # Token Store
//!
//! Durable storage for the three broker record kinds. The central correctness
//! property lives here: a `consume_*` call is an atomic load-then-delete, so
//! two concurrent consumers of the same value can never both succeed -
//! exactly one observes the record, the other observes `None`. Unknown and
//! expired records are indistinguishable to callers (both are `None`).

mod sql;

pub use sql::SqlTokenStore;

use async_trait::async_trait;

use crate::errors::AuthResult;
use crate::models::{AuthCodeRecord, StateRecord, StoredSession};

/// Row counts removed by one [`TokenStore::cleanup_expired`] sweep.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CleanupReport {
    pub states: u64,
    pub auth_codes: u64,
    pub sessions: u64,
}

impl CleanupReport {
    #[must_use]
    pub const fn total(&self) -> u64 {
        self.states + self.auth_codes + self.sessions
    }
}

/// Durable storage contract for pending states, authorization codes, and
/// sessions. Implementations must be safe under the server's full request
/// concurrency; no caller ever holds a lock across these calls.
#[async_trait]
pub trait TokenStore: Send + Sync {
    async fn store_state(&self, record: &StateRecord) -> AuthResult<()>;

    /// Atomically load and delete a state. Returns `None` for unknown *and*
    /// expired states.
    async fn consume_state(&self, state: &str) -> AuthResult<Option<StateRecord>>;

    async fn store_auth_code(&self, record: &AuthCodeRecord) -> AuthResult<()>;

    async fn load_auth_code(&self, code: &str) -> AuthResult<Option<AuthCodeRecord>>;

    async fn delete_auth_code(&self, code: &str) -> AuthResult<bool>;

    /// Atomically load and delete an auth code; same semantics as
    /// [`Self::consume_state`].
    async fn consume_auth_code(&self, code: &str) -> AuthResult<Option<AuthCodeRecord>>;

    async fn store_session(&self, session: &StoredSession) -> AuthResult<()>;

    /// Rewrite a session row in place (token rotation, upstream refresh).
    async fn update_session(&self, session: &StoredSession) -> AuthResult<()>;

    async fn load_session_by_token(&self, access_token: &str)
        -> AuthResult<Option<StoredSession>>;

    async fn load_session_by_refresh_token(
        &self,
        refresh_token: &str,
    ) -> AuthResult<Option<StoredSession>>;

    async fn load_session_by_id(&self, session_id: &str) -> AuthResult<Option<StoredSession>>;

    async fn delete_session_by_token(&self, access_token: &str) -> AuthResult<bool>;

    /// Delete every row whose TTL has elapsed. Safe to call concurrently and
    /// repeatedly; a second immediate sweep removes nothing.
    async fn cleanup_expired(&self) -> AuthResult<CleanupReport>;
}
