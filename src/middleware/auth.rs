// ABOUTME: Per-request authentication gate resolving bearer tokens to UserContext
// ABOUTME: Downgrades every failure to None; require_auth passes context explicitly
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 idbridge contributors

//! # Authentication Middleware
//!
//! The one place in the broker where failures downgrade instead of raising:
//! an unauthenticated request is a normal, expected case for callers that
//! choose to proceed without identity, so [`check_authentication`] returns
//! `Option<UserContext>` and never an error.
//!
//! Identity is never ambient. [`require_auth`] hands the resolved context to
//! a closure as an explicit argument, so the binding lives exactly as long as
//! the call - every exit path (success, error, early return) drops it, and
//! concurrent requests cannot observe each other's identity.
//!
//! [`check_authentication`]: AuthenticationMiddleware::check_authentication
//! [`require_auth`]: AuthenticationMiddleware::require_auth

use std::future::Future;
use tracing::debug;

use crate::errors::{AuthError, AuthResult};
use crate::models::UserContext;
use crate::session::SessionManager;

/// Request-time authentication gate.
///
/// Constructed with a session manager when authentication is configured, or
/// [`AuthenticationMiddleware::disabled`] when the host runs without a
/// provider - in which case every check resolves to "no identity".
#[derive(Clone)]
pub struct AuthenticationMiddleware {
    sessions: Option<SessionManager>,
}

impl AuthenticationMiddleware {
    #[must_use]
    pub fn new(sessions: SessionManager) -> Self {
        Self {
            sessions: Some(sessions),
        }
    }

    /// Inert middleware for hosts running without authentication.
    #[must_use]
    pub const fn disabled() -> Self {
        Self { sessions: None }
    }

    #[must_use]
    pub const fn is_enabled(&self) -> bool {
        self.sessions.is_some()
    }

    /// Resolve a caller-supplied bearer token into a user context.
    ///
    /// Returns `None` when authentication is disabled, the token is missing
    /// or malformed, or no live session backs it. Expired sessions read as
    /// missing at the store level, so they fall out here too.
    pub async fn check_authentication(&self, bearer: Option<&str>) -> Option<UserContext> {
        let sessions = self.sessions.as_ref()?;

        let token = bearer?.trim();
        let token = token.strip_prefix("Bearer ").unwrap_or(token);
        if token.is_empty() {
            return None;
        }

        match sessions.get_session(token).await {
            Ok(Some(session)) => Some(UserContext::from_session(&session)),
            Ok(None) => {
                debug!("bearer token matched no live session");
                None
            }
            Err(err) => {
                // A store failure is not the caller's fault, but an
                // unauthenticated result is still the safe answer.
                tracing::warn!(error = %err, "session lookup failed during authentication");
                None
            }
        }
    }

    /// Run `handler` with a resolved user context, failing with
    /// `invalid_token` when the request carries no usable identity.
    ///
    /// The context is scoped to the closure call: it is passed by value and
    /// dropped on every exit path, so nothing request-scoped outlives the
    /// request.
    pub async fn require_auth<F, Fut, T>(&self, bearer: Option<&str>, handler: F) -> AuthResult<T>
    where
        F: FnOnce(UserContext) -> Fut,
        Fut: Future<Output = AuthResult<T>>,
    {
        let context = self
            .check_authentication(bearer)
            .await
            .ok_or_else(|| AuthError::invalid_token("authentication required"))?;
        handler(context).await
    }
}
