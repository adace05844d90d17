// ABOUTME: Library entry point for the idbridge OAuth2 identity broker
// ABOUTME: Wires provider adapters, token store, session manager, and the OAuth server facade
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 idbridge contributors

#![deny(unsafe_code)]

//! # idbridge
//!
//! An embedded OAuth2 identity broker for tool-serving hosts. The host issues
//! its own short-lived, scoped access tokens while delegating end-user
//! authentication to an upstream identity provider (GitHub, Google,
//! Atlassian, Salesforce, Keycloak, or any OIDC issuer) using the
//! authorization-code grant with PKCE.
//!
//! The broker performs a full token-identity translation: the host's tokens
//! never reach the upstream provider, and upstream tokens never reach the
//! calling client.
//!
//! ## Architecture
//!
//! - **Providers**: one [`providers::ProviderAdapter`] per upstream IdP,
//!   selected once at startup, plus a deterministic synthetic double for tests
//! - **Store**: [`store::TokenStore`] persists pending states, single-use
//!   auth codes, and sessions, with secrets encrypted at rest
//! - **Session manager**: [`session::SessionManager`] owns token generation
//!   and record lifecycles
//! - **Service**: [`service::AuthService`] runs the three-step broker flow
//! - **Middleware**: [`middleware::AuthenticationMiddleware`] resolves bearer
//!   tokens into request-scoped user contexts
//! - **OAuth server**: [`oauth2_server::OAuth2AuthorizationServer`] exposes
//!   the standard protocol surface to OAuth-aware clients
//!
//! ## Quick start
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use idbridge::config::BrokerConfig;
//! use idbridge::providers::create_adapter;
//! use idbridge::service::AuthService;
//! use idbridge::session::SessionManager;
//! use idbridge::store::SqlTokenStore;
//!
//! # async fn run() -> anyhow::Result<()> {
//! let config = BrokerConfig::from_env()?;
//! let store = Arc::new(
//!     SqlTokenStore::connect(&config.database_url, config.encryption_key.clone()).await?,
//! );
//! let adapter = create_adapter(&config).await?;
//! let service = AuthService::new(
//!     adapter,
//!     SessionManager::new(store),
//!     config.callback_url.clone(),
//! );
//! # let _ = service;
//! # Ok(())
//! # }
//! ```

/// Environment-based broker configuration
pub mod config;

/// Application constants: token prefixes, TTLs, provider names
pub mod constants;

/// Field encryption and keyed lookup hashing
pub mod crypto;

/// Unified error handling with OAuth-standard codes
pub mod errors;

/// Logging configuration
pub mod logging;

/// Core data model: records, identities, token responses
pub mod models;

/// Protocol-facing OAuth 2.0 authorization server
pub mod oauth2_server;

/// Request-time authentication middleware
pub mod middleware;

/// Upstream identity provider adapters
pub mod providers;

/// The three-step broker flow
pub mod service;

/// Session and token lifecycle management
pub mod session;

/// Durable token storage with at-rest encryption
pub mod store;

pub use errors::{AuthError, AuthResult, RecordFault};
pub use models::{AccessTokenResponse, StoredSession, UserContext, UserInfo};
