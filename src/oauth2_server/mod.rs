// ABOUTME: Issuer-mode OAuth 2.0 authorization server facade over the broker flow
// ABOUTME: Client registry, protocol endpoints, and axum route wiring
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 idbridge contributors

//! # OAuth 2.0 Authorization Server
//!
//! Adapts [`AuthService`](crate::service::AuthService) and the session
//! manager to the protocol surface OAuth-aware client libraries expect:
//! client lookup from a statically configured registry, `/authorize` with
//! required PKCE, the provider callback, authorization-code and
//! refresh-token grants at `/token`, and revocation.

pub mod clients;
pub mod endpoints;
pub mod models;
pub mod routes;

pub use clients::{ClientRegistry, RegisteredClient};
pub use endpoints::OAuth2AuthorizationServer;
pub use models::{AuthorizeParams, CallbackParams, RevokeForm, TokenRequestForm};
pub use routes::{oauth2_routes, OAuth2Routes};
