// ABOUTME: Axum HTTP routes for the OAuth 2.0 authorization server surface
// ABOUTME: /authorize, /{provider}/callback, /token, /revoke, and RFC 8414 discovery
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 idbridge contributors

use axum::extract::{Form, Path, Query, State};
use axum::http::{header, HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use std::sync::Arc;
use url::Url;

use super::endpoints::OAuth2AuthorizationServer;
use super::models::{AuthorizeParams, CallbackParams, RevokeForm, TokenRequestForm};
use crate::errors::{AuthError, ErrorBody};

/// Shared state for the OAuth route handlers.
pub struct OAuth2Routes {
    pub server: Arc<OAuth2AuthorizationServer>,
    /// Public base URL advertised in discovery metadata
    pub issuer_url: String,
}

/// Build the OAuth 2.0 router. Hosts nest this under their own routing.
pub fn oauth2_routes(state: Arc<OAuth2Routes>) -> Router {
    Router::new()
        .route("/authorize", get(handle_authorize))
        .route("/:provider/callback", get(handle_callback))
        .route("/token", post(handle_token))
        .route("/revoke", post(handle_revoke))
        .route(
            "/.well-known/oauth-authorization-server",
            get(handle_discovery),
        )
        .with_state(state)
}

/// `GET /authorize` - 302 to the upstream provider's consent screen.
async fn handle_authorize(
    State(state): State<Arc<OAuth2Routes>>,
    Query(params): Query<AuthorizeParams>,
) -> Response {
    match state.server.authorize(&params).await {
        Ok(url) => found_redirect(&url),
        Err(err) => error_response(&err),
    }
}

/// `GET /{provider}/callback` - 302 back to the client with the broker code.
async fn handle_callback(
    State(state): State<Arc<OAuth2Routes>>,
    Path(provider): Path<String>,
    Query(params): Query<CallbackParams>,
) -> Response {
    if provider != state.server.provider_name() {
        let err = AuthError::InvalidGrant(format!("no callback registered for {provider}"));
        return error_response(&err);
    }

    match state.server.handle_callback(&params).await {
        Ok(url) => found_redirect(&url),
        Err(err) => error_response(&err),
    }
}

/// `POST /token` - authorization-code and refresh-token grants.
async fn handle_token(
    State(state): State<Arc<OAuth2Routes>>,
    Form(form): Form<TokenRequestForm>,
) -> Response {
    match state.server.token(&form).await {
        Ok(token) => (StatusCode::OK, Json(token)).into_response(),
        Err(err) => error_response(&err),
    }
}

/// `POST /revoke` - accepts the token as a bearer header or form field.
async fn handle_revoke(
    State(state): State<Arc<OAuth2Routes>>,
    headers: HeaderMap,
    form: Option<Form<RevokeForm>>,
) -> Response {
    let bearer = headers
        .get(header::AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.strip_prefix("Bearer "))
        .map(ToOwned::to_owned);
    let token = bearer.or_else(|| form.map(|Form(body)| body.token));

    let Some(token) = token else {
        let err = AuthError::InvalidGrant("no token to revoke".into());
        return error_response(&err);
    };

    match state.server.revoke_token(&token).await {
        Ok(()) => StatusCode::OK.into_response(),
        Err(err) => error_response(&err),
    }
}

/// `GET /.well-known/oauth-authorization-server` (RFC 8414).
async fn handle_discovery(State(state): State<Arc<OAuth2Routes>>) -> Response {
    let issuer = state.issuer_url.trim_end_matches('/');
    Json(serde_json::json!({
        "issuer": issuer,
        "authorization_endpoint": format!("{issuer}/authorize"),
        "token_endpoint": format!("{issuer}/token"),
        "revocation_endpoint": format!("{issuer}/revoke"),
        "grant_types_supported": ["authorization_code", "refresh_token"],
        "response_types_supported": ["code"],
        "token_endpoint_auth_methods_supported": ["client_secret_post", "none"],
        "code_challenge_methods_supported": ["S256", "plain"],
    }))
    .into_response()
}

/// OAuth redirects conventionally use 302 Found.
fn found_redirect(url: &Url) -> Response {
    (
        StatusCode::FOUND,
        [(header::LOCATION, url.to_string())],
    )
        .into_response()
}

fn error_response(err: &AuthError) -> Response {
    let status =
        StatusCode::from_u16(err.http_status()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
    (status, Json(ErrorBody::from(err))).into_response()
}
