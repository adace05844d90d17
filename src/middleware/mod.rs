// ABOUTME: Request-time middleware for resolving bearer tokens into user contexts
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 idbridge contributors

mod auth;

pub use auth::AuthenticationMiddleware;
