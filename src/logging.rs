// ABOUTME: Structured logging setup with env-filter and JSON output for production
// ABOUTME: Small wrapper over tracing-subscriber; hosts embedding the broker may skip it
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 idbridge contributors

use tracing_subscriber::{fmt, EnvFilter};

/// Log output format.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    /// JSON lines for production log pipelines
    Json,
    /// Human-readable output for development
    Pretty,
}

impl LogFormat {
    /// Read `BROKER_LOG_FORMAT` (`json` or anything else for pretty).
    #[must_use]
    pub fn from_env() -> Self {
        match std::env::var("BROKER_LOG_FORMAT").as_deref() {
            Ok("json") => Self::Json,
            _ => Self::Pretty,
        }
    }
}

/// Initialize the global tracing subscriber.
///
/// Filtering follows `RUST_LOG` when set, otherwise `default_filter`
/// (typically `"info"`). Safe to call only once per process; embedding hosts
/// that install their own subscriber simply never call this.
pub fn init(default_filter: &str, format: LogFormat) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter));

    match format {
        LogFormat::Json => fmt()
            .json()
            .with_env_filter(filter)
            .with_current_span(false)
            .init(),
        LogFormat::Pretty => fmt().with_env_filter(filter).init(),
    }

    tracing::debug!("logging initialized");
}
