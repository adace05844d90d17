// ABOUTME: SQLite token store with column-level encryption for secrets at rest
// ABOUTME: Atomic consume via DELETE RETURNING; decryption failures read as not-found
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 idbridge contributors

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqlitePool};
use tracing::warn;

use super::{CleanupReport, TokenStore};
use crate::crypto::FieldCipher;
use crate::errors::{AuthError, AuthResult};
use crate::models::{AuthCodeRecord, StateRecord, StoredSession, UserInfo};

/// Persistent token store over an embedded SQLite database.
///
/// States and auth codes are short-lived, high-entropy values and serve as
/// their own lookup keys; their payload rows carry no further secrets.
/// Session rows hold every secret the broker owns, so those columns are
/// sealed with AES-256-GCM and the broker token columns are additionally
/// indexed by keyed hash - the database never stores a plaintext token.
pub struct SqlTokenStore {
    pool: SqlitePool,
    cipher: FieldCipher,
}

impl SqlTokenStore {
    /// Open (creating if needed) the database at `database_url` and run
    /// migrations.
    pub async fn connect(database_url: &str, encryption_key: Vec<u8>) -> AuthResult<Self> {
        // Ensure SQLite creates the database file if it doesn't exist
        let options = if database_url.starts_with("sqlite:") {
            format!("{database_url}?mode=rwc")
        } else {
            database_url.to_owned()
        };
        let pool = SqlitePool::connect(&options)
            .await
            .map_err(AuthError::storage)?;
        Self::with_pool(pool, encryption_key).await
    }

    /// Build a store over an existing pool and run migrations.
    pub async fn with_pool(pool: SqlitePool, encryption_key: Vec<u8>) -> AuthResult<Self> {
        let store = Self {
            pool,
            cipher: FieldCipher::new(encryption_key)?,
        };
        store.migrate().await?;
        Ok(store)
    }

    async fn migrate(&self) -> AuthResult<()> {
        sqlx::query(
            r"
            CREATE TABLE IF NOT EXISTS states (
                state TEXT PRIMARY KEY,
                client_id TEXT NOT NULL,
                redirect_uri TEXT NOT NULL,
                code_challenge TEXT,
                code_challenge_method TEXT,
                upstream_code_verifier TEXT,
                client_state TEXT,
                scopes TEXT NOT NULL DEFAULT '',
                created_at INTEGER NOT NULL,
                expires_at INTEGER NOT NULL
            )
            ",
        )
        .execute(&self.pool)
        .await
        .map_err(AuthError::storage)?;

        sqlx::query(
            r"
            CREATE TABLE IF NOT EXISTS auth_codes (
                code TEXT PRIMARY KEY,
                session_id TEXT NOT NULL,
                redirect_uri TEXT NOT NULL,
                code_challenge TEXT,
                code_challenge_method TEXT,
                scopes TEXT NOT NULL DEFAULT '',
                created_at INTEGER NOT NULL,
                expires_at INTEGER NOT NULL
            )
            ",
        )
        .execute(&self.pool)
        .await
        .map_err(AuthError::storage)?;

        sqlx::query(
            r"
            CREATE TABLE IF NOT EXISTS sessions (
                session_id TEXT PRIMARY KEY,
                access_token_hash TEXT NOT NULL UNIQUE,
                refresh_token_hash TEXT NOT NULL,
                access_token TEXT NOT NULL,
                refresh_token TEXT NOT NULL,
                provider TEXT NOT NULL,
                user_info_json TEXT NOT NULL,
                provider_access_token TEXT,
                provider_refresh_token TEXT,
                provider_expires_at INTEGER,
                scopes TEXT NOT NULL DEFAULT '',
                created_at INTEGER NOT NULL,
                issued_at INTEGER NOT NULL,
                expires_at INTEGER NOT NULL
            )
            ",
        )
        .execute(&self.pool)
        .await
        .map_err(AuthError::storage)?;

        for statement in [
            "CREATE INDEX IF NOT EXISTS idx_sessions_refresh_hash ON sessions(refresh_token_hash)",
            "CREATE INDEX IF NOT EXISTS idx_states_expires ON states(expires_at)",
            "CREATE INDEX IF NOT EXISTS idx_auth_codes_expires ON auth_codes(expires_at)",
            "CREATE INDEX IF NOT EXISTS idx_sessions_expires ON sessions(expires_at)",
        ] {
            sqlx::query(statement)
                .execute(&self.pool)
                .await
                .map_err(AuthError::storage)?;
        }

        Ok(())
    }

    /// Assemble a state row. The upstream verifier is the one secret-bearing
    /// payload column here, sealed at rest; a decryption failure makes the
    /// whole record read as not-found.
    fn decode_state(&self, state: &str, row: &SqliteRow) -> Option<StateRecord> {
        let upstream_code_verifier = match row.get::<Option<String>, _>("upstream_code_verifier") {
            None => None,
            Some(sealed) => match self.cipher.open(&sealed) {
                Ok(verifier) => Some(verifier),
                Err(err) => {
                    warn!(error = %err, "failed to decrypt upstream code verifier");
                    return None;
                }
            },
        };

        Some(StateRecord {
            state: state.to_owned(),
            client_id: row.get("client_id"),
            redirect_uri: row.get("redirect_uri"),
            code_challenge: row.get("code_challenge"),
            code_challenge_method: row.get("code_challenge_method"),
            upstream_code_verifier,
            client_state: row.get("client_state"),
            scopes: split_scopes(&row.get::<String, _>("scopes")),
            created_at: timestamp(row.get("created_at"))?,
            expires_at: timestamp(row.get("expires_at"))?,
        })
    }

    fn decode_auth_code(code: &str, row: &SqliteRow) -> Option<AuthCodeRecord> {
        Some(AuthCodeRecord {
            code: code.to_owned(),
            session_id: row.get("session_id"),
            redirect_uri: row.get("redirect_uri"),
            code_challenge: row.get("code_challenge"),
            code_challenge_method: row.get("code_challenge_method"),
            scopes: split_scopes(&row.get::<String, _>("scopes")),
            created_at: timestamp(row.get("created_at"))?,
            expires_at: timestamp(row.get("expires_at"))?,
        })
    }

    /// Decrypt and assemble a session row. Any decryption or parse failure
    /// reads as "no such session" - a wrong key must not become a 5xx.
    fn decode_session(&self, row: &SqliteRow) -> Option<StoredSession> {
        let session_id: String = row.get("session_id");

        let open = |column: &str| -> Option<String> {
            let sealed: String = row.get(column);
            match self.cipher.open(&sealed) {
                Ok(value) => Some(value),
                Err(err) => {
                    warn!(%session_id, column, error = %err, "failed to decrypt session column");
                    None
                }
            }
        };
        let open_optional = |column: &str| -> Option<Option<String>> {
            match row.get::<Option<String>, _>(column) {
                None => Some(None),
                Some(sealed) => match self.cipher.open(&sealed) {
                    Ok(value) => Some(Some(value)),
                    Err(err) => {
                        warn!(%session_id, column, error = %err, "failed to decrypt session column");
                        None
                    }
                },
            }
        };

        let user_info_json = open("user_info_json")?;
        let user_info: UserInfo = match serde_json::from_str(&user_info_json) {
            Ok(info) => info,
            Err(err) => {
                warn!(%session_id, error = %err, "stored user info is unreadable");
                return None;
            }
        };

        Some(StoredSession {
            access_token: open("access_token")?,
            refresh_token: open("refresh_token")?,
            provider_access_token: open_optional("provider_access_token")?,
            provider_refresh_token: open_optional("provider_refresh_token")?,
            session_id,
            provider: row.get("provider"),
            user_info,
            provider_expires_at: row
                .get::<Option<i64>, _>("provider_expires_at")
                .and_then(|secs| DateTime::from_timestamp(secs, 0)),
            scopes: split_scopes(&row.get::<String, _>("scopes")),
            created_at: timestamp(row.get("created_at"))?,
            issued_at: timestamp(row.get("issued_at"))?,
            expires_at: timestamp(row.get("expires_at"))?,
        })
    }

    async fn load_session_where(
        &self,
        column: &str,
        value: &str,
    ) -> AuthResult<Option<StoredSession>> {
        let query = format!("SELECT * FROM sessions WHERE {column} = $1");
        let row = sqlx::query(&query)
            .bind(value)
            .fetch_optional(&self.pool)
            .await
            .map_err(AuthError::storage)?;

        Ok(row
            .as_ref()
            .and_then(|row| self.decode_session(row))
            .filter(|session| !session.is_expired()))
    }

    fn bind_session_values<'q>(
        &self,
        query: sqlx::query::Query<'q, sqlx::Sqlite, sqlx::sqlite::SqliteArguments<'q>>,
        session: &StoredSession,
    ) -> AuthResult<sqlx::query::Query<'q, sqlx::Sqlite, sqlx::sqlite::SqliteArguments<'q>>> {
        let user_info_json = serde_json::to_string(&session.user_info)
            .map_err(|e| AuthError::ServerError(format!("user info serialization: {e}")))?;

        let provider_access = session
            .provider_access_token
            .as_deref()
            .map(|token| self.cipher.seal(token))
            .transpose()?;
        let provider_refresh = session
            .provider_refresh_token
            .as_deref()
            .map(|token| self.cipher.seal(token))
            .transpose()?;

        Ok(query
            .bind(self.cipher.lookup_hash(&session.access_token))
            .bind(self.cipher.lookup_hash(&session.refresh_token))
            .bind(self.cipher.seal(&session.access_token)?)
            .bind(self.cipher.seal(&session.refresh_token)?)
            .bind(session.provider.clone())
            .bind(self.cipher.seal(&user_info_json)?)
            .bind(provider_access)
            .bind(provider_refresh)
            .bind(session.provider_expires_at.map(|at| at.timestamp()))
            .bind(join_scopes(&session.scopes))
            .bind(session.created_at.timestamp())
            .bind(session.issued_at.timestamp())
            .bind(session.expires_at.timestamp()))
    }
}

#[async_trait]
impl TokenStore for SqlTokenStore {
    async fn store_state(&self, record: &StateRecord) -> AuthResult<()> {
        let sealed_verifier = record
            .upstream_code_verifier
            .as_deref()
            .map(|verifier| self.cipher.seal(verifier))
            .transpose()?;

        sqlx::query(
            r"
            INSERT INTO states (state, client_id, redirect_uri, code_challenge,
                                code_challenge_method, upstream_code_verifier, client_state,
                                scopes, created_at, expires_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
            ",
        )
        .bind(&record.state)
        .bind(&record.client_id)
        .bind(&record.redirect_uri)
        .bind(&record.code_challenge)
        .bind(&record.code_challenge_method)
        .bind(sealed_verifier)
        .bind(&record.client_state)
        .bind(join_scopes(&record.scopes))
        .bind(record.created_at.timestamp())
        .bind(record.expires_at.timestamp())
        .execute(&self.pool)
        .await
        .map_err(AuthError::storage)?;
        Ok(())
    }

    async fn consume_state(&self, state: &str) -> AuthResult<Option<StateRecord>> {
        // Single-statement check-and-delete: of two concurrent consumers,
        // exactly one gets the row back.
        let row = sqlx::query(
            r"
            DELETE FROM states WHERE state = $1
            RETURNING client_id, redirect_uri, code_challenge, code_challenge_method,
                      upstream_code_verifier, client_state, scopes, created_at, expires_at
            ",
        )
        .bind(state)
        .fetch_optional(&self.pool)
        .await
        .map_err(AuthError::storage)?;

        Ok(row
            .as_ref()
            .and_then(|row| self.decode_state(state, row))
            .filter(|record| !record.is_expired()))
    }

    async fn store_auth_code(&self, record: &AuthCodeRecord) -> AuthResult<()> {
        sqlx::query(
            r"
            INSERT INTO auth_codes (code, session_id, redirect_uri, code_challenge,
                                    code_challenge_method, scopes, created_at, expires_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            ",
        )
        .bind(&record.code)
        .bind(&record.session_id)
        .bind(&record.redirect_uri)
        .bind(&record.code_challenge)
        .bind(&record.code_challenge_method)
        .bind(join_scopes(&record.scopes))
        .bind(record.created_at.timestamp())
        .bind(record.expires_at.timestamp())
        .execute(&self.pool)
        .await
        .map_err(AuthError::storage)?;
        Ok(())
    }

    async fn load_auth_code(&self, code: &str) -> AuthResult<Option<AuthCodeRecord>> {
        let row = sqlx::query("SELECT * FROM auth_codes WHERE code = $1")
            .bind(code)
            .fetch_optional(&self.pool)
            .await
            .map_err(AuthError::storage)?;

        Ok(row
            .as_ref()
            .and_then(|row| Self::decode_auth_code(code, row))
            .filter(|record| !record.is_expired()))
    }

    async fn delete_auth_code(&self, code: &str) -> AuthResult<bool> {
        let result = sqlx::query("DELETE FROM auth_codes WHERE code = $1")
            .bind(code)
            .execute(&self.pool)
            .await
            .map_err(AuthError::storage)?;
        Ok(result.rows_affected() > 0)
    }

    async fn consume_auth_code(&self, code: &str) -> AuthResult<Option<AuthCodeRecord>> {
        let row = sqlx::query(
            r"
            DELETE FROM auth_codes WHERE code = $1
            RETURNING session_id, redirect_uri, code_challenge, code_challenge_method,
                      scopes, created_at, expires_at
            ",
        )
        .bind(code)
        .fetch_optional(&self.pool)
        .await
        .map_err(AuthError::storage)?;

        Ok(row
            .as_ref()
            .and_then(|row| Self::decode_auth_code(code, row))
            .filter(|record| !record.is_expired()))
    }

    async fn store_session(&self, session: &StoredSession) -> AuthResult<()> {
        // Shared binder order: the secret/metadata columns bind $1..$13, the
        // session id binds last, so insert and update use the same helper.
        let query = sqlx::query(
            r"
            INSERT INTO sessions (access_token_hash, refresh_token_hash, access_token,
                                  refresh_token, provider, user_info_json,
                                  provider_access_token, provider_refresh_token,
                                  provider_expires_at, scopes, created_at, issued_at,
                                  expires_at, session_id)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14)
            ",
        );
        self.bind_session_values(query, session)?
            .bind(session.session_id.clone())
            .execute(&self.pool)
            .await
            .map_err(AuthError::storage)?;
        Ok(())
    }

    async fn update_session(&self, session: &StoredSession) -> AuthResult<()> {
        let query = sqlx::query(
            r"
            UPDATE sessions SET
                access_token_hash = $1, refresh_token_hash = $2, access_token = $3,
                refresh_token = $4, provider = $5, user_info_json = $6,
                provider_access_token = $7, provider_refresh_token = $8,
                provider_expires_at = $9, scopes = $10, created_at = $11,
                issued_at = $12, expires_at = $13
            WHERE session_id = $14
            ",
        );
        let result = self
            .bind_session_values(query, session)?
            .bind(session.session_id.clone())
            .execute(&self.pool)
            .await
            .map_err(AuthError::storage)?;

        if result.rows_affected() == 0 {
            return Err(AuthError::ServerError(format!(
                "session {} vanished during update",
                session.session_id
            )));
        }
        Ok(())
    }

    async fn load_session_by_token(
        &self,
        access_token: &str,
    ) -> AuthResult<Option<StoredSession>> {
        self.load_session_where("access_token_hash", &self.cipher.lookup_hash(access_token))
            .await
    }

    async fn load_session_by_refresh_token(
        &self,
        refresh_token: &str,
    ) -> AuthResult<Option<StoredSession>> {
        self.load_session_where("refresh_token_hash", &self.cipher.lookup_hash(refresh_token))
            .await
    }

    async fn load_session_by_id(&self, session_id: &str) -> AuthResult<Option<StoredSession>> {
        self.load_session_where("session_id", session_id).await
    }

    async fn delete_session_by_token(&self, access_token: &str) -> AuthResult<bool> {
        let result = sqlx::query("DELETE FROM sessions WHERE access_token_hash = $1")
            .bind(self.cipher.lookup_hash(access_token))
            .execute(&self.pool)
            .await
            .map_err(AuthError::storage)?;
        Ok(result.rows_affected() > 0)
    }

    async fn cleanup_expired(&self) -> AuthResult<CleanupReport> {
        let now = Utc::now().timestamp();
        let mut report = CleanupReport::default();

        for (table, count) in [
            ("states", &mut report.states),
            ("auth_codes", &mut report.auth_codes),
            ("sessions", &mut report.sessions),
        ] {
            let query = format!("DELETE FROM {table} WHERE expires_at < $1");
            let result = sqlx::query(&query)
                .bind(now)
                .execute(&self.pool)
                .await
                .map_err(AuthError::storage)?;
            *count = result.rows_affected();
        }

        if report.total() > 0 {
            tracing::debug!(
                states = report.states,
                auth_codes = report.auth_codes,
                sessions = report.sessions,
                "swept expired auth records"
            );
        }
        Ok(report)
    }
}

fn timestamp(secs: i64) -> Option<DateTime<Utc>> {
    DateTime::from_timestamp(secs, 0)
}

fn join_scopes(scopes: &[String]) -> String {
    scopes.join(" ")
}

fn split_scopes(raw: &str) -> Vec<String> {
    raw.split_whitespace().map(ToOwned::to_owned).collect()
}
