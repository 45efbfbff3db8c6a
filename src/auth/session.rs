//! Server-side sessions keyed by an opaque cookie token.
//!
//! Sessions live in the `sessions` table so concurrent requests go through
//! the database's own atomicity. The raw token is returned to the client
//! once at login; only its SHA-256 digest is stored. Expiry is fixed at
//! creation time, not sliding.

use chrono::{DateTime, Duration, Utc};
use rand::Rng;
use sha2::{Digest, Sha256};
use tracing::warn;

use crate::db::{DbPool, Session, StoreError};

/// Identity attached to a request once its session token resolves.
#[derive(Debug, Clone)]
pub struct AuthSession {
    pub user_id: i64,
    pub username: String,
}

#[derive(Clone)]
pub struct SessionManager {
    pool: DbPool,
    ttl: Duration,
}

impl SessionManager {
    pub fn new(pool: DbPool, ttl_minutes: i64) -> Self {
        Self {
            pool,
            ttl: Duration::minutes(ttl_minutes),
        }
    }

    /// Seconds until a freshly created session expires (cookie max-age).
    pub fn ttl_seconds(&self) -> i64 {
        self.ttl.num_seconds()
    }

    /// Create a session for a user and return the raw token.
    pub async fn create(&self, user_id: i64, username: &str) -> Result<String, StoreError> {
        let token = generate_token();
        let token_hash = hash_token(&token);

        let now = Utc::now();
        let expires_at = (now + self.ttl).to_rfc3339();

        let session_id = uuid::Uuid::new_v4().to_string();
        sqlx::query(
            r#"
            INSERT INTO sessions (id, user_id, username, token_hash, expires_at, created_at)
            VALUES (?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&session_id)
        .bind(user_id)
        .bind(username)
        .bind(&token_hash)
        .bind(&expires_at)
        .bind(now.to_rfc3339())
        .execute(&self.pool)
        .await?;

        Ok(token)
    }

    /// Resolve a token to the session identity. Unknown and expired tokens
    /// both come back as `None`; an expired row is deleted on sight.
    pub async fn resolve(&self, token: &str) -> Result<Option<AuthSession>, StoreError> {
        let token_hash = hash_token(token);

        let session: Option<Session> = sqlx::query_as("SELECT * FROM sessions WHERE token_hash = ?")
            .bind(&token_hash)
            .fetch_optional(&self.pool)
            .await?;

        let Some(session) = session else {
            return Ok(None);
        };

        if is_expired(&session.expires_at) {
            sqlx::query("DELETE FROM sessions WHERE token_hash = ?")
                .bind(&token_hash)
                .execute(&self.pool)
                .await?;
            return Ok(None);
        }

        Ok(Some(AuthSession {
            user_id: session.user_id,
            username: session.username,
        }))
    }

    /// Destroy the session for a token. Destroying a session that is
    /// already gone is not an error.
    pub async fn destroy(&self, token: &str) -> Result<(), StoreError> {
        sqlx::query("DELETE FROM sessions WHERE token_hash = ?")
            .bind(hash_token(token))
            .execute(&self.pool)
            .await?;
        Ok(())
    }
}

fn is_expired(expires_at: &str) -> bool {
    match DateTime::parse_from_rfc3339(expires_at) {
        Ok(t) => Utc::now() >= t.with_timezone(&Utc),
        Err(_) => {
            // An unparseable timestamp can only come from manual edits;
            // treat the session as dead rather than immortal.
            warn!("Session row with malformed expires_at: {}", expires_at);
            true
        }
    }
}

/// Generate a random token
fn generate_token() -> String {
    let mut rng = rand::rng();
    let bytes: [u8; 32] = rng.random();
    hex::encode(bytes)
}

/// Hash a token for storage
fn hash_token(token: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(token.as_bytes());
    hex::encode(hasher.finalize())
}
