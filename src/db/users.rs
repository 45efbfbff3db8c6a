//! Credential store: username/password-hash pairs.

use chrono::Utc;

use super::{is_unique_violation, DbPool, StoreError, User};

#[derive(Clone)]
pub struct UserStore {
    pool: DbPool,
}

impl UserStore {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    /// Create a user. Usernames are unique; a duplicate is a `Conflict`.
    pub async fn create(&self, username: &str, password_hash: &str) -> Result<i64, StoreError> {
        if username.trim().is_empty() {
            return Err(StoreError::Invalid("Username is required".to_string()));
        }
        if password_hash.is_empty() {
            return Err(StoreError::Invalid("Password hash is required".to_string()));
        }

        let now = Utc::now().to_rfc3339();
        let result = sqlx::query(
            "INSERT INTO users (username, password_hash, created_at) VALUES (?, ?, ?)",
        )
        .bind(username)
        .bind(password_hash)
        .bind(&now)
        .execute(&self.pool)
        .await
        .map_err(|e| {
            if is_unique_violation(&e) {
                StoreError::Conflict(format!("Username '{}' is already taken", username))
            } else {
                StoreError::Database(e)
            }
        })?;

        Ok(result.last_insert_rowid())
    }

    pub async fn find_by_username(&self, username: &str) -> Result<Option<User>, StoreError> {
        let user = sqlx::query_as("SELECT * FROM users WHERE username = ?")
            .bind(username)
            .fetch_optional(&self.pool)
            .await?;
        Ok(user)
    }
}
