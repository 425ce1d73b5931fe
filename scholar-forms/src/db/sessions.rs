//! Bearer-token sessions
//!
//! Only the SHA-256 hex digest of a token is stored. The clear token is
//! returned once, by [`create_session`].

use chrono::Duration;
use rand::Rng;
use scholar_common::models::User;
use scholar_common::{time, Error, Result};
use sha2::{Digest, Sha256};
use sqlx::SqlitePool;
use uuid::Uuid;

use super::users;

/// 32 random bytes, hex encoded
pub fn generate_token() -> String {
    let bytes: [u8; 32] = rand::thread_rng().gen();
    bytes.iter().map(|b| format!("{:02x}", b)).collect()
}

/// SHA-256 of the token as 64 hex characters
pub fn hash_token(token: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(token.as_bytes());
    format!("{:x}", hasher.finalize())
}

/// Issue a session for `user_id` valid for `ttl_hours`; returns the clear token
pub async fn create_session(pool: &SqlitePool, user_id: Uuid, ttl_hours: i64) -> Result<String> {
    let token = generate_token();
    let now = time::now();
    let expires_at = Duration::try_hours(ttl_hours)
        .and_then(|ttl| now.checked_add_signed(ttl))
        .ok_or_else(|| Error::Config(format!("session TTL of {} hours is out of range", ttl_hours)))?;

    sqlx::query(
        "INSERT INTO sessions (token_hash, user_id, created_at, expires_at) VALUES (?, ?, ?, ?)",
    )
    .bind(hash_token(&token))
    .bind(user_id.to_string())
    .bind(time::to_db(&now))
    .bind(time::to_db(&expires_at))
    .execute(pool)
    .await?;

    Ok(token)
}

/// Resolve a clear token to its active user.
///
/// `None` for unknown or expired tokens and for deactivated users.
pub async fn resolve_token(pool: &SqlitePool, token: &str) -> Result<Option<User>> {
    let row: Option<(String, String)> =
        sqlx::query_as("SELECT user_id, expires_at FROM sessions WHERE token_hash = ?")
            .bind(hash_token(token))
            .fetch_optional(pool)
            .await?;

    let Some((user_id, expires_at)) = row else {
        return Ok(None);
    };
    if time::from_db(&expires_at)? <= time::now() {
        return Ok(None);
    }

    let user_id = super::forms::parse_uuid(&user_id)?;
    Ok(users::get_user(pool, user_id).await?.filter(|u| u.active))
}

/// Drop expired sessions; returns how many were removed
pub async fn purge_expired(pool: &SqlitePool) -> Result<u64> {
    let result = sqlx::query("DELETE FROM sessions WHERE expires_at <= ?")
        .bind(time::to_db(&time::now()))
        .execute(pool)
        .await?;
    Ok(result.rows_affected())
}
