//! Refresh token store
//!
//! Tokens are kept as SHA-256 hex digests; a refresh token that is not in
//! this table is revoked.

use chrono::Utc;
use sha2::{Digest, Sha256};
use sqlx::{Pool, Postgres};
use uuid::Uuid;

use crate::error::{AppError, AppResult};

pub fn hash_token(token: &str) -> String {
    hex::encode(Sha256::digest(token.as_bytes()))
}

#[derive(Clone)]
pub struct AuthenticationsRepository {
    pool: Pool<Postgres>,
}

impl AuthenticationsRepository {
    pub fn new(pool: Pool<Postgres>) -> Self {
        Self { pool }
    }

    /// Remember a freshly issued refresh token
    pub async fn add(&self, user_id: Uuid, token: &str) -> AppResult<()> {
        sqlx::query(
            "INSERT INTO authentications (id, token, user_id, created_at) VALUES ($1, $2, $3, $4)",
        )
        .bind(Uuid::new_v4())
        .bind(hash_token(token))
        .bind(user_id)
        .bind(Utc::now())
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    /// Forget a refresh token. Fails when the token is unknown.
    pub async fn remove(&self, token: &str) -> AppResult<()> {
        let result = sqlx::query("DELETE FROM authentications WHERE token = $1")
            .bind(hash_token(token))
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(AppError::Validation("Refresh token is not valid".to_string()));
        }
        Ok(())
    }

    /// Swap `old` for `new` in one step. Only one of two concurrent
    /// rotations of the same token can succeed.
    pub async fn rotate(&self, user_id: Uuid, old: &str, new: &str) -> AppResult<()> {
        let mut tx = self.pool.begin().await?;

        let result = sqlx::query("DELETE FROM authentications WHERE token = $1 AND user_id = $2")
            .bind(hash_token(old))
            .bind(user_id)
            .execute(&mut *tx)
            .await?;

        if result.rows_affected() == 0 {
            return Err(AppError::Validation("Refresh token is not valid".to_string()));
        }

        sqlx::query(
            "INSERT INTO authentications (id, token, user_id, created_at) VALUES ($1, $2, $3, $4)",
        )
        .bind(Uuid::new_v4())
        .bind(hash_token(new))
        .bind(user_id)
        .bind(Utc::now())
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hash_token_is_stable_hex() {
        let digest = hash_token("refresh-token");
        assert_eq!(digest.len(), 64);
        assert_eq!(digest, hash_token("refresh-token"));
        assert_ne!(digest, hash_token("refresh-token2"));
        assert!(digest.chars().all(|c| c.is_ascii_hexdigit()));
    }
}
