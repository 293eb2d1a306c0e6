//! Credential checks and bearer-token lifecycle.

use std::sync::{Arc, OnceLock};

use async_trait::async_trait;
use sha2::{Digest, Sha256};
use sqlx::SqlitePool;
use uuid::Uuid;

use crate::db;
use crate::errors::{AppError, AppResult};
use crate::jwt::JwtConfig;
use crate::utils::{hash_password, utc_now, verify_password};

/// A verified bearer token.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Session {
    pub user_id: i64,
    pub token_id: String,
}

#[async_trait]
pub trait AuthSession: Send + Sync {
    /// Resolves credentials to a user id. Unknown email and wrong password
    /// fail identically with `InvalidCredentials`.
    async fn authenticate(&self, email: &str, password: &str) -> AppResult<i64>;

    async fn issue_token(&self, user_id: i64) -> AppResult<String>;

    /// Revokes every token of the user and issues a fresh one atomically.
    async fn rotate_tokens(&self, user_id: i64) -> AppResult<String>;

    async fn revoke_token(&self, token_id: &str) -> AppResult<()>;

    async fn revoke_all_tokens(&self, user_id: i64) -> AppResult<()>;

    /// Checks signature, expiry and that the token has not been revoked.
    async fn verify(&self, token: &str) -> AppResult<Session>;
}

/// JWTs whose `jti` digests are recorded in `access_tokens`; deleting the
/// record revokes the token.
#[derive(Clone)]
pub struct SqliteSessions {
    pool: SqlitePool,
    jwt: Arc<JwtConfig>,
}

impl SqliteSessions {
    pub fn new(pool: SqlitePool, jwt: JwtConfig) -> Self {
        dummy_password_hash();
        Self {
            pool,
            jwt: Arc::new(jwt),
        }
    }

    fn mint(&self, user_id: i64) -> AppResult<(String, String)> {
        let jti = Uuid::new_v4().to_string();
        let token = self.jwt.encode(user_id, &jti)?;
        Ok((token, token_id(&jti)))
    }
}

/// Argon2 hash checked against when the email is unknown, so that path costs
/// as much as a wrong password.
fn dummy_password_hash() -> &'static str {
    static HASH: OnceLock<String> = OnceLock::new();
    HASH.get_or_init(|| hash_password("no-such-user-password").unwrap_or_default())
}

/// Hex SHA-256 of the token's `jti`; the raw `jti` is never stored.
pub fn token_id(jti: &str) -> String {
    hex::encode(Sha256::digest(jti.as_bytes()))
}

#[async_trait]
impl AuthSession for SqliteSessions {
    async fn authenticate(&self, email: &str, password: &str) -> AppResult<i64> {
        let Some(user) = db::users::fetch_user_by_email(&self.pool, email).await? else {
            let _ = verify_password(password, dummy_password_hash());
            return Err(AppError::InvalidCredentials);
        };

        if !verify_password(password, &user.password_hash)? {
            return Err(AppError::InvalidCredentials);
        }

        Ok(user.id)
    }

    async fn issue_token(&self, user_id: i64) -> AppResult<String> {
        let (token, token_id) = self.mint(user_id)?;

        sqlx::query("INSERT INTO access_tokens (user_id, token_hash, created_at) VALUES (?, ?, ?)")
            .bind(user_id)
            .bind(&token_id)
            .bind(utc_now())
            .execute(&self.pool)
            .await?;

        Ok(token)
    }

    async fn rotate_tokens(&self, user_id: i64) -> AppResult<String> {
        let (token, token_id) = self.mint(user_id)?;

        let mut tx = self.pool.begin().await?;
        let revoked = sqlx::query("DELETE FROM access_tokens WHERE user_id = ?")
            .bind(user_id)
            .execute(&mut *tx)
            .await?
            .rows_affected();
        sqlx::query("INSERT INTO access_tokens (user_id, token_hash, created_at) VALUES (?, ?, ?)")
            .bind(user_id)
            .bind(&token_id)
            .bind(utc_now())
            .execute(&mut *tx)
            .await?;
        tx.commit().await?;

        tracing::debug!(user_id, revoked, "rotated access tokens");
        Ok(token)
    }

    async fn revoke_token(&self, token_id: &str) -> AppResult<()> {
        sqlx::query("DELETE FROM access_tokens WHERE token_hash = ?")
            .bind(token_id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn revoke_all_tokens(&self, user_id: i64) -> AppResult<()> {
        sqlx::query("DELETE FROM access_tokens WHERE user_id = ?")
            .bind(user_id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn verify(&self, token: &str) -> AppResult<Session> {
        let claims = self.jwt.decode(token)?;
        let token_id = token_id(&claims.jti);

        let owner: Option<i64> = sqlx::query_scalar("SELECT user_id FROM access_tokens WHERE token_hash = ?")
            .bind(&token_id)
            .fetch_optional(&self.pool)
            .await?;

        match owner {
            Some(user_id) if user_id == claims.sub => Ok(Session { user_id, token_id }),
            _ => Err(AppError::token("token has been revoked")),
        }
    }
}
