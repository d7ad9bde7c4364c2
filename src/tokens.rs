//! Opaque DB-backed bearer tokens.
//!
//! A token is a random alphanumeric secret handed to the client once; only
//! its SHA-256 digest is stored. Resolving hashes the presented secret and
//! looks the digest up, revoking deletes the row, so logout invalidates the
//! credential immediately.

use axum::async_trait;
use axum::extract::FromRequestParts;
use axum::http::request::Parts;
use rand::distributions::Alphanumeric;
use rand::Rng;
use sha2::{Digest, Sha256};
use sqlx::{FromRow, PgPool};
use time::OffsetDateTime;
use tracing::warn;
use uuid::Uuid;

use crate::error::ApiError;
use crate::state::AppState;

const SECRET_LEN: usize = 48;

pub const KIND_ACCOUNT: &str = "account";
pub const KIND_ADMIN: &str = "admin";

pub const ABILITY_MASTER: &str = "master";
pub const ABILITY_MODERATOR: &str = "moderator";

#[derive(Debug, Clone, FromRow)]
pub struct AccessToken {
    pub id: Uuid,
    pub principal_kind: String,
    pub principal_id: Uuid,
    pub token_hash: String,
    pub ability: Option<String>,
    pub created_at: OffsetDateTime,
}

pub fn generate_secret() -> String {
    rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(SECRET_LEN)
        .map(char::from)
        .collect()
}

pub fn hash_secret(secret: &str) -> String {
    hex::encode(Sha256::digest(secret.as_bytes()))
}

/// Mints a token for the given principal and returns the plaintext secret.
pub async fn issue(
    db: &PgPool,
    principal_kind: &str,
    principal_id: Uuid,
    ability: Option<&str>,
) -> anyhow::Result<String> {
    let secret = generate_secret();
    sqlx::query(
        r#"
        INSERT INTO access_tokens (principal_kind, principal_id, token_hash, ability)
        VALUES ($1, $2, $3, $4)
        "#,
    )
    .bind(principal_kind)
    .bind(principal_id)
    .bind(hash_secret(&secret))
    .bind(ability)
    .execute(db)
    .await?;
    Ok(secret)
}

pub async fn resolve(db: &PgPool, secret: &str) -> anyhow::Result<Option<AccessToken>> {
    let token = sqlx::query_as::<_, AccessToken>(
        r#"
        SELECT id, principal_kind, principal_id, token_hash, ability, created_at
        FROM access_tokens
        WHERE token_hash = $1
        "#,
    )
    .bind(hash_secret(secret))
    .fetch_optional(db)
    .await?;
    Ok(token)
}

pub async fn revoke(db: &PgPool, token_id: Uuid) -> anyhow::Result<()> {
    sqlx::query(r#"DELETE FROM access_tokens WHERE id = $1"#)
        .bind(token_id)
        .execute(db)
        .await?;
    Ok(())
}

fn bearer_secret(parts: &Parts) -> Result<&str, ApiError> {
    parts
        .headers
        .get(axum::http::header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer ").or_else(|| v.strip_prefix("bearer ")))
        .ok_or(ApiError::Unauthorized)
}

/// Authenticated client account.
pub struct AuthAccount {
    pub account_id: Uuid,
    pub token_id: Uuid,
}

#[async_trait]
impl FromRequestParts<AppState> for AuthAccount {
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let secret = bearer_secret(parts)?;
        let token = resolve(&state.db, secret)
            .await
            .map_err(|e| ApiError::Internal(e.to_string()))?
            .ok_or(ApiError::Unauthorized)?;

        if token.principal_kind != KIND_ACCOUNT {
            warn!(kind = %token.principal_kind, "non-client token on client route");
            return Err(ApiError::Unauthorized);
        }

        Ok(AuthAccount {
            account_id: token.principal_id,
            token_id: token.id,
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AdminAbility {
    Master,
    Moderator,
}

impl AdminAbility {
    pub fn as_str(&self) -> &'static str {
        match self {
            AdminAbility::Master => ABILITY_MASTER,
            AdminAbility::Moderator => ABILITY_MODERATOR,
        }
    }

    fn from_tag(tag: &str) -> Option<Self> {
        match tag {
            ABILITY_MASTER => Some(AdminAbility::Master),
            ABILITY_MODERATOR => Some(AdminAbility::Moderator),
            _ => None,
        }
    }
}

/// Authenticated admin principal with the ability tag minted at login.
pub struct AuthAdmin {
    pub admin_id: Uuid,
    pub ability: AdminAbility,
    pub token_id: Uuid,
}

impl AuthAdmin {
    /// Guard for master-only routes. Checks the token's ability tag rather
    /// than comparing emails, so changing the configured master email does
    /// not break authorization for already-issued sessions.
    pub fn require_master(&self) -> Result<(), ApiError> {
        if self.ability == AdminAbility::Master {
            Ok(())
        } else {
            Err(ApiError::Forbidden)
        }
    }
}

#[async_trait]
impl FromRequestParts<AppState> for AuthAdmin {
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let secret = bearer_secret(parts)?;
        let token = resolve(&state.db, secret)
            .await
            .map_err(|e| ApiError::Internal(e.to_string()))?
            .ok_or(ApiError::Unauthorized)?;

        if token.principal_kind != KIND_ADMIN {
            warn!(kind = %token.principal_kind, "non-admin token on admin route");
            return Err(ApiError::Unauthorized);
        }

        let ability = token
            .ability
            .as_deref()
            .and_then(AdminAbility::from_tag)
            .ok_or(ApiError::Unauthorized)?;

        Ok(AuthAdmin {
            admin_id: token.principal_id,
            ability,
            token_id: token.id,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn secret_is_long_and_alphanumeric() {
        let secret = generate_secret();
        assert_eq!(secret.len(), SECRET_LEN);
        assert!(secret.chars().all(|c| c.is_ascii_alphanumeric()));
    }

    #[test]
    fn secrets_are_unique() {
        assert_ne!(generate_secret(), generate_secret());
    }

    #[test]
    fn hash_is_deterministic_and_hex() {
        let h1 = hash_secret("abc");
        let h2 = hash_secret("abc");
        assert_eq!(h1, h2);
        assert_eq!(h1.len(), 64);
        assert!(h1.chars().all(|c| c.is_ascii_hexdigit()));
        assert_ne!(hash_secret("abd"), h1);
    }

    #[test]
    fn ability_tags_round_trip() {
        assert_eq!(
            AdminAbility::from_tag(AdminAbility::Master.as_str()),
            Some(AdminAbility::Master)
        );
        assert_eq!(
            AdminAbility::from_tag(AdminAbility::Moderator.as_str()),
            Some(AdminAbility::Moderator)
        );
        assert_eq!(AdminAbility::from_tag("root"), None);
    }

    #[test]
    fn master_guard_rejects_moderator() {
        let admin = AuthAdmin {
            admin_id: Uuid::new_v4(),
            ability: AdminAbility::Moderator,
            token_id: Uuid::new_v4(),
        };
        assert!(matches!(
            admin.require_master(),
            Err(ApiError::Forbidden)
        ));

        let master = AuthAdmin {
            admin_id: Uuid::new_v4(),
            ability: AdminAbility::Master,
            token_id: Uuid::new_v4(),
        };
        assert!(master.require_master().is_ok());
    }
}
