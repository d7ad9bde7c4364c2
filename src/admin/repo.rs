use serde::{Deserialize, Serialize};
use sqlx::{FromRow, PgPool};
use time::OffsetDateTime;
use uuid::Uuid;

/// Internal staff identity. The master admin also has a row here, but its
/// stored hash is a random placeholder that is never checked; master login
/// compares against configuration only.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Moderator {
    pub id: Uuid,
    pub name: String,
    pub email: String,
    #[serde(skip_serializing)]
    pub password_hash: String,
    pub created_at: OffsetDateTime,
}

const MODERATOR_COLUMNS: &str = "id, name, email, password_hash, created_at";

pub async fn find_by_email(db: &PgPool, email: &str) -> anyhow::Result<Option<Moderator>> {
    let moderator = sqlx::query_as::<_, Moderator>(&format!(
        r#"SELECT {MODERATOR_COLUMNS} FROM moderators WHERE email = $1"#
    ))
    .bind(email)
    .fetch_optional(db)
    .await?;
    Ok(moderator)
}

pub async fn find_by_id(db: &PgPool, id: Uuid) -> anyhow::Result<Option<Moderator>> {
    let moderator = sqlx::query_as::<_, Moderator>(&format!(
        r#"SELECT {MODERATOR_COLUMNS} FROM moderators WHERE id = $1"#
    ))
    .bind(id)
    .fetch_optional(db)
    .await?;
    Ok(moderator)
}

pub async fn list_all(db: &PgPool) -> anyhow::Result<Vec<Moderator>> {
    let rows = sqlx::query_as::<_, Moderator>(&format!(
        r#"SELECT {MODERATOR_COLUMNS} FROM moderators ORDER BY created_at DESC"#
    ))
    .fetch_all(db)
    .await?;
    Ok(rows)
}

pub async fn create(
    db: &PgPool,
    name: &str,
    email: &str,
    password_hash: &str,
) -> Result<Moderator, sqlx::Error> {
    sqlx::query_as::<_, Moderator>(&format!(
        r#"
        INSERT INTO moderators (name, email, password_hash)
        VALUES ($1, $2, $3)
        RETURNING {MODERATOR_COLUMNS}
        "#
    ))
    .bind(name)
    .bind(email)
    .bind(password_hash)
    .fetch_one(db)
    .await
}

/// Updates a moderator; the hash is only rewritten when a new one is given.
pub async fn update(
    db: &PgPool,
    id: Uuid,
    name: &str,
    email: &str,
    password_hash: Option<&str>,
) -> Result<Moderator, sqlx::Error> {
    sqlx::query_as::<_, Moderator>(&format!(
        r#"
        UPDATE moderators
        SET name = $2, email = $3, password_hash = COALESCE($4, password_hash)
        WHERE id = $1
        RETURNING {MODERATOR_COLUMNS}
        "#
    ))
    .bind(id)
    .bind(name)
    .bind(email)
    .bind(password_hash)
    .fetch_one(db)
    .await
}

pub async fn delete(db: &PgPool, id: Uuid) -> anyhow::Result<u64> {
    let result = sqlx::query(r#"DELETE FROM moderators WHERE id = $1"#)
        .bind(id)
        .execute(db)
        .await?;
    Ok(result.rows_affected())
}
