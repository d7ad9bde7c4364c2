use serde::{Deserialize, Serialize};
use sqlx::{FromRow, PgPool, Postgres, Transaction};
use time::OffsetDateTime;
use uuid::Uuid;

/// Client account, keyed by canonical phone.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Account {
    pub id: Uuid,
    pub name: String,
    pub email: Option<String>,
    pub phone: String,
    pub organization_name: String,
    pub inn: String,
    pub is_active: bool,
    pub created_at: OffsetDateTime,
}

const ACCOUNT_COLUMNS: &str =
    "id, name, email, phone, organization_name, inn, is_active, created_at";

/// All accounts stored under any of the given phone spellings, oldest first.
pub async fn find_by_phones(db: &PgPool, phones: &[String]) -> anyhow::Result<Vec<Account>> {
    let rows = sqlx::query_as::<_, Account>(&format!(
        r#"
        SELECT {ACCOUNT_COLUMNS}
        FROM accounts
        WHERE phone = ANY($1)
        ORDER BY created_at ASC
        "#
    ))
    .bind(phones)
    .fetch_all(db)
    .await?;
    Ok(rows)
}

pub async fn exists_by_phones(db: &PgPool, phones: &[String]) -> anyhow::Result<bool> {
    let row: (bool,) =
        sqlx::query_as(r#"SELECT EXISTS(SELECT 1 FROM accounts WHERE phone = ANY($1))"#)
            .bind(phones)
            .fetch_one(db)
            .await?;
    Ok(row.0)
}

pub async fn find_by_id(db: &PgPool, id: Uuid) -> anyhow::Result<Option<Account>> {
    let account = sqlx::query_as::<_, Account>(&format!(
        r#"SELECT {ACCOUNT_COLUMNS} FROM accounts WHERE id = $1"#
    ))
    .bind(id)
    .fetch_optional(db)
    .await?;
    Ok(account)
}

/// Creates the minimal guest account used by the implicit-provisioning login.
pub async fn create_guest(db: &PgPool, phone: &str, name: &str) -> anyhow::Result<Account> {
    let account = sqlx::query_as::<_, Account>(&format!(
        r#"
        INSERT INTO accounts (name, phone)
        VALUES ($1, $2)
        RETURNING {ACCOUNT_COLUMNS}
        "#
    ))
    .bind(name)
    .bind(phone)
    .fetch_one(db)
    .await?;
    Ok(account)
}

/// Overwrites the stored phone with its canonical form. The caller decides
/// what to do with a uniqueness violation.
pub async fn set_phone(db: &PgPool, id: Uuid, phone: &str) -> Result<(), sqlx::Error> {
    sqlx::query(r#"UPDATE accounts SET phone = $2 WHERE id = $1"#)
        .bind(id)
        .bind(phone)
        .execute(db)
        .await?;
    Ok(())
}

pub async fn reassign_orders(
    tx: &mut Transaction<'_, Postgres>,
    from: Uuid,
    to: Uuid,
) -> Result<(), sqlx::Error> {
    sqlx::query(r#"UPDATE orders SET account_id = $2 WHERE account_id = $1"#)
        .bind(from)
        .bind(to)
        .execute(&mut **tx)
        .await?;
    Ok(())
}

pub async fn delete_in_tx(
    tx: &mut Transaction<'_, Postgres>,
    id: Uuid,
) -> Result<(), sqlx::Error> {
    sqlx::query(r#"DELETE FROM accounts WHERE id = $1"#)
        .bind(id)
        .execute(&mut **tx)
        .await?;
    Ok(())
}

// Back-office queries.

pub async fn list_all(db: &PgPool) -> anyhow::Result<Vec<Account>> {
    let rows = sqlx::query_as::<_, Account>(&format!(
        r#"SELECT {ACCOUNT_COLUMNS} FROM accounts ORDER BY created_at DESC"#
    ))
    .fetch_all(db)
    .await?;
    Ok(rows)
}

pub async fn create(
    db: &PgPool,
    name: &str,
    email: Option<&str>,
    phone: &str,
    organization_name: &str,
    inn: &str,
) -> Result<Account, sqlx::Error> {
    sqlx::query_as::<_, Account>(&format!(
        r#"
        INSERT INTO accounts (name, email, phone, organization_name, inn)
        VALUES ($1, $2, $3, $4, $5)
        RETURNING {ACCOUNT_COLUMNS}
        "#
    ))
    .bind(name)
    .bind(email)
    .bind(phone)
    .bind(organization_name)
    .bind(inn)
    .fetch_one(db)
    .await
}

pub async fn update(
    db: &PgPool,
    id: Uuid,
    name: &str,
    email: Option<&str>,
    phone: &str,
    organization_name: &str,
    inn: &str,
) -> Result<Account, sqlx::Error> {
    sqlx::query_as::<_, Account>(&format!(
        r#"
        UPDATE accounts
        SET name = $2, email = $3, phone = $4, organization_name = $5, inn = $6
        WHERE id = $1
        RETURNING {ACCOUNT_COLUMNS}
        "#
    ))
    .bind(id)
    .bind(name)
    .bind(email)
    .bind(phone)
    .bind(organization_name)
    .bind(inn)
    .fetch_one(db)
    .await
}

pub async fn count_all(db: &PgPool) -> anyhow::Result<i64> {
    let row: (i64,) = sqlx::query_as(r#"SELECT COUNT(*) FROM accounts"#)
        .fetch_one(db)
        .await?;
    Ok(row.0)
}

pub async fn delete(db: &PgPool, id: Uuid) -> anyhow::Result<u64> {
    let result = sqlx::query(r#"DELETE FROM accounts WHERE id = $1"#)
        .bind(id)
        .execute(db)
        .await?;
    Ok(result.rows_affected())
}
