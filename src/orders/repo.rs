use serde::{Deserialize, Serialize};
use sqlx::{FromRow, PgPool};
use time::OffsetDateTime;
use uuid::Uuid;

/// Order row. `order_type` and `status` are stored as text; the enums in
/// `dto` validate them at the API boundary.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Order {
    pub id: Uuid,
    pub account_id: Uuid,
    #[sqlx(rename = "type")]
    #[serde(rename = "type")]
    pub order_type: String,
    pub status: String,
    pub details: serde_json::Value,
    pub comment: Option<String>,
    pub external_ref: Option<String>,
    pub created_at: OffsetDateTime,
    pub updated_at: OffsetDateTime,
}

/// Order joined with its owner, for the back office list.
#[derive(Debug, Clone, Serialize, FromRow)]
pub struct OrderWithAccount {
    pub id: Uuid,
    pub account_id: Uuid,
    #[sqlx(rename = "type")]
    #[serde(rename = "type")]
    pub order_type: String,
    pub status: String,
    pub details: serde_json::Value,
    pub comment: Option<String>,
    pub external_ref: Option<String>,
    pub created_at: OffsetDateTime,
    pub updated_at: OffsetDateTime,
    pub account_name: String,
    pub account_phone: String,
    pub account_organization: String,
}

const ORDER_COLUMNS: &str =
    "id, account_id, type, status, details, comment, external_ref, created_at, updated_at";

pub async fn list_by_account(db: &PgPool, account_id: Uuid) -> anyhow::Result<Vec<Order>> {
    let rows = sqlx::query_as::<_, Order>(&format!(
        r#"
        SELECT {ORDER_COLUMNS}
        FROM orders
        WHERE account_id = $1
        ORDER BY created_at DESC
        "#
    ))
    .bind(account_id)
    .fetch_all(db)
    .await?;
    Ok(rows)
}

pub async fn create(
    db: &PgPool,
    account_id: Uuid,
    order_type: &str,
    details: &serde_json::Value,
    comment: Option<&str>,
) -> anyhow::Result<Order> {
    let order = sqlx::query_as::<_, Order>(&format!(
        r#"
        INSERT INTO orders (account_id, type, details, comment, status)
        VALUES ($1, $2, $3, $4, 'new')
        RETURNING {ORDER_COLUMNS}
        "#
    ))
    .bind(account_id)
    .bind(order_type)
    .bind(details)
    .bind(comment)
    .fetch_one(db)
    .await?;
    Ok(order)
}

pub async fn find_for_account(
    db: &PgPool,
    id: Uuid,
    account_id: Uuid,
) -> anyhow::Result<Option<Order>> {
    let order = sqlx::query_as::<_, Order>(&format!(
        r#"SELECT {ORDER_COLUMNS} FROM orders WHERE id = $1 AND account_id = $2"#
    ))
    .bind(id)
    .bind(account_id)
    .fetch_optional(db)
    .await?;
    Ok(order)
}

pub async fn count_by_account(db: &PgPool, account_id: Uuid) -> anyhow::Result<i64> {
    let row: (i64,) = sqlx::query_as(r#"SELECT COUNT(*) FROM orders WHERE account_id = $1"#)
        .bind(account_id)
        .fetch_one(db)
        .await?;
    Ok(row.0)
}

pub async fn count_by_account_in_statuses(
    db: &PgPool,
    account_id: Uuid,
    statuses: &[String],
) -> anyhow::Result<i64> {
    let row: (i64,) = sqlx::query_as(
        r#"SELECT COUNT(*) FROM orders WHERE account_id = $1 AND status = ANY($2)"#,
    )
    .bind(account_id)
    .bind(statuses)
    .fetch_one(db)
    .await?;
    Ok(row.0)
}

pub async fn count_by_account_between(
    db: &PgPool,
    account_id: Uuid,
    from: OffsetDateTime,
    to: OffsetDateTime,
) -> anyhow::Result<i64> {
    let row: (i64,) = sqlx::query_as(
        r#"
        SELECT COUNT(*)
        FROM orders
        WHERE account_id = $1 AND created_at >= $2 AND created_at < $3
        "#,
    )
    .bind(account_id)
    .bind(from)
    .bind(to)
    .fetch_one(db)
    .await?;
    Ok(row.0)
}

// Back-office queries.

pub async fn list_all_with_account(db: &PgPool) -> anyhow::Result<Vec<OrderWithAccount>> {
    let rows = sqlx::query_as::<_, OrderWithAccount>(
        r#"
        SELECT o.id, o.account_id, o.type, o.status, o.details, o.comment,
               o.external_ref, o.created_at, o.updated_at,
               a.name AS account_name,
               a.phone AS account_phone,
               a.organization_name AS account_organization
        FROM orders o
        JOIN accounts a ON a.id = o.account_id
        ORDER BY o.created_at DESC
        "#,
    )
    .fetch_all(db)
    .await?;
    Ok(rows)
}

/// `external_ref`: `None` leaves the stored reference alone, `Some(None)`
/// clears it, `Some(Some(_))` replaces it.
pub async fn update_status(
    db: &PgPool,
    id: Uuid,
    status: &str,
    external_ref: Option<Option<&str>>,
) -> anyhow::Result<Option<Order>> {
    let order = sqlx::query_as::<_, Order>(&format!(
        r#"
        UPDATE orders
        SET status = $2,
            external_ref = CASE WHEN $3 THEN $4 ELSE external_ref END,
            updated_at = now()
        WHERE id = $1
        RETURNING {ORDER_COLUMNS}
        "#
    ))
    .bind(id)
    .bind(status)
    .bind(external_ref.is_some())
    .bind(external_ref.flatten())
    .fetch_optional(db)
    .await?;
    Ok(order)
}

pub async fn delete(db: &PgPool, id: Uuid) -> anyhow::Result<u64> {
    let result = sqlx::query(r#"DELETE FROM orders WHERE id = $1"#)
        .bind(id)
        .execute(db)
        .await?;
    Ok(result.rows_affected())
}

pub async fn count_all(db: &PgPool) -> anyhow::Result<i64> {
    let row: (i64,) = sqlx::query_as(r#"SELECT COUNT(*) FROM orders"#)
        .fetch_one(db)
        .await?;
    Ok(row.0)
}

pub async fn count_between(
    db: &PgPool,
    from: OffsetDateTime,
    to: OffsetDateTime,
) -> anyhow::Result<i64> {
    let row: (i64,) = sqlx::query_as(
        r#"SELECT COUNT(*) FROM orders WHERE created_at >= $1 AND created_at < $2"#,
    )
    .bind(from)
    .bind(to)
    .fetch_one(db)
    .await?;
    Ok(row.0)
}
