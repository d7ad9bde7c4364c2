use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::routing::get;
use axum::{Json, Router};
use time::macros::format_description;
use time::{Duration, OffsetDateTime};
use tracing::instrument;
use uuid::Uuid;

use crate::error::ApiError;
use crate::state::AppState;
use crate::tokens::AuthAccount;

use super::dto::{ChartData, CreateOrderRequest, OrderStats, OrderStatus, OrderType};
use super::repo::{self, Order};

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/orders", get(list_orders).post(create_order))
        .route("/orders/stats", get(order_stats))
        .route("/orders/:id", get(get_order))
}

#[instrument(skip(state, auth))]
pub async fn list_orders(
    State(state): State<AppState>,
    auth: AuthAccount,
) -> Result<Json<Vec<Order>>, ApiError> {
    let orders = repo::list_by_account(&state.db, auth.account_id).await?;
    Ok(Json(orders))
}

#[instrument(skip(state, auth, payload))]
pub async fn create_order(
    State(state): State<AppState>,
    auth: AuthAccount,
    Json(payload): Json<CreateOrderRequest>,
) -> Result<(StatusCode, Json<Order>), ApiError> {
    let order_type: OrderType = payload
        .order_type
        .parse()
        .map_err(|_| ApiError::Validation("Недопустимый тип заявки.".into()))?;
    if !payload.details.is_object() {
        return Err(ApiError::Validation("Заполните данные заявки.".into()));
    }

    let order = repo::create(
        &state.db,
        auth.account_id,
        order_type.as_str(),
        &payload.details,
        payload.comment.as_deref(),
    )
    .await?;
    Ok((StatusCode::CREATED, Json(order)))
}

#[instrument(skip(state, auth))]
pub async fn get_order(
    State(state): State<AppState>,
    auth: AuthAccount,
    Path(id): Path<Uuid>,
) -> Result<Json<Order>, ApiError> {
    let order = repo::find_for_account(&state.db, id, auth.account_id)
        .await?
        .ok_or_else(|| ApiError::NotFound("Заявка не найдена".into()))?;
    Ok(Json(order))
}

/// Dashboard counters plus a 30-day per-day submission chart.
#[instrument(skip(state, auth))]
pub async fn order_stats(
    State(state): State<AppState>,
    auth: AuthAccount,
) -> Result<Json<OrderStats>, ApiError> {
    let total = repo::count_by_account(&state.db, auth.account_id).await?;
    let processing = repo::count_by_account_in_statuses(
        &state.db,
        auth.account_id,
        &[
            OrderStatus::New.as_str().to_string(),
            OrderStatus::Processing.as_str().to_string(),
        ],
    )
    .await?;
    let completed = repo::count_by_account_in_statuses(
        &state.db,
        auth.account_id,
        &[OrderStatus::Completed.as_str().to_string()],
    )
    .await?;

    let label_format = format_description!("[day].[month]");
    let today = OffsetDateTime::now_utc().date();

    let mut labels = Vec::with_capacity(30);
    let mut data = Vec::with_capacity(30);
    for i in (0..30i64).rev() {
        let date = today - Duration::days(i);
        let from = date.midnight().assume_utc();
        let to = from + Duration::days(1);
        labels.push(
            date.format(&label_format)
                .map_err(|e| ApiError::Internal(e.to_string()))?,
        );
        data.push(repo::count_by_account_between(&state.db, auth.account_id, from, to).await?);
    }

    Ok(Json(OrderStats {
        total,
        processing,
        completed,
        chart: ChartData { labels, data },
    }))
}
