use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::routing::{get, post};
use axum::{Json, Router};
use serde_json::json;
use time::macros::format_description;
use time::{Duration, OffsetDateTime};
use tracing::instrument;
use uuid::Uuid;

use crate::auth::repo as accounts;
use crate::error::{is_unique_violation, ApiError};
use crate::orders::dto::{ChartData, OrderStatus};
use crate::orders::repo::{self as orders, Order, OrderWithAccount};
use crate::phone::normalize_phone;
use crate::state::AppState;
use crate::tokens::{self, AuthAdmin};

use super::dto::{
    AdminAuthResponse, AdminLoginRequest, AdminStats, CreateModeratorRequest, UpdateBidRequest,
    UpdateModeratorRequest, UserPayload,
};
use super::repo::{self, Moderator};
use super::service;

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/admin/login", post(login))
        .route("/admin/logout", post(logout))
        .route("/admin/me", get(me))
        .route("/admin/stats", get(stats))
        .route("/admin/moderators", get(list_moderators).post(create_moderator))
        .route(
            "/admin/moderators/:id",
            get(show_moderator).put(update_moderator).delete(delete_moderator),
        )
        .route("/admin/users", get(list_users).post(create_user))
        .route(
            "/admin/users/:id",
            get(show_user).put(update_user).delete(delete_user),
        )
        .route("/admin/bids", get(list_bids))
        .route("/admin/bids/:id", axum::routing::put(update_bid).delete(delete_bid))
}

#[instrument(skip(state, payload))]
pub async fn login(
    State(state): State<AppState>,
    Json(payload): Json<AdminLoginRequest>,
) -> Result<Json<AdminAuthResponse>, ApiError> {
    let (token, ability, user) =
        service::admin_login(&state, &payload.email, &payload.password).await?;
    Ok(Json(AdminAuthResponse {
        token,
        role: ability.as_str(),
        user,
    }))
}

#[instrument(skip(state, auth))]
pub async fn logout(
    State(state): State<AppState>,
    auth: AuthAdmin,
) -> Result<Json<serde_json::Value>, ApiError> {
    tokens::revoke(&state.db, auth.token_id).await?;
    Ok(Json(json!({ "message": "Logged out" })))
}

#[instrument(skip(state, auth))]
pub async fn me(
    State(state): State<AppState>,
    auth: AuthAdmin,
) -> Result<Json<Moderator>, ApiError> {
    let moderator = repo::find_by_id(&state.db, auth.admin_id)
        .await?
        .ok_or(ApiError::Unauthorized)?;
    Ok(Json(moderator))
}

/// Portal-wide counters plus a 7-day per-day bid chart.
#[instrument(skip(state, _auth))]
pub async fn stats(
    State(state): State<AppState>,
    _auth: AuthAdmin,
) -> Result<Json<AdminStats>, ApiError> {
    let users_count = accounts::count_all(&state.db).await?;
    let bids_count = orders::count_all(&state.db).await?;

    let label_format = format_description!("[day].[month]");
    let today = OffsetDateTime::now_utc().date();

    let mut labels = Vec::with_capacity(7);
    let mut data = Vec::with_capacity(7);
    for i in (0..7i64).rev() {
        let date = today - Duration::days(i);
        let from = date.midnight().assume_utc();
        let to = from + Duration::days(1);
        labels.push(
            date.format(&label_format)
                .map_err(|e| ApiError::Internal(e.to_string()))?,
        );
        data.push(orders::count_between(&state.db, from, to).await?);
    }

    Ok(Json(AdminStats {
        users_count,
        bids_count,
        chart_data: ChartData { labels, data },
    }))
}

// --- moderators (master only) ---

#[instrument(skip(state, auth))]
pub async fn list_moderators(
    State(state): State<AppState>,
    auth: AuthAdmin,
) -> Result<Json<Vec<Moderator>>, ApiError> {
    auth.require_master()?;
    // Self-heal: make sure the master row shows up in the listing.
    service::ensure_master_row(&state).await?;
    let moderators = repo::list_all(&state.db).await?;
    Ok(Json(moderators))
}

#[instrument(skip(state, auth, payload))]
pub async fn create_moderator(
    State(state): State<AppState>,
    auth: AuthAdmin,
    Json(payload): Json<CreateModeratorRequest>,
) -> Result<(StatusCode, Json<Moderator>), ApiError> {
    auth.require_master()?;
    validate_moderator_fields(&payload.name, &payload.email)?;
    service::check_password_policy(&payload.password)?;

    let hash = service::hash_password(&payload.password)?;
    let moderator = repo::create(&state.db, &payload.name, &payload.email, &hash)
        .await
        .map_err(conflict_on_unique_email)?;
    Ok((StatusCode::CREATED, Json(moderator)))
}

#[instrument(skip(state, auth))]
pub async fn show_moderator(
    State(state): State<AppState>,
    auth: AuthAdmin,
    Path(id): Path<Uuid>,
) -> Result<Json<Moderator>, ApiError> {
    auth.require_master()?;
    let moderator = repo::find_by_id(&state.db, id)
        .await?
        .ok_or_else(|| ApiError::NotFound("Модератор не найден".into()))?;
    Ok(Json(moderator))
}

#[instrument(skip(state, auth, payload))]
pub async fn update_moderator(
    State(state): State<AppState>,
    auth: AuthAdmin,
    Path(id): Path<Uuid>,
    Json(payload): Json<UpdateModeratorRequest>,
) -> Result<Json<Moderator>, ApiError> {
    auth.require_master()?;
    validate_moderator_fields(&payload.name, &payload.email)?;

    let hash = match payload.password.as_deref().filter(|p| !p.is_empty()) {
        Some(password) => {
            service::check_password_policy(password)?;
            Some(service::hash_password(password)?)
        }
        None => None,
    };

    repo::find_by_id(&state.db, id)
        .await?
        .ok_or_else(|| ApiError::NotFound("Модератор не найден".into()))?;

    let moderator = repo::update(&state.db, id, &payload.name, &payload.email, hash.as_deref())
        .await
        .map_err(conflict_on_unique_email)?;
    Ok(Json(moderator))
}

#[instrument(skip(state, auth))]
pub async fn delete_moderator(
    State(state): State<AppState>,
    auth: AuthAdmin,
    Path(id): Path<Uuid>,
) -> Result<Json<serde_json::Value>, ApiError> {
    auth.require_master()?;
    let moderator = repo::find_by_id(&state.db, id)
        .await?
        .ok_or_else(|| ApiError::NotFound("Модератор не найден".into()))?;

    // The master row cannot be deleted, even by the master itself.
    if moderator.email == state.config.admin.master_email {
        return Err(ApiError::Forbidden);
    }

    repo::delete(&state.db, id).await?;
    Ok(Json(json!({ "message": "Deleted" })))
}

// --- client accounts ---

#[instrument(skip(state, _auth))]
pub async fn list_users(
    State(state): State<AppState>,
    _auth: AuthAdmin,
) -> Result<Json<Vec<accounts::Account>>, ApiError> {
    let users = accounts::list_all(&state.db).await?;
    Ok(Json(users))
}

#[instrument(skip(state, _auth, payload))]
pub async fn create_user(
    State(state): State<AppState>,
    _auth: AuthAdmin,
    Json(payload): Json<UserPayload>,
) -> Result<(StatusCode, Json<accounts::Account>), ApiError> {
    let (phone, email) = validate_user_payload(&payload)?;
    let user = accounts::create(
        &state.db,
        &payload.name,
        email.as_deref(),
        &phone,
        &payload.organization_name,
        &payload.inn,
    )
    .await
    .map_err(conflict_on_unique_contact)?;
    Ok((StatusCode::CREATED, Json(user)))
}

#[instrument(skip(state, _auth))]
pub async fn show_user(
    State(state): State<AppState>,
    _auth: AuthAdmin,
    Path(id): Path<Uuid>,
) -> Result<Json<accounts::Account>, ApiError> {
    let user = accounts::find_by_id(&state.db, id)
        .await?
        .ok_or_else(|| ApiError::NotFound("Пользователь не найден".into()))?;
    Ok(Json(user))
}

#[instrument(skip(state, _auth, payload))]
pub async fn update_user(
    State(state): State<AppState>,
    _auth: AuthAdmin,
    Path(id): Path<Uuid>,
    Json(payload): Json<UserPayload>,
) -> Result<Json<accounts::Account>, ApiError> {
    let (phone, email) = validate_user_payload(&payload)?;
    accounts::find_by_id(&state.db, id)
        .await?
        .ok_or_else(|| ApiError::NotFound("Пользователь не найден".into()))?;

    let user = accounts::update(
        &state.db,
        id,
        &payload.name,
        email.as_deref(),
        &phone,
        &payload.organization_name,
        &payload.inn,
    )
    .await
    .map_err(conflict_on_unique_contact)?;
    Ok(Json(user))
}

#[instrument(skip(state, _auth))]
pub async fn delete_user(
    State(state): State<AppState>,
    _auth: AuthAdmin,
    Path(id): Path<Uuid>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let deleted = accounts::delete(&state.db, id).await?;
    if deleted == 0 {
        return Err(ApiError::NotFound("Пользователь не найден".into()));
    }
    Ok(Json(json!({ "message": "User deleted" })))
}

// --- bids ---

#[instrument(skip(state, _auth))]
pub async fn list_bids(
    State(state): State<AppState>,
    _auth: AuthAdmin,
) -> Result<Json<Vec<OrderWithAccount>>, ApiError> {
    let bids = orders::list_all_with_account(&state.db).await?;
    Ok(Json(bids))
}

#[instrument(skip(state, _auth, payload))]
pub async fn update_bid(
    State(state): State<AppState>,
    _auth: AuthAdmin,
    Path(id): Path<Uuid>,
    Json(payload): Json<UpdateBidRequest>,
) -> Result<Json<Order>, ApiError> {
    let status: OrderStatus = payload
        .status
        .parse()
        .map_err(|_| ApiError::Validation("Недопустимый статус заявки.".into()))?;

    let bid = orders::update_status(
        &state.db,
        id,
        status.as_str(),
        payload.external_ref.as_ref().map(|r| r.as_deref()),
    )
    .await?
    .ok_or_else(|| ApiError::NotFound("Заявка не найдена".into()))?;
    Ok(Json(bid))
}

#[instrument(skip(state, _auth))]
pub async fn delete_bid(
    State(state): State<AppState>,
    _auth: AuthAdmin,
    Path(id): Path<Uuid>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let deleted = orders::delete(&state.db, id).await?;
    if deleted == 0 {
        return Err(ApiError::NotFound("Заявка не найдена".into()));
    }
    Ok(Json(json!({ "message": "Bid deleted" })))
}

// --- validation helpers ---

fn validate_moderator_fields(name: &str, email: &str) -> Result<(), ApiError> {
    if name.trim().is_empty() {
        return Err(ApiError::Validation("Введите имя.".into()));
    }
    if !service::is_valid_email(email) {
        return Err(ApiError::Validation("Введите корректный Email.".into()));
    }
    Ok(())
}

/// Returns the canonical phone and normalized optional email.
fn validate_user_payload(payload: &UserPayload) -> Result<(String, Option<String>), ApiError> {
    if payload.name.trim().is_empty() {
        return Err(ApiError::Validation("Введите ФИО.".into()));
    }
    let phone = normalize_phone(&payload.phone);
    if phone.is_empty() {
        return Err(ApiError::Validation("Введите телефон.".into()));
    }
    if payload.organization_name.trim().is_empty() {
        return Err(ApiError::Validation(
            "Введите название организации.".into(),
        ));
    }
    if payload.inn.trim().is_empty() {
        return Err(ApiError::Validation("Введите ИНН.".into()));
    }
    let email = match payload.email.as_deref().filter(|e| !e.is_empty()) {
        Some(email) => {
            if !service::is_valid_email(email) {
                return Err(ApiError::Validation("Введите корректный Email.".into()));
            }
            Some(email.to_string())
        }
        None => None,
    };
    Ok((phone, email))
}

fn conflict_on_unique_email(err: sqlx::Error) -> ApiError {
    if is_unique_violation(&err) {
        ApiError::Conflict("Такой Email уже зарегистрирован.".into())
    } else {
        err.into()
    }
}

fn conflict_on_unique_contact(err: sqlx::Error) -> ApiError {
    if is_unique_violation(&err) {
        ApiError::Conflict("Такой Email или телефон уже зарегистрирован.".into())
    } else {
        err.into()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn payload(email: Option<&str>, phone: &str) -> UserPayload {
        UserPayload {
            name: "Иванов Иван".into(),
            email: email.map(String::from),
            phone: phone.into(),
            organization_name: "ООО Ромашка".into(),
            inn: "7701234567".into(),
        }
    }

    #[test]
    fn user_payload_normalizes_phone() {
        let (phone, email) = validate_user_payload(&payload(None, "+7 (912) 345-67-89")).unwrap();
        assert_eq!(phone, "79123456789");
        assert_eq!(email, None);
    }

    #[test]
    fn user_payload_rejects_bad_email_and_empty_phone() {
        assert!(validate_user_payload(&payload(Some("bad"), "79123456789")).is_err());
        assert!(validate_user_payload(&payload(None, "---")).is_err());
    }

    #[test]
    fn empty_email_string_counts_as_absent() {
        let (_, email) = validate_user_payload(&payload(Some(""), "79123456789")).unwrap();
        assert_eq!(email, None);
    }

    #[test]
    fn moderator_fields_validation() {
        assert!(validate_moderator_fields("Админ", "admin@example.com").is_ok());
        assert!(validate_moderator_fields("", "admin@example.com").is_err());
        assert!(validate_moderator_fields("Админ", "nope").is_err());
    }
}
