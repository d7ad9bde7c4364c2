use axum::extract::State;
use axum::routing::{get, post};
use axum::{Json, Router};
use serde_json::json;
use tracing::instrument;

use crate::error::ApiError;
use crate::state::AppState;
use crate::tokens::{self, AuthAccount};

use super::dto::{AuthResponse, ImplicitLoginRequest, SendCodeRequest, VerifyCodeRequest};
use super::repo::Account;
use super::service;

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/auth/send-code", post(send_code))
        .route("/auth/login", post(login))
        .route("/login", post(implicit_login))
        .route("/logout", post(logout))
        .route("/me", get(me))
}

#[instrument(skip(state, payload))]
pub async fn send_code(
    State(state): State<AppState>,
    Json(payload): Json<SendCodeRequest>,
) -> Result<Json<serde_json::Value>, ApiError> {
    service::request_code(&state, &payload.phone).await?;
    Ok(Json(json!({ "message": "Код отправлен" })))
}

#[instrument(skip(state, payload))]
pub async fn login(
    State(state): State<AppState>,
    Json(payload): Json<VerifyCodeRequest>,
) -> Result<Json<AuthResponse>, ApiError> {
    let (access_token, user) =
        service::verify_code_and_login(&state, &payload.phone, &payload.code).await?;
    Ok(Json(AuthResponse {
        access_token,
        token_type: "Bearer".into(),
        user,
    }))
}

#[instrument(skip(state, payload))]
pub async fn implicit_login(
    State(state): State<AppState>,
    Json(payload): Json<ImplicitLoginRequest>,
) -> Result<Json<AuthResponse>, ApiError> {
    let (access_token, user) = service::implicit_login(&state, &payload.phone).await?;
    Ok(Json(AuthResponse {
        access_token,
        token_type: "Bearer".into(),
        user,
    }))
}

#[instrument(skip(state, auth))]
pub async fn logout(
    State(state): State<AppState>,
    auth: AuthAccount,
) -> Result<Json<serde_json::Value>, ApiError> {
    tokens::revoke(&state.db, auth.token_id).await?;
    Ok(Json(json!({ "message": "Logged out" })))
}

#[instrument(skip(state, auth))]
pub async fn me(
    State(state): State<AppState>,
    auth: AuthAccount,
) -> Result<Json<Account>, ApiError> {
    let account = super::repo::find_by_id(&state.db, auth.account_id)
        .await?
        .ok_or(ApiError::Unauthorized)?;
    Ok(Json(account))
}

#[cfg(test)]
mod tests {
    use super::*;
    use time::OffsetDateTime;
    use uuid::Uuid;

    #[test]
    fn auth_response_serializes_bearer_shape() {
        let response = AuthResponse {
            access_token: "secret".into(),
            token_type: "Bearer".into(),
            user: Account {
                id: Uuid::new_v4(),
                name: "ООО Ромашка".into(),
                email: None,
                phone: "79123456789".into(),
                organization_name: "Ромашка".into(),
                inn: "7701234567".into(),
                is_active: true,
                created_at: OffsetDateTime::now_utc(),
            },
        };
        let body = serde_json::to_value(&response).unwrap();
        assert_eq!(body["token_type"], "Bearer");
        assert_eq!(body["access_token"], "secret");
        assert_eq!(body["user"]["phone"], "79123456789");
    }
}
