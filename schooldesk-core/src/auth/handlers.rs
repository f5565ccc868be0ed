use axum::extract::rejection::JsonRejection;
use axum::extract::State;
use axum::http::StatusCode;
use axum::Json;
use serde::Serialize;

use crate::auth::service::{self, LoginRequest, LoginResponse, RegisterRequest};
use crate::error::AppResult;
use crate::models::user::UserResponse;
use crate::response::ApiResponse;
use crate::state::AppState;

#[derive(Debug, Serialize)]
pub struct UserPayload {
    pub user: UserResponse,
}

/// `POST /auth/register`
pub async fn register_handler(
    State(state): State<AppState>,
    body: Result<Json<RegisterRequest>, JsonRejection>,
) -> AppResult<(StatusCode, Json<ApiResponse<UserPayload>>)> {
    let Json(req) = body?;
    let user = service::register(&state.store, req).await?;

    Ok((
        StatusCode::CREATED,
        Json(ApiResponse::with_message(
            "User created successfully",
            UserPayload { user: user.into() },
        )),
    ))
}

/// `POST /auth/login`
pub async fn login_handler(
    State(state): State<AppState>,
    body: Result<Json<LoginRequest>, JsonRejection>,
) -> AppResult<Json<ApiResponse<LoginResponse>>> {
    let Json(req) = body?;
    let response = service::login(&state.store, &state.config.jwt, req).await?;
    Ok(Json(ApiResponse::ok(response)))
}
