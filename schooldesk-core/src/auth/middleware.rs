use axum::extract::{Request, State};
use axum::http::HeaderMap;
use axum::middleware::Next;
use axum::response::Response;
use uuid::Uuid;

use crate::auth::jwt::{validate_token, JwtConfig};
use crate::error::{AppError, AppResult};
use crate::models::UserRole;
use crate::state::AppState;

/// Authenticated caller, stored in request extensions by [`require_auth`].
///
/// Handlers read it with `Extension<AuthUser>`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AuthUser {
    pub user_id: Uuid,
    pub role: UserRole,
}

/// Resolves the caller from a `Bearer` token in the `Authorization` header.
pub fn authenticate(headers: &HeaderMap, config: &JwtConfig) -> AppResult<AuthUser> {
    let header = headers
        .get(axum::http::header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .ok_or_else(|| AppError::Unauthorized("Missing Authorization header".into()))?;

    let token = header.strip_prefix("Bearer ").ok_or_else(|| {
        AppError::Unauthorized("Invalid Authorization format. Expected: Bearer <token>".into())
    })?;

    let claims = validate_token(token.trim(), config)
        .map_err(|_| AppError::Unauthorized("Invalid or expired token".into()))?;

    Ok(AuthUser {
        user_id: claims.sub,
        role: claims.role,
    })
}

/// Middleware guarding protected routes.
///
/// On success the request is forwarded with an [`AuthUser`] extension; on
/// failure a `401` JSON error is returned.
pub async fn require_auth(
    State(state): State<AppState>,
    mut req: Request,
    next: Next,
) -> Result<Response, AppError> {
    let user = authenticate(req.headers(), &state.config.jwt)?;
    req.extensions_mut().insert(user);
    Ok(next.run(req).await)
}
