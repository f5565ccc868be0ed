use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::auth::jwt::{issue_token, JwtConfig};
use crate::auth::password::{hash_password, verify_password, MIN_PASSWORD_LENGTH};
use crate::error::{AppError, AppResult};
use crate::extract::non_empty;
use crate::models::user::UserResponse;
use crate::models::{User, UserRole};
use crate::store::{constraints, UserStore};

const INVALID_CREDENTIALS: &str = "Invalid email or password";

/// Request body for `POST /auth/register`.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RegisterRequest {
    pub name: Option<String>,
    pub email: Option<String>,
    pub password: Option<String>,
    pub role: Option<String>,
}

/// Request body for `POST /auth/login`.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct LoginRequest {
    pub email: Option<String>,
    pub password: Option<String>,
}

/// Response payload of a successful login.
#[derive(Debug, Serialize)]
pub struct LoginResponse {
    pub token: String,
    pub user: UserResponse,
}

fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

/// Creates a user account with a bcrypt-hashed password.
///
/// # Errors
///
/// * [`AppError::Validation`] for missing fields, a short password or an unknown role
/// * [`AppError::Conflict`] if the email is already registered
pub async fn register<S: UserStore>(store: &S, req: RegisterRequest) -> AppResult<User> {
    let (Some(name), Some(email), Some(password)) =
        (non_empty(req.name), non_empty(req.email), req.password)
    else {
        return Err(AppError::Validation(
            "Email, password, and name are required".into(),
        ));
    };

    if password.chars().count() < MIN_PASSWORD_LENGTH {
        return Err(AppError::Validation(format!(
            "Password must be at least {MIN_PASSWORD_LENGTH} characters long"
        )));
    }

    let role = match non_empty(req.role) {
        Some(role) => role.parse::<UserRole>().map_err(AppError::Validation)?,
        None => UserRole::Student,
    };

    let email = normalize_email(&email);
    let duplicate = || AppError::Conflict("User already exists".into());
    if store.find_user_by_email(&email).await?.is_some() {
        return Err(duplicate());
    }

    let user = User::new(name, email, hash_password(password).await?, role);
    match store.insert_user(&user).await {
        Ok(()) => {}
        Err(e) if e.is_conflict_on(constraints::USER_EMAIL) => return Err(duplicate()),
        Err(e) => return Err(e.into()),
    }

    info!(user_id = %user.id, role = user.role.as_str(), "Registered user");
    Ok(user)
}

/// Verifies credentials and issues an access token.
///
/// Unknown emails and wrong passwords produce the same 401 error.
pub async fn login<S: UserStore>(
    store: &S,
    jwt: &JwtConfig,
    req: LoginRequest,
) -> AppResult<LoginResponse> {
    let (Some(email), Some(password)) = (non_empty(req.email), req.password) else {
        return Err(AppError::Validation("Email and password are required".into()));
    };

    let Some(user) = store.find_user_by_email(&normalize_email(&email)).await? else {
        warn!("Login attempt for unknown email");
        return Err(AppError::Unauthorized(INVALID_CREDENTIALS.into()));
    };

    if !verify_password(password, user.password_hash.clone()).await? {
        warn!(user_id = %user.id, "Login attempt with wrong password");
        return Err(AppError::Unauthorized(INVALID_CREDENTIALS.into()));
    }

    let token = issue_token(&user, jwt)
        .map_err(|e| AppError::Internal(format!("Failed to sign token: {e}")))?;

    info!(user_id = %user.id, "User logged in");
    Ok(LoginResponse {
        token,
        user: user.into(),
    })
}
