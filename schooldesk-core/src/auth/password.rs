//! Bcrypt password hashing, run off the async executor.

use crate::error::{AppError, AppResult};

pub const MIN_PASSWORD_LENGTH: usize = 6;

pub async fn hash_password(password: String) -> AppResult<String> {
    tokio::task::spawn_blocking(move || bcrypt::hash(password, bcrypt::DEFAULT_COST))
        .await
        .map_err(|e| AppError::Internal(format!("Password hashing task failed: {e}")))?
        .map_err(|e| AppError::Internal(format!("Password hashing failed: {e}")))
}

/// Returns `Ok(false)` for a wrong password; malformed hashes are internal errors.
pub async fn verify_password(password: String, hash: String) -> AppResult<bool> {
    tokio::task::spawn_blocking(move || bcrypt::verify(password, &hash))
        .await
        .map_err(|e| AppError::Internal(format!("Password verification task failed: {e}")))?
        .map_err(|e| AppError::Internal(format!("Password verification failed: {e}")))
}
