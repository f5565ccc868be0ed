//! Request-side helpers shared by the handlers.

use uuid::Uuid;

use crate::error::{AppError, AppResult};

/// Trims `value` and drops it when empty.
pub fn non_empty(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

/// Parses a path id, reporting a malformed value as a validation error
/// such as "Invalid student ID".
pub fn parse_id(raw: &str, label: &str) -> AppResult<Uuid> {
    Uuid::parse_str(raw.trim()).map_err(|_| AppError::Validation(format!("Invalid {label} ID")))
}
