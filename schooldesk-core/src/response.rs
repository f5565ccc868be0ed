//! Shared response envelope types for API handlers.
//!
//! Successful responses are `{ "success": true, "message"?: ..., ...payload }`.
//! The payload struct is flattened into the envelope so each endpoint keeps
//! its own top-level keys (`fee`, `students`, `pagination`, ...).

use serde::Serialize;

use crate::store::PageRequest;

/// Standard success envelope.
///
/// ```ignore
/// Ok(Json(ApiResponse::with_message("Fee structure created", payload)))
/// ```
#[derive(Debug, Serialize)]
pub struct ApiResponse<T: Serialize> {
    pub success: bool,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,

    #[serde(flatten)]
    pub data: T,
}

impl<T: Serialize> ApiResponse<T> {
    pub fn ok(data: T) -> Self {
        Self {
            success: true,
            message: None,
            data,
        }
    }

    pub fn with_message(message: impl Into<String>, data: T) -> Self {
        Self {
            success: true,
            message: Some(message.into()),
            data,
        }
    }
}

/// Page position metadata returned with every listing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Pagination {
    pub current_page: u32,
    pub total_pages: i64,
    pub total_items: i64,
    pub has_next: bool,
    pub has_prev: bool,
}

impl Pagination {
    pub fn new(page: PageRequest, total_items: i64) -> Self {
        let limit = i64::from(page.limit);
        let total_pages = (total_items + limit - 1) / limit;
        Self {
            current_page: page.page,
            total_pages,
            total_items,
            has_next: i64::from(page.page) < total_pages,
            has_prev: page.page > 1,
        }
    }
}
