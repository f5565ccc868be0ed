//! Accounts, credential checks and bearer-token protection of routes.

pub mod handlers;
pub mod jwt;
pub mod middleware;
pub mod password;
pub mod service;

#[cfg(test)]
mod tests;

pub use handlers::{login_handler, register_handler};
pub use middleware::{require_auth, AuthUser};
