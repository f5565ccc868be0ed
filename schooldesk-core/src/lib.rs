//! SchoolDesk: student enrollment and monthly fee billing over HTTP.

pub mod auth;
pub mod config;
pub mod db;
pub mod error;
pub mod extract;
pub mod fees;
pub mod models;
pub mod response;
pub mod routes;
pub mod state;
pub mod store;
pub mod students;
