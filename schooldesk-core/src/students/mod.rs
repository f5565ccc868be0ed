//! Student enrollment records.

pub mod handlers;
pub mod roll_number;
pub mod service;
pub mod types;


pub use service::{create_student, deactivate_student, get_student, list_students, update_student};
