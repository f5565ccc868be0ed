//! Fee structures, monthly fee generation, adjustments, payments and reporting.

pub mod generate;
pub mod handlers;
pub mod payment;
pub mod query;
pub mod structures;
pub mod types;


pub use generate::{create_manual_fee, generate_class_wise, generate_fees};
pub use payment::{adjust_fee, record_payment};
pub use query::{get_fee, list_fees, student_summary};
pub use structures::{
    create_structure, deactivate_structure, list_structures, seed_standard_structures,
};
