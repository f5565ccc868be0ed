pub mod fee_record;
pub mod fee_structure;
pub mod period;
pub mod student;
pub mod user;

pub use fee_record::{FeeRecord, FeeStatus, FeeType, GenerationType};
pub use fee_structure::{FeeComponent, FeeStructure, StructureStatus};
pub use period::{BillingPeriod, YearValue};
pub use student::{Student, StudentBrief, StudentStatus};
pub use user::{User, UserRole};
