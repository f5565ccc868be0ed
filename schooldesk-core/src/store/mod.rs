//! Persistence contracts for structures, students, fee records and users.
//!
//! Services are generic over these traits. [`PgStore`] is the production
//! implementation; the in-memory store backs the unit tests. Uniqueness
//! invariants live in the store (unique indexes in PostgreSQL) and surface
//! as [`StoreError::Conflict`] naming the violated constraint.

use std::future::Future;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::Serialize;
use uuid::Uuid;

use crate::models::fee_record::{FeeAdjustment, PaymentDetails};
use crate::models::{FeeRecord, FeeStructure, Student, StudentStatus, User};

#[cfg(test)]
pub mod memory;
pub mod postgres;

pub use postgres::PgStore;

/// Names of the unique constraints declared in the migrations.
pub mod constraints {
    pub const FEE_STUDENT_PERIOD: &str = "uq_fee_records_student_period";
    pub const FEE_INVOICE_NUMBER: &str = "uq_fee_records_invoice_number";
    pub const STUDENT_ROLL_NUMBER: &str = "uq_students_roll_number";
    pub const STRUCTURE_ACTIVE_CLASS_YEAR: &str = "uq_fee_structures_active_class_year";
    pub const USER_EMAIL: &str = "uq_users_email";
}

/// Error reported by a store implementation.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// A unique constraint rejected the write.
    #[error("Duplicate value violates unique constraint {constraint}")]
    Conflict { constraint: String },

    #[error("Database error: {0}")]
    Database(sqlx::Error),
}

impl StoreError {
    pub fn conflict(constraint: &str) -> Self {
        StoreError::Conflict {
            constraint: constraint.to_string(),
        }
    }

    /// True when this is a unique violation of `constraint`.
    pub fn is_conflict_on(&self, constraint: &str) -> bool {
        matches!(self, StoreError::Conflict { constraint: c } if c == constraint)
    }
}

impl From<sqlx::Error> for StoreError {
    fn from(err: sqlx::Error) -> Self {
        if let sqlx::Error::Database(db_err) = &err {
            // PostgreSQL unique constraint violation: error code 23505
            if db_err.code().as_deref() == Some("23505") {
                return StoreError::conflict(db_err.constraint().unwrap_or("unknown"));
            }
        }
        StoreError::Database(err)
    }
}

pub type StoreResult<T> = Result<T, StoreError>;

/// 1-based page request with a clamped page size.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageRequest {
    pub page: u32,
    pub limit: u32,
}

impl PageRequest {
    pub const DEFAULT_LIMIT: u32 = 50;
    pub const MAX_LIMIT: u32 = 200;

    pub fn new(page: Option<u32>, limit: Option<u32>) -> Self {
        Self {
            page: page.unwrap_or(1).max(1),
            limit: limit
                .unwrap_or(Self::DEFAULT_LIMIT)
                .clamp(1, Self::MAX_LIMIT),
        }
    }

    pub fn offset(&self) -> i64 {
        i64::from(self.page - 1) * i64::from(self.limit)
    }
}

impl Default for PageRequest {
    fn default() -> Self {
        Self::new(None, None)
    }
}

/// Free-text fee search, already resolved against students.
#[derive(Debug, Clone, Default)]
pub struct FeeSearch {
    /// Matched case-insensitively against the invoice number.
    pub text: String,
    /// Students whose name or roll number matched the text.
    pub student_ids: Vec<Uuid>,
}

/// Predicate shared by a fee page and its summary.
#[derive(Debug, Clone, Default)]
pub struct FeeFilter {
    pub month: Option<String>,
    pub year: Option<i32>,
    pub is_paid: Option<bool>,
    pub student_id: Option<Uuid>,
    /// Ignored when `student_id` is set.
    pub search: Option<FeeSearch>,
}

impl FeeFilter {
    /// In-process evaluation of the predicate.
    pub fn matches(&self, fee: &FeeRecord) -> bool {
        if self.month.as_deref().is_some_and(|m| m != fee.month) {
            return false;
        }
        if self.year.is_some_and(|y| y != fee.year) {
            return false;
        }
        if self.is_paid.is_some_and(|p| p != fee.is_paid) {
            return false;
        }
        match (self.student_id, &self.search) {
            (Some(id), _) => id == fee.student_id,
            (None, Some(search)) => {
                fee.invoice_number
                    .to_lowercase()
                    .contains(&search.text.to_lowercase())
                    || search.student_ids.contains(&fee.student_id)
            }
            (None, None) => true,
        }
    }
}

/// Aggregate over base amounts of a filtered fee set.
#[derive(Debug, Clone, Default, PartialEq, Serialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct FeeSummary {
    pub total_amount: Decimal,
    pub paid_amount: Decimal,
    pub pending_amount: Decimal,
    pub total_fees: i64,
}

impl FeeSummary {
    pub fn add(&mut self, fee: &FeeRecord) {
        self.total_amount += fee.base_fee_amount;
        if fee.is_paid {
            self.paid_amount += fee.base_fee_amount;
        } else {
            self.pending_amount += fee.base_fee_amount;
        }
        self.total_fees += 1;
    }
}

/// Paid/pending totals for one student.
#[derive(Debug, Clone, Default, PartialEq, Serialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct StudentFeeSummary {
    pub total_pending: Decimal,
    pub total_paid: Decimal,
    pub fees_count: i64,
}

#[derive(Debug, Clone, Default)]
pub struct StudentFilter {
    pub class_name: Option<String>,
    pub section: Option<String>,
    pub status: Option<StudentStatus>,
    /// Matched against name, email, roll number and parent name.
    pub search: Option<String>,
}

impl StudentFilter {
    pub fn matches(&self, student: &Student) -> bool {
        if self.class_name.as_deref().is_some_and(|c| c != student.class_name) {
            return false;
        }
        if self.section.as_deref().is_some_and(|s| s != student.section) {
            return false;
        }
        if self.status.is_some_and(|s| s != student.status) {
            return false;
        }
        match &self.search {
            Some(text) => {
                let needle = text.to_lowercase();
                [
                    Some(student.name.as_str()),
                    student.email.as_deref(),
                    Some(student.roll_number.as_str()),
                    student.parent_name.as_deref(),
                ]
                .into_iter()
                .flatten()
                .any(|field| field.to_lowercase().contains(&needle))
            }
            None => true,
        }
    }
}

pub trait FeeStructureStore: Send + Sync {
    fn insert_structure(
        &self,
        structure: &FeeStructure,
    ) -> impl Future<Output = StoreResult<()>> + Send;

    fn find_active_structure(
        &self,
        class_name: &str,
        academic_year: &str,
    ) -> impl Future<Output = StoreResult<Option<FeeStructure>>> + Send;

    /// Active structures ordered by class name. An empty `class_names` means all classes.
    fn list_active_structures(
        &self,
        academic_year: Option<&str>,
        class_names: &[String],
    ) -> impl Future<Output = StoreResult<Vec<FeeStructure>>> + Send;

    fn deactivate_structure(
        &self,
        id: Uuid,
    ) -> impl Future<Output = StoreResult<Option<FeeStructure>>> + Send;
}

pub trait StudentStore: Send + Sync {
    fn insert_student(&self, student: &Student) -> impl Future<Output = StoreResult<()>> + Send;

    fn find_student(&self, id: Uuid)
        -> impl Future<Output = StoreResult<Option<Student>>> + Send;

    /// Writes every mutable field of `student`. Returns `false` if it does not exist.
    fn update_student(&self, student: &Student) -> impl Future<Output = StoreResult<bool>> + Send;

    /// A page of students ordered by class, section and roll number, plus the filtered total.
    fn list_students(
        &self,
        filter: &StudentFilter,
        page: PageRequest,
    ) -> impl Future<Output = StoreResult<(Vec<Student>, i64)>> + Send;

    /// Active students of a class ordered by roll number, optionally narrowed
    /// to a section and to an explicit id set.
    fn active_students_in_class(
        &self,
        class_name: &str,
        section: Option<&str>,
        student_ids: Option<&[Uuid]>,
    ) -> impl Future<Output = StoreResult<Vec<Student>>> + Send;

    fn find_students_by_ids(
        &self,
        ids: &[Uuid],
    ) -> impl Future<Output = StoreResult<Vec<Student>>> + Send;

    /// Ids of students whose name or roll number contains `text` (case-insensitive).
    fn search_student_ids(&self, text: &str) -> impl Future<Output = StoreResult<Vec<Uuid>>> + Send;

    fn count_students_in_section(
        &self,
        class_name: &str,
        section: &str,
        academic_year: &str,
    ) -> impl Future<Output = StoreResult<i64>> + Send;
}

pub trait FeeRecordStore: Send + Sync {
    /// Next value of the store-wide, strictly increasing invoice sequence.
    fn next_invoice_sequence(&self) -> impl Future<Output = StoreResult<i64>> + Send;

    fn insert_fee(&self, fee: &FeeRecord) -> impl Future<Output = StoreResult<()>> + Send;

    fn find_fee(&self, id: Uuid) -> impl Future<Output = StoreResult<Option<FeeRecord>>> + Send;

    fn find_fee_for_period(
        &self,
        student_id: Uuid,
        month: &str,
        year: i32,
    ) -> impl Future<Output = StoreResult<Option<FeeRecord>>> + Send;

    /// Sets discount/charges and returns the record with its recomputed final amount.
    fn update_adjustment(
        &self,
        id: Uuid,
        adjustment: &FeeAdjustment,
    ) -> impl Future<Output = StoreResult<Option<FeeRecord>>> + Send;

    /// Marks an unpaid record paid. Returns `None` if the record is missing
    /// or was already paid, so at most one caller can settle a record.
    fn record_payment(
        &self,
        id: Uuid,
        payment: &PaymentDetails,
        paid_at: DateTime<Utc>,
    ) -> impl Future<Output = StoreResult<Option<FeeRecord>>> + Send;

    /// A page of matching fees (newest first) and the summary of the whole
    /// matching set, read from one consistent snapshot.
    fn fee_page(
        &self,
        filter: &FeeFilter,
        page: PageRequest,
    ) -> impl Future<Output = StoreResult<(Vec<FeeRecord>, FeeSummary)>> + Send;

    fn student_fee_summary(
        &self,
        student_id: Uuid,
    ) -> impl Future<Output = StoreResult<StudentFeeSummary>> + Send;
}

pub trait UserStore: Send + Sync {
    fn insert_user(&self, user: &User) -> impl Future<Output = StoreResult<()>> + Send;

    fn find_user_by_email(
        &self,
        email: &str,
    ) -> impl Future<Output = StoreResult<Option<User>>> + Send;
}
