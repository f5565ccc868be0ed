//! In-memory store used by the service tests.
//!
//! Enforces the same unique constraints as the migrations and reports
//! violations with the same constraint names.

use std::collections::HashSet;
use std::sync::atomic::{AtomicI64, Ordering};

use chrono::{DateTime, Utc};
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::models::fee_record::{FeeAdjustment, PaymentDetails};
use crate::models::{FeeRecord, FeeStatus, FeeStructure, Student, StudentStatus, User};
use crate::store::{
    constraints, FeeFilter, FeeRecordStore, FeeStructureStore, FeeSummary, PageRequest,
    StoreError, StoreResult, StudentFeeSummary, StudentFilter, StudentStore, UserStore,
};

#[derive(Default)]
struct Inner {
    structures: Vec<FeeStructure>,
    students: Vec<Student>,
    fees: Vec<FeeRecord>,
    users: Vec<User>,
    fail_fee_inserts_for: HashSet<Uuid>,
    fail_student_loads_for: HashSet<String>,
    hidden_period_lookups: usize,
    competing_payment: Option<PaymentDetails>,
}

#[derive(Default)]
pub struct MemoryStore {
    inner: RwLock<Inner>,
    invoice_seq: AtomicI64,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes every fee insert for `student_id` fail with a database error.
    pub async fn fail_fee_inserts_for(&self, student_id: Uuid) {
        self.inner.write().await.fail_fee_inserts_for.insert(student_id);
    }

    /// Makes loading the active students of `class_name` fail with a database error.
    pub async fn fail_student_loads_for(&self, class_name: &str) {
        self.inner
            .write()
            .await
            .fail_student_loads_for
            .insert(class_name.to_string());
    }

    /// The next `count` period lookups find nothing, as if the existing fee
    /// were inserted by another writer right after the check.
    pub async fn hide_period_lookups(&self, count: usize) {
        self.inner.write().await.hidden_period_lookups = count;
    }

    /// The next payment finds the fee already settled with `payment` by
    /// another writer between the service's check and its update.
    pub async fn settle_before_next_payment(&self, payment: PaymentDetails) {
        self.inner.write().await.competing_payment = Some(payment);
    }

    /// Resets the invoice sequence so the next value is `last + 1`.
    pub fn rewind_invoice_sequence(&self, last: i64) {
        self.invoice_seq.store(last, Ordering::SeqCst);
    }

    pub async fn fee_count(&self) -> usize {
        self.inner.read().await.fees.len()
    }
}

fn page_slice<T: Clone>(items: &[T], page: PageRequest) -> Vec<T> {
    items
        .iter()
        .skip(usize::try_from(page.offset()).unwrap_or(usize::MAX))
        .take(page.limit as usize)
        .cloned()
        .collect()
}

impl FeeStructureStore for MemoryStore {
    async fn insert_structure(&self, structure: &FeeStructure) -> StoreResult<()> {
        let mut inner = self.inner.write().await;
        if structure.is_active()
            && inner.structures.iter().any(|s| {
                s.is_active()
                    && s.class_name == structure.class_name
                    && s.academic_year == structure.academic_year
            })
        {
            return Err(StoreError::conflict(constraints::STRUCTURE_ACTIVE_CLASS_YEAR));
        }
        inner.structures.push(structure.clone());
        Ok(())
    }

    async fn find_active_structure(
        &self,
        class_name: &str,
        academic_year: &str,
    ) -> StoreResult<Option<FeeStructure>> {
        let inner = self.inner.read().await;
        Ok(inner
            .structures
            .iter()
            .find(|s| s.is_active() && s.class_name == class_name && s.academic_year == academic_year)
            .cloned())
    }

    async fn list_active_structures(
        &self,
        academic_year: Option<&str>,
        class_names: &[String],
    ) -> StoreResult<Vec<FeeStructure>> {
        let inner = self.inner.read().await;
        let mut structures: Vec<FeeStructure> = inner
            .structures
            .iter()
            .filter(|s| s.is_active())
            .filter(|s| academic_year.map_or(true, |y| s.academic_year == y))
            .filter(|s| class_names.is_empty() || class_names.contains(&s.class_name))
            .cloned()
            .collect();
        structures.sort_by(|a, b| {
            a.class_name
                .cmp(&b.class_name)
                .then_with(|| a.academic_year.cmp(&b.academic_year))
        });
        Ok(structures)
    }

    async fn deactivate_structure(&self, id: Uuid) -> StoreResult<Option<FeeStructure>> {
        let mut inner = self.inner.write().await;
        Ok(inner.structures.iter_mut().find(|s| s.id == id).map(|s| {
            s.status = crate::models::StructureStatus::Inactive;
            s.updated_at = Utc::now();
            s.clone()
        }))
    }
}

impl StudentStore for MemoryStore {
    async fn insert_student(&self, student: &Student) -> StoreResult<()> {
        let mut inner = self.inner.write().await;
        if inner
            .students
            .iter()
            .any(|s| s.roll_number == student.roll_number)
        {
            return Err(StoreError::conflict(constraints::STUDENT_ROLL_NUMBER));
        }
        inner.students.push(student.clone());
        Ok(())
    }

    async fn find_student(&self, id: Uuid) -> StoreResult<Option<Student>> {
        let inner = self.inner.read().await;
        Ok(inner.students.iter().find(|s| s.id == id).cloned())
    }

    async fn update_student(&self, student: &Student) -> StoreResult<bool> {
        let mut inner = self.inner.write().await;
        if inner
            .students
            .iter()
            .any(|s| s.id != student.id && s.roll_number == student.roll_number)
        {
            return Err(StoreError::conflict(constraints::STUDENT_ROLL_NUMBER));
        }
        match inner.students.iter_mut().find(|s| s.id == student.id) {
            Some(existing) => {
                *existing = student.clone();
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn list_students(
        &self,
        filter: &StudentFilter,
        page: PageRequest,
    ) -> StoreResult<(Vec<Student>, i64)> {
        let inner = self.inner.read().await;
        let mut matching: Vec<Student> = inner
            .students
            .iter()
            .filter(|s| filter.matches(s))
            .cloned()
            .collect();
        matching.sort_by(|a, b| {
            (&a.class_name, &a.section, &a.roll_number).cmp(&(
                &b.class_name,
                &b.section,
                &b.roll_number,
            ))
        });
        let total = matching.len() as i64;
        Ok((page_slice(&matching, page), total))
    }

    async fn active_students_in_class(
        &self,
        class_name: &str,
        section: Option<&str>,
        student_ids: Option<&[Uuid]>,
    ) -> StoreResult<Vec<Student>> {
        let inner = self.inner.read().await;
        if inner.fail_student_loads_for.contains(class_name) {
            return Err(StoreError::Database(sqlx::Error::Protocol(
                "injected student load failure".into(),
            )));
        }
        let mut students: Vec<Student> = inner
            .students
            .iter()
            .filter(|s| s.status == StudentStatus::Active && s.class_name == class_name)
            .filter(|s| section.map_or(true, |sec| s.section == sec))
            .filter(|s| student_ids.map_or(true, |ids| ids.contains(&s.id)))
            .cloned()
            .collect();
        students.sort_by(|a, b| a.roll_number.cmp(&b.roll_number));
        Ok(students)
    }

    async fn find_students_by_ids(&self, ids: &[Uuid]) -> StoreResult<Vec<Student>> {
        let inner = self.inner.read().await;
        Ok(inner
            .students
            .iter()
            .filter(|s| ids.contains(&s.id))
            .cloned()
            .collect())
    }

    async fn search_student_ids(&self, text: &str) -> StoreResult<Vec<Uuid>> {
        let needle = text.to_lowercase();
        let inner = self.inner.read().await;
        Ok(inner
            .students
            .iter()
            .filter(|s| {
                s.name.to_lowercase().contains(&needle)
                    || s.roll_number.to_lowercase().contains(&needle)
            })
            .map(|s| s.id)
            .collect())
    }

    async fn count_students_in_section(
        &self,
        class_name: &str,
        section: &str,
        academic_year: &str,
    ) -> StoreResult<i64> {
        let inner = self.inner.read().await;
        Ok(inner
            .students
            .iter()
            .filter(|s| {
                s.class_name == class_name
                    && s.section == section
                    && s.academic_year == academic_year
            })
            .count() as i64)
    }
}

impl FeeRecordStore for MemoryStore {
    async fn next_invoice_sequence(&self) -> StoreResult<i64> {
        Ok(self.invoice_seq.fetch_add(1, Ordering::SeqCst) + 1)
    }

    async fn insert_fee(&self, fee: &FeeRecord) -> StoreResult<()> {
        let mut inner = self.inner.write().await;
        if inner.fail_fee_inserts_for.contains(&fee.student_id) {
            return Err(StoreError::Database(sqlx::Error::Protocol(
                "injected insert failure".into(),
            )));
        }
        if inner.fees.iter().any(|f| {
            f.student_id == fee.student_id && f.month == fee.month && f.year == fee.year
        }) {
            return Err(StoreError::conflict(constraints::FEE_STUDENT_PERIOD));
        }
        if inner
            .fees
            .iter()
            .any(|f| f.invoice_number == fee.invoice_number)
        {
            return Err(StoreError::conflict(constraints::FEE_INVOICE_NUMBER));
        }
        inner.fees.push(fee.clone());
        Ok(())
    }

    async fn find_fee(&self, id: Uuid) -> StoreResult<Option<FeeRecord>> {
        let inner = self.inner.read().await;
        Ok(inner.fees.iter().find(|f| f.id == id).cloned())
    }

    async fn find_fee_for_period(
        &self,
        student_id: Uuid,
        month: &str,
        year: i32,
    ) -> StoreResult<Option<FeeRecord>> {
        let mut inner = self.inner.write().await;
        if inner.hidden_period_lookups > 0 {
            inner.hidden_period_lookups -= 1;
            return Ok(None);
        }
        Ok(inner
            .fees
            .iter()
            .find(|f| f.student_id == student_id && f.month == month && f.year == year)
            .cloned())
    }

    async fn update_adjustment(
        &self,
        id: Uuid,
        adjustment: &FeeAdjustment,
    ) -> StoreResult<Option<FeeRecord>> {
        let mut inner = self.inner.write().await;
        Ok(inner.fees.iter_mut().find(|f| f.id == id).map(|fee| {
            fee.apply_adjustment(adjustment);
            fee.clone()
        }))
    }

    async fn record_payment(
        &self,
        id: Uuid,
        payment: &PaymentDetails,
        paid_at: DateTime<Utc>,
    ) -> StoreResult<Option<FeeRecord>> {
        let mut inner = self.inner.write().await;
        if let Some(competing) = inner.competing_payment.take() {
            if let Some(fee) = inner.fees.iter_mut().find(|f| f.id == id) {
                fee.apply_payment(&competing, paid_at);
            }
        }
        Ok(inner
            .fees
            .iter_mut()
            .find(|f| f.id == id && !f.is_paid && f.status != FeeStatus::Cancelled)
            .map(|fee| {
                fee.apply_payment(payment, paid_at);
                fee.clone()
            }))
    }

    async fn fee_page(
        &self,
        filter: &FeeFilter,
        page: PageRequest,
    ) -> StoreResult<(Vec<FeeRecord>, FeeSummary)> {
        let inner = self.inner.read().await;
        let mut matching: Vec<FeeRecord> = inner
            .fees
            .iter()
            .filter(|f| filter.matches(f))
            .cloned()
            .collect();
        matching.sort_by(|a, b| {
            b.created_at
                .cmp(&a.created_at)
                .then_with(|| b.invoice_number.cmp(&a.invoice_number))
        });

        let mut summary = FeeSummary::default();
        matching.iter().for_each(|f| summary.add(f));

        Ok((page_slice(&matching, page), summary))
    }

    async fn student_fee_summary(&self, student_id: Uuid) -> StoreResult<StudentFeeSummary> {
        let inner = self.inner.read().await;
        let mut summary = StudentFeeSummary::default();
        for fee in inner.fees.iter().filter(|f| f.student_id == student_id) {
            if fee.is_paid {
                summary.total_paid += fee.base_fee_amount;
            } else {
                summary.total_pending += fee.base_fee_amount;
            }
            summary.fees_count += 1;
        }
        Ok(summary)
    }
}

impl UserStore for MemoryStore {
    async fn insert_user(&self, user: &User) -> StoreResult<()> {
        let mut inner = self.inner.write().await;
        if inner.users.iter().any(|u| u.email == user.email) {
            return Err(StoreError::conflict(constraints::USER_EMAIL));
        }
        inner.users.push(user.clone());
        Ok(())
    }

    async fn find_user_by_email(&self, email: &str) -> StoreResult<Option<User>> {
        let inner = self.inner.read().await;
        Ok(inner.users.iter().find(|u| u.email == email).cloned())
    }
}
