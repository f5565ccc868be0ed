use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::types::Json;
use sqlx::FromRow;
use uuid::Uuid;

use crate::error::AppError;
use crate::models::fee_structure::FeeComponent;
use crate::models::period::BillingPeriod;

/// Fee payment status enumeration
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "varchar", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum FeeStatus {
    Pending,
    Paid,
    Overdue,
    Cancelled,
}

/// Kind of charge a fee record represents
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "varchar", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum FeeType {
    Monthly,
    Admission,
    Exam,
    Transport,
    Library,
    Sports,
    Manual,
    Other,
}

/// How a fee record came into existence
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "varchar", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum GenerationType {
    Auto,
    Manual,
}

/// Per-record copy of a structure component, editable without touching the structure.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FeeComponentSnapshot {
    pub name: String,
    pub base_amount: Decimal,
    pub adjusted_amount: Decimal,
    pub discount: Decimal,
    pub is_applicable: bool,
}

impl From<&FeeComponent> for FeeComponentSnapshot {
    fn from(component: &FeeComponent) -> Self {
        FeeComponentSnapshot {
            name: component.name.clone(),
            base_amount: component.amount,
            adjusted_amount: component.amount,
            discount: Decimal::ZERO,
            is_applicable: !component.is_optional,
        }
    }
}

/// The amount a fee record bills: base less discount plus extra charges.
pub fn compute_final_amount(base: Decimal, discount: Decimal, charges: Decimal) -> Decimal {
    base - discount + charges
}

/// Fee record model: one student's bill for one month.
///
/// Maps to the `fee_records` table. `(student_id, month, year)` and
/// `invoice_number` are unique. `final_amount` is derived from the base,
/// discount and charges on every write and is a generated column in
/// PostgreSQL.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct FeeRecord {
    /// Unique identifier for the fee record
    pub id: Uuid,

    /// Student billed by this record
    pub student_id: Uuid,

    /// Structure this record was generated from (`None` for manual entries)
    pub fee_structure_id: Option<Uuid>,

    /// Invoice number (globally unique)
    pub invoice_number: String,

    /// Canonical month name, e.g. "January"
    pub month: String,

    pub year: i32,

    pub academic_year: String,

    pub fee_type: FeeType,

    /// Component snapshot (JSON array)
    #[serde(rename = "feeComponents")]
    pub components: Json<Vec<FeeComponentSnapshot>>,

    pub base_fee_amount: Decimal,

    pub total_discount: Decimal,

    pub discount_reason: Option<String>,

    pub additional_charges: Decimal,

    /// base_fee_amount - total_discount + additional_charges
    pub final_amount: Decimal,

    pub due_date: NaiveDate,

    pub is_paid: bool,

    pub paid_date: Option<DateTime<Utc>>,

    pub payment_method: Option<String>,

    pub transaction_id: Option<String>,

    /// Identity of whoever generated or entered the record
    pub generated_by: Option<String>,

    pub generation_type: GenerationType,

    pub status: FeeStatus,

    pub remarks: Option<String>,

    pub created_at: DateTime<Utc>,

    pub updated_at: DateTime<Utc>,
}

/// Everything needed to build a new fee record.
#[derive(Debug, Clone)]
pub struct NewFeeRecord {
    pub student_id: Uuid,
    pub fee_structure_id: Option<Uuid>,
    pub invoice_number: String,
    pub period: BillingPeriod,
    pub academic_year: String,
    pub fee_type: FeeType,
    pub components: Vec<FeeComponentSnapshot>,
    pub base_fee_amount: Decimal,
    pub due_date: NaiveDate,
    pub generated_by: Option<String>,
    pub generation_type: GenerationType,
    pub remarks: Option<String>,
}

/// Absolute discount/charge values to set on a fee record.
#[derive(Debug, Clone, PartialEq)]
pub struct FeeAdjustment {
    pub discount: Decimal,
    pub discount_reason: Option<String>,
    pub additional_charges: Decimal,
    pub remarks: Option<String>,
}

impl FeeAdjustment {
    /// Rejects negative inputs and discounts that would push the final amount below zero.
    pub fn validate_for(&self, base_fee_amount: Decimal) -> Result<(), AppError> {
        if self.discount < Decimal::ZERO {
            return Err(AppError::Validation("Discount cannot be negative".into()));
        }
        if self.additional_charges < Decimal::ZERO {
            return Err(AppError::Validation(
                "Additional charges cannot be negative".into(),
            ));
        }
        if self.discount > base_fee_amount + self.additional_charges {
            return Err(AppError::Validation(format!(
                "Discount {} exceeds the billable amount {}",
                self.discount,
                base_fee_amount + self.additional_charges
            )));
        }
        Ok(())
    }
}

/// Settlement details recorded when a fee is paid.
#[derive(Debug, Clone, PartialEq)]
pub struct PaymentDetails {
    pub method: String,
    pub transaction_id: Option<String>,
    pub remarks: Option<String>,
}

impl FeeRecord {
    /// Builds a pending, unpaid record with no discount or extra charges.
    pub fn new(input: NewFeeRecord) -> Self {
        let now = Utc::now();
        let mut record = Self {
            id: Uuid::new_v4(),
            student_id: input.student_id,
            fee_structure_id: input.fee_structure_id,
            invoice_number: input.invoice_number,
            month: input.period.month_name().to_string(),
            year: input.period.year,
            academic_year: input.academic_year,
            fee_type: input.fee_type,
            components: Json(input.components),
            base_fee_amount: input.base_fee_amount,
            total_discount: Decimal::ZERO,
            discount_reason: None,
            additional_charges: Decimal::ZERO,
            final_amount: Decimal::ZERO,
            due_date: input.due_date,
            is_paid: false,
            paid_date: None,
            payment_method: None,
            transaction_id: None,
            generated_by: input.generated_by,
            generation_type: input.generation_type,
            status: FeeStatus::Pending,
            remarks: input.remarks,
            created_at: now,
            updated_at: now,
        };
        record.recompute_final_amount();
        record
    }

    pub fn recompute_final_amount(&mut self) {
        self.final_amount = compute_final_amount(
            self.base_fee_amount,
            self.total_discount,
            self.additional_charges,
        );
    }

    /// Overwrites discount and charges and recomputes the final amount.
    pub fn apply_adjustment(&mut self, adjustment: &FeeAdjustment) {
        self.total_discount = adjustment.discount;
        self.discount_reason = adjustment.discount_reason.clone();
        self.additional_charges = adjustment.additional_charges;
        if adjustment.remarks.is_some() {
            self.remarks = adjustment.remarks.clone();
        }
        self.recompute_final_amount();
        self.updated_at = Utc::now();
    }

    /// Marks the record paid. Callers must check `is_paid` first.
    pub fn apply_payment(&mut self, payment: &PaymentDetails, paid_at: DateTime<Utc>) {
        self.is_paid = true;
        self.paid_date = Some(paid_at);
        self.status = FeeStatus::Paid;
        self.payment_method = Some(payment.method.clone());
        if payment.transaction_id.is_some() {
            self.transaction_id = payment.transaction_id.clone();
        }
        if payment.remarks.is_some() {
            self.remarks = payment.remarks.clone();
        }
        self.updated_at = paid_at;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Month;

    fn sample_record(base: i64) -> FeeRecord {
        let period = BillingPeriod::new(Month::January, 2025);
        FeeRecord::new(NewFeeRecord {
            student_id: Uuid::new_v4(),
            fee_structure_id: None,
            invoice_number: "INV-2025-JAN-0001".into(),
            period,
            academic_year: "2025".into(),
            fee_type: FeeType::Monthly,
            components: vec![],
            base_fee_amount: Decimal::from(base),
            due_date: period.due_date().unwrap(),
            generated_by: Some("admin".into()),
            generation_type: GenerationType::Auto,
            remarks: None,
        })
    }

    #[test]
    fn test_new_record_final_amount_equals_base() {
        let record = sample_record(2700);
        assert_eq!(record.final_amount, Decimal::from(2700));
        assert_eq!(record.status, FeeStatus::Pending);
        assert!(!record.is_paid);
        assert_eq!(record.month, "January");
    }

    #[test]
    fn test_adjustment_recomputes_and_is_idempotent() {
        let mut record = sample_record(2700);
        let adjustment = FeeAdjustment {
            discount: Decimal::from(500),
            discount_reason: Some("sibling".into()),
            additional_charges: Decimal::from(100),
            remarks: None,
        };

        record.apply_adjustment(&adjustment);
        assert_eq!(record.final_amount, Decimal::from(2300));

        record.apply_adjustment(&adjustment);
        assert_eq!(record.final_amount, Decimal::from(2300));
        assert_eq!(record.total_discount, Decimal::from(500));
    }

    #[test]
    fn test_adjustment_validation() {
        let base = Decimal::from(1000);
        let ok = FeeAdjustment {
            discount: Decimal::from(1100),
            discount_reason: None,
            additional_charges: Decimal::from(100),
            remarks: None,
        };
        assert!(ok.validate_for(base).is_ok());

        let too_much = FeeAdjustment {
            discount: Decimal::from(1101),
            ..ok.clone()
        };
        assert!(too_much.validate_for(base).is_err());

        let negative = FeeAdjustment {
            discount: Decimal::from(-1),
            ..ok
        };
        assert!(negative.validate_for(base).is_err());
    }

    #[test]
    fn test_snapshot_from_component() {
        let component = FeeComponent {
            name: "Transport".into(),
            amount: Decimal::from(400),
            is_optional: true,
            description: None,
        };
        let snapshot = FeeComponentSnapshot::from(&component);
        assert_eq!(snapshot.base_amount, snapshot.adjusted_amount);
        assert_eq!(snapshot.discount, Decimal::ZERO);
        assert!(!snapshot.is_applicable);
    }

    #[test]
    fn test_apply_payment_sets_settlement_fields() {
        let mut record = sample_record(2700);
        let now = Utc::now();
        record.apply_payment(
            &PaymentDetails {
                method: "cash".into(),
                transaction_id: None,
                remarks: Some("paid at desk".into()),
            },
            now,
        );
        assert!(record.is_paid);
        assert_eq!(record.status, FeeStatus::Paid);
        assert_eq!(record.paid_date, Some(now));
        assert_eq!(record.payment_method.as_deref(), Some("cash"));
        assert_eq!(record.remarks.as_deref(), Some("paid at desk"));
    }
}
