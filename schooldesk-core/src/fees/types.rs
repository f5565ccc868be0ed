use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{AppError, AppResult};
use crate::extract::{non_empty, parse_id};
use crate::models::fee_record::{FeeAdjustment, PaymentDetails};
use crate::models::fee_structure::NewFeeStructure;
use crate::models::period::parse_month;
use crate::models::{BillingPeriod, FeeComponent, FeeRecord, FeeType, StudentBrief, YearValue};
use crate::store::{FeeFilter, PageRequest};

/// Request body for `POST /fees/structure`.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateStructureRequest {
    pub class_name: Option<String>,
    pub section: Option<String>,
    /// Defaults to the current calendar year
    pub academic_year: Option<String>,
    pub fee_components: Option<Vec<FeeComponent>>,
    pub total_monthly_fee: Option<Decimal>,
}

impl CreateStructureRequest {
    pub fn validate(self, current_year: i32) -> AppResult<NewFeeStructure> {
        let (Some(class_name), Some(total_monthly_fee)) =
            (non_empty(self.class_name), self.total_monthly_fee)
        else {
            return Err(AppError::Validation(
                "Class name and total monthly fee are required".into(),
            ));
        };

        if total_monthly_fee <= Decimal::ZERO {
            return Err(AppError::Validation(
                "Total monthly fee must be greater than zero".into(),
            ));
        }

        let components = self.fee_components.unwrap_or_default();
        for component in &components {
            if component.name.trim().is_empty() {
                return Err(AppError::Validation("Fee component name is required".into()));
            }
            if component.amount < Decimal::ZERO {
                return Err(AppError::Validation(format!(
                    "Fee component '{}' cannot have a negative amount",
                    component.name
                )));
            }
        }

        Ok(NewFeeStructure {
            class_name,
            section: non_empty(self.section),
            academic_year: non_empty(self.academic_year)
                .unwrap_or_else(|| current_year.to_string()),
            components,
            total_monthly_fee,
        })
    }
}

/// Request body for `POST /fees/generate`.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerateFeesRequest {
    pub class_name: Option<String>,
    pub section: Option<String>,
    /// Defaults to `year` as text
    pub academic_year: Option<String>,
    pub month: Option<String>,
    pub year: Option<YearValue>,
    pub generated_by: Option<String>,
    pub student_ids: Option<Vec<Uuid>>,
}

/// Validated single-class generation command.
#[derive(Debug, Clone, PartialEq)]
pub struct GenerateCommand {
    pub class_name: String,
    pub academic_year: String,
    pub period: BillingPeriod,
    pub generated_by: String,
    /// Caller scope; overrides the structure's own section
    pub section: Option<String>,
    pub student_ids: Option<Vec<Uuid>>,
}

fn require_period(month: Option<String>, year: Option<YearValue>) -> AppResult<BillingPeriod> {
    match (non_empty(month), year) {
        (Some(month), Some(year)) => BillingPeriod::parse(&month, &year),
        _ => Err(AppError::Validation("Month and year are required".into())),
    }
}

fn require_generated_by(value: Option<String>) -> AppResult<String> {
    non_empty(value).ok_or_else(|| AppError::Validation("generatedBy is required".into()))
}

impl GenerateFeesRequest {
    pub fn validate(self) -> AppResult<GenerateCommand> {
        let class_name = non_empty(self.class_name)
            .ok_or_else(|| AppError::Validation("Class name is required".into()))?;
        let period = require_period(self.month, self.year)?;
        let generated_by = require_generated_by(self.generated_by)?;

        Ok(GenerateCommand {
            class_name,
            academic_year: non_empty(self.academic_year)
                .unwrap_or_else(|| period.year.to_string()),
            period,
            generated_by,
            section: non_empty(self.section),
            student_ids: self.student_ids.filter(|ids| !ids.is_empty()),
        })
    }
}

/// Request body for `POST /fees/generate-class-wise`.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClassWiseRequest {
    pub month: Option<String>,
    pub year: Option<YearValue>,
    pub generated_by: Option<String>,
    pub specific_classes: Option<Vec<String>>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ClassWiseCommand {
    pub period: BillingPeriod,
    pub generated_by: String,
    /// Empty means every class with an active structure
    pub classes: Vec<String>,
}

impl ClassWiseRequest {
    pub fn validate(self) -> AppResult<ClassWiseCommand> {
        let (Some(month), Some(year), Some(generated_by)) = (
            non_empty(self.month),
            self.year,
            non_empty(self.generated_by),
        ) else {
            return Err(AppError::Validation(
                "Month, year, and generatedBy are required".into(),
            ));
        };

        Ok(ClassWiseCommand {
            period: BillingPeriod::parse(&month, &year)?,
            generated_by,
            classes: self
                .specific_classes
                .unwrap_or_default()
                .into_iter()
                .filter_map(|c| non_empty(Some(c)))
                .collect(),
        })
    }
}

/// Request body for `POST /fees/manual`.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ManualFeeRequest {
    pub student_id: Option<String>,
    pub month: Option<String>,
    pub year: Option<YearValue>,
    pub amount: Option<Decimal>,
    pub fee_type: Option<FeeType>,
    pub description: Option<String>,
    pub due_date: Option<NaiveDate>,
    pub generated_by: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ManualFeeCommand {
    pub student_id: Uuid,
    pub period: BillingPeriod,
    pub amount: Decimal,
    pub fee_type: FeeType,
    pub description: Option<String>,
    /// Overrides the computed due date
    pub due_date: Option<NaiveDate>,
    pub generated_by: String,
}

impl ManualFeeRequest {
    pub fn validate(self) -> AppResult<ManualFeeCommand> {
        let (Some(student_id), Some(month), Some(year), Some(amount), Some(generated_by)) = (
            non_empty(self.student_id),
            non_empty(self.month),
            self.year,
            self.amount,
            non_empty(self.generated_by),
        ) else {
            return Err(AppError::Validation(
                "Student ID, month, year, amount, and generatedBy are required".into(),
            ));
        };

        let student_id = parse_id(&student_id, "student")?;

        if amount <= Decimal::ZERO {
            return Err(AppError::Validation("Amount must be greater than zero".into()));
        }

        Ok(ManualFeeCommand {
            student_id,
            period: BillingPeriod::parse(&month, &year)?,
            amount,
            fee_type: self.fee_type.unwrap_or(FeeType::Manual),
            description: non_empty(self.description),
            due_date: self.due_date,
            generated_by,
        })
    }
}

/// Request body for `PUT /fees/:id/adjust`. Missing amounts default to zero.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AdjustFeeRequest {
    pub discount: Option<Decimal>,
    pub discount_reason: Option<String>,
    pub additional_charges: Option<Decimal>,
    pub remarks: Option<String>,
}

impl From<AdjustFeeRequest> for FeeAdjustment {
    fn from(req: AdjustFeeRequest) -> Self {
        FeeAdjustment {
            discount: req.discount.unwrap_or(Decimal::ZERO),
            discount_reason: non_empty(req.discount_reason),
            additional_charges: req.additional_charges.unwrap_or(Decimal::ZERO),
            remarks: non_empty(req.remarks),
        }
    }
}

/// Request body for `PUT /fees/:id/pay`.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PayFeeRequest {
    pub payment_method: Option<String>,
    pub transaction_id: Option<String>,
    pub remarks: Option<String>,
}

impl PayFeeRequest {
    pub fn validate(self) -> AppResult<PaymentDetails> {
        let method = non_empty(self.payment_method)
            .ok_or_else(|| AppError::Validation("Payment method is required".into()))?;

        Ok(PaymentDetails {
            method,
            transaction_id: non_empty(self.transaction_id),
            remarks: non_empty(self.remarks),
        })
    }
}

/// Query string of `GET /fees`. Empty values mean "no filter".
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FeeListQuery {
    pub page: Option<String>,
    pub limit: Option<String>,
    pub search: Option<String>,
    pub month: Option<String>,
    pub year: Option<String>,
    pub is_paid: Option<String>,
    pub student_id: Option<String>,
}

/// Validated fee listing request. The search text is resolved against
/// students by the query service.
#[derive(Debug, Clone, Default)]
pub struct FeeListCommand {
    pub filter: FeeFilter,
    pub search: Option<String>,
    pub page: PageRequest,
}

fn parse_opt<T: std::str::FromStr>(value: Option<String>, field: &str) -> AppResult<Option<T>> {
    non_empty(value)
        .map(|v| {
            v.parse::<T>()
                .map_err(|_| AppError::Validation(format!("Invalid {field} '{v}'")))
        })
        .transpose()
}

impl FeeListQuery {
    pub fn validate(self) -> AppResult<FeeListCommand> {
        let month = non_empty(self.month)
            .map(|m| parse_month(&m).map(|m| m.name().to_string()))
            .transpose()?;
        let year = non_empty(self.year)
            .map(|y| YearValue::Text(y).to_year())
            .transpose()?;

        Ok(FeeListCommand {
            filter: FeeFilter {
                month,
                year,
                is_paid: parse_opt(self.is_paid, "isPaid")?,
                student_id: parse_opt(self.student_id, "studentId")?,
                search: None,
            },
            search: non_empty(self.search),
            page: PageRequest::new(
                parse_opt(self.page, "page")?,
                parse_opt(self.limit, "limit")?,
            ),
        })
    }
}

/// One student billed by a generation run.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CreatedFee {
    pub student_name: String,
    pub class_name: String,
    pub invoice_number: String,
    pub amount: Decimal,
    pub fee: FeeRecord,
}

/// One student left alone by a generation run.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SkippedFee {
    pub student_name: String,
    pub class_name: String,
    pub reason: String,
}

/// One student whose fee could not be created, or a whole class whose
/// students could not be loaded.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FailedFee {
    /// `None` for a class-level failure
    #[serde(skip_serializing_if = "Option::is_none")]
    pub student_name: Option<String>,
    pub class_name: String,
    pub error: String,
}

/// Per-student outcome of a generation run.
#[derive(Debug, Clone, Default, Serialize)]
pub struct GenerationReport {
    pub created: Vec<CreatedFee>,
    pub skipped: Vec<SkippedFee>,
    pub errors: Vec<FailedFee>,
}

impl GenerationReport {
    pub fn merge(&mut self, other: GenerationReport) {
        self.created.extend(other.created);
        self.skipped.extend(other.skipped);
        self.errors.extend(other.errors);
    }
}

/// Response payload of both generation endpoints.
#[derive(Debug, Clone, Serialize)]
pub struct GenerationSummary {
    pub generated: usize,
    pub skipped: usize,
    pub errors: usize,
    pub details: GenerationReport,
}

impl From<GenerationReport> for GenerationSummary {
    fn from(report: GenerationReport) -> Self {
        GenerationSummary {
            generated: report.created.len(),
            skipped: report.skipped.len(),
            errors: report.errors.len(),
            details: report,
        }
    }
}

/// A fee record with a brief of its student attached.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FeeWithStudent {
    #[serde(flatten)]
    pub fee: FeeRecord,
    /// `None` if the student record is gone
    pub student: Option<StudentBrief>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Month;
    use serde_json::json;

    #[test]
    fn test_generate_request_defaults_academic_year_to_billing_year() {
        let req: GenerateFeesRequest = serde_json::from_value(json!({
            "className": "3rd",
            "month": "January",
            "year": "2025",
            "generatedBy": "admin",
            "studentIds": []
        }))
        .unwrap();

        let cmd = req.validate().unwrap();
        assert_eq!(cmd.academic_year, "2025");
        assert_eq!(cmd.period, BillingPeriod::new(Month::January, 2025));
        assert_eq!(cmd.student_ids, None);
        assert_eq!(cmd.section, None);
    }

    #[test]
    fn test_generate_request_requires_generated_by() {
        let req = GenerateFeesRequest {
            class_name: Some("3rd".into()),
            month: Some("January".into()),
            year: Some(2025.into()),
            ..Default::default()
        };
        assert!(matches!(req.validate(), Err(AppError::Validation(_))));
    }

    #[test]
    fn test_class_wise_request_rejects_bad_month() {
        let req = ClassWiseRequest {
            month: Some("Janvier".into()),
            year: Some(2025.into()),
            generated_by: Some("admin".into()),
            specific_classes: None,
        };
        assert!(matches!(req.validate(), Err(AppError::Validation(_))));

        let missing = ClassWiseRequest::default();
        let err = missing.validate().unwrap_err();
        assert_eq!(err.to_string(), "Month, year, and generatedBy are required");
    }

    #[test]
    fn test_manual_request_validation() {
        let base = ManualFeeRequest {
            student_id: Some(Uuid::new_v4().to_string()),
            month: Some("March".into()),
            year: Some(YearValue::Number(2025)),
            amount: Some(Decimal::from(1500)),
            generated_by: Some("admin".into()),
            ..Default::default()
        };
        let cmd = base.clone().validate().unwrap();
        assert_eq!(cmd.fee_type, FeeType::Manual);

        let bad_id = ManualFeeRequest {
            student_id: Some("not-a-uuid".into()),
            ..base.clone()
        };
        assert_eq!(
            bad_id.validate().unwrap_err().to_string(),
            "Invalid student ID"
        );

        let zero = ManualFeeRequest {
            amount: Some(Decimal::ZERO),
            ..base
        };
        assert!(zero.validate().is_err());
    }

    #[test]
    fn test_structure_request_defaults() {
        let req: CreateStructureRequest = serde_json::from_value(json!({
            "className": "3rd",
            "totalMonthlyFee": 2700,
            "feeComponents": [
                { "name": "Tuition Fee", "amount": 2200 },
                { "name": "Activity Fee", "amount": 300 },
                { "name": "Maintenance Fee", "amount": 200 }
            ]
        }))
        .unwrap();

        let input = req.validate(2025).unwrap();
        assert_eq!(input.academic_year, "2025");
        assert_eq!(input.section, None);
        assert_eq!(input.components.len(), 3);
        assert!(!input.components[0].is_optional);
    }

    #[test]
    fn test_structure_request_requires_class_and_total() {
        let req = CreateStructureRequest {
            class_name: Some("  ".into()),
            total_monthly_fee: Some(Decimal::from(100)),
            ..Default::default()
        };
        assert!(req.validate(2025).is_err());
    }

    #[test]
    fn test_adjust_request_defaults_to_zero() {
        let adjustment: FeeAdjustment = AdjustFeeRequest::default().into();
        assert_eq!(adjustment.discount, Decimal::ZERO);
        assert_eq!(adjustment.additional_charges, Decimal::ZERO);
    }

    #[test]
    fn test_pay_request_requires_method() {
        let req = PayFeeRequest {
            payment_method: Some(" ".into()),
            ..Default::default()
        };
        assert_eq!(
            req.validate().unwrap_err().to_string(),
            "Payment method is required"
        );
    }

    #[test]
    fn test_fee_list_query_treats_empty_values_as_absent() {
        let query = FeeListQuery {
            page: Some("2".into()),
            year: Some("".into()),
            is_paid: Some("true".into()),
            month: Some("February".into()),
            ..Default::default()
        };
        let cmd = query.validate().unwrap();
        assert_eq!(cmd.page.page, 2);
        assert_eq!(cmd.page.limit, PageRequest::DEFAULT_LIMIT);
        assert_eq!(cmd.filter.year, None);
        assert_eq!(cmd.filter.is_paid, Some(true));
        assert_eq!(cmd.filter.month.as_deref(), Some("February"));

        let bad = FeeListQuery {
            is_paid: Some("maybe".into()),
            ..Default::default()
        };
        assert!(bad.validate().is_err());
    }
}
