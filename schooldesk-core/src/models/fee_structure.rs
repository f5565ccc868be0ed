use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::types::Json;
use sqlx::FromRow;
use uuid::Uuid;

/// Fee structure status enumeration
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "varchar", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum StructureStatus {
    Active,
    Inactive,
}

/// A named line of a class fee template, e.g. "Tuition Fee".
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FeeComponent {
    pub name: String,

    pub amount: Decimal,

    /// Optional components are not billed unless enabled per student.
    #[serde(default)]
    pub is_optional: bool,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

/// Fee structure model: the monthly fee template of one class for one academic year.
///
/// Maps to the `fee_structures` table. At most one structure per
/// (class, academic year) may be active at a time.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct FeeStructure {
    /// Unique identifier for the structure
    pub id: Uuid,

    /// Class this template applies to, e.g. "3rd" or "Pre-Primary Jr. KG"
    pub class_name: String,

    /// Section restriction; `None` bills every section of the class
    pub section: Option<String>,

    /// Academic year, e.g. "2025"
    pub academic_year: String,

    /// Ordered fee components (JSON array)
    #[serde(rename = "feeComponents")]
    pub components: Json<Vec<FeeComponent>>,

    /// Total monthly fee billed to each student
    pub total_monthly_fee: Decimal,

    pub status: StructureStatus,

    pub created_at: DateTime<Utc>,

    pub updated_at: DateTime<Utc>,
}

/// Validated input for a new fee structure.
#[derive(Debug, Clone)]
pub struct NewFeeStructure {
    pub class_name: String,
    pub section: Option<String>,
    pub academic_year: String,
    pub components: Vec<FeeComponent>,
    pub total_monthly_fee: Decimal,
}

impl FeeStructure {
    /// Builds an active structure from validated input.
    pub fn new(input: NewFeeStructure) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            class_name: input.class_name,
            section: input.section,
            academic_year: input.academic_year,
            components: Json(input.components),
            total_monthly_fee: input.total_monthly_fee,
            status: StructureStatus::Active,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn is_active(&self) -> bool {
        self.status == StructureStatus::Active
    }

    /// Sum of all component amounts (optional ones included).
    pub fn components_total(&self) -> Decimal {
        self.components.iter().map(|c| c.amount).sum()
    }
}
