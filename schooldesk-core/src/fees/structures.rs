use rust_decimal::Decimal;
use tracing::info;
use uuid::Uuid;

use crate::error::{AppError, AppResult};
use crate::models::fee_structure::NewFeeStructure;
use crate::models::{FeeComponent, FeeStructure};
use crate::store::{constraints, FeeStructureStore};

/// Creates a new active fee structure.
///
/// # Errors
///
/// Returns [`AppError::Conflict`] if an active structure already exists for
/// the same class and academic year. The pre-check only produces the message;
/// the partial unique index is what enforces the rule.
pub async fn create_structure<S>(store: &S, input: NewFeeStructure) -> AppResult<FeeStructure>
where
    S: FeeStructureStore,
{
    let duplicate = || {
        AppError::Conflict(format!(
            "An active fee structure already exists for {} ({})",
            input.class_name, input.academic_year
        ))
    };

    if store
        .find_active_structure(&input.class_name, &input.academic_year)
        .await?
        .is_some()
    {
        return Err(duplicate());
    }

    let structure = FeeStructure::new(input.clone());
    match store.insert_structure(&structure).await {
        Ok(()) => {}
        Err(e) if e.is_conflict_on(constraints::STRUCTURE_ACTIVE_CLASS_YEAR) => {
            return Err(duplicate())
        }
        Err(e) => return Err(e.into()),
    }

    info!(
        structure_id = %structure.id,
        class_name = %structure.class_name,
        academic_year = %structure.academic_year,
        total = %structure.total_monthly_fee,
        "Created fee structure"
    );
    Ok(structure)
}

/// All active structures ordered by class name.
pub async fn list_structures<S: FeeStructureStore>(store: &S) -> AppResult<Vec<FeeStructure>> {
    Ok(store.list_active_structures(None, &[]).await?)
}

/// Marks a structure inactive so a replacement can be created.
pub async fn deactivate_structure<S: FeeStructureStore>(
    store: &S,
    id: Uuid,
) -> AppResult<FeeStructure> {
    let structure = store
        .deactivate_structure(id)
        .await?
        .ok_or_else(|| AppError::not_found("Fee structure"))?;

    info!(structure_id = %id, class_name = %structure.class_name, "Deactivated fee structure");
    Ok(structure)
}

/// Monthly totals of the standard class list.
pub const STANDARD_MONTHLY_FEES: &[(&str, i64)] = &[
    ("Pre-Primary Jr. KG", 2000),
    ("Pre-Primary Sr. KG", 2200),
    ("1st", 2500),
    ("2nd", 2600),
    ("3rd", 2700),
    ("4th", 2800),
    ("5th", 2900),
    ("6th", 3000),
    ("7th", 3100),
    ("8th", 3200),
    ("9th", 3500),
    ("10th", 4000),
];

const ACTIVITY_FEE: i64 = 300;
const MAINTENANCE_FEE: i64 = 200;

/// The standard structures for `academic_year`: tuition makes up whatever the
/// activity and maintenance fees leave of the monthly total.
pub fn standard_structures(academic_year: &str) -> Vec<NewFeeStructure> {
    let fixed = |name: &str, amount: i64| FeeComponent {
        name: name.to_string(),
        amount: Decimal::from(amount),
        is_optional: false,
        description: None,
    };

    STANDARD_MONTHLY_FEES
        .iter()
        .map(|&(class_name, total)| NewFeeStructure {
            class_name: class_name.to_string(),
            section: None,
            academic_year: academic_year.to_string(),
            components: vec![
                fixed("Tuition Fee", total - ACTIVITY_FEE - MAINTENANCE_FEE),
                fixed("Activity Fee", ACTIVITY_FEE),
                fixed("Maintenance Fee", MAINTENANCE_FEE),
            ],
            total_monthly_fee: Decimal::from(total),
        })
        .collect()
}

#[derive(Debug, Default)]
pub struct SeedOutcome {
    pub created: Vec<FeeStructure>,
    /// Classes that already had an active structure
    pub skipped: Vec<String>,
}

/// Inserts the standard structures, leaving classes that already have an
/// active structure for the year untouched.
pub async fn seed_standard_structures<S: FeeStructureStore>(
    store: &S,
    academic_year: &str,
) -> AppResult<SeedOutcome> {
    let mut outcome = SeedOutcome::default();

    for input in standard_structures(academic_year) {
        let class_name = input.class_name.clone();
        match create_structure(store, input).await {
            Ok(structure) => outcome.created.push(structure),
            Err(AppError::Conflict(_)) => {
                info!(class_name = %class_name, academic_year, "Active structure exists, skipping");
                outcome.skipped.push(class_name);
            }
            Err(e) => return Err(e),
        }
    }

    Ok(outcome)
}
