use chrono::NaiveDate;
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::error::{AppError, AppResult};
use crate::fees::types::{
    ClassWiseCommand, CreatedFee, FailedFee, GenerateCommand, GenerationReport, ManualFeeCommand,
    SkippedFee,
};
use crate::models::fee_record::{FeeComponentSnapshot, NewFeeRecord};
use crate::models::{
    BillingPeriod, FeeRecord, FeeStructure, FeeType, GenerationType, Student,
};
use crate::store::{
    constraints, FeeRecordStore, FeeStructureStore, StoreError, StudentStore,
};

/// How many invoice numbers are drawn for one record before giving up.
pub const MAX_INVOICE_ATTEMPTS: u32 = 3;

pub const FEE_EXISTS_REASON: &str = "Fee already exists";

const DUPLICATE_PERIOD_MESSAGE: &str = "Fee already exists for this student and month";

/// `INV-<roll>-<MON><year>-<NNNN>`, used for generated fees.
pub fn auto_invoice_number(roll_number: &str, period: &BillingPeriod, sequence: i64) -> String {
    format!(
        "INV-{}-{}{}-{:04}",
        roll_number,
        period.month_abbr(),
        period.year,
        sequence
    )
}

/// `INV-<year>-<MON>-<NNNN>`, used for manually entered fees.
pub fn manual_invoice_number(period: &BillingPeriod, sequence: i64) -> String {
    format!("INV-{}-{}-{:04}", period.year, period.month_abbr(), sequence)
}

/// Inserts `fee`, assigning it an invoice number from the store sequence.
///
/// A collision on the invoice index draws a fresh number, up to
/// [`MAX_INVOICE_ATTEMPTS`] times. Every other error is returned as is.
async fn insert_with_fresh_invoice<S, F>(
    store: &S,
    mut fee: FeeRecord,
    invoice_number: F,
) -> Result<FeeRecord, StoreError>
where
    S: FeeRecordStore,
    F: Fn(i64) -> String,
{
    let mut attempt = 1;
    loop {
        fee.invoice_number = invoice_number(store.next_invoice_sequence().await?);

        match store.insert_fee(&fee).await {
            Ok(()) => return Ok(fee),
            Err(e)
                if e.is_conflict_on(constraints::FEE_INVOICE_NUMBER)
                    && attempt < MAX_INVOICE_ATTEMPTS =>
            {
                warn!(
                    invoice_number = %fee.invoice_number,
                    attempt,
                    "Invoice number already taken, drawing a new one"
                );
                attempt += 1;
            }
            Err(e) => return Err(e),
        }
    }
}

/// Creates the fee of one student for `period`.
///
/// Returns `Ok(None)` when the student is already billed for the period,
/// including when a concurrent run inserted it first.
async fn bill_student<S>(
    store: &S,
    structure: &FeeStructure,
    student: &Student,
    period: BillingPeriod,
    due_date: NaiveDate,
    generated_by: &str,
) -> Result<Option<FeeRecord>, AppError>
where
    S: FeeRecordStore,
{
    if store
        .find_fee_for_period(student.id, period.month_name(), period.year)
        .await?
        .is_some()
    {
        return Ok(None);
    }

    let fee = FeeRecord::new(NewFeeRecord {
        student_id: student.id,
        fee_structure_id: Some(structure.id),
        invoice_number: String::new(),
        period,
        academic_year: structure.academic_year.clone(),
        fee_type: FeeType::Monthly,
        components: structure
            .components
            .iter()
            .map(FeeComponentSnapshot::from)
            .collect(),
        base_fee_amount: structure.total_monthly_fee,
        due_date,
        generated_by: Some(generated_by.to_string()),
        generation_type: GenerationType::Auto,
        remarks: None,
    });

    let inserted = insert_with_fresh_invoice(store, fee, |sequence| {
        auto_invoice_number(&student.roll_number, &period, sequence)
    })
    .await;

    match inserted {
        Ok(fee) => Ok(Some(fee)),
        Err(e) if e.is_conflict_on(constraints::FEE_STUDENT_PERIOD) => Ok(None),
        Err(e) => Err(e.into()),
    }
}

/// Bills every selected student of `structure`'s class for `period`.
///
/// Students are processed one at a time; a failure for one student is
/// recorded in the report and does not stop the others.
async fn generate_for_structure<S>(
    store: &S,
    structure: &FeeStructure,
    section: Option<&str>,
    student_ids: Option<&[Uuid]>,
    period: BillingPeriod,
    due_date: NaiveDate,
    generated_by: &str,
) -> AppResult<GenerationReport>
where
    S: StudentStore + FeeRecordStore,
{
    let section = section.or(structure.section.as_deref());
    let students = store
        .active_students_in_class(&structure.class_name, section, student_ids)
        .await?;

    info!(
        class_name = %structure.class_name,
        section = section.unwrap_or("*"),
        students = students.len(),
        month = period.month_name(),
        year = period.year,
        "Generating fees for class"
    );

    let mut report = GenerationReport::default();
    for student in &students {
        match bill_student(store, structure, student, period, due_date, generated_by).await {
            Ok(Some(fee)) => {
                info!(
                    student_id = %student.id,
                    invoice_number = %fee.invoice_number,
                    "Created fee"
                );
                report.created.push(CreatedFee {
                    student_name: student.name.clone(),
                    class_name: structure.class_name.clone(),
                    invoice_number: fee.invoice_number.clone(),
                    amount: fee.final_amount,
                    fee,
                });
            }
            Ok(None) => report.skipped.push(SkippedFee {
                student_name: student.name.clone(),
                class_name: structure.class_name.clone(),
                reason: FEE_EXISTS_REASON.to_string(),
            }),
            Err(e) => {
                warn!(student_id = %student.id, error = %e, "Failed to create fee");
                report.errors.push(FailedFee {
                    student_name: Some(student.name.clone()),
                    class_name: structure.class_name.clone(),
                    error: e.to_string(),
                });
            }
        }
    }

    Ok(report)
}

/// Generates one month of fees for a single class.
///
/// # Arguments
///
/// * `store` - Backing store
/// * `cmd` - Validated generation request
///
/// # Returns
///
/// A report listing the created, skipped and failed students.
///
/// # Errors
///
/// Returns [`AppError::Validation`] if the period has no representable due
/// date and [`AppError::NoFeeStructure`] if the class has no active structure
/// for the academic year, creating nothing in either case. A store error is
/// returned if the students cannot be loaded.
pub async fn generate_fees<S>(store: &S, cmd: GenerateCommand) -> AppResult<GenerationReport>
where
    S: FeeStructureStore + StudentStore + FeeRecordStore,
{
    let due_date = cmd.period.due_date()?;
    let structure = store
        .find_active_structure(&cmd.class_name, &cmd.academic_year)
        .await?
        .ok_or_else(|| {
            AppError::NoFeeStructure(format!(
                "No fee structure found for {} in {}",
                cmd.class_name, cmd.academic_year
            ))
        })?;

    let report = generate_for_structure(
        store,
        &structure,
        cmd.section.as_deref(),
        cmd.student_ids.as_deref(),
        cmd.period,
        due_date,
        &cmd.generated_by,
    )
    .await?;

    info!(
        class_name = %cmd.class_name,
        created = report.created.len(),
        skipped = report.skipped.len(),
        errors = report.errors.len(),
        "Fee generation completed"
    );
    Ok(report)
}

/// Generates one month of fees for every class with an active structure in
/// the billing year, in class-name order.
///
/// A class whose students cannot be loaded is reported as a class-level
/// error and the run continues with the next class.
pub async fn generate_class_wise<S>(store: &S, cmd: ClassWiseCommand) -> AppResult<GenerationReport>
where
    S: FeeStructureStore + StudentStore + FeeRecordStore,
{
    let due_date = cmd.period.due_date()?;
    let academic_year = cmd.period.year.to_string();
    let structures = store
        .list_active_structures(Some(&academic_year), &cmd.classes)
        .await?;

    if structures.is_empty() {
        return Err(AppError::NoFeeStructure(
            "No fee structures found. Please create fee structures first.".into(),
        ));
    }

    let mut report = GenerationReport::default();
    for structure in &structures {
        let class_report = generate_for_structure(
            store,
            structure,
            None,
            None,
            cmd.period,
            due_date,
            &cmd.generated_by,
        )
        .await;

        match class_report {
            Ok(class_report) => report.merge(class_report),
            Err(e) => {
                error!(class_name = %structure.class_name, error = %e, "Failed to generate fees for class");
                report.errors.push(FailedFee {
                    student_name: None,
                    class_name: structure.class_name.clone(),
                    error: e.to_string(),
                });
            }
        }
    }

    info!(
        month = cmd.period.month_name(),
        year = cmd.period.year,
        classes = structures.len(),
        created = report.created.len(),
        skipped = report.skipped.len(),
        errors = report.errors.len(),
        "Class-wise fee generation completed"
    );
    Ok(report)
}

/// Enters a one-off fee for a student outside of any structure.
///
/// Returns the new record and the student it bills.
pub async fn create_manual_fee<S>(store: &S, cmd: ManualFeeCommand) -> AppResult<(FeeRecord, Student)>
where
    S: StudentStore + FeeRecordStore,
{
    let student = store
        .find_student(cmd.student_id)
        .await?
        .ok_or_else(|| AppError::not_found("Student"))?;

    let period = cmd.period;
    if store
        .find_fee_for_period(student.id, period.month_name(), period.year)
        .await?
        .is_some()
    {
        return Err(AppError::Conflict(DUPLICATE_PERIOD_MESSAGE.into()));
    }

    let due_date = match cmd.due_date {
        Some(date) => date,
        None => period.due_date()?,
    };

    let fee = FeeRecord::new(NewFeeRecord {
        student_id: student.id,
        fee_structure_id: None,
        invoice_number: String::new(),
        period,
        academic_year: period.year.to_string(),
        fee_type: cmd.fee_type,
        components: Vec::new(),
        base_fee_amount: cmd.amount,
        due_date,
        generated_by: Some(cmd.generated_by),
        generation_type: GenerationType::Manual,
        remarks: cmd.description,
    });

    let fee = insert_with_fresh_invoice(store, fee, |sequence| {
        manual_invoice_number(&period, sequence)
    })
    .await
    .map_err(|e| {
        if e.is_conflict_on(constraints::FEE_STUDENT_PERIOD) {
            AppError::Conflict(DUPLICATE_PERIOD_MESSAGE.into())
        } else {
            e.into()
        }
    })?;

    info!(
        student_id = %student.id,
        invoice_number = %fee.invoice_number,
        amount = %fee.final_amount,
        "Created manual fee"
    );
    Ok((fee, student))
}
