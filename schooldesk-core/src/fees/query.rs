use std::collections::HashMap;

use serde::Serialize;
use tracing::debug;
use uuid::Uuid;

use crate::error::{AppError, AppResult};
use crate::fees::types::{FeeListCommand, FeeWithStudent};
use crate::models::{FeeRecord, StudentBrief};
use crate::response::Pagination;
use crate::store::{FeeRecordStore, FeeSearch, FeeSummary, StudentFeeSummary, StudentStore};

/// Response payload of `GET /fees`.
#[derive(Debug, Serialize)]
pub struct FeePage {
    pub fees: Vec<FeeWithStudent>,
    pub summary: FeeSummary,
    pub pagination: Pagination,
}

/// Attaches a student brief to each fee.
async fn with_students<S: StudentStore>(
    store: &S,
    fees: Vec<FeeRecord>,
) -> AppResult<Vec<FeeWithStudent>> {
    let mut ids: Vec<Uuid> = fees.iter().map(|f| f.student_id).collect();
    ids.sort_unstable();
    ids.dedup();

    let briefs: HashMap<Uuid, StudentBrief> = store
        .find_students_by_ids(&ids)
        .await?
        .iter()
        .map(|s| (s.id, StudentBrief::from(s)))
        .collect();

    Ok(fees
        .into_iter()
        .map(|fee| FeeWithStudent {
            student: briefs.get(&fee.student_id).cloned(),
            fee,
        })
        .collect())
}

/// Lists fees newest first, with a summary of everything the filter matches.
///
/// Free-text search runs in two stages: students whose name or roll number
/// match are resolved first, then fees match on invoice number or on one of
/// those students. Search is ignored when a student id is given.
pub async fn list_fees<S>(store: &S, cmd: FeeListCommand) -> AppResult<FeePage>
where
    S: StudentStore + FeeRecordStore,
{
    let mut filter = cmd.filter;
    if let (Some(text), None) = (cmd.search, filter.student_id) {
        let student_ids = store.search_student_ids(&text).await?;
        debug!(search = %text, students = student_ids.len(), "Resolved fee search");
        filter.search = Some(FeeSearch { text, student_ids });
    }

    let (fees, summary) = store.fee_page(&filter, cmd.page).await?;
    let pagination = Pagination::new(cmd.page, summary.total_fees);

    Ok(FeePage {
        fees: with_students(store, fees).await?,
        summary,
        pagination,
    })
}

/// One fee with its student brief.
pub async fn get_fee<S>(store: &S, id: Uuid) -> AppResult<FeeWithStudent>
where
    S: StudentStore + FeeRecordStore,
{
    let fee = store
        .find_fee(id)
        .await?
        .ok_or_else(|| AppError::not_found("Fee record"))?;

    let student = store.find_student(fee.student_id).await?;
    Ok(FeeWithStudent {
        student: student.as_ref().map(StudentBrief::from),
        fee,
    })
}

/// Paid and pending totals of one student.
pub async fn student_summary<S: FeeRecordStore>(
    store: &S,
    student_id: Uuid,
) -> AppResult<StudentFeeSummary> {
    Ok(store.student_fee_summary(student_id).await?)
}
