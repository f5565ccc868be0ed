use tracing::{info, warn};
use uuid::Uuid;

use crate::error::{AppError, AppResult};
use crate::models::student::UpdateStudent;
use crate::models::{Student, StudentStatus};
use crate::response::Pagination;
use crate::store::{constraints, PageRequest, StoreError, StudentFilter, StudentStore};
use crate::students::roll_number::{roll_number, MAX_ROLL_ATTEMPTS};
use crate::students::types::{validate_update, StudentDraft, StudentPage};

fn duplicate_roll_number() -> AppError {
    AppError::Conflict("Roll number already exists".into())
}

fn map_roll_conflict(err: StoreError) -> AppError {
    if err.is_conflict_on(constraints::STUDENT_ROLL_NUMBER) {
        duplicate_roll_number()
    } else {
        err.into()
    }
}

/// Enrolls a student.
///
/// Without an explicit roll number one is generated from the class, the
/// section and the number of students already enrolled in that section for
/// the academic year. A generated number that is already taken is retried
/// with the next sequence value.
pub async fn create_student<S: StudentStore>(store: &S, draft: StudentDraft) -> AppResult<Student> {
    let mut student = Student::new(draft.student);

    if draft.roll_number_given {
        store
            .insert_student(&student)
            .await
            .map_err(map_roll_conflict)?;
    } else {
        let enrolled = store
            .count_students_in_section(
                &student.class_name,
                &student.section,
                &student.academic_year,
            )
            .await?;

        let mut inserted = false;
        for offset in 1..=MAX_ROLL_ATTEMPTS {
            student.roll_number = roll_number(&student.class_name, &student.section, enrolled + offset);
            match store.insert_student(&student).await {
                Ok(()) => {
                    inserted = true;
                    break;
                }
                Err(e) if e.is_conflict_on(constraints::STUDENT_ROLL_NUMBER) => {
                    warn!(roll_number = %student.roll_number, "Roll number taken, trying the next one");
                }
                Err(e) => return Err(e.into()),
            }
        }
        if !inserted {
            return Err(duplicate_roll_number());
        }
    }

    info!(
        student_id = %student.id,
        roll_number = %student.roll_number,
        class_name = %student.class_name,
        section = %student.section,
        "Enrolled student"
    );
    Ok(student)
}

pub async fn get_student<S: StudentStore>(store: &S, id: Uuid) -> AppResult<Student> {
    store
        .find_student(id)
        .await?
        .ok_or_else(|| AppError::not_found("Student"))
}

pub async fn list_students<S: StudentStore>(
    store: &S,
    filter: StudentFilter,
    page: PageRequest,
) -> AppResult<StudentPage> {
    let (students, total) = store.list_students(&filter, page).await?;
    Ok(StudentPage {
        students,
        pagination: Pagination::new(page, total),
    })
}

/// Applies the present fields of `update` to a student.
pub async fn update_student<S: StudentStore>(
    store: &S,
    id: Uuid,
    update: UpdateStudent,
) -> AppResult<Student> {
    validate_update(&update)?;

    let mut student = get_student(store, id).await?;
    update.apply_to(&mut student);

    if !store
        .update_student(&student)
        .await
        .map_err(map_roll_conflict)?
    {
        return Err(AppError::not_found("Student"));
    }

    info!(student_id = %id, "Updated student");
    Ok(student)
}

/// Soft delete: the student is kept with status `inactive`.
pub async fn deactivate_student<S: StudentStore>(store: &S, id: Uuid) -> AppResult<Student> {
    let mut student = get_student(store, id).await?;
    student.status = StudentStatus::Inactive;
    student.updated_at = chrono::Utc::now();

    if !store.update_student(&student).await? {
        return Err(AppError::not_found("Student"));
    }

    info!(student_id = %id, roll_number = %student.roll_number, "Deactivated student");
    Ok(student)
}
