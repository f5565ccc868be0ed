use serde::{Deserialize, Serialize};

use crate::error::{AppError, AppResult};
use crate::extract::non_empty;
use crate::models::student::{NewStudent, UpdateStudent};
use crate::models::{Student, StudentStatus};
use crate::response::Pagination;
use crate::store::{PageRequest, StudentFilter};

pub const DEFAULT_SECTION: &str = "A";

/// Request body for `POST /students`.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateStudentRequest {
    pub name: Option<String>,
    pub email: Option<String>,
    pub phone: Option<String>,
    #[serde(rename = "class")]
    pub class_name: Option<String>,
    pub section: Option<String>,
    /// Generated when absent
    pub roll_number: Option<String>,
    pub parent_name: Option<String>,
    pub parent_email: Option<String>,
    pub parent_phone: Option<String>,
    pub address: Option<String>,
}

/// A validated new student whose roll number may still need generating.
#[derive(Debug, Clone)]
pub struct StudentDraft {
    pub student: NewStudent,
    pub roll_number_given: bool,
}

impl CreateStudentRequest {
    pub fn validate(self, academic_year: String) -> AppResult<StudentDraft> {
        let (Some(name), Some(class_name)) = (non_empty(self.name), non_empty(self.class_name))
        else {
            return Err(AppError::Validation("Name and class are required".into()));
        };

        let roll_number = non_empty(self.roll_number);
        Ok(StudentDraft {
            roll_number_given: roll_number.is_some(),
            student: NewStudent {
                name,
                email: non_empty(self.email).map(|e| e.to_lowercase()),
                phone: non_empty(self.phone),
                class_name,
                section: non_empty(self.section).unwrap_or_else(|| DEFAULT_SECTION.to_string()),
                roll_number: roll_number.unwrap_or_default(),
                parent_name: non_empty(self.parent_name),
                parent_email: non_empty(self.parent_email),
                parent_phone: non_empty(self.parent_phone),
                address: non_empty(self.address),
                academic_year,
            },
        })
    }
}

/// Rejects updates that would blank out a required field.
pub fn validate_update(update: &UpdateStudent) -> AppResult<()> {
    let required = [
        ("Name", &update.name),
        ("Class", &update.class_name),
        ("Section", &update.section),
        ("Roll number", &update.roll_number),
    ];
    for (label, value) in required {
        if value.as_deref().is_some_and(|v| v.trim().is_empty()) {
            return Err(AppError::Validation(format!("{label} cannot be empty")));
        }
    }
    Ok(())
}

/// Query string of `GET /students`.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct StudentListQuery {
    pub page: Option<u32>,
    pub limit: Option<u32>,
    pub search: Option<String>,
    pub class: Option<String>,
    pub section: Option<String>,
    /// Absent means `active`; an empty value lists every status
    pub status: Option<String>,
}

impl StudentListQuery {
    pub fn validate(self) -> AppResult<(StudentFilter, PageRequest)> {
        let status = match self.status {
            None => Some(StudentStatus::Active),
            Some(raw) => non_empty(Some(raw))
                .map(|s| s.parse::<StudentStatus>().map_err(AppError::Validation))
                .transpose()?,
        };

        Ok((
            StudentFilter {
                class_name: non_empty(self.class),
                section: non_empty(self.section),
                status,
                search: non_empty(self.search),
            },
            PageRequest::new(self.page, self.limit),
        ))
    }
}

/// Response payload of `GET /students`.
#[derive(Debug, Serialize)]
pub struct StudentPage {
    pub students: Vec<Student>,
    pub pagination: Pagination,
}
