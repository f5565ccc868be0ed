use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// Student enrollment status enumeration
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "varchar", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum StudentStatus {
    Active,
    Inactive,
    Graduated,
    Transferred,
}

impl std::str::FromStr for StudentStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "active" => Ok(StudentStatus::Active),
            "inactive" => Ok(StudentStatus::Inactive),
            "graduated" => Ok(StudentStatus::Graduated),
            "transferred" => Ok(StudentStatus::Transferred),
            other => Err(format!("Unknown student status '{other}'")),
        }
    }
}

/// Student model representing one enrollment record.
///
/// Maps to the `students` table. Parent contact details are stored as
/// flat columns. Students are never hard-deleted; deactivation sets
/// `status` to `inactive`.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct Student {
    /// Unique identifier for the student
    pub id: Uuid,

    pub name: String,

    pub email: Option<String>,

    pub phone: Option<String>,

    /// Class name, exposed as `class` in JSON
    #[serde(rename = "class")]
    pub class_name: String,

    pub section: String,

    /// Roll number (unique across all students regardless of status)
    pub roll_number: String,

    pub parent_name: Option<String>,

    pub parent_email: Option<String>,

    pub parent_phone: Option<String>,

    pub address: Option<String>,

    pub status: StudentStatus,

    /// Academic year of enrollment, e.g. "2025"
    pub academic_year: String,

    pub created_at: DateTime<Utc>,

    pub updated_at: DateTime<Utc>,
}

impl Student {
    pub fn is_active(&self) -> bool {
        self.status == StudentStatus::Active
    }
}

/// Validated input for a new student.
#[derive(Debug, Clone)]
pub struct NewStudent {
    pub name: String,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub class_name: String,
    pub section: String,
    pub roll_number: String,
    pub parent_name: Option<String>,
    pub parent_email: Option<String>,
    pub parent_phone: Option<String>,
    pub address: Option<String>,
    pub academic_year: String,
}

impl Student {
    /// Builds an active student from validated input.
    pub fn new(input: NewStudent) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            name: input.name,
            email: input.email,
            phone: input.phone,
            class_name: input.class_name,
            section: input.section,
            roll_number: input.roll_number,
            parent_name: input.parent_name,
            parent_email: input.parent_email,
            parent_phone: input.parent_phone,
            address: input.address,
            status: StudentStatus::Active,
            academic_year: input.academic_year,
            created_at: now,
            updated_at: now,
        }
    }
}

/// Student update request. Only `Some` fields are applied.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateStudent {
    pub name: Option<String>,
    pub email: Option<String>,
    pub phone: Option<String>,
    #[serde(rename = "class")]
    pub class_name: Option<String>,
    pub section: Option<String>,
    pub roll_number: Option<String>,
    pub parent_name: Option<String>,
    pub parent_email: Option<String>,
    pub parent_phone: Option<String>,
    pub address: Option<String>,
    pub status: Option<StudentStatus>,
}

impl UpdateStudent {
    /// Applies the present fields onto `student`.
    pub fn apply_to(&self, student: &mut Student) {
        fn set(target: &mut String, value: &Option<String>) {
            if let Some(v) = value {
                *target = v.trim().to_string();
            }
        }
        fn set_opt(target: &mut Option<String>, value: &Option<String>) {
            if let Some(v) = value {
                *target = Some(v.trim().to_string()).filter(|s| !s.is_empty());
            }
        }

        set(&mut student.name, &self.name);
        set(&mut student.class_name, &self.class_name);
        set(&mut student.section, &self.section);
        set(&mut student.roll_number, &self.roll_number);
        set_opt(&mut student.email, &self.email);
        set_opt(&mut student.phone, &self.phone);
        set_opt(&mut student.parent_name, &self.parent_name);
        set_opt(&mut student.parent_email, &self.parent_email);
        set_opt(&mut student.parent_phone, &self.parent_phone);
        set_opt(&mut student.address, &self.address);
        if let Some(status) = self.status {
            student.status = status;
        }
        student.updated_at = Utc::now();
    }
}

/// The few student fields shown next to a fee record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StudentBrief {
    pub id: Uuid,
    pub name: String,
    pub roll_number: String,
    #[serde(rename = "class")]
    pub class_name: String,
    pub section: String,
}

impl From<&Student> for StudentBrief {
    fn from(student: &Student) -> Self {
        StudentBrief {
            id: student.id,
            name: student.name.clone(),
            roll_number: student.roll_number.clone(),
            class_name: student.class_name.clone(),
            section: student.section.clone(),
        }
    }
}
