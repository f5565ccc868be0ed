use axum::extract::rejection::{JsonRejection, QueryRejection};
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::{Extension, Json};
use chrono::{Datelike, Utc};
use serde::Serialize;
use tracing::info;

use crate::auth::AuthUser;
use crate::error::AppResult;
use crate::extract::parse_id;
use crate::models::student::UpdateStudent;
use crate::models::Student;
use crate::response::ApiResponse;
use crate::state::AppState;
use crate::students::service;
use crate::students::types::{CreateStudentRequest, StudentListQuery, StudentPage};

#[derive(Debug, Serialize)]
pub struct StudentPayload {
    pub student: Student,
}

/// `GET /students`
pub async fn list_students_handler(
    State(state): State<AppState>,
    params: Result<Query<StudentListQuery>, QueryRejection>,
) -> AppResult<Json<ApiResponse<StudentPage>>> {
    let Query(params) = params?;
    let (filter, page) = params.validate()?;
    let students = service::list_students(&state.store, filter, page).await?;
    Ok(Json(ApiResponse::ok(students)))
}

/// `POST /students`
pub async fn create_student_handler(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    body: Result<Json<CreateStudentRequest>, JsonRejection>,
) -> AppResult<(StatusCode, Json<ApiResponse<StudentPayload>>)> {
    let Json(req) = body?;
    let draft = req.validate(Utc::now().year().to_string())?;

    info!(actor = %user.user_id, class_name = %draft.student.class_name, "Enroll student requested");
    let student = service::create_student(&state.store, draft).await?;

    Ok((
        StatusCode::CREATED,
        Json(ApiResponse::with_message(
            "Student added successfully",
            StudentPayload { student },
        )),
    ))
}

/// `GET /students/:id`
pub async fn get_student_handler(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> AppResult<Json<ApiResponse<StudentPayload>>> {
    let id = parse_id(&id, "student")?;
    let student = service::get_student(&state.store, id).await?;
    Ok(Json(ApiResponse::ok(StudentPayload { student })))
}

/// `PUT /students/:id`
pub async fn update_student_handler(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Path(id): Path<String>,
    body: Result<Json<UpdateStudent>, JsonRejection>,
) -> AppResult<Json<ApiResponse<StudentPayload>>> {
    let id = parse_id(&id, "student")?;
    let Json(update) = body?;

    info!(actor = %user.user_id, student_id = %id, "Update student requested");
    let student = service::update_student(&state.store, id, update).await?;

    Ok(Json(ApiResponse::with_message(
        "Student updated successfully",
        StudentPayload { student },
    )))
}

/// `DELETE /students/:id`
pub async fn delete_student_handler(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Path(id): Path<String>,
) -> AppResult<Json<ApiResponse<StudentPayload>>> {
    let id = parse_id(&id, "student")?;

    info!(actor = %user.user_id, student_id = %id, "Deactivate student requested");
    let student = service::deactivate_student(&state.store, id).await?;

    Ok(Json(ApiResponse::with_message(
        "Student deactivated successfully",
        StudentPayload { student },
    )))
}
