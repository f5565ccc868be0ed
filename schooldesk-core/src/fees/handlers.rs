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
use crate::fees::query::FeePage;
use crate::fees::types::{
    AdjustFeeRequest, ClassWiseRequest, CreateStructureRequest, FeeListQuery, FeeWithStudent,
    GenerateFeesRequest, GenerationSummary, ManualFeeRequest, PayFeeRequest,
};
use crate::fees::{generate, payment, query, structures};
use crate::models::{FeeRecord, FeeStructure, StudentBrief};
use crate::response::ApiResponse;
use crate::state::AppState;
use crate::store::StudentFeeSummary;

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StructurePayload {
    pub fee_structure: FeeStructure,
}

#[derive(Debug, Serialize)]
pub struct StructureListPayload {
    pub structures: Vec<FeeStructure>,
    pub count: usize,
}

#[derive(Debug, Serialize)]
pub struct FeePayload<T: Serialize> {
    pub fee: T,
}

#[derive(Debug, Serialize)]
pub struct ManualFeePayload {
    pub fee: FeeRecord,
    pub student: StudentBrief,
}

type JsonBody<T> = Result<Json<T>, JsonRejection>;

/// `POST /fees/structure`
pub async fn create_structure_handler(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    body: JsonBody<CreateStructureRequest>,
) -> AppResult<(StatusCode, Json<ApiResponse<StructurePayload>>)> {
    let Json(req) = body?;
    let input = req.validate(Utc::now().year())?;

    info!(actor = %user.user_id, class_name = %input.class_name, "Create fee structure requested");
    let structure = structures::create_structure(&state.store, input).await?;

    Ok((
        StatusCode::CREATED,
        Json(ApiResponse::with_message(
            "Fee structure created successfully",
            StructurePayload {
                fee_structure: structure,
            },
        )),
    ))
}

/// `GET /fees/structures`
pub async fn list_structures_handler(
    State(state): State<AppState>,
) -> AppResult<Json<ApiResponse<StructureListPayload>>> {
    let structures = structures::list_structures(&state.store).await?;
    Ok(Json(ApiResponse::ok(StructureListPayload {
        count: structures.len(),
        structures,
    })))
}

/// `PUT /fees/structures/:id/deactivate`
pub async fn deactivate_structure_handler(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Path(id): Path<String>,
) -> AppResult<Json<ApiResponse<StructurePayload>>> {
    let id = parse_id(&id, "fee structure")?;
    info!(actor = %user.user_id, structure_id = %id, "Deactivate fee structure requested");

    let structure = structures::deactivate_structure(&state.store, id).await?;
    Ok(Json(ApiResponse::with_message(
        "Fee structure deactivated",
        StructurePayload {
            fee_structure: structure,
        },
    )))
}

/// `POST /fees/generate`
pub async fn generate_handler(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    body: JsonBody<GenerateFeesRequest>,
) -> AppResult<Json<ApiResponse<GenerationSummary>>> {
    let Json(req) = body?;
    let cmd = req.validate()?;

    info!(
        actor = %user.user_id,
        class_name = %cmd.class_name,
        month = cmd.period.month_name(),
        year = cmd.period.year,
        "Fee generation requested"
    );

    let class_name = cmd.class_name.clone();
    let period = cmd.period;
    let summary = GenerationSummary::from(generate::generate_fees(&state.store, cmd).await?);

    Ok(Json(ApiResponse::with_message(
        format!(
            "Generated {} fees for {} {} {}",
            summary.generated,
            class_name,
            period.month_name(),
            period.year
        ),
        summary,
    )))
}

/// `POST /fees/generate-class-wise`
pub async fn generate_class_wise_handler(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    body: JsonBody<ClassWiseRequest>,
) -> AppResult<Json<ApiResponse<GenerationSummary>>> {
    let Json(req) = body?;
    let cmd = req.validate()?;
    let period = cmd.period;

    info!(
        actor = %user.user_id,
        month = period.month_name(),
        year = period.year,
        classes = cmd.classes.len(),
        "Class-wise fee generation requested"
    );

    let summary = GenerationSummary::from(generate::generate_class_wise(&state.store, cmd).await?);

    Ok(Json(ApiResponse::with_message(
        format!(
            "Successfully generated {} fees for {} {}",
            summary.generated,
            period.month_name(),
            period.year
        ),
        summary,
    )))
}

/// `POST /fees/manual`
pub async fn manual_fee_handler(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    body: JsonBody<ManualFeeRequest>,
) -> AppResult<(StatusCode, Json<ApiResponse<ManualFeePayload>>)> {
    let Json(req) = body?;
    let cmd = req.validate()?;

    info!(actor = %user.user_id, student_id = %cmd.student_id, "Manual fee requested");
    let (fee, student) = generate::create_manual_fee(&state.store, cmd).await?;

    Ok((
        StatusCode::CREATED,
        Json(ApiResponse::with_message(
            format!("Manual fee created successfully for {}", student.name),
            ManualFeePayload {
                fee,
                student: StudentBrief::from(&student),
            },
        )),
    ))
}

/// `GET /fees`
pub async fn list_fees_handler(
    State(state): State<AppState>,
    params: Result<Query<FeeListQuery>, QueryRejection>,
) -> AppResult<Json<ApiResponse<FeePage>>> {
    let Query(params) = params?;
    let cmd = params.validate()?;
    let page = query::list_fees(&state.store, cmd).await?;
    Ok(Json(ApiResponse::ok(page)))
}

/// `GET /fees/:id`
pub async fn get_fee_handler(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> AppResult<Json<ApiResponse<FeePayload<FeeWithStudent>>>> {
    let id = parse_id(&id, "fee")?;
    let fee = query::get_fee(&state.store, id).await?;
    Ok(Json(ApiResponse::ok(FeePayload { fee })))
}

/// `PUT /fees/:id/adjust`
pub async fn adjust_fee_handler(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Path(id): Path<String>,
    body: JsonBody<AdjustFeeRequest>,
) -> AppResult<Json<ApiResponse<FeePayload<FeeRecord>>>> {
    let id = parse_id(&id, "fee")?;
    let Json(req) = body?;

    info!(actor = %user.user_id, fee_id = %id, "Fee adjustment requested");
    let fee = payment::adjust_fee(&state.store, id, req.into()).await?;

    Ok(Json(ApiResponse::with_message(
        "Student fee adjusted successfully",
        FeePayload { fee },
    )))
}

/// `PUT /fees/:id/pay`
pub async fn pay_fee_handler(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Path(id): Path<String>,
    body: JsonBody<PayFeeRequest>,
) -> AppResult<Json<ApiResponse<FeePayload<FeeRecord>>>> {
    let id = parse_id(&id, "fee")?;
    let Json(req) = body?;
    let details = req.validate()?;

    info!(actor = %user.user_id, fee_id = %id, "Payment requested");
    let fee = payment::record_payment(&state.store, id, details).await?;

    Ok(Json(ApiResponse::with_message(
        format!("Payment recorded successfully for {}", fee.invoice_number),
        FeePayload { fee },
    )))
}

/// `GET /fees/student-summary/:id`
pub async fn student_summary_handler(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> AppResult<Json<ApiResponse<StudentFeeSummary>>> {
    let student_id = parse_id(&id, "student")?;
    let summary = query::student_summary(&state.store, student_id).await?;
    Ok(Json(ApiResponse::ok(summary)))
}
