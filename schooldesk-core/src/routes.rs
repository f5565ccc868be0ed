use axum::extract::State;
use axum::http::{HeaderValue, StatusCode};
use axum::response::Json;
use axum::routing::{get, post, put};
use axum::{middleware, Router};
use serde_json::{json, Value};
use tower::ServiceBuilder;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::{error, warn};

use crate::auth::{login_handler, register_handler, require_auth};
use crate::fees::handlers as fees;
use crate::state::AppState;
use crate::students::handlers as students;

async fn health_check() -> Json<Value> {
    Json(json!({
        "status": "ok",
        "service": "schooldesk-core",
        "version": env!("CARGO_PKG_VERSION")
    }))
}

/// Verifies the database answers a trivial query.
async fn db_health_check(State(state): State<AppState>) -> Result<Json<Value>, StatusCode> {
    sqlx::query("SELECT 1")
        .execute(state.store.pool())
        .await
        .map_err(|e| {
            error!(error = %e, "Database health check failed");
            StatusCode::SERVICE_UNAVAILABLE
        })?;

    Ok(Json(json!({
        "status": "ok",
        "database": "connected"
    })))
}

fn fee_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(fees::list_fees_handler))
        .route("/structure", post(fees::create_structure_handler))
        .route("/structures", get(fees::list_structures_handler))
        .route(
            "/structures/:id/deactivate",
            put(fees::deactivate_structure_handler),
        )
        .route("/generate", post(fees::generate_handler))
        .route("/generate-class-wise", post(fees::generate_class_wise_handler))
        .route("/manual", post(fees::manual_fee_handler))
        .route("/student-summary/:id", get(fees::student_summary_handler))
        .route("/:id", get(fees::get_fee_handler))
        .route("/:id/adjust", put(fees::adjust_fee_handler))
        .route("/:id/pay", put(fees::pay_fee_handler))
}

fn student_routes() -> Router<AppState> {
    Router::new()
        .route(
            "/",
            get(students::list_students_handler).post(students::create_student_handler),
        )
        .route(
            "/:id",
            get(students::get_student_handler)
                .put(students::update_student_handler)
                .delete(students::delete_student_handler),
        )
}

fn cors_layer(origins: &[String]) -> CorsLayer {
    let layer = CorsLayer::new().allow_methods(Any).allow_headers(Any);
    if origins.iter().any(|o| o == "*") {
        return layer.allow_origin(Any);
    }

    let allowed: Vec<HeaderValue> = origins
        .iter()
        .filter_map(|origin| match origin.parse() {
            Ok(value) => Some(value),
            Err(_) => {
                warn!(origin = %origin, "Ignoring invalid CORS origin");
                None
            }
        })
        .collect();
    layer.allow_origin(allowed)
}

/// Builds the HTTP API.
///
/// `/health*` and `/auth/*` are public; `/fees/*` and `/students/*` require a
/// bearer token.
pub fn create_router(state: AppState) -> Router {
    let protected = Router::new()
        .nest("/fees", fee_routes())
        .nest("/students", student_routes())
        .route_layer(middleware::from_fn_with_state(state.clone(), require_auth));

    Router::new()
        .route("/health", get(health_check))
        .route("/health/db", get(db_health_check))
        .route("/auth/register", post(register_handler))
        .route("/auth/login", post(login_handler))
        .merge(protected)
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(cors_layer(&state.config.cors_origins)),
        )
        .with_state(state)
}
