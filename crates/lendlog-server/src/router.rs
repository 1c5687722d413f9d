use std::path::Path;

use axum::http::Method;
use axum::routing::{get, post};
use axum::Router;
use tower_http::cors::{Any, CorsLayer};
use tower_http::services::ServeDir;
use tower_http::trace::TraceLayer;

use crate::handler;
use crate::state::SharedState;

/// Build the axum router with every lendlog endpoint.
///
/// When `static_dir` is set, unmatched paths are served from it so the
/// front end and the API share one origin.
pub fn build_router(state: SharedState, static_dir: Option<&Path>) -> Router {
    let api = Router::new()
        .route("/v1/health", get(handler::health_handler))
        .route("/api/books", get(handler::books_handler))
        .route("/api/students", get(handler::students_handler))
        .route("/api/transaction", post(handler::transaction_handler))
        .route("/api/users/status", post(handler::user_status_handler))
        .route("/api/users/register", post(handler::register_handler))
        .route("/api/users/history", post(handler::user_history_handler))
        .route("/api/users/link-student-id", post(handler::link_student_id_handler))
        .route("/api/users/lookup-student-id", post(handler::lookup_student_id_handler))
        .route("/api/collateral", post(handler::save_collateral_handler))
        .route("/api/admin/active", post(handler::admin_active_handler))
        .route("/api/admin/history", post(handler::admin_history_handler))
        .route("/api/admin/reload", post(handler::admin_reload_handler))
        .route("/api/admin/collateral", post(handler::admin_collateral_handler))
        .with_state(state);

    let app = match static_dir {
        Some(dir) => api.fallback_service(ServeDir::new(dir)),
        None => api,
    };

    app.layer(
        CorsLayer::new()
            .allow_origin(Any)
            .allow_methods([Method::GET, Method::POST])
            .allow_headers(Any),
    )
    .layer(TraceLayer::new_for_http())
}
