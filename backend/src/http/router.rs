//! Router configuration for the HTTP API.
//!
//! This module sets up all routes, middleware (CORS, tracing, user
//! identification) and creates the axum router ready for serving.

use axum::{
    extract::DefaultBodyLimit,
    http::Method,
    middleware,
    routing::{get, post},
    Router,
};
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};

use super::error::AppError;
use super::extract::{identify_user, MAX_JSON_BODY_BYTES};
use super::handlers;
use super::state::AppState;

async fn not_found() -> AppError {
    AppError::NotFound
}

async fn method_not_allowed(method: Method) -> AppError {
    AppError::MethodNotAllowed(method)
}

/// Create the main application router with all routes and middleware.
pub fn create_router(state: AppState) -> Router {
    // CORS configuration - permissive for development, should be restricted in production
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let api_v1 = Router::new()
        // Subjects
        .route(
            "/subjects/import",
            post(handlers::import_subjects)
                .layer(DefaultBodyLimit::max(handlers::MAX_IMPORT_BYTES)),
        )
        .route(
            "/subjects/{year}",
            get(handlers::list_subjects).post(handlers::create_subject),
        )
        .route(
            "/subjects/{year}/{id}",
            get(handlers::get_subject)
                .patch(handlers::update_subject)
                .delete(handlers::delete_subject),
        )
        // Exemptions
        .route(
            "/exempteds",
            get(handlers::list_exempteds).post(handlers::create_exempted),
        )
        .route(
            "/exempteds/{id}",
            get(handlers::get_exempted).delete(handlers::delete_exempted),
        )
        .route(
            "/exempteds/find/{student_id}/{subject_id}",
            get(handlers::find_exempted),
        )
        .route(
            "/exempteds/students/{id}",
            get(handlers::list_student_exempteds),
        )
        .route(
            "/exempteds/subjects/{id}",
            get(handlers::list_subject_exempteds),
        );

    Router::new()
        .route("/health", get(handlers::health_check))
        .nest("/v1", api_v1)
        .fallback(not_found)
        .method_not_allowed_fallback(method_not_allowed)
        .layer(DefaultBodyLimit::max(MAX_JSON_BODY_BYTES))
        .layer(middleware::from_fn(identify_user))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}
