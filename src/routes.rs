// src/routes.rs

use axum::{
    Router,
    extract::DefaultBodyLimit,
    http::{Method, header},
    middleware,
    routing::{get, post, put},
};
use tower::ServiceBuilder;
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};

use crate::{
    config::MAX_SAMPLE_BYTES,
    handlers::{proctoring, quiz, review},
    state::AppState,
    utils::jwt::auth_middleware,
};

/// Assembles the exam service router.
///
/// * `/api/quizzes`: quiz retrieval, attempt lifecycle and review.
/// * `/api/proctoring`: sample intake.
/// * Every route requires a bearer token; unknown paths fall through to 404.
pub fn create_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::POST, Method::PUT])
        .allow_headers([header::AUTHORIZATION, header::CONTENT_TYPE]);

    let quiz_routes = Router::new()
        .route("/{course_id}/{quiz_id}/get", get(quiz::get_quiz))
        .route("/{course_id}/{quiz_id}/start", post(quiz::start_quiz))
        .route("/{course_id}/{quiz_id}/submit", post(quiz::submit_quiz))
        .route(
            "/{course_id}/{quiz_id}/submission/{submission_id}",
            get(review::get_submission),
        )
        .route(
            "/{course_id}/{quiz_id}/update-flag/{submission_id}",
            put(review::update_flag),
        )
        .route(
            "/{course_id}/{quiz_id}/update-marks/{submission_id}",
            put(review::update_marks),
        );

    // Room for multipart framing on top of the image itself.
    let proctoring_routes = Router::new()
        .route(
            "/{course_id}/{quiz_id}/analyze-image",
            post(proctoring::analyze_image),
        )
        .layer(DefaultBodyLimit::max(MAX_SAMPLE_BYTES * 2));

    Router::new()
        .nest("/api/quizzes", quiz_routes)
        .nest("/api/proctoring", proctoring_routes)
        .layer(middleware::from_fn_with_state(state.clone(), auth_middleware))
        // Global Middleware (applied from outside in)
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(cors),
        )
        .with_state(state)
}
