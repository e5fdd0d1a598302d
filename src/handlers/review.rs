// src/handlers/review.rs

use std::sync::Arc;

use axum::{
    Extension, Json,
    extract::{Path, State},
    response::IntoResponse,
};
use uuid::Uuid;
use validator::Validate;

use crate::{
    error::AppError,
    models::submission::{UpdateFlagRequest, UpdateMarksRequest},
    store::Store,
    utils::jwt::Claims,
};

pub async fn get_submission(
    State(store): State<Arc<Store>>,
    Path((course_id, quiz_id, submission_id)): Path<(String, String, Uuid)>,
) -> Result<impl IntoResponse, AppError> {
    let submission = store
        .submission(submission_id, &course_id, &quiz_id)
        .await
        .ok_or_else(|| AppError::NotFound("Submission not found".to_string()))?;

    Ok(Json(submission))
}

/// Sets the flag to the requested value and returns the updated snapshot.
/// Repeating the same value is a no-op.
pub async fn update_flag(
    State(store): State<Arc<Store>>,
    Extension(claims): Extension<Claims>,
    Path((course_id, quiz_id, submission_id)): Path<(String, String, Uuid)>,
    Json(req): Json<UpdateFlagRequest>,
) -> Result<impl IntoResponse, AppError> {
    let submission = store
        .update_submission(submission_id, &course_id, &quiz_id, |s| {
            s.is_flagged = req.is_flagged;
            Ok(())
        })
        .await?;

    tracing::info!(
        reviewer = %claims.sub,
        %submission_id,
        is_flagged = submission.is_flagged,
        "Submission flag updated"
    );

    Ok(Json(submission))
}

/// Overrides the score of a completed submission.
pub async fn update_marks(
    State(store): State<Arc<Store>>,
    Extension(claims): Extension<Claims>,
    Path((course_id, quiz_id, submission_id)): Path<(String, String, Uuid)>,
    Json(req): Json<UpdateMarksRequest>,
) -> Result<impl IntoResponse, AppError> {
    req.validate()?;

    let submission = store
        .update_submission(submission_id, &course_id, &quiz_id, |s| {
            if !s.is_completed {
                return Err(AppError::BadRequest("Quiz has not been submitted yet".to_string()));
            }
            s.score = req.new_score;
            Ok(())
        })
        .await?;

    tracing::info!(
        reviewer = %claims.sub,
        %submission_id,
        score = submission.score,
        "Submission marks updated"
    );

    Ok(Json(submission))
}
