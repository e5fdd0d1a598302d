// src/handlers/proctoring.rs

use std::sync::Arc;

use axum::{
    Extension, Json,
    extract::{Multipart, Path, State},
    response::IntoResponse,
};
use chrono::Utc;
use image::ImageFormat;

use crate::{
    config::MAX_SAMPLE_BYTES,
    error::AppError,
    handlers::quiz::find_quiz,
    models::{
        proctoring::{SAMPLE_FIELD, SampleAck, sample_format},
        submission::SampleRecord,
    },
    store::Store,
    utils::jwt::Claims,
};

/// Accepts one proctoring sample for the caller's open attempt.
///
/// The image must be a JPEG or PNG of at most 1 MiB, sent in the
/// `proctor_image` multipart field. Samples arriving in the last 30 seconds
/// of the attempt are refused.
pub async fn analyze_image(
    State(store): State<Arc<Store>>,
    Extension(claims): Extension<Claims>,
    Path((course_id, quiz_id)): Path<(String, String)>,
    mut multipart: Multipart,
) -> Result<impl IntoResponse, AppError> {
    find_quiz(&store, &course_id, &quiz_id).await?;

    let mut image = None;
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| AppError::BadRequest(format!("Invalid multipart body: {}", e)))?
    {
        if field.name() != Some(SAMPLE_FIELD) {
            continue;
        }
        let bytes = field
            .bytes()
            .await
            .map_err(|e| AppError::BadRequest(format!("Failed to read image: {}", e)))?;
        image = Some(bytes);
    }

    let bytes = image.ok_or_else(|| AppError::BadRequest(format!("Missing '{}' field", SAMPLE_FIELD)))?;

    if bytes.is_empty() {
        return Err(AppError::BadRequest("Image is empty".to_string()));
    }
    if bytes.len() > MAX_SAMPLE_BYTES {
        return Err(AppError::BadRequest("Image exceeds the 1 MiB limit".to_string()));
    }

    let format = match sample_format(&bytes) {
        Some(format @ (ImageFormat::Jpeg | ImageFormat::Png)) => format,
        _ => return Err(AppError::BadRequest("Only JPEG and PNG images are accepted".to_string())),
    };

    let sample = SampleRecord {
        received_at: Utc::now(),
        content_type: format.to_mime_type().to_string(),
        size: bytes.len(),
    };
    let samples_recorded = store
        .record_sample(&claims.sub, &course_id, &quiz_id, sample)
        .await?;

    tracing::debug!(
        student = %claims.sub,
        %quiz_id,
        size = bytes.len(),
        samples_recorded,
        "Proctoring sample stored"
    );

    Ok(Json(SampleAck {
        success: true,
        samples_recorded,
    }))
}
