// src/models/submission.rs

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

/// One answered question in a submit payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnswerEntry {
    pub question_id: String,
    pub selected_option: String,
}

/// DTO for submitting a quiz attempt. Unanswered questions are omitted.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SubmitQuizRequest {
    pub answers: Vec<AnswerEntry>,
}

/// Returned by the start endpoint. Authoritative: clients never derive
/// their own deadline from the quiz duration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StartQuizResponse {
    pub session_end_time: DateTime<Utc>,
}

/// One proctoring sample accepted by the service.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SampleRecord {
    pub received_at: DateTime<Utc>,
    pub content_type: String,
    pub size: usize,
}

/// A student's attempt at a quiz. At most one exists per (student, quiz).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Submission {
    pub id: Uuid,
    pub course_id: String,
    pub quiz_id: String,
    pub student_id: String,
    pub started_at: DateTime<Utc>,
    pub session_end_time: DateTime<Utc>,
    pub answers: Vec<AnswerEntry>,
    pub score: f64,
    pub is_completed: bool,
    /// Set by a reviewer; overrides score display.
    pub is_flagged: bool,
    pub submitted_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub proctoring: Vec<SampleRecord>,
}

/// DTO for the flag endpoint. Carries the target value, not a toggle.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateFlagRequest {
    pub is_flagged: bool,
}

/// DTO for the score override endpoint.
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct UpdateMarksRequest {
    #[validate(range(min = 0.0, message = "Score cannot be negative."))]
    pub new_score: f64,
}
