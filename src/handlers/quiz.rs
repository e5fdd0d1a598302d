// src/handlers/quiz.rs

use std::{collections::HashMap, sync::Arc};

use axum::{
    Extension, Json,
    extract::{Path, State},
    response::IntoResponse,
};
use chrono::Utc;

use crate::{
    error::AppError,
    models::{
        question::QuestionRecord,
        quiz::QuizRecord,
        submission::{AnswerEntry, StartQuizResponse, SubmitQuizRequest},
    },
    store::Store,
    utils::jwt::Claims,
};

pub(crate) async fn find_quiz(store: &Store, course_id: &str, quiz_id: &str) -> Result<QuizRecord, AppError> {
    store
        .quiz(course_id, quiz_id)
        .await
        .ok_or_else(|| AppError::NotFound("Quiz not found".to_string()))
}

/// Keeps the last answer given per question, in question order, dropping
/// answers to questions the quiz does not have.
fn normalize_answers(answers: Vec<AnswerEntry>, questions: &[QuestionRecord]) -> Vec<AnswerEntry> {
    let mut latest: HashMap<String, String> = answers
        .into_iter()
        .map(|a| (a.question_id, a.selected_option))
        .collect();

    questions
        .iter()
        .filter_map(|q| {
            latest.remove(&q.id).map(|selected_option| AnswerEntry {
                question_id: q.id.clone(),
                selected_option,
            })
        })
        .collect()
}

/// One point per correct answer.
/// Returns (correct_count, score).
fn calculate_score(answers: &[AnswerEntry], questions: &[QuestionRecord]) -> (usize, f64) {
    let key: HashMap<&str, &str> = questions
        .iter()
        .map(|q| (q.id.as_str(), q.correct_option.as_str()))
        .collect();

    let correct_count = answers
        .iter()
        .filter(|a| key.get(a.question_id.as_str()) == Some(&a.selected_option.as_str()))
        .count();

    (correct_count, correct_count as f64)
}

/// Returns the quiz without its answer key.
pub async fn get_quiz(
    State(store): State<Arc<Store>>,
    Path((course_id, quiz_id)): Path<(String, String)>,
) -> Result<impl IntoResponse, AppError> {
    let quiz = find_quiz(&store, &course_id, &quiz_id).await?;
    Ok(Json(quiz.to_public()))
}

/// Starts (or resumes) the caller's attempt and returns its authoritative end time.
pub async fn start_quiz(
    State(store): State<Arc<Store>>,
    Extension(claims): Extension<Claims>,
    Path((course_id, quiz_id)): Path<(String, String)>,
) -> Result<impl IntoResponse, AppError> {
    let quiz = find_quiz(&store, &course_id, &quiz_id).await?;
    let now = Utc::now();

    if quiz.deadline <= now {
        return Err(AppError::BadRequest("The deadline for this quiz has passed".to_string()));
    }

    let submission = store.start_attempt(&claims.sub, &quiz, now).await?;
    tracing::info!(
        student = %claims.sub,
        quiz_id = %quiz.id,
        submission_id = %submission.id,
        session_end_time = %submission.session_end_time,
        "Quiz attempt started"
    );

    Ok(Json(StartQuizResponse {
        session_end_time: submission.session_end_time,
    }))
}

/// Grades and closes the caller's attempt. A second submit is a conflict.
pub async fn submit_quiz(
    State(store): State<Arc<Store>>,
    Extension(claims): Extension<Claims>,
    Path((course_id, quiz_id)): Path<(String, String)>,
    Json(req): Json<SubmitQuizRequest>,
) -> Result<impl IntoResponse, AppError> {
    let quiz = find_quiz(&store, &course_id, &quiz_id).await?;

    let answers = normalize_answers(req.answers, &quiz.questions);
    let (correct_count, score) = calculate_score(&answers, &quiz.questions);

    let submission = store
        .complete_attempt(&claims.sub, &quiz, answers, score, Utc::now())
        .await?;
    tracing::info!(
        student = %claims.sub,
        quiz_id = %quiz.id,
        submission_id = %submission.id,
        score,
        "Quiz submitted"
    );

    Ok(Json(serde_json::json!({
        "submissionId": submission.id,
        "score": score,
        "correctCount": correct_count,
        "totalQuestions": quiz.questions.len(),
        "answered": submission.answers.len(),
        "message": "Quiz submitted successfully"
    })))
}
