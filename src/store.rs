// src/store.rs

//! In-memory exam data: quiz definitions and one submission per
//! (student, quiz). Every check-then-write happens under a single write
//! lock, so concurrent starts or submits for the same attempt serialize.

use std::collections::HashMap;

use chrono::{DateTime, Duration, Utc};
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::{
    config::{SAMPLE_CUTOFF_SECS, SUBMISSION_GRACE_SECS},
    error::AppError,
    models::{
        quiz::QuizRecord,
        submission::{AnswerEntry, SampleRecord, Submission},
    },
};

type QuizKey = (String, String);
type AttemptKey = (String, String, String);

#[derive(Default)]
struct Submissions {
    by_id: HashMap<Uuid, Submission>,
    by_attempt: HashMap<AttemptKey, Uuid>,
}

impl Submissions {
    fn attempt_mut(&mut self, student_id: &str, course_id: &str, quiz_id: &str) -> Option<&mut Submission> {
        let key = (student_id.to_owned(), course_id.to_owned(), quiz_id.to_owned());
        let id = self.by_attempt.get(&key)?;
        self.by_id.get_mut(id)
    }
}

#[derive(Default)]
pub struct Store {
    quizzes: RwLock<HashMap<QuizKey, QuizRecord>>,
    submissions: RwLock<Submissions>,
}

impl Store {
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts or replaces a quiz definition.
    pub async fn insert_quiz(&self, quiz: QuizRecord) {
        let key = (quiz.course_id.clone(), quiz.id.clone());
        self.quizzes.write().await.insert(key, quiz);
    }

    pub async fn quiz(&self, course_id: &str, quiz_id: &str) -> Option<QuizRecord> {
        self.quizzes
            .read()
            .await
            .get(&(course_id.to_owned(), quiz_id.to_owned()))
            .cloned()
    }

    /// Creates the student's attempt, or returns the open one unchanged so a
    /// reload resumes with the same end time.
    pub async fn start_attempt(
        &self,
        student_id: &str,
        quiz: &QuizRecord,
        now: DateTime<Utc>,
    ) -> Result<Submission, AppError> {
        let mut submissions = self.submissions.write().await;

        if let Some(existing) = submissions.attempt_mut(student_id, &quiz.course_id, &quiz.id) {
            if existing.is_completed {
                return Err(AppError::Conflict("Quiz has already been submitted".to_string()));
            }
            return Ok(existing.clone());
        }

        let submission = Submission {
            id: Uuid::new_v4(),
            course_id: quiz.course_id.clone(),
            quiz_id: quiz.id.clone(),
            student_id: student_id.to_owned(),
            started_at: now,
            session_end_time: now + Duration::minutes(i64::from(quiz.duration)),
            answers: Vec::new(),
            score: 0.0,
            is_completed: false,
            is_flagged: false,
            submitted_at: None,
            proctoring: Vec::new(),
        };

        submissions.by_attempt.insert(
            (student_id.to_owned(), quiz.course_id.clone(), quiz.id.clone()),
            submission.id,
        );
        submissions.by_id.insert(submission.id, submission.clone());
        Ok(submission)
    }

    /// Finalizes an open attempt. Only the first call succeeds.
    pub async fn complete_attempt(
        &self,
        student_id: &str,
        quiz: &QuizRecord,
        answers: Vec<AnswerEntry>,
        score: f64,
        now: DateTime<Utc>,
    ) -> Result<Submission, AppError> {
        let mut submissions = self.submissions.write().await;
        let submission = submissions
            .attempt_mut(student_id, &quiz.course_id, &quiz.id)
            .ok_or_else(|| AppError::NotFound("Quiz has not been started".to_string()))?;

        if submission.is_completed {
            return Err(AppError::Conflict("Quiz has already been submitted".to_string()));
        }
        if now > submission.session_end_time + Duration::seconds(SUBMISSION_GRACE_SECS) {
            return Err(AppError::BadRequest("Time for this quiz is over".to_string()));
        }

        submission.answers = answers;
        submission.score = score;
        submission.is_completed = true;
        submission.submitted_at = Some(now);
        Ok(submission.clone())
    }

    /// Appends a proctoring sample to the student's open attempt and returns
    /// how many samples the attempt now holds.
    pub async fn record_sample(
        &self,
        student_id: &str,
        course_id: &str,
        quiz_id: &str,
        sample: SampleRecord,
    ) -> Result<usize, AppError> {
        let mut submissions = self.submissions.write().await;
        let submission = submissions
            .attempt_mut(student_id, course_id, quiz_id)
            .ok_or_else(|| AppError::NotFound("No submission found, quiz not started yet".to_string()))?;

        if submission.is_completed {
            return Err(AppError::BadRequest("Quiz has already been completed".to_string()));
        }
        let remaining = submission.session_end_time - sample.received_at;
        if remaining < Duration::seconds(SAMPLE_CUTOFF_SECS) {
            return Err(AppError::BadRequest("Cannot take image, quiz about to end".to_string()));
        }

        submission.proctoring.push(sample);
        Ok(submission.proctoring.len())
    }

    /// Looks a submission up by id, scoped to the quiz it belongs to.
    pub async fn submission(&self, id: Uuid, course_id: &str, quiz_id: &str) -> Option<Submission> {
        self.submissions
            .read()
            .await
            .by_id
            .get(&id)
            .filter(|s| s.course_id == course_id && s.quiz_id == quiz_id)
            .cloned()
    }

    /// Applies a reviewer change to a submission and returns the result.
    pub async fn update_submission<F>(
        &self,
        id: Uuid,
        course_id: &str,
        quiz_id: &str,
        apply: F,
    ) -> Result<Submission, AppError>
    where
        F: FnOnce(&mut Submission) -> Result<(), AppError>,
    {
        let mut submissions = self.submissions.write().await;
        let submission = submissions
            .by_id
            .get_mut(&id)
            .filter(|s| s.course_id == course_id && s.quiz_id == quiz_id)
            .ok_or_else(|| AppError::NotFound("Submission not found".to_string()))?;

        apply(submission)?;
        Ok(submission.clone())
    }
}
