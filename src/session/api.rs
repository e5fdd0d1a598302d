// src/session/api.rs

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::{
    Client, Response,
    multipart::{Form, Part},
};
use serde::de::DeserializeOwned;
use uuid::Uuid;

use crate::{
    error::ApiError,
    models::{
        proctoring::{ProctoringSample, SAMPLE_FIELD},
        quiz::{QuizDefinition, QuizRef},
        submission::{
            AnswerEntry, StartQuizResponse, Submission, SubmitQuizRequest, UpdateFlagRequest,
            UpdateMarksRequest,
        },
    },
};

/// The exam-service calls a session depends on.
#[async_trait]
pub trait QuizApi: Send + Sync {
    async fn fetch_quiz(&self, quiz: &QuizRef) -> Result<QuizDefinition, ApiError>;

    /// Returns the authoritative end time of the attempt.
    async fn start_quiz(&self, quiz: &QuizRef) -> Result<DateTime<Utc>, ApiError>;

    async fn submit_quiz(&self, quiz: &QuizRef, answers: Vec<AnswerEntry>) -> Result<(), ApiError>;

    async fn upload_sample(&self, sample: ProctoringSample) -> Result<(), ApiError>;
}

/// `QuizApi` over HTTP with a bearer token. Also carries the reviewer calls.
#[derive(Debug, Clone)]
pub struct HttpQuizApi {
    client: Client,
    base_url: String,
    token: String,
}

impl HttpQuizApi {
    pub fn new(base_url: impl Into<String>, token: impl Into<String>) -> Self {
        Self::with_client(Client::new(), base_url, token)
    }

    pub fn with_client(client: Client, base_url: impl Into<String>, token: impl Into<String>) -> Self {
        let base_url = base_url.into().trim_end_matches('/').to_string();
        Self {
            client,
            base_url,
            token: token.into(),
        }
    }

    fn quiz_url(&self, quiz: &QuizRef, action: &str) -> String {
        format!(
            "{}/api/quizzes/{}/{}/{}",
            self.base_url, quiz.course_id, quiz.quiz_id, action
        )
    }

    /// Fetches a submission snapshot.
    pub async fn get_submission(
        &self,
        quiz: &QuizRef,
        submission_id: Uuid,
    ) -> Result<Submission, ApiError> {
        let resp = self
            .client
            .get(self.quiz_url(quiz, &format!("submission/{}", submission_id)))
            .bearer_auth(&self.token)
            .send()
            .await?;
        decode(check(resp).await?).await
    }

    /// Sets the flag to an explicit value. Applying the same value twice is a no-op.
    pub async fn update_flag(
        &self,
        quiz: &QuizRef,
        submission_id: Uuid,
        is_flagged: bool,
    ) -> Result<Submission, ApiError> {
        let resp = self
            .client
            .put(self.quiz_url(quiz, &format!("update-flag/{}", submission_id)))
            .bearer_auth(&self.token)
            .json(&UpdateFlagRequest { is_flagged })
            .send()
            .await?;
        decode(check(resp).await?).await
    }

    /// Replaces the score. Answers are not re-scored.
    pub async fn update_marks(
        &self,
        quiz: &QuizRef,
        submission_id: Uuid,
        new_score: f64,
    ) -> Result<Submission, ApiError> {
        let resp = self
            .client
            .put(self.quiz_url(quiz, &format!("update-marks/{}", submission_id)))
            .bearer_auth(&self.token)
            .json(&UpdateMarksRequest { new_score })
            .send()
            .await?;
        decode(check(resp).await?).await
    }
}

#[async_trait]
impl QuizApi for HttpQuizApi {
    async fn fetch_quiz(&self, quiz: &QuizRef) -> Result<QuizDefinition, ApiError> {
        let resp = self
            .client
            .get(self.quiz_url(quiz, "get"))
            .bearer_auth(&self.token)
            .send()
            .await?;
        decode(check(resp).await?).await
    }

    async fn start_quiz(&self, quiz: &QuizRef) -> Result<DateTime<Utc>, ApiError> {
        let resp = self
            .client
            .post(self.quiz_url(quiz, "start"))
            .bearer_auth(&self.token)
            .send()
            .await?;
        let body: StartQuizResponse = decode(check(resp).await?).await?;
        Ok(body.session_end_time)
    }

    async fn submit_quiz(&self, quiz: &QuizRef, answers: Vec<AnswerEntry>) -> Result<(), ApiError> {
        let resp = self
            .client
            .post(self.quiz_url(quiz, "submit"))
            .bearer_auth(&self.token)
            .json(&SubmitQuizRequest { answers })
            .send()
            .await?;
        check(resp).await?;
        Ok(())
    }

    async fn upload_sample(&self, sample: ProctoringSample) -> Result<(), ApiError> {
        let url = format!(
            "{}/api/proctoring/{}/{}/analyze-image",
            self.base_url, sample.quiz.course_id, sample.quiz.quiz_id
        );
        let file_name = sample.file_name();
        let part = Part::bytes(sample.image)
            .file_name(file_name)
            .mime_str("image/jpeg")?;

        let resp = self
            .client
            .post(url)
            .bearer_auth(&self.token)
            .multipart(Form::new().part(SAMPLE_FIELD, part))
            .send()
            .await?;
        check(resp).await?;
        Ok(())
    }
}

/// Turns a non-2xx response into `ApiError::Rejected`, keeping the service's message.
async fn check(resp: Response) -> Result<Response, ApiError> {
    let status = resp.status();
    if status.is_success() {
        return Ok(resp);
    }

    let message = resp
        .json::<serde_json::Value>()
        .await
        .ok()
        .and_then(|body| body["error"].as_str().map(str::to_owned))
        .unwrap_or_else(|| status.to_string());

    Err(ApiError::Rejected {
        status: status.as_u16(),
        message,
    })
}

async fn decode<T: DeserializeOwned>(resp: Response) -> Result<T, ApiError> {
    resp.json::<T>()
        .await
        .map_err(|e| ApiError::Decode(e.to_string()))
}
