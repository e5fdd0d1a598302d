// src/session/testing.rs

//! In-memory collaborators for session tests.

use std::{
    sync::{
        Arc, Mutex,
        atomic::{AtomicBool, AtomicUsize, Ordering},
    },
    time::Duration,
};

use async_trait::async_trait;
use chrono::{DateTime, TimeDelta, Utc};
use image::{Rgb, RgbImage};
use tokio::sync::Notify;

use crate::{
    error::{ApiError, CameraError},
    models::{
        proctoring::ProctoringSample,
        question::Question,
        quiz::{QuizDefinition, QuizRef},
        submission::AnswerEntry,
    },
    session::{
        api::QuizApi,
        capture::{Camera, MediaStream},
    },
};

pub(crate) fn quiz() -> QuizDefinition {
    let question = |id: &str| Question {
        id: id.to_string(),
        content: format!("Question {}", id),
        options: vec!["A".to_string(), "B".to_string(), "C".to_string()],
    };
    QuizDefinition {
        id: "quiz-1".to_string(),
        course_id: "course-1".to_string(),
        title: "Operating Systems".to_string(),
        topic: Some("Scheduling".to_string()),
        duration: 1,
        deadline: Utc::now() + TimeDelta::days(1),
        questions: vec![question("1"), question("2"), question("3")],
    }
}

pub(crate) fn sample() -> ProctoringSample {
    ProctoringSample {
        quiz: QuizRef::new("course-1", "quiz-1"),
        captured_at: Utc::now(),
        image: vec![0xFF, 0xD8, 0xFF],
    }
}

fn rejected(message: &str) -> ApiError {
    ApiError::Rejected {
        status: 503,
        message: message.to_string(),
    }
}

pub(crate) struct FakeApi {
    session_length: TimeDelta,
    fail_start: AtomicBool,
    /// `start_quiz` waits for a permit on this before answering.
    start_gate: Option<Arc<Notify>>,
    fail_submit: bool,
    fail_uploads: bool,
    submits: Mutex<Vec<Vec<AnswerEntry>>>,
    uploads: AtomicUsize,
    upload_attempts: AtomicUsize,
}

impl FakeApi {
    pub(crate) fn new() -> Self {
        Self {
            session_length: TimeDelta::minutes(1),
            fail_start: AtomicBool::new(false),
            start_gate: None,
            fail_submit: false,
            fail_uploads: false,
            submits: Mutex::new(Vec::new()),
            uploads: AtomicUsize::new(0),
            upload_attempts: AtomicUsize::new(0),
        }
    }

    pub(crate) fn session_length(mut self, length: TimeDelta) -> Self {
        self.session_length = length;
        self
    }

    pub(crate) fn failing_start(self) -> Self {
        self.fail_start.store(true, Ordering::SeqCst);
        self
    }

    pub(crate) fn gated_start(mut self, gate: Arc<Notify>) -> Self {
        self.start_gate = Some(gate);
        self
    }

    pub(crate) fn allow_start(&self) {
        self.fail_start.store(false, Ordering::SeqCst);
    }

    pub(crate) fn failing_submit(mut self) -> Self {
        self.fail_submit = true;
        self
    }

    pub(crate) fn failing_uploads(mut self) -> Self {
        self.fail_uploads = true;
        self
    }

    pub(crate) fn submits(&self) -> Vec<Vec<AnswerEntry>> {
        self.submits.lock().unwrap().clone()
    }

    pub(crate) fn upload_count(&self) -> usize {
        self.uploads.load(Ordering::SeqCst)
    }

    pub(crate) fn upload_attempts(&self) -> usize {
        self.upload_attempts.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl QuizApi for FakeApi {
    async fn fetch_quiz(&self, _quiz: &QuizRef) -> Result<QuizDefinition, ApiError> {
        Ok(quiz())
    }

    async fn start_quiz(&self, _quiz: &QuizRef) -> Result<DateTime<Utc>, ApiError> {
        if let Some(gate) = &self.start_gate {
            gate.notified().await;
        }
        tokio::task::yield_now().await;
        if self.fail_start.load(Ordering::SeqCst) {
            return Err(rejected("start unavailable"));
        }
        Ok(Utc::now() + self.session_length)
    }

    async fn submit_quiz(&self, _quiz: &QuizRef, answers: Vec<AnswerEntry>) -> Result<(), ApiError> {
        self.submits.lock().unwrap().push(answers);
        tokio::task::yield_now().await;
        if self.fail_submit {
            return Err(rejected("submit unavailable"));
        }
        Ok(())
    }

    async fn upload_sample(&self, sample: ProctoringSample) -> Result<(), ApiError> {
        self.upload_attempts.fetch_add(1, Ordering::SeqCst);
        tokio::task::yield_now().await;
        if self.fail_uploads || sample.image.is_empty() {
            return Err(rejected("upload unavailable"));
        }
        self.uploads.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

/// Camera whose open tracks are visible through a shared counter.
#[derive(Clone)]
pub(crate) struct FakeCamera {
    tracks: Arc<AtomicUsize>,
    opened: Arc<AtomicUsize>,
    deny: bool,
    /// `open` waits this long before answering, like an unanswered prompt.
    open_delay: Option<Duration>,
    /// The stream's track ends after this many frames.
    frames_before_revoke: Option<usize>,
}

impl FakeCamera {
    pub(crate) fn new() -> Self {
        Self {
            tracks: Arc::new(AtomicUsize::new(0)),
            opened: Arc::new(AtomicUsize::new(0)),
            deny: false,
            open_delay: None,
            frames_before_revoke: None,
        }
    }

    pub(crate) fn denied() -> Self {
        Self {
            deny: true,
            ..Self::new()
        }
    }

    pub(crate) fn slow(delay: Duration) -> Self {
        Self {
            open_delay: Some(delay),
            ..Self::new()
        }
    }

    pub(crate) fn revoked_after(frames: usize) -> Self {
        Self {
            frames_before_revoke: Some(frames),
            ..Self::new()
        }
    }

    pub(crate) fn active_tracks(&self) -> usize {
        self.tracks.load(Ordering::SeqCst)
    }

    pub(crate) fn times_opened(&self) -> usize {
        self.opened.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Camera for FakeCamera {
    async fn open(&self) -> Result<Box<dyn MediaStream>, CameraError> {
        if let Some(delay) = self.open_delay {
            tokio::time::sleep(delay).await;
        }
        if self.deny {
            return Err(CameraError::PermissionDenied);
        }
        self.opened.fetch_add(1, Ordering::SeqCst);
        self.tracks.store(1, Ordering::SeqCst);
        Ok(Box::new(FakeStream {
            tracks: Arc::clone(&self.tracks),
            frames_left: self.frames_before_revoke,
        }))
    }
}

struct FakeStream {
    tracks: Arc<AtomicUsize>,
    frames_left: Option<usize>,
}

impl MediaStream for FakeStream {
    fn capture_frame(&mut self) -> Result<RgbImage, CameraError> {
        match self.frames_left {
            Some(0) => return Err(CameraError::TrackEnded("revoked".to_string())),
            Some(ref mut n) => *n -= 1,
            None => {}
        }
        Ok(RgbImage::from_pixel(640, 480, Rgb([120, 80, 40])))
    }

    fn active_tracks(&self) -> usize {
        self.tracks.load(Ordering::SeqCst)
    }

    fn stop(&mut self) {
        self.tracks.store(0, Ordering::SeqCst);
    }
}
