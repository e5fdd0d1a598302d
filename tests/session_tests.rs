// tests/session_tests.rs

//! Drives a full session against a live exam service.

use std::{
    net::SocketAddr,
    sync::{
        Arc,
        atomic::{AtomicUsize, Ordering},
    },
    time::Duration,
};

use async_trait::async_trait;
use chrono::{DateTime, TimeDelta, Utc};
use image::{Rgb, RgbImage};
use proctored_quiz::{
    config::Config,
    error::{ApiError, CameraError},
    models::{
        proctoring::ProctoringSample,
        question::QuestionRecord,
        quiz::{QuizDefinition, QuizRecord, QuizRef},
        submission::AnswerEntry,
    },
    routes,
    session::{
        Camera, HttpQuizApi, MediaStream, ProctoringState, QuizApi, SessionConfig,
        SessionCoordinator, SessionStatus, SubmitOutcome, Trigger, load_quiz,
    },
    state::AppState,
    store::Store,
    utils::jwt::sign_jwt,
};

const SECRET: &str = "test_secret_for_session_tests";

async fn spawn_app() -> String {
    let store = Arc::new(Store::new());
    let question = |id: &str| QuestionRecord {
        id: id.to_string(),
        content: format!("Question {}", id),
        options: vec!["A".to_string(), "B".to_string()],
        correct_option: "A".to_string(),
    };
    store
        .insert_quiz(QuizRecord {
            id: "quiz-1".to_string(),
            course_id: "course-1".to_string(),
            title: "Networks".to_string(),
            topic: None,
            duration: 10,
            deadline: Utc::now() + TimeDelta::days(1),
            questions: vec![question("1"), question("2"), question("3")],
        })
        .await;

    let config = Config {
        jwt_secret: SECRET.to_string(),
        jwt_expiration: 600,
        rust_log: "error".to_string(),
        bind_addr: SocketAddr::from(([127, 0, 0, 1], 0)),
        seed_demo_quiz: false,
    };
    let app = routes::create_router(AppState { store, config });

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("Failed to bind random port");
    let port = listener.local_addr().unwrap().port();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    format!("http://127.0.0.1:{}", port)
}

/// Counts samples the service accepted.
struct CountingApi {
    inner: HttpQuizApi,
    accepted: AtomicUsize,
}

#[async_trait]
impl QuizApi for CountingApi {
    async fn fetch_quiz(&self, quiz: &QuizRef) -> Result<QuizDefinition, ApiError> {
        self.inner.fetch_quiz(quiz).await
    }

    async fn start_quiz(&self, quiz: &QuizRef) -> Result<DateTime<Utc>, ApiError> {
        self.inner.start_quiz(quiz).await
    }

    async fn submit_quiz(&self, quiz: &QuizRef, answers: Vec<AnswerEntry>) -> Result<(), ApiError> {
        self.inner.submit_quiz(quiz, answers).await
    }

    async fn upload_sample(&self, sample: ProctoringSample) -> Result<(), ApiError> {
        self.inner.upload_sample(sample).await?;
        self.accepted.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

struct StillCamera {
    tracks: Arc<AtomicUsize>,
}

struct StillStream {
    tracks: Arc<AtomicUsize>,
}

#[async_trait]
impl Camera for StillCamera {
    async fn open(&self) -> Result<Box<dyn MediaStream>, CameraError> {
        self.tracks.store(1, Ordering::SeqCst);
        Ok(Box::new(StillStream {
            tracks: Arc::clone(&self.tracks),
        }))
    }
}

impl MediaStream for StillStream {
    fn capture_frame(&mut self) -> Result<RgbImage, CameraError> {
        Ok(RgbImage::from_pixel(640, 480, Rgb([90, 90, 90])))
    }

    fn active_tracks(&self) -> usize {
        self.tracks.load(Ordering::SeqCst)
    }

    fn stop(&mut self) {
        self.tracks.store(0, Ordering::SeqCst);
    }
}

#[tokio::test]
async fn proctored_session_round_trip() {
    let address = spawn_app().await;
    let token = sign_jwt("student-7", "student", SECRET, 600).unwrap();
    let api = Arc::new(CountingApi {
        inner: HttpQuizApi::new(address.as_str(), token.as_str()),
        accepted: AtomicUsize::new(0),
    });
    let quiz_ref = QuizRef::new("course-1", "quiz-1");

    let quiz = load_quiz(&*api, &quiz_ref).await.unwrap();
    assert_eq!(quiz.questions.len(), 3);

    let tracks = Arc::new(AtomicUsize::new(0));
    let camera = Arc::new(StillCamera {
        tracks: Arc::clone(&tracks),
    });
    let config = SessionConfig {
        capture_interval: Duration::from_millis(200),
        ..SessionConfig::default()
    };
    let session = SessionCoordinator::new(api.clone(), camera, quiz, config).unwrap();

    let before = Utc::now();
    let end = session.start().await.unwrap();
    assert!(end >= before + TimeDelta::minutes(10) - TimeDelta::seconds(1));
    assert_eq!(session.status(), SessionStatus::InProgress);

    // The camera is acquired in the background.
    for _ in 0..50 {
        if session.proctoring() == Some(ProctoringState::Active) {
            break;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    assert_eq!(session.proctoring(), Some(ProctoringState::Active));
    assert_eq!(tracks.load(Ordering::SeqCst), 1);

    session.record_answer("1", "A").unwrap();
    session.record_answer("3", "B").unwrap();
    session.record_answer("3", "A").unwrap();

    tokio::time::sleep(Duration::from_millis(900)).await;
    assert!(api.accepted.load(Ordering::SeqCst) >= 1);

    let outcome = session.submit().await.unwrap();
    assert_eq!(
        outcome,
        SubmitOutcome::Submitted {
            trigger: Trigger::Manual,
            answered: 2,
        }
    );
    assert_eq!(session.status(), SessionStatus::Submitted);
    assert_eq!(tracks.load(Ordering::SeqCst), 0);

    // The service holds exactly one completed attempt.
    let again = api.inner.submit_quiz(&quiz_ref, vec![]).await;
    assert!(matches!(again, Err(ApiError::Rejected { status: 409, .. })));

    // A second manual submit is a local no-op.
    assert_eq!(session.submit().await.unwrap(), SubmitOutcome::AlreadySubmitted);
}

#[tokio::test]
async fn session_cannot_start_unknown_quiz() {
    let address = spawn_app().await;
    let token = sign_jwt("student-8", "student", SECRET, 600).unwrap();
    let api = HttpQuizApi::new(address, token);

    let result = load_quiz(&api, &QuizRef::new("course-1", "missing")).await;
    assert!(result.is_err());
}
