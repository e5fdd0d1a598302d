// src/session/coordinator.rs

use std::{
    collections::HashMap,
    sync::{
        Arc, Mutex, MutexGuard, PoisonError, Weak,
        atomic::{AtomicU8, Ordering},
    },
};

use chrono::{DateTime, Utc};
use tokio::{sync::watch, task::JoinHandle, time::Instant};

use crate::{
    error::{ApiError, SessionError},
    models::{
        quiz::{QuizDefinition, QuizRef},
        submission::AnswerEntry,
    },
    session::{
        SessionConfig,
        api::QuizApi,
        capture::{Camera, CaptureLoop, CaptureSettings, ProctoringState},
        clock::{SessionClock, local_deadline},
        uploader::SampleUploader,
    },
};

/// Externally visible lifecycle of a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionStatus {
    NotStarted,
    InProgress,
    /// Terminal. The submit call was issued (whether or not it succeeded).
    Submitted,
    /// Terminal. Left without submitting; resources released.
    Closed,
}

/// What moved the session to `Submitted`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Trigger {
    Manual,
    Expired,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubmitOutcome {
    Submitted { trigger: Trigger, answered: usize },
    /// Another trigger already submitted this session; nothing was sent.
    AlreadySubmitted,
}

/// Terminal result, published for observers (e.g. after an automatic submit).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubmissionReport {
    pub trigger: Trigger,
    pub answered: usize,
    pub error: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
enum Phase {
    NotStarted = 0,
    Starting = 1,
    InProgress = 2,
    Submitted = 3,
    Closed = 4,
}

impl Phase {
    fn from_u8(value: u8) -> Self {
        match value {
            1 => Phase::Starting,
            2 => Phase::InProgress,
            3 => Phase::Submitted,
            4 => Phase::Closed,
            _ => Phase::NotStarted,
        }
    }
}

/// Compare-and-set cell; every transition goes through `advance`.
struct PhaseCell(AtomicU8);

impl PhaseCell {
    fn new() -> Self {
        Self(AtomicU8::new(Phase::NotStarted as u8))
    }

    fn get(&self) -> Phase {
        Phase::from_u8(self.0.load(Ordering::Acquire))
    }

    fn advance(&self, from: Phase, to: Phase) -> bool {
        self.0
            .compare_exchange(from as u8, to as u8, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
    }

    /// Moves any non-terminal phase to `Closed` in one step.
    /// Returns the phase it replaced, or `None` if already terminal.
    fn close(&self) -> Option<Phase> {
        self.0
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |current| {
                match Phase::from_u8(current) {
                    Phase::Submitted | Phase::Closed => None,
                    _ => Some(Phase::Closed as u8),
                }
            })
            .ok()
            .map(Phase::from_u8)
    }
}

#[derive(Default)]
struct Resources {
    clock: Option<SessionClock>,
    /// Camera acquisition still in flight.
    camera_task: Option<JoinHandle<()>>,
    capture: Option<CaptureLoop>,
    remaining: Option<watch::Receiver<u64>>,
    session_end: Option<DateTime<Utc>>,
    proctoring: Option<ProctoringState>,
}

struct Shared {
    api: Arc<dyn QuizApi>,
    camera: Arc<dyn Camera>,
    quiz: QuizDefinition,
    config: SessionConfig,
    phase: PhaseCell,
    answers: Mutex<HashMap<String, String>>,
    resources: Mutex<Resources>,
    outcome: watch::Sender<Option<SubmissionReport>>,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

impl Shared {
    /// Stops capture (camera released) and then the clock. Idempotent.
    fn release(&self) {
        let (camera_task, capture, clock) = {
            let mut res = lock(&self.resources);
            let camera_task = res.camera_task.take();
            let capture = res.capture.take();
            let clock = res.clock.take();
            if let Some(capture) = &capture {
                res.proctoring = Some(match capture.state() {
                    ProctoringState::Disabled(reason) => ProctoringState::Disabled(reason),
                    _ => ProctoringState::Stopped,
                });
            } else if res.proctoring == Some(ProctoringState::Pending) {
                res.proctoring = Some(ProctoringState::Stopped);
            }
            (camera_task, capture, clock)
        };

        if let Some(task) = camera_task {
            task.abort();
        }
        if let Some(mut capture) = capture {
            capture.stop();
        }
        if let Some(mut clock) = clock {
            clock.stop();
        }
    }

    /// Answers in question order; unanswered questions are omitted.
    fn payload(&self) -> Vec<AnswerEntry> {
        let answers = lock(&self.answers);
        self.quiz
            .questions
            .iter()
            .filter_map(|q| {
                answers.get(&q.id).map(|selected| AnswerEntry {
                    question_id: q.id.clone(),
                    selected_option: selected.clone(),
                })
            })
            .collect()
    }
}

/// Fetches and validates a quiz before a session can be built from it.
pub async fn load_quiz(api: &dyn QuizApi, quiz: &QuizRef) -> Result<QuizDefinition, SessionError> {
    let definition = api.fetch_quiz(quiz).await.map_err(|e| match e {
        ApiError::Decode(msg) => SessionError::Protocol(msg),
        other => SessionError::Load(other),
    })?;

    if definition.quiz_ref() != *quiz {
        return Err(SessionError::Protocol(format!(
            "requested quiz '{}' but received '{}'",
            quiz.quiz_id, definition.id
        )));
    }
    definition.validate()?;
    Ok(definition)
}

/// Owns one student's attempt at one quiz.
///
/// Cheap to clone; all clones drive the same session. The transition to
/// `Submitted` is a single compare-and-set, so whichever of the manual
/// submit and the clock's expiry gets there first issues the one submit
/// call and the other becomes a no-op. Dropping the last handle releases
/// the clock and the camera without submitting.
#[derive(Clone)]
pub struct SessionCoordinator {
    shared: Arc<Shared>,
}

impl SessionCoordinator {
    pub fn new(
        api: Arc<dyn QuizApi>,
        camera: Arc<dyn Camera>,
        quiz: QuizDefinition,
        config: SessionConfig,
    ) -> Result<Self, SessionError> {
        quiz.validate()?;
        let (outcome, _) = watch::channel(None);

        Ok(Self {
            shared: Arc::new(Shared {
                api,
                camera,
                quiz,
                config,
                phase: PhaseCell::new(),
                answers: Mutex::new(HashMap::new()),
                resources: Mutex::new(Resources::default()),
                outcome,
            }),
        })
    }

    pub fn quiz(&self) -> &QuizDefinition {
        &self.shared.quiz
    }

    pub fn status(&self) -> SessionStatus {
        match self.shared.phase.get() {
            Phase::NotStarted | Phase::Starting => SessionStatus::NotStarted,
            Phase::InProgress => SessionStatus::InProgress,
            Phase::Submitted => SessionStatus::Submitted,
            Phase::Closed => SessionStatus::Closed,
        }
    }

    /// Server-issued end time, once started.
    pub fn session_end_time(&self) -> Option<DateTime<Utc>> {
        lock(&self.shared.resources).session_end
    }

    /// Remaining whole seconds, once started.
    pub fn remaining(&self) -> Option<watch::Receiver<u64>> {
        lock(&self.shared.resources).remaining.clone()
    }

    pub fn proctoring(&self) -> Option<ProctoringState> {
        let res = lock(&self.shared.resources);
        match &res.capture {
            Some(capture) => Some(capture.state()),
            None => res.proctoring.clone(),
        }
    }

    pub fn outcome(&self) -> watch::Receiver<Option<SubmissionReport>> {
        self.shared.outcome.subscribe()
    }

    /// Current answers in submit-payload form.
    pub fn answers(&self) -> Vec<AnswerEntry> {
        self.shared.payload()
    }

    /// `NotStarted -> InProgress`. On failure the session stays `NotStarted`
    /// and may be started again.
    pub async fn start(&self) -> Result<DateTime<Utc>, SessionError> {
        let shared = &self.shared;
        if shared.quiz.deadline < Utc::now() {
            return Err(SessionError::DeadlinePassed);
        }
        if !shared.phase.advance(Phase::NotStarted, Phase::Starting) {
            return Err(SessionError::AlreadyStarted);
        }

        let quiz_ref = shared.quiz.quiz_ref();
        let session_end = match shared.api.start_quiz(&quiz_ref).await {
            Ok(end) => end,
            Err(e) => {
                tracing::warn!(quiz_id = %quiz_ref.quiz_id, "Failed to start quiz: {}", e);
                shared.phase.advance(Phase::Starting, Phase::NotStarted);
                return Err(SessionError::Start(e));
            }
        };

        lock(&shared.answers).clear();

        let deadline = local_deadline(
            session_end,
            shared.config.deadline_skew,
            Utc::now(),
            Instant::now(),
        );
        let (clock, expired) = SessionClock::start(deadline, shared.config.tick);
        let remaining = clock.remaining();

        let settings = CaptureSettings {
            quiz: quiz_ref.clone(),
            interval: shared.config.capture_interval,
            max_width: shared.config.capture_max_width,
            jpeg_quality: shared.config.jpeg_quality,
            upload_until: deadline
                .checked_sub(shared.config.sample_cutoff)
                .unwrap_or_else(Instant::now),
        };

        {
            let mut res = lock(&shared.resources);
            res.clock = Some(clock);
            res.remaining = Some(remaining);
            res.session_end = Some(session_end);
            res.proctoring = Some(ProctoringState::Pending);
        }

        if !shared.phase.advance(Phase::Starting, Phase::InProgress) {
            // Closed while the start call was in flight.
            shared.release();
            return Err(SessionError::NotInProgress);
        }

        tracing::info!(
            quiz_id = %quiz_ref.quiz_id,
            %session_end,
            "Quiz session started"
        );
        spawn_expiry_watch(Arc::downgrade(shared), expired);

        // The exam is already running; the camera prompt never holds it up.
        let camera_task = spawn_camera(shared, settings);
        {
            let mut res = lock(&shared.resources);
            if shared.phase.get() == Phase::InProgress {
                res.camera_task = Some(camera_task);
            } else {
                camera_task.abort();
            }
        }

        Ok(session_end)
    }

    /// Records (or overwrites) the answer to one question.
    pub fn record_answer(&self, question_id: &str, option: &str) -> Result<(), SessionError> {
        let question = self
            .shared
            .quiz
            .question(question_id)
            .ok_or_else(|| SessionError::UnknownQuestion(question_id.to_string()))?;
        if !question.offers(option) {
            return Err(SessionError::UnknownOption {
                question: question_id.to_string(),
                option: option.to_string(),
            });
        }

        // Checked under the answers lock so nothing lands after the payload is taken.
        let mut answers = lock(&self.shared.answers);
        if self.shared.phase.get() != Phase::InProgress {
            return Err(SessionError::NotInProgress);
        }
        answers.insert(question_id.to_string(), option.to_string());
        Ok(())
    }

    /// Explicit submit by the student.
    pub async fn submit(&self) -> Result<SubmitOutcome, SessionError> {
        self.finish(Trigger::Manual).await
    }

    /// Releases the clock and camera without submitting (page left).
    /// Idempotent; safe in any state.
    pub fn end(&self) {
        let shared = &self.shared;
        if shared.phase.close().is_some() {
            tracing::info!(quiz_id = %shared.quiz.id, "Quiz session closed without submitting");
        }
        shared.release();
    }

    async fn finish(&self, trigger: Trigger) -> Result<SubmitOutcome, SessionError> {
        let shared = &self.shared;
        if !shared.phase.advance(Phase::InProgress, Phase::Submitted) {
            return match shared.phase.get() {
                Phase::Submitted => Ok(SubmitOutcome::AlreadySubmitted),
                _ => Err(SessionError::NotInProgress),
            };
        }

        shared.release();

        let answers = shared.payload();
        let answered = answers.len();
        let quiz_ref = shared.quiz.quiz_ref();
        tracing::info!(quiz_id = %quiz_ref.quiz_id, answered, ?trigger, "Submitting quiz");

        let result = shared.api.submit_quiz(&quiz_ref, answers).await;

        shared.outcome.send_replace(Some(SubmissionReport {
            trigger,
            answered,
            error: result.as_ref().err().map(ToString::to_string),
        }));

        match result {
            Ok(()) => Ok(SubmitOutcome::Submitted { trigger, answered }),
            Err(e) => {
                tracing::error!(quiz_id = %quiz_ref.quiz_id, "Quiz submission failed: {}", e);
                Err(SessionError::Submit(e))
            }
        }
    }
}

/// Acquires the camera off the start path. The loop is kept only if the
/// session is still in progress once the camera answers; otherwise it is
/// dropped, which stops the stream.
fn spawn_camera(shared: &Arc<Shared>, settings: CaptureSettings) -> JoinHandle<()> {
    let camera = Arc::clone(&shared.camera);
    let uploader = SampleUploader::new(Arc::clone(&shared.api));
    let shared = Arc::downgrade(shared);

    tokio::spawn(async move {
        let capture = CaptureLoop::start(camera.as_ref(), uploader, settings).await;
        let Some(shared) = shared.upgrade() else {
            return;
        };

        let mut res = lock(&shared.resources);
        res.camera_task = None;
        if shared.phase.get() == Phase::InProgress {
            res.proctoring = Some(capture.state());
            res.capture = Some(capture);
        } else {
            drop(res);
            tracing::debug!("Camera answered after the session ended; releasing it");
            drop(capture);
        }
    })
}

/// Submits on expiry. Holds only a weak handle so an abandoned session is
/// still dropped; a stopped clock resolves `expired` with an error instead.
fn spawn_expiry_watch(shared: Weak<Shared>, expired: tokio::sync::oneshot::Receiver<()>) {
    tokio::spawn(async move {
        if expired.await.is_err() {
            return;
        }
        let Some(shared) = shared.upgrade() else {
            return;
        };
        tracing::info!(quiz_id = %shared.quiz.id, "Time is up");
        let coordinator = SessionCoordinator { shared };
        // Failures are already logged and published through `outcome`.
        let _ = coordinator.finish(Trigger::Expired).await;
    });
}
