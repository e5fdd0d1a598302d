// src/session/mod.rs

//! Timed, proctored quiz session engine.
//!
//! A [`SessionCoordinator`] owns one student's attempt. Starting it asks the
//! exam service for the authoritative end time, then runs a [`SessionClock`]
//! and a [`CaptureLoop`] side by side until the attempt is submitted (by the
//! student or by the clock) or abandoned.

pub mod api;
pub mod capture;
pub mod clock;
pub mod coordinator;
pub mod uploader;

#[cfg(test)]
mod testing;

use std::time::Duration;

use crate::config::{
    CAPTURE_INTERVAL_SECS, CAPTURE_JPEG_QUALITY, CAPTURE_MAX_WIDTH, CLOCK_TICK_MILLIS,
    DEADLINE_SKEW_SECS, SAMPLE_CUTOFF_SECS,
};

pub use api::{HttpQuizApi, QuizApi};
pub use capture::{Camera, CaptureLoop, MediaStream, ProctoringState};
pub use clock::SessionClock;
pub use coordinator::{
    SessionCoordinator, SessionStatus, SubmissionReport, SubmitOutcome, Trigger, load_quiz,
};
pub use uploader::SampleUploader;

/// Tunables for one session. Defaults come from `config`.
#[derive(Debug, Clone)]
pub struct SessionConfig {
    pub tick: Duration,
    pub capture_interval: Duration,
    pub capture_max_width: u32,
    pub jpeg_quality: u8,
    /// Safety margin subtracted from the server-issued end time.
    pub deadline_skew: Duration,
    /// Samples stop once less than this is left before the deadline.
    pub sample_cutoff: Duration,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            tick: Duration::from_millis(CLOCK_TICK_MILLIS),
            capture_interval: Duration::from_secs(CAPTURE_INTERVAL_SECS),
            capture_max_width: CAPTURE_MAX_WIDTH,
            jpeg_quality: CAPTURE_JPEG_QUALITY,
            deadline_skew: Duration::from_secs(DEADLINE_SKEW_SECS),
            sample_cutoff: Duration::from_secs(SAMPLE_CUTOFF_SECS.unsigned_abs()),
        }
    }
}
