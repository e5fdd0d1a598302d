// src/session/capture.rs

use std::{
    sync::{Arc, Mutex, MutexGuard, PoisonError},
    time::Duration,
};

use async_trait::async_trait;
use chrono::Utc;
use image::{RgbImage, codecs::jpeg::JpegEncoder, imageops::FilterType};
use tokio::{
    task::JoinHandle,
    time::{self, Instant, MissedTickBehavior},
};

use crate::{
    error::CameraError,
    models::{proctoring::ProctoringSample, quiz::QuizRef},
    session::uploader::SampleUploader,
};

/// A device that can hand out a video stream, e.g. a webcam.
#[async_trait]
pub trait Camera: Send + Sync {
    /// May be refused by the user or the OS.
    async fn open(&self) -> Result<Box<dyn MediaStream>, CameraError>;
}

/// An acquired video stream. Owned by exactly one capture loop.
pub trait MediaStream: Send {
    fn capture_frame(&mut self) -> Result<RgbImage, CameraError>;

    fn active_tracks(&self) -> usize;

    /// Stops every track, releasing the device.
    fn stop(&mut self);
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProctoringState {
    /// Camera requested; the exam runs while the request is pending.
    Pending,
    Active,
    /// Camera could not be acquired; the exam runs unproctored.
    Disabled(String),
    Stopped,
}

#[derive(Debug, Clone)]
pub struct CaptureSettings {
    pub quiz: QuizRef,
    pub interval: Duration,
    pub max_width: u32,
    pub jpeg_quality: u8,
    /// No samples are taken at or after this instant.
    pub upload_until: Instant,
}

/// Downscales to at most `max_width` (keeping aspect ratio) and re-encodes as JPEG.
pub fn compress_frame(frame: &RgbImage, max_width: u32, quality: u8) -> Result<Vec<u8>, CameraError> {
    let (width, height) = frame.dimensions();
    let mut out = Vec::new();
    {
        let mut encoder = JpegEncoder::new_with_quality(&mut out, quality);
        if width > max_width {
            let scaled_height = (u64::from(height) * u64::from(max_width) / u64::from(width)).max(1);
            let scaled_height = u32::try_from(scaled_height).unwrap_or(u32::MAX);
            let scaled = image::imageops::resize(frame, max_width, scaled_height, FilterType::Triangle);
            encoder.encode_image(&scaled)?;
        } else {
            encoder.encode_image(frame)?;
        }
    }
    Ok(out)
}

type SharedStream = Arc<Mutex<Option<Box<dyn MediaStream>>>>;

fn lock(stream: &SharedStream) -> MutexGuard<'_, Option<Box<dyn MediaStream>>> {
    stream.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Periodic proctoring capture, bound to one session.
///
/// Proctoring is best effort: if the camera cannot be opened the loop is
/// created disabled and the exam goes on. [`stop`](Self::stop) clears the
/// timer and stops every track; it is idempotent and also runs on drop.
pub struct CaptureLoop {
    stream: SharedStream,
    task: Option<JoinHandle<()>>,
    disabled: Option<String>,
}

impl CaptureLoop {
    pub async fn start(camera: &dyn Camera, uploader: SampleUploader, settings: CaptureSettings) -> Self {
        let stream = match camera.open().await {
            Ok(stream) => stream,
            Err(e) => {
                tracing::warn!(quiz_id = %settings.quiz.quiz_id, "Proctoring disabled: {}", e);
                return Self::disabled(e.to_string());
            }
        };

        tracing::info!(
            quiz_id = %settings.quiz.quiz_id,
            interval_secs = settings.interval.as_secs(),
            "Proctoring capture started"
        );
        let stream: SharedStream = Arc::new(Mutex::new(Some(stream)));
        let task = tokio::spawn(run(Arc::clone(&stream), uploader, settings));

        Self {
            stream,
            task: Some(task),
            disabled: None,
        }
    }

    pub fn disabled(reason: impl Into<String>) -> Self {
        Self {
            stream: Arc::new(Mutex::new(None)),
            task: None,
            disabled: Some(reason.into()),
        }
    }

    pub fn state(&self) -> ProctoringState {
        if let Some(reason) = &self.disabled {
            return ProctoringState::Disabled(reason.clone());
        }
        if lock(&self.stream).is_some() {
            ProctoringState::Active
        } else {
            ProctoringState::Stopped
        }
    }

    pub fn active_tracks(&self) -> usize {
        lock(&self.stream).as_ref().map_or(0, |s| s.active_tracks())
    }

    pub fn stop(&mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
        }
        // Taking the stream under the lock guarantees no tick dispatches after this.
        if let Some(mut stream) = lock(&self.stream).take() {
            stream.stop();
            tracing::debug!("Camera released");
        }
    }
}

impl Drop for CaptureLoop {
    fn drop(&mut self) {
        self.stop();
    }
}

async fn run(stream: SharedStream, uploader: SampleUploader, settings: CaptureSettings) {
    let start = Instant::now() + settings.interval;
    let mut interval = time::interval_at(start, settings.interval);
    interval.set_missed_tick_behavior(MissedTickBehavior::Skip);

    loop {
        interval.tick().await;

        if Instant::now() >= settings.upload_until {
            tracing::debug!("Proctoring sample window closed");
            return;
        }

        let frame = {
            let mut guard = lock(&stream);
            let Some(active) = guard.as_mut() else {
                return;
            };
            match active.capture_frame() {
                Ok(frame) => frame,
                Err(CameraError::TrackEnded(reason)) => {
                    tracing::warn!("Camera track ended, proctoring stopped: {}", reason);
                    active.stop();
                    *guard = None;
                    return;
                }
                Err(e) => {
                    tracing::warn!("Skipping proctoring frame: {}", e);
                    continue;
                }
            }
        };

        let (max_width, quality) = (settings.max_width, settings.jpeg_quality);
        let encoded =
            tokio::task::spawn_blocking(move || compress_frame(&frame, max_width, quality)).await;
        let image = match encoded {
            Ok(Ok(image)) => image,
            Ok(Err(e)) => {
                tracing::warn!("Skipping proctoring frame: {}", e);
                continue;
            }
            Err(e) => {
                tracing::warn!("Frame encoding task failed: {}", e);
                continue;
            }
        };

        // Dispatch under the lock: once `stop` has taken the stream nothing goes out.
        {
            let guard = lock(&stream);
            if guard.is_none() {
                return;
            }
            uploader.dispatch(ProctoringSample {
                quiz: settings.quiz.clone(),
                captured_at: Utc::now(),
                image,
            });
        }
    }
}
