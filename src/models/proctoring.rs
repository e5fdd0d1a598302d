// src/models/proctoring.rs

use chrono::{DateTime, Utc};
use image::ImageFormat;
use serde::Serialize;

use crate::models::quiz::QuizRef;

/// Multipart field the analyze-image endpoint reads.
pub const SAMPLE_FIELD: &str = "proctor_image";

/// One compressed camera frame on its way to the exam service.
/// Created by the capture loop, consumed once by the uploader.
#[derive(Debug, Clone)]
pub struct ProctoringSample {
    pub quiz: QuizRef,
    pub captured_at: DateTime<Utc>,
    /// JPEG bytes.
    pub image: Vec<u8>,
}

impl ProctoringSample {
    pub fn file_name(&self) -> String {
        format!("frame-{}.jpg", self.captured_at.timestamp_millis())
    }
}

/// Sniffs the container format of an encoded sample.
pub fn sample_format(bytes: &[u8]) -> Option<ImageFormat> {
    image::guess_format(bytes).ok()
}

/// Response body of the analyze-image endpoint.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SampleAck {
    pub success: bool,
    pub samples_recorded: usize,
}
