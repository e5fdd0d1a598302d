// src/session/uploader.rs

use std::sync::Arc;

use tokio::task::JoinHandle;

use crate::{models::proctoring::ProctoringSample, session::api::QuizApi};

/// Fire-and-forget delivery of proctoring samples.
///
/// Each sample is sent once on its own task. Failures are logged and the
/// sample is dropped: no retry, no queue, nothing reported back to the session.
#[derive(Clone)]
pub struct SampleUploader {
    api: Arc<dyn QuizApi>,
}

impl SampleUploader {
    pub fn new(api: Arc<dyn QuizApi>) -> Self {
        Self { api }
    }

    /// Hands the sample off and returns immediately. The handle is only
    /// useful to tests; dropping it does not cancel the upload.
    pub fn dispatch(&self, sample: ProctoringSample) -> JoinHandle<()> {
        let api = Arc::clone(&self.api);

        tokio::spawn(async move {
            let size = sample.image.len();
            let quiz_id = sample.quiz.quiz_id.clone();
            match api.upload_sample(sample).await {
                Ok(()) => tracing::debug!(%quiz_id, size, "Proctoring sample uploaded"),
                Err(e) => tracing::warn!(%quiz_id, size, "Proctoring sample dropped: {}", e),
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::testing::{FakeApi, sample};

    #[tokio::test]
    async fn test_successful_upload_reaches_api() {
        let api = Arc::new(FakeApi::new());
        let uploader = SampleUploader::new(api.clone());

        uploader.dispatch(sample()).await.unwrap();

        assert_eq!(api.upload_count(), 1);
    }

    #[tokio::test]
    async fn test_failed_upload_is_swallowed() {
        let api = Arc::new(FakeApi::new().failing_uploads());
        let uploader = SampleUploader::new(api.clone());

        // The task completes normally even though the upload failed.
        assert!(uploader.dispatch(sample()).await.is_ok());
        assert!(uploader.dispatch(sample()).await.is_ok());
        assert_eq!(api.upload_count(), 0);
        assert_eq!(api.upload_attempts(), 2);
    }
}
