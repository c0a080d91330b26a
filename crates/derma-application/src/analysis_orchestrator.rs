//! Image analysis round-trips.

use derma_core::backend::{AnalysisService, ImageUpload};
use derma_core::flight::FlightGate;
use derma_core::image::ImagePayload;
use derma_core::{DermaError, PredictionResult, PredictionSlot, Result};
use futures::FutureExt;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;

/// Runs at most one analysis at a time and writes results into a shared
/// [`PredictionSlot`].
pub struct AnalysisOrchestrator {
    service: Arc<dyn AnalysisService>,
    slot: PredictionSlot,
    /// Named in the failure description.
    backend_url: String,
    gate: FlightGate,
}

impl AnalysisOrchestrator {
    pub fn new(
        service: Arc<dyn AnalysisService>,
        slot: PredictionSlot,
        backend_url: impl Into<String>,
    ) -> Self {
        Self {
            service,
            slot,
            backend_url: backend_url.into(),
            gate: FlightGate::new(),
        }
    }

    pub fn is_analyzing(&self) -> bool {
        self.gate.is_in_flight()
    }

    /// Analyzes `payload` and returns the result.
    ///
    /// Returns `None` without doing anything if an analysis is already in
    /// flight. Otherwise the previous result is cleared before the request is
    /// sent, and the round always produces a result: the backend's, or a
    /// synthetic `"Error"` result when anything goes wrong.
    ///
    /// The result is written to the slot only if the slot was not cleared
    /// again while the request was out.
    pub async fn analyze(&self, payload: &ImagePayload) -> Option<PredictionResult> {
        let Some(_permit) = self.gate.try_admit() else {
            tracing::warn!("[AnalysisOrchestrator] Rejected analyze: an analysis is already in flight");
            return None;
        };

        let ticket = self.slot.clear().await;
        tracing::debug!(
            "[AnalysisOrchestrator] Analyzing '{}' ({} bytes)",
            payload.file_name(),
            payload.byte_len()
        );

        let result = match AssertUnwindSafe(self.request(payload))
            .catch_unwind()
            .await
            .unwrap_or_else(|_| Err(DermaError::transport("analysis service panicked")))
        {
            Ok(result) => result,
            Err(e) if e.is_protocol() => {
                tracing::error!("[AnalysisOrchestrator] Backend returned an unusable result: {}", e);
                PredictionResult::failure(&self.backend_url)
            }
            Err(e) => {
                tracing::error!("[AnalysisOrchestrator] Analysis failed: {}", e);
                PredictionResult::failure(&self.backend_url)
            }
        };

        if !self.slot.publish(ticket, result.clone()).await {
            tracing::debug!("[AnalysisOrchestrator] Image changed during analysis, result not shown");
        }

        Some(result)
    }

    async fn request(&self, payload: &ImagePayload) -> Result<PredictionResult> {
        let upload = ImageUpload {
            mime_type: payload.mime_type().to_string(),
            bytes: payload.decode()?,
        };
        let response = self.service.predict(upload).await?;
        Ok(response.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use derma_core::backend::PredictionResponse;
    use derma_core::image::{ImageIngestor, SelectedFile};
    use derma_core::notification::TracingNotifier;
    use derma_core::prediction::ANALYSIS_COMPLETE_DESCRIPTION;
    use std::sync::Mutex;
    use tokio::sync::Notify;

    const BACKEND: &str = "http://derma-backend.test:8000";

    struct ScriptedAnalysis {
        response: Result<PredictionResponse>,
        uploads: Mutex<Vec<ImageUpload>>,
        hold: Option<(Arc<Notify>, Arc<Notify>)>,
    }

    impl ScriptedAnalysis {
        fn new(response: Result<PredictionResponse>) -> Self {
            Self {
                response,
                uploads: Mutex::new(Vec::new()),
                hold: None,
            }
        }
    }

    #[async_trait]
    impl AnalysisService for ScriptedAnalysis {
        async fn predict(&self, upload: ImageUpload) -> Result<PredictionResponse> {
            self.uploads.lock().unwrap().push(upload);
            if let Some((entered, release)) = &self.hold {
                entered.notify_one();
                release.notified().await;
            }
            self.response.clone()
        }
    }

    fn eczema() -> PredictionResponse {
        PredictionResponse {
            disease: "Eczema".to_string(),
            confidence: 0.92,
            description: None,
        }
    }

    async fn payload(bytes: &[u8]) -> ImagePayload {
        ImageIngestor::new(Arc::new(TracingNotifier))
            .ingest(SelectedFile::from_bytes("skin.png", "image/png", bytes.to_vec()))
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn test_success_defaults_description() {
        let service = Arc::new(ScriptedAnalysis::new(Ok(eczema())));
        let slot = PredictionSlot::new();
        let orchestrator = AnalysisOrchestrator::new(service.clone(), slot.clone(), BACKEND);

        let result = orchestrator.analyze(&payload(b"pixels").await).await.unwrap();

        assert_eq!(result.disease, "Eczema");
        assert_eq!(result.confidence, 0.92);
        assert_eq!(result.description, ANALYSIS_COMPLETE_DESCRIPTION);
        assert_eq!(slot.current().await, Some(result));

        let uploads = service.uploads.lock().unwrap();
        assert_eq!(uploads[0].bytes, b"pixels".to_vec());
        assert_eq!(uploads[0].mime_type, "image/png");
    }

    #[tokio::test]
    async fn test_network_failure_yields_error_result() {
        let service = Arc::new(ScriptedAnalysis::new(Err(DermaError::transport(
            "connection refused",
        ))));
        let slot = PredictionSlot::new();
        let orchestrator = AnalysisOrchestrator::new(service, slot.clone(), BACKEND);

        let result = orchestrator.analyze(&payload(b"pixels").await).await.unwrap();

        assert_eq!(result.disease, "Error");
        assert_eq!(result.confidence, 0.0);
        assert!(result.description.contains(BACKEND));
        assert_eq!(slot.current().await, Some(result));
        assert!(!orchestrator.is_analyzing());
    }

    #[tokio::test]
    async fn test_status_error_yields_error_result() {
        let service = Arc::new(ScriptedAnalysis::new(Err(DermaError::status(503, "down"))));
        let orchestrator = AnalysisOrchestrator::new(service, PredictionSlot::new(), BACKEND);

        let result = orchestrator.analyze(&payload(b"pixels").await).await.unwrap();
        assert!(result.is_failure());
    }

    #[tokio::test]
    async fn test_previous_result_cleared_before_new_one() {
        let entered = Arc::new(Notify::new());
        let release = Arc::new(Notify::new());
        let service = Arc::new(ScriptedAnalysis {
            hold: Some((entered.clone(), release.clone())),
            ..ScriptedAnalysis::new(Ok(eczema()))
        });
        let slot = PredictionSlot::new();
        let ticket = slot.clear().await;
        slot.publish(ticket, PredictionResult::new("Acne", 0.4, None)).await;

        let orchestrator = AnalysisOrchestrator::new(service, slot.clone(), BACKEND);
        let image = payload(b"pixels").await;

        let (first, second) = tokio::join!(orchestrator.analyze(&image), async {
            entered.notified().await;
            assert_eq!(slot.current().await, None);
            assert!(orchestrator.is_analyzing());

            let second = orchestrator.analyze(&image).await;
            release.notify_one();
            second
        });

        assert_eq!(first.unwrap().disease, "Eczema");
        assert_eq!(second, None);
        assert_eq!(slot.current().await.unwrap().disease, "Eczema");
    }

    #[tokio::test]
    async fn test_result_discarded_when_slot_cleared_mid_flight() {
        let entered = Arc::new(Notify::new());
        let release = Arc::new(Notify::new());
        let service = Arc::new(ScriptedAnalysis {
            hold: Some((entered.clone(), release.clone())),
            ..ScriptedAnalysis::new(Ok(eczema()))
        });
        let slot = PredictionSlot::new();
        let orchestrator = AnalysisOrchestrator::new(service, slot.clone(), BACKEND);
        let image = payload(b"pixels").await;

        let (result, _) = tokio::join!(orchestrator.analyze(&image), async {
            entered.notified().await;
            slot.clear().await;
            release.notify_one();
        });

        assert_eq!(result.unwrap().disease, "Eczema");
        assert_eq!(slot.current().await, None);
    }
}
