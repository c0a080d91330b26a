//! Page-level composition of the image, analysis and chat flows.
//!
//! `DermaSession` owns the selected image and the current prediction and
//! wires them to the two orchestrators:
//! - selecting or clearing an image invalidates the current prediction
//! - every chat message carries the current prediction as context
//! - chat rounds record scroll intents that the renderer flushes

use crate::analysis_orchestrator::AnalysisOrchestrator;
use crate::chat_orchestrator::{ChatOrchestrator, ChatOutcome};
use derma_core::backend::{AnalysisService, ChatService};
use derma_core::conversation::{ConversationSnapshot, ConversationStore};
use derma_core::image::{ImageIngestor, ImagePayload, SelectedFile};
use derma_core::notification::Notifier;
use derma_core::scroll::{ScrollCoordinator, ScrollViewport};
use derma_core::{BackendConfig, PredictionResult, PredictionSlot, Result};
use std::sync::Arc;
use tokio::sync::{RwLock, watch};

pub struct DermaSession {
    config: BackendConfig,
    ingestor: ImageIngestor,
    image: RwLock<Option<ImagePayload>>,
    prediction: PredictionSlot,
    store: Arc<RwLock<ConversationStore>>,
    scroll: Arc<ScrollCoordinator>,
    chat: ChatOrchestrator,
    analysis: AnalysisOrchestrator,
}

impl DermaSession {
    /// Creates a session with a fresh conversation and no image.
    ///
    /// # Arguments
    ///
    /// * `config` - Backend settings; the base address is named in failure messages
    /// * `chat_service` - Remote chat operation
    /// * `analysis_service` - Remote analysis operation
    /// * `notifier` - Sink for transient notifications
    pub fn new(
        config: BackendConfig,
        chat_service: Arc<dyn ChatService>,
        analysis_service: Arc<dyn AnalysisService>,
        notifier: Arc<dyn Notifier>,
    ) -> Self {
        let store = Arc::new(RwLock::new(ConversationStore::new()));
        let scroll = Arc::new(ScrollCoordinator::new());
        let prediction = PredictionSlot::new();

        let chat = ChatOrchestrator::new(
            store.clone(),
            chat_service,
            scroll.clone(),
            notifier.clone(),
            config.base_url(),
        );
        let analysis =
            AnalysisOrchestrator::new(analysis_service, prediction.clone(), config.base_url());

        Self {
            config,
            ingestor: ImageIngestor::new(notifier),
            image: RwLock::new(None),
            prediction,
            store,
            scroll,
            chat,
            analysis,
        }
    }

    pub fn config(&self) -> &BackendConfig {
        &self.config
    }

    /// Ingests `file` and makes it the current image.
    ///
    /// On success the previous prediction is cleared before the new image is
    /// stored. A rejected or unreadable file leaves image and prediction as
    /// they were.
    ///
    /// # Errors
    ///
    /// Returns the ingestor's validation or read error.
    pub async fn select_image(&self, file: SelectedFile) -> Result<()> {
        let payload = self.ingestor.ingest(file).await?;
        self.prediction.clear().await;
        *self.image.write().await = Some(payload);
        Ok(())
    }

    /// Drops the current image and its prediction.
    pub async fn clear_image(&self) {
        *self.image.write().await = None;
        self.prediction.clear().await;
        tracing::debug!("[DermaSession] Image cleared");
    }

    pub async fn image(&self) -> Option<ImagePayload> {
        self.image.read().await.clone()
    }

    pub async fn prediction(&self) -> Option<PredictionResult> {
        self.prediction.current().await
    }

    /// Analyzes the current image.
    ///
    /// Returns `None` if there is no image or an analysis is already running.
    pub async fn analyze(&self) -> Option<PredictionResult> {
        let Some(payload) = self.image().await else {
            tracing::warn!("[DermaSession] Analyze requested with no image selected");
            return None;
        };
        self.analysis.analyze(&payload).await
    }

    pub fn is_analyzing(&self) -> bool {
        self.analysis.is_analyzing()
    }

    /// Sends `text` with the current prediction as context.
    pub async fn send_message(&self, text: &str) -> ChatOutcome {
        let prediction = self.prediction.current().await;
        self.chat.submit(text, prediction).await
    }

    pub async fn reset_conversation(&self) {
        self.store.write().await.reset();
    }

    pub async fn snapshot(&self) -> ConversationSnapshot {
        self.store.read().await.snapshot()
    }

    pub async fn subscribe(&self) -> watch::Receiver<ConversationSnapshot> {
        self.store.read().await.subscribe()
    }

    /// Applies the pending scroll intent, if any, to `viewport`.
    pub fn flush_scroll(&self, viewport: &mut dyn ScrollViewport) -> bool {
        self.scroll.flush(viewport)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use derma_core::backend::{ChatReply, ChatRequest, ImageUpload, PredictionResponse};
    use derma_core::conversation::TurnId;
    use derma_core::notification::NotificationQueue;
    use std::collections::HashMap;
    use std::sync::Mutex;

    /// Backend fake implementing both operations.
    #[derive(Default)]
    struct FakeBackend {
        chats: Mutex<Vec<ChatRequest>>,
        predictions: Mutex<u32>,
    }

    #[async_trait]
    impl ChatService for FakeBackend {
        async fn chat(&self, request: &ChatRequest) -> Result<ChatReply> {
            self.chats.lock().unwrap().push(request.clone());
            Ok(ChatReply {
                reply: Some(format!("echo: {}", request.message)),
            })
        }
    }

    #[async_trait]
    impl AnalysisService for FakeBackend {
        async fn predict(&self, _upload: ImageUpload) -> Result<PredictionResponse> {
            let mut count = self.predictions.lock().unwrap();
            *count += 1;
            Ok(PredictionResponse {
                disease: if *count == 1 { "Eczema" } else { "Rosacea" }.to_string(),
                confidence: 0.92,
                description: Some("Chronic skin condition.".to_string()),
            })
        }
    }

    fn session() -> (DermaSession, Arc<FakeBackend>, Arc<NotificationQueue>) {
        let backend = Arc::new(FakeBackend::default());
        let notes = Arc::new(NotificationQueue::new());
        let session = DermaSession::new(
            BackendConfig::default(),
            backend.clone(),
            backend.clone(),
            notes.clone(),
        );
        (session, backend, notes)
    }

    fn png(name: &str) -> SelectedFile {
        SelectedFile::from_bytes(name, "image/png", b"png bytes".to_vec())
    }

    #[tokio::test]
    async fn test_new_image_clears_previous_prediction() {
        let (session, _, _) = session();

        session.select_image(png("first.png")).await.unwrap();
        assert_eq!(session.analyze().await.unwrap().disease, "Eczema");
        assert!(session.prediction().await.is_some());

        session.select_image(png("second.png")).await.unwrap();
        assert_eq!(session.prediction().await, None);
        assert_eq!(session.image().await.unwrap().file_name(), "second.png");

        assert_eq!(session.analyze().await.unwrap().disease, "Rosacea");
        assert_eq!(session.prediction().await.unwrap().disease, "Rosacea");
    }

    #[tokio::test]
    async fn test_rejected_image_keeps_previous_state() {
        let (session, _, notes) = session();
        session.select_image(png("first.png")).await.unwrap();
        session.analyze().await.unwrap();
        notes.drain();

        let text = SelectedFile::from_bytes("notes.txt", "text/plain", b"hi".to_vec());
        assert!(session.select_image(text).await.is_err());

        assert_eq!(session.image().await.unwrap().file_name(), "first.png");
        assert!(session.prediction().await.is_some());
        assert_eq!(notes.drain()[0].message, "Please upload an image file");
    }

    #[tokio::test]
    async fn test_clear_image_and_reselect() {
        let (session, _, _) = session();
        session.select_image(png("spot.png")).await.unwrap();
        session.analyze().await.unwrap();

        session.clear_image().await;
        assert_eq!(session.image().await, None);
        assert_eq!(session.prediction().await, None);
        assert_eq!(session.analyze().await, None);

        session.select_image(png("spot.png")).await.unwrap();
        assert!(session.image().await.is_some());
    }

    #[tokio::test]
    async fn test_chat_carries_prediction_context() {
        let (session, backend, _) = session();

        session.send_message("hello").await;
        session.select_image(png("spot.png")).await.unwrap();
        session.analyze().await.unwrap();
        session.send_message("what is it?").await;

        let chats = backend.chats.lock().unwrap();
        assert_eq!(chats[0].prediction, None);
        assert_eq!(chats[1].prediction.as_ref().unwrap().disease, "Eczema");
    }

    #[derive(Default)]
    struct Transcript {
        anchors: HashMap<TurnId, f32>,
        top: Option<f32>,
    }

    impl ScrollViewport for Transcript {
        fn anchor_top(&self, id: TurnId) -> Option<f32> {
            self.anchors.get(&id).copied()
        }

        fn scroll_to(&mut self, top: f32) {
            self.top = Some(top);
        }
    }

    #[tokio::test]
    async fn test_scroll_targets_user_turn() {
        let (session, _, _) = session();
        let mut viewport = Transcript::default();
        assert!(!session.flush_scroll(&mut viewport));

        let outcome = session.send_message("first question").await;
        let ChatOutcome::Replied { user_turn, .. } = outcome else {
            panic!("unexpected outcome {:?}", outcome);
        };

        let snapshot = session.snapshot().await;
        for (index, turn) in snapshot.turns.iter().enumerate() {
            viewport.anchors.insert(turn.id, index as f32 * 100.0);
        }

        assert!(session.flush_scroll(&mut viewport));
        assert_eq!(viewport.top, Some(100.0));
        assert_eq!(viewport.anchors[&user_turn], 100.0);
        assert!(!session.flush_scroll(&mut viewport));
    }

    #[tokio::test]
    async fn test_reset_conversation() {
        let (session, _, _) = session();
        let mut rx = session.subscribe().await;

        session.send_message("hello").await;
        assert_eq!(session.snapshot().await.turns.len(), 3);

        session.reset_conversation().await;
        assert!(rx.has_changed().unwrap());
        assert_eq!(rx.borrow_and_update().turns.len(), 1);
    }
}
