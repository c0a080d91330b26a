//! One chat round-trip at a time.
//!
//! A round appends the user's turn and a "thinking" placeholder in a single
//! store mutation, calls the remote chat service, and then resolves the
//! placeholder with either the reply or a diagnostic. Every admitted round
//! ends with the placeholder resolved and the gate idle.

use derma_core::backend::{ChatRequest, ChatService};
use derma_core::conversation::{ConversationStore, PendingTurn, TurnId};
use derma_core::error::ConversationError;
use derma_core::flight::FlightGate;
use derma_core::notification::{Notification, Notifier};
use derma_core::scroll::ScrollCoordinator;
use derma_core::{DermaError, PredictionResult};
use futures::FutureExt;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use tokio::runtime::Handle;
use tokio::sync::RwLock;

/// Shown when the backend answers successfully but with no reply text.
pub const EMPTY_REPLY_FALLBACK: &str =
    "I apologize, but I couldn't generate a response. Please try again.";
/// Notification emitted when a round fails.
pub const SEND_FAILURE_NOTICE: &str =
    "Failed to send message. Please ensure the backend is running.";

/// Assistant text used to close a failed round.
pub fn connection_failure_message(backend_url: &str) -> String {
    format!(
        "I apologize, but I'm having trouble connecting to the server. Please make sure the backend is reachable at {}",
        backend_url
    )
}

/// Why a submission never started a round.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RejectReason {
    /// The text was blank after trimming.
    EmptyMessage,
    /// Another round is still in flight.
    Busy,
}

/// What happened to one call to [`ChatOrchestrator::submit`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChatOutcome {
    /// Nothing was appended and no request was sent.
    Rejected(RejectReason),
    /// The placeholder was resolved with the assistant's reply.
    Replied { user_turn: TurnId, reply_turn: TurnId },
    /// The placeholder was resolved with a connection diagnostic.
    Failed {
        user_turn: TurnId,
        reply_turn: TurnId,
        error: String,
    },
    /// The conversation was reset while the request was out. The answer was
    /// dropped and neither turn exists any more.
    Discarded { user_turn: TurnId },
}

impl ChatOutcome {
    pub fn is_rejected(&self) -> bool {
        matches!(self, ChatOutcome::Rejected(_))
    }
}

/// Drives chat rounds against a shared [`ConversationStore`].
pub struct ChatOrchestrator {
    store: Arc<RwLock<ConversationStore>>,
    service: Arc<dyn ChatService>,
    scroll: Arc<ScrollCoordinator>,
    notifier: Arc<dyn Notifier>,
    /// Named in the failure diagnostic.
    backend_url: String,
    gate: FlightGate,
}

impl ChatOrchestrator {
    pub fn new(
        store: Arc<RwLock<ConversationStore>>,
        service: Arc<dyn ChatService>,
        scroll: Arc<ScrollCoordinator>,
        notifier: Arc<dyn Notifier>,
        backend_url: impl Into<String>,
    ) -> Self {
        Self {
            store,
            service,
            scroll,
            notifier,
            backend_url: backend_url.into(),
            gate: FlightGate::new(),
        }
    }

    /// Returns `true` while a round is in flight.
    pub fn is_busy(&self) -> bool {
        self.gate.is_in_flight()
    }

    /// Runs one chat round for `text`.
    ///
    /// Blank text and calls made while another round is in flight are
    /// rejected without touching the store. Otherwise the user turn and the
    /// placeholder become visible before the request is sent, and a scroll
    /// intent targeting the user turn is recorded.
    pub async fn submit(&self, text: &str, prediction: Option<PredictionResult>) -> ChatOutcome {
        if text.trim().is_empty() {
            return ChatOutcome::Rejected(RejectReason::EmptyMessage);
        }

        let Some(_permit) = self.gate.try_admit() else {
            tracing::warn!("[ChatOrchestrator] Rejected submit: a chat round is already in flight");
            return ChatOutcome::Rejected(RejectReason::Busy);
        };

        let begun = self.store.write().await.begin_round(text);
        let (user_turn, pending) = match begun {
            Ok(round) => round,
            Err(ConversationError::EmptyMessage) => {
                return ChatOutcome::Rejected(RejectReason::EmptyMessage);
            }
            Err(e) => {
                tracing::warn!("[ChatOrchestrator] Could not start round: {}", e);
                return ChatOutcome::Rejected(RejectReason::Busy);
            }
        };
        self.scroll.request_scroll_to(user_turn.id);

        let reply_turn = pending.id();
        let guard = PendingGuard::new(
            self.store.clone(),
            pending,
            connection_failure_message(&self.backend_url),
        );
        let request = ChatRequest {
            message: user_turn.text().unwrap_or_default().to_string(),
            prediction,
        };

        tracing::debug!(
            "[ChatOrchestrator] Sending message for turn {} (with prediction: {})",
            user_turn.id,
            request.prediction.is_some()
        );

        let result = AssertUnwindSafe(self.service.chat(&request))
            .catch_unwind()
            .await
            .unwrap_or_else(|_| Err(DermaError::transport("chat service panicked")));

        let (reply_text, outcome) = match result {
            Ok(reply) => {
                let text = reply
                    .reply
                    .filter(|text| !text.trim().is_empty())
                    .unwrap_or_else(|| EMPTY_REPLY_FALLBACK.to_string());
                (
                    text,
                    ChatOutcome::Replied {
                        user_turn: user_turn.id,
                        reply_turn,
                    },
                )
            }
            Err(e) => {
                if e.is_transport() {
                    tracing::error!("[ChatOrchestrator] Backend unreachable: {}", e);
                } else {
                    tracing::error!("[ChatOrchestrator] Backend rejected the message: {}", e);
                }
                self.notifier.notify(Notification::error(SEND_FAILURE_NOTICE));
                (
                    connection_failure_message(&self.backend_url),
                    ChatOutcome::Failed {
                        user_turn: user_turn.id,
                        reply_turn,
                        error: e.to_string(),
                    },
                )
            }
        };

        let mut store = self.store.write().await;
        match guard.resolve(&mut store, reply_text) {
            Ok(()) => outcome,
            Err(_) => ChatOutcome::Discarded {
                user_turn: user_turn.id,
            },
        }
    }
}

/// Owns the placeholder of a running round.
///
/// If the round is abandoned before [`resolve`](Self::resolve) runs (the
/// `submit` future is dropped by a timeout, a `select!` or a task abort), the
/// placeholder is closed with the connection diagnostic so the store is
/// never left with a pending turn nobody will resolve.
struct PendingGuard {
    store: Arc<RwLock<ConversationStore>>,
    pending: Option<PendingTurn>,
    abandoned_text: String,
}

impl PendingGuard {
    fn new(store: Arc<RwLock<ConversationStore>>, pending: PendingTurn, abandoned_text: String) -> Self {
        Self {
            store,
            pending: Some(pending),
            abandoned_text,
        }
    }

    /// Resolves the placeholder through an already held store lock.
    fn resolve(mut self, store: &mut ConversationStore, text: String) -> Result<(), ConversationError> {
        match self.pending.take() {
            Some(pending) => store.resolve_pending_turn(pending, text),
            None => Ok(()),
        }
    }
}

impl Drop for PendingGuard {
    fn drop(&mut self) {
        let Some(pending) = self.pending.take() else {
            return;
        };
        let text = std::mem::take(&mut self.abandoned_text);
        tracing::warn!(
            "[ChatOrchestrator] Round abandoned, closing turn {}",
            pending.id()
        );

        if let Ok(mut store) = self.store.try_write() {
            let _ = store.resolve_pending_turn(pending, text);
            return;
        }

        // Someone holds the lock; finish the job once it is released.
        let store = self.store.clone();
        match Handle::try_current() {
            Ok(handle) => {
                handle.spawn(async move {
                    let _ = store.write().await.resolve_pending_turn(pending, text);
                });
            }
            Err(_) => tracing::error!(
                "[ChatOrchestrator] No runtime to close abandoned turn {}",
                pending.id()
            ),
        }
    }
}
