pub mod analyze;
pub mod chat;
pub mod session;

use crate::render::{self, Transcript};
use derma_application::{ChatOutcome, DermaSession, RejectReason};
use derma_core::BackendConfig;
use derma_core::notification::NotificationQueue;
use derma_interaction::HttpBackend;
use std::sync::Arc;

/// Wires an HTTP-backed session whose notifications are printed by the CLI.
pub fn build_session(config: BackendConfig) -> (DermaSession, Arc<NotificationQueue>) {
    let backend = Arc::new(HttpBackend::new(config.clone()));
    let notifications = Arc::new(NotificationQueue::new());
    let session = DermaSession::new(config, backend.clone(), backend, notifications.clone());
    (session, notifications)
}

/// Sends one message and prints the round, starting at the user's question.
pub async fn send_and_print(
    session: &DermaSession,
    transcript: &mut Transcript,
    notifications: &NotificationQueue,
    message: &str,
) -> ChatOutcome {
    let outcome = session.send_message(message).await;
    if let ChatOutcome::Rejected(reason) = &outcome {
        match reason {
            RejectReason::EmptyMessage => eprintln!("Nothing to send."),
            RejectReason::Busy => eprintln!("Still waiting for the previous reply."),
        }
        return outcome;
    }

    transcript.render(&session.snapshot().await);
    session.flush_scroll(transcript);
    transcript.print();
    render::print_notifications(notifications);
    outcome
}
