//! The conversation record.
//!
//! `ConversationStore` is the single source of truth for what the chat panel
//! displays. It only ever appends turns or replaces the pending placeholder
//! in place, and publishes a snapshot to observers after every mutation.

use super::turn::{PendingTurn, Speaker, Turn, TurnContent, TurnId};
use crate::error::ConversationError;
use chrono::Utc;
use tokio::sync::watch;

/// Greeting shown when a conversation starts or is reset.
pub const GREETING: &str = "Hello! I'm your dermatology AI assistant. You can ask me questions about skin conditions, treatments, or general dermatology topics. How can I help you today?";

/// Immutable view of the conversation handed to observers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConversationSnapshot {
    /// Incremented on every published mutation.
    pub revision: u64,
    pub turns: Vec<Turn>,
}

impl ConversationSnapshot {
    pub fn pending_count(&self) -> usize {
        self.turns.iter().filter(|turn| turn.is_pending()).count()
    }
}

/// Ordered, append-only-with-replacement log of chat turns.
pub struct ConversationStore {
    turns: Vec<Turn>,
    /// The current placeholder, if any. At most one exists.
    pending: Option<TurnId>,
    revision: u64,
    observers: watch::Sender<ConversationSnapshot>,
}

impl Default for ConversationStore {
    fn default() -> Self {
        Self::new()
    }
}

impl ConversationStore {
    /// Creates a store holding only the greeting turn.
    pub fn new() -> Self {
        let turns = vec![Turn::resolved(Speaker::Assistant, GREETING)];
        let (observers, _) = watch::channel(ConversationSnapshot {
            revision: 0,
            turns: turns.clone(),
        });

        Self {
            turns,
            pending: None,
            revision: 0,
            observers,
        }
    }

    /// Subscribes to snapshots. The receiver starts at the current state.
    pub fn subscribe(&self) -> watch::Receiver<ConversationSnapshot> {
        self.observers.subscribe()
    }

    pub fn snapshot(&self) -> ConversationSnapshot {
        ConversationSnapshot {
            revision: self.revision,
            turns: self.turns.clone(),
        }
    }

    pub fn turns(&self) -> &[Turn] {
        &self.turns
    }

    pub fn len(&self) -> usize {
        self.turns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.turns.is_empty()
    }

    pub fn get(&self, id: TurnId) -> Option<&Turn> {
        self.turns.iter().find(|turn| turn.id == id)
    }

    /// Id of the current placeholder, if one exists.
    pub fn pending_id(&self) -> Option<TurnId> {
        self.pending
    }

    /// Appends a user turn with the trimmed text.
    ///
    /// # Errors
    ///
    /// Returns [`ConversationError::EmptyMessage`] if `text` is blank.
    pub fn append_user_turn(&mut self, text: &str) -> Result<Turn, ConversationError> {
        let turn = self.push_user_turn(text)?;
        self.publish();
        Ok(turn)
    }

    /// Appends the single allowed pending assistant turn.
    ///
    /// # Errors
    ///
    /// Returns [`ConversationError::PendingTurnExists`] if a placeholder is
    /// already pending.
    pub fn append_pending_turn(&mut self) -> Result<PendingTurn, ConversationError> {
        let pending = self.push_pending_turn()?;
        self.publish();
        Ok(pending)
    }

    /// Appends a user turn and a pending turn as one observable mutation.
    ///
    /// Nothing is appended if either precondition fails.
    pub fn begin_round(&mut self, text: &str) -> Result<(Turn, PendingTurn), ConversationError> {
        if let Some(existing) = self.pending {
            return Err(ConversationError::PendingTurnExists(existing.to_string()));
        }

        let user_turn = self.push_user_turn(text)?;
        let pending = self.push_pending_turn()?;
        self.publish();

        tracing::debug!(
            "[ConversationStore] Round started: user_turn={}, pending_turn={}",
            user_turn.id,
            pending.id()
        );

        Ok((user_turn, pending))
    }

    /// Replaces the pending turn in place with resolved text.
    ///
    /// The turn keeps its id and its position in the sequence.
    ///
    /// # Errors
    ///
    /// Returns [`ConversationError::StalePendingTurn`] and leaves the store
    /// untouched if the handle no longer refers to the current placeholder
    /// (for example after [`reset`](Self::reset)).
    pub fn resolve_pending_turn(
        &mut self,
        pending: PendingTurn,
        text: impl Into<String>,
    ) -> Result<(), ConversationError> {
        let id = pending.id();
        let position = match self.pending {
            Some(current) if current == id => self.turns.iter().position(|turn| turn.id == id),
            _ => None,
        };

        let Some(position) = position else {
            tracing::warn!(
                "[ConversationStore] Ignoring resolve for turn {} which is not pending",
                id
            );
            return Err(ConversationError::StalePendingTurn(id.to_string()));
        };

        let turn = &mut self.turns[position];
        turn.content = TurnContent::Resolved(text.into());
        turn.created_at = Utc::now();
        self.pending = None;
        self.publish();

        tracing::debug!("[ConversationStore] Resolved pending turn {}", id);
        Ok(())
    }

    /// Clears the conversation back to the greeting turn.
    pub fn reset(&mut self) {
        self.turns = vec![Turn::resolved(Speaker::Assistant, GREETING)];
        self.pending = None;
        self.publish();
        tracing::debug!("[ConversationStore] Reset to greeting");
    }

    fn push_user_turn(&mut self, text: &str) -> Result<Turn, ConversationError> {
        let trimmed = text.trim();
        if trimmed.is_empty() {
            return Err(ConversationError::EmptyMessage);
        }

        let turn = Turn::resolved(Speaker::User, trimmed);
        self.turns.push(turn.clone());
        Ok(turn)
    }

    fn push_pending_turn(&mut self) -> Result<PendingTurn, ConversationError> {
        if let Some(existing) = self.pending {
            return Err(ConversationError::PendingTurnExists(existing.to_string()));
        }

        let turn = Turn::pending();
        let id = turn.id;
        self.turns.push(turn);
        self.pending = Some(id);
        Ok(PendingTurn::new(id))
    }

    fn publish(&mut self) {
        self.revision += 1;
        self.observers.send_replace(ConversationSnapshot {
            revision: self.revision,
            turns: self.turns.clone(),
        });
    }
}
