//! Conversation turn types.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Label shown in place of a pending assistant turn.
pub const THINKING_LABEL: &str = "Thinking...";

/// Opaque, unique identifier of a [`Turn`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TurnId(Uuid);

impl TurnId {
    pub(crate) fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl fmt::Display for TurnId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// Who authored a turn.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Speaker {
    User,
    Assistant,
}

/// What a turn currently shows.
///
/// A turn is either a placeholder for a response still in flight, or a
/// resolved piece of text. Only assistant turns are ever pending.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "state", content = "text", rename_all = "lowercase")]
pub enum TurnContent {
    Pending,
    Resolved(String),
}

/// A single entry in the conversation record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Turn {
    pub id: TurnId,
    pub speaker: Speaker,
    pub content: TurnContent,
    pub created_at: DateTime<Utc>,
}

impl Turn {
    pub(crate) fn resolved(speaker: Speaker, text: impl Into<String>) -> Self {
        Self {
            id: TurnId::new(),
            speaker,
            content: TurnContent::Resolved(text.into()),
            created_at: Utc::now(),
        }
    }

    pub(crate) fn pending() -> Self {
        Self {
            id: TurnId::new(),
            speaker: Speaker::Assistant,
            content: TurnContent::Pending,
            created_at: Utc::now(),
        }
    }

    pub fn is_pending(&self) -> bool {
        matches!(self.content, TurnContent::Pending)
    }

    /// The resolved text, or `None` while pending.
    pub fn text(&self) -> Option<&str> {
        match &self.content {
            TurnContent::Pending => None,
            TurnContent::Resolved(text) => Some(text),
        }
    }

    /// Text to render: the resolved text or the thinking label.
    pub fn display_text(&self) -> &str {
        self.text().unwrap_or(THINKING_LABEL)
    }
}

/// Move-only handle to the single pending turn.
///
/// Returned by [`ConversationStore::append_pending_turn`] and consumed by
/// [`ConversationStore::resolve_pending_turn`], so a placeholder cannot be
/// resolved twice.
///
/// [`ConversationStore::append_pending_turn`]: super::ConversationStore::append_pending_turn
/// [`ConversationStore::resolve_pending_turn`]: super::ConversationStore::resolve_pending_turn
#[derive(Debug, PartialEq, Eq)]
#[must_use = "a pending turn must be resolved"]
pub struct PendingTurn {
    id: TurnId,
}

impl PendingTurn {
    pub(crate) fn new(id: TurnId) -> Self {
        Self { id }
    }

    pub fn id(&self) -> TurnId {
        self.id
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pending_turn_display() {
        let turn = Turn::pending();
        assert!(turn.is_pending());
        assert_eq!(turn.speaker, Speaker::Assistant);
        assert_eq!(turn.text(), None);
        assert_eq!(turn.display_text(), "Thinking...");
    }

    #[test]
    fn test_turn_ids_are_unique() {
        let a = Turn::resolved(Speaker::User, "hi");
        let b = Turn::resolved(Speaker::User, "hi");
        assert_ne!(a.id, b.id);
    }

    #[test]
    fn test_content_serialization() {
        let json = serde_json::to_value(TurnContent::Resolved("ok".to_string())).unwrap();
        assert_eq!(json, serde_json::json!({"state": "resolved", "text": "ok"}));

        let json = serde_json::to_value(TurnContent::Pending).unwrap();
        assert_eq!(json, serde_json::json!({"state": "pending"}));
    }
}
