//! Conversation domain: turns and the store that owns them.

pub mod store;
pub mod turn;

pub use store::{ConversationSnapshot, ConversationStore, GREETING};
pub use turn::{PendingTurn, Speaker, THINKING_LABEL, Turn, TurnContent, TurnId};
