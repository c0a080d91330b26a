//! Error types for the Derma-AI client.

use thiserror::Error;

/// Maximum accepted image size in bytes (10 MiB).
pub const MAX_IMAGE_BYTES: u64 = 10 * 1024 * 1024;

/// Rejections raised by the image ingestor before any bytes are read.
///
/// These never reach an orchestrator; they surface only as a notification.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    /// The declared MIME type is not an `image/*` type.
    #[error("'{mime_type}' is not an image type")]
    NotAnImage { mime_type: String },

    /// The file exceeds [`MAX_IMAGE_BYTES`].
    #[error("image is {size} bytes, limit is {limit} bytes")]
    TooLarge { size: u64, limit: u64 },
}

/// Misuse of the conversation store contract.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConversationError {
    /// A user turn was requested with blank text.
    #[error("message text is empty")]
    EmptyMessage,

    /// A second placeholder was requested while one is still pending.
    #[error("a pending turn already exists: {0}")]
    PendingTurnExists(String),

    /// The placeholder being resolved is no longer the current pending turn.
    #[error("turn '{0}' is not the current pending turn")]
    StalePendingTurn(String),
}

/// A shared error type for the Derma-AI crates.
#[derive(Error, Debug, Clone)]
pub enum DermaError {
    /// Image rejected before upload
    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),

    /// The selected image could not be read or decoded
    #[error("Image read error: {0}")]
    ImageRead(String),

    /// Network unreachable, connection refused or timeout
    #[error("Transport error: {0}")]
    Transport(String),

    /// Non-success status or a body that does not match the contract
    #[error("Protocol error{}: {message}", status_suffix(.status))]
    Protocol {
        status: Option<u16>,
        message: String,
    },

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),
}

impl DermaError {
    // ============================================================================
    // Constructor helpers
    // ============================================================================

    /// Creates a Transport error
    pub fn transport(message: impl Into<String>) -> Self {
        Self::Transport(message.into())
    }

    /// Creates a Protocol error for a non-success HTTP status
    pub fn status(status: u16, message: impl Into<String>) -> Self {
        Self::Protocol {
            status: Some(status),
            message: message.into(),
        }
    }

    /// Creates a Protocol error for a malformed body
    pub fn malformed(message: impl Into<String>) -> Self {
        Self::Protocol {
            status: None,
            message: message.into(),
        }
    }

    /// Creates a Config error
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config(message.into())
    }

    /// Creates an ImageRead error
    pub fn image_read(message: impl Into<String>) -> Self {
        Self::ImageRead(message.into())
    }

    // ============================================================================
    // Type checking methods
    // ============================================================================

    /// Check if this is a transport failure
    pub fn is_transport(&self) -> bool {
        matches!(self, Self::Transport(_))
    }

    /// Check if this is a protocol failure
    pub fn is_protocol(&self) -> bool {
        matches!(self, Self::Protocol { .. })
    }
}

// ============================================================================
// From implementations for automatic conversion
// ============================================================================

impl From<base64::DecodeError> for DermaError {
    fn from(err: base64::DecodeError) -> Self {
        Self::ImageRead(format!("invalid base64 payload: {}", err))
    }
}

fn status_suffix(status: &Option<u16>) -> String {
    status.map(|code| format!(" ({})", code)).unwrap_or_default()
}

/// A type alias for `Result<T, DermaError>`.
pub type Result<T> = std::result::Result<T, DermaError>;
