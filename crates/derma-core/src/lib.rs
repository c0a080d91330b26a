pub mod backend;
pub mod config;
pub mod conversation;
pub mod error;
pub mod flight;
pub mod image;
pub mod notification;
pub mod prediction;
pub mod scroll;

// Re-export common error type
pub use error::{DermaError, Result, ValidationError};

pub use config::BackendConfig;
pub use prediction::{PredictionResult, PredictionSlot};
