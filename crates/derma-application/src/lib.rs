//! Use cases for the Derma-AI client: chat rounds, image analysis rounds and
//! the session that ties them together.

pub mod analysis_orchestrator;
pub mod chat_orchestrator;
pub mod session;

pub use analysis_orchestrator::AnalysisOrchestrator;
pub use chat_orchestrator::{ChatOrchestrator, ChatOutcome, RejectReason};
pub use session::DermaSession;
