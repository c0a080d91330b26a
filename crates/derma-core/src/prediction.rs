//! Image analysis results and the slot that holds the current one.

use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::RwLock;

/// Description used when the backend omits one.
pub const ANALYSIS_COMPLETE_DESCRIPTION: &str = "Analysis completed successfully.";
/// Disease name of the synthetic result produced when analysis fails.
pub const ERROR_DISEASE: &str = "Error";
/// Shown alongside every result.
pub const DISCLAIMER: &str = "This is an AI-generated analysis. Please consult a healthcare professional for accurate diagnosis.";

/// The structured outcome of one image analysis round.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PredictionResult {
    pub disease: String,
    /// Always within `[0, 1]`.
    pub confidence: f64,
    pub description: String,
}

/// Coarse confidence bucket used by the results display.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfidenceLevel {
    High,
    Moderate,
    Low,
}

impl ConfidenceLevel {
    pub fn label(&self) -> &'static str {
        match self {
            ConfidenceLevel::High => "High Confidence",
            ConfidenceLevel::Moderate => "Moderate Confidence",
            ConfidenceLevel::Low => "Low Confidence",
        }
    }
}

impl PredictionResult {
    /// Builds a result, clamping confidence into `[0, 1]` and defaulting a
    /// missing or blank description.
    pub fn new(disease: impl Into<String>, confidence: f64, description: Option<String>) -> Self {
        let confidence = if confidence.is_finite() {
            confidence.clamp(0.0, 1.0)
        } else {
            0.0
        };
        let description = description
            .filter(|text| !text.trim().is_empty())
            .unwrap_or_else(|| ANALYSIS_COMPLETE_DESCRIPTION.to_string());

        Self {
            disease: disease.into(),
            confidence,
            description,
        }
    }

    /// The synthetic result shown when the analysis round fails.
    pub fn failure(backend_url: &str) -> Self {
        Self {
            disease: ERROR_DISEASE.to_string(),
            confidence: 0.0,
            description: format!(
                "Failed to analyze the image. Please ensure the backend is running on {}",
                backend_url
            ),
        }
    }

    pub fn is_failure(&self) -> bool {
        self.disease == ERROR_DISEASE && self.confidence == 0.0
    }

    pub fn confidence_level(&self) -> ConfidenceLevel {
        if self.confidence >= 0.8 {
            ConfidenceLevel::High
        } else if self.confidence >= 0.6 {
            ConfidenceLevel::Moderate
        } else {
            ConfidenceLevel::Low
        }
    }

    /// Confidence as a percentage with one decimal, e.g. `"92.0%"`.
    pub fn confidence_percent(&self) -> String {
        format!("{:.1}%", self.confidence * 100.0)
    }
}

/// Generation captured when a slot is cleared for a new analysis.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SlotTicket(u64);

#[derive(Debug, Default)]
struct SlotState {
    current: Option<PredictionResult>,
    generation: u64,
}

/// Shared holder of the current [`PredictionResult`].
///
/// Every clear bumps a generation counter. A result is only published with
/// the ticket from the most recent clear, so a round that started before the
/// image was replaced can never repopulate the slot.
#[derive(Debug, Clone, Default)]
pub struct PredictionSlot {
    state: Arc<RwLock<SlotState>>,
}

impl PredictionSlot {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn current(&self) -> Option<PredictionResult> {
        self.state.read().await.current.clone()
    }

    /// Invalidates the current result and returns a ticket for the next one.
    pub async fn clear(&self) -> SlotTicket {
        let mut state = self.state.write().await;
        state.current = None;
        state.generation += 1;
        SlotTicket(state.generation)
    }

    /// Stores `result` if no clear happened since `ticket` was issued.
    ///
    /// Returns `false` when the result was discarded as stale.
    pub async fn publish(&self, ticket: SlotTicket, result: PredictionResult) -> bool {
        let mut state = self.state.write().await;
        if state.generation != ticket.0 {
            tracing::debug!(
                "[PredictionSlot] Discarding stale result '{}' (ticket {}, generation {})",
                result.disease,
                ticket.0,
                state.generation
            );
            return false;
        }

        state.current = Some(result);
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_description_is_defaulted() {
        let result = PredictionResult::new("Eczema", 0.92, None);
        assert_eq!(result.description, ANALYSIS_COMPLETE_DESCRIPTION);

        let result = PredictionResult::new("Eczema", 0.92, Some("  ".to_string()));
        assert_eq!(result.description, ANALYSIS_COMPLETE_DESCRIPTION);
    }

    #[test]
    fn test_confidence_is_clamped() {
        assert_eq!(PredictionResult::new("Acne", 1.7, None).confidence, 1.0);
        assert_eq!(PredictionResult::new("Acne", -0.2, None).confidence, 0.0);
        assert_eq!(PredictionResult::new("Acne", f64::NAN, None).confidence, 0.0);
    }

    #[test]
    fn test_confidence_levels() {
        let level = |c| PredictionResult::new("Acne", c, None).confidence_level();
        assert_eq!(level(0.8), ConfidenceLevel::High);
        assert_eq!(level(0.79), ConfidenceLevel::Moderate);
        assert_eq!(level(0.6), ConfidenceLevel::Moderate);
        assert_eq!(level(0.59), ConfidenceLevel::Low);
        assert_eq!(ConfidenceLevel::High.label(), "High Confidence");
    }

    #[test]
    fn test_confidence_percent() {
        let result = PredictionResult::new("Rosacea", 0.9234, None);
        assert_eq!(result.confidence_percent(), "92.3%");
    }

    #[test]
    fn test_failure_mentions_backend() {
        let result = PredictionResult::failure("http://derma.local:8000");
        assert!(result.is_failure());
        assert_eq!(result.disease, "Error");
        assert_eq!(result.confidence, 0.0);
        assert!(result.description.contains("http://derma.local:8000"));
    }

    #[tokio::test]
    async fn test_slot_discards_stale_publish() {
        let slot = PredictionSlot::new();

        let first = slot.clear().await;
        let second = slot.clear().await;

        assert!(!slot.publish(first, PredictionResult::new("Acne", 0.5, None)).await);
        assert_eq!(slot.current().await, None);

        assert!(slot.publish(second, PredictionResult::new("Eczema", 0.9, None)).await);
        assert_eq!(slot.current().await.unwrap().disease, "Eczema");

        slot.clear().await;
        assert_eq!(slot.current().await, None);
    }
}
