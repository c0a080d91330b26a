//! Contracts for the two remote operations.
//!
//! The orchestrators only see these traits; `derma-interaction` provides the
//! HTTP implementation and tests substitute in-memory fakes.

use crate::error::{DermaError, Result};
use crate::prediction::PredictionResult;
use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Body of `POST /chat`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChatRequest {
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub prediction: Option<PredictionResult>,
}

/// Success body of `POST /chat`.
///
/// A missing `reply` key is accepted and treated like an empty reply.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ChatReply {
    #[serde(default)]
    pub reply: Option<String>,
}

/// The image part of `POST /predict`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageUpload {
    pub mime_type: String,
    pub bytes: Vec<u8>,
}

/// Success body of `POST /predict`.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct PredictionResponse {
    pub disease: String,
    pub confidence: f64,
    #[serde(default)]
    pub description: Option<String>,
}

impl From<PredictionResponse> for PredictionResult {
    fn from(response: PredictionResponse) -> Self {
        PredictionResult::new(response.disease, response.confidence, response.description)
    }
}

/// Parses a success body, which must be a JSON object.
///
/// Derived struct deserializers also accept JSON arrays as positional
/// fields, so the shape is checked before the fields are read.
///
/// # Errors
///
/// Returns `DermaError::Protocol` if the body is not JSON, is not an
/// object, or does not have the expected fields.
pub fn parse_json_object<T: DeserializeOwned>(body: &str) -> Result<T> {
    let value: Value = serde_json::from_str(body)
        .map_err(|e| DermaError::malformed(format!("body is not valid JSON: {}", e)))?;
    if !value.is_object() {
        return Err(DermaError::malformed(format!(
            "expected a JSON object, got {}",
            json_kind(&value)
        )));
    }
    serde_json::from_value(value).map_err(|e| DermaError::malformed(e.to_string()))
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

/// Remote chat assistant.
#[async_trait]
pub trait ChatService: Send + Sync {
    /// Sends one message and returns the assistant's reply.
    ///
    /// # Errors
    ///
    /// Returns `DermaError::Transport` or `DermaError::Protocol`.
    async fn chat(&self, request: &ChatRequest) -> Result<ChatReply>;
}

/// Remote image classifier.
#[async_trait]
pub trait AnalysisService: Send + Sync {
    /// Uploads one image and returns the classification.
    ///
    /// # Errors
    ///
    /// Returns `DermaError::Transport` or `DermaError::Protocol`.
    async fn predict(&self, upload: ImageUpload) -> Result<PredictionResponse>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_chat_request_omits_missing_prediction() {
        let request = ChatRequest {
            message: "Is this serious?".to_string(),
            prediction: None,
        };
        assert_eq!(
            serde_json::to_value(&request).unwrap(),
            serde_json::json!({"message": "Is this serious?"})
        );

        let request = ChatRequest {
            message: "Treatment?".to_string(),
            prediction: Some(PredictionResult::new("Eczema", 0.92, None)),
        };
        assert_eq!(
            serde_json::to_value(&request).unwrap(),
            serde_json::json!({
                "message": "Treatment?",
                "prediction": {
                    "disease": "Eczema",
                    "confidence": 0.92,
                    "description": "Analysis completed successfully."
                }
            })
        );
    }

    #[test]
    fn test_chat_reply_shapes() {
        let reply: ChatReply = parse_json_object(r#"{"reply": "Use sunscreen"}"#).unwrap();
        assert_eq!(reply.reply.as_deref(), Some("Use sunscreen"));

        let reply: ChatReply = parse_json_object("{}").unwrap();
        assert_eq!(reply.reply, None);

        for body in [r#"["reply"]"#, "[]", r#"{"reply": 3}"#, r#""reply""#, "null", "nope"] {
            let err = parse_json_object::<ChatReply>(body).unwrap_err();
            assert!(
                matches!(err, DermaError::Protocol { status: None, .. }),
                "{} gave {:?}",
                body,
                err
            );
        }
    }

    #[test]
    fn test_prediction_response_rejects_arrays() {
        let err = parse_json_object::<PredictionResponse>(r#"["Eczema", 0.92]"#).unwrap_err();
        assert!(err.to_string().contains("an array"));
    }

    #[test]
    fn test_prediction_response_into_result() {
        let response: PredictionResponse =
            parse_json_object(r#"{"disease": "Eczema", "confidence": 0.92}"#).unwrap();
        let result = PredictionResult::from(response);
        assert_eq!(result.disease, "Eczema");
        assert_eq!(result.confidence, 0.92);
        assert_eq!(result.description, "Analysis completed successfully.");
    }
}
