//! HttpBackend - REST implementation of the chat and analysis operations.
//!
//! - `POST {base}/chat` with a JSON body, expecting `{ "reply": ... }`
//! - `POST {base}/predict` with a multipart `image` part, expecting
//!   `{ "disease": ..., "confidence": ..., "description"?: ... }`
//!
//! Connection failures and timeouts map to `DermaError::Transport`; non-2xx
//! statuses and bodies that do not match the contract map to
//! `DermaError::Protocol`.

use async_trait::async_trait;
use derma_core::backend::{
    AnalysisService, ChatReply, ChatRequest, ChatService, ImageUpload, PredictionResponse,
    parse_json_object,
};
use derma_core::{BackendConfig, DermaError, Result};
use reqwest::multipart::{Form, Part};
use reqwest::{Client, Response};
use serde::de::DeserializeOwned;

/// Multipart field name the analysis endpoint reads the image from.
pub const IMAGE_FIELD: &str = "image";
/// File name attached to every uploaded image.
pub const UPLOAD_FILE_NAME: &str = "skin_image.jpg";

const MAX_ERROR_BODY_CHARS: usize = 512;

/// Talks to the Derma-AI backend over HTTP.
#[derive(Clone)]
pub struct HttpBackend {
    client: Client,
    config: BackendConfig,
}

impl HttpBackend {
    pub fn new(config: BackendConfig) -> Self {
        Self {
            client: Client::new(),
            config,
        }
    }

    pub fn config(&self) -> &BackendConfig {
        &self.config
    }
}

#[async_trait]
impl ChatService for HttpBackend {
    async fn chat(&self, request: &ChatRequest) -> Result<ChatReply> {
        let url = self.config.endpoint("chat");
        tracing::debug!(
            "[HttpBackend] POST {} (with prediction: {})",
            url,
            request.prediction.is_some()
        );

        let response = self
            .client
            .post(&url)
            .json(request)
            .timeout(self.config.request_timeout())
            .send()
            .await
            .map_err(|e| transport_error("Chat", &url, e))?;

        read_json(response, "Chat").await
    }
}

#[async_trait]
impl AnalysisService for HttpBackend {
    async fn predict(&self, upload: ImageUpload) -> Result<PredictionResponse> {
        let url = self.config.endpoint("predict");
        tracing::debug!(
            "[HttpBackend] POST {} ({} bytes, {})",
            url,
            upload.bytes.len(),
            upload.mime_type
        );

        let part = Part::bytes(upload.bytes)
            .file_name(UPLOAD_FILE_NAME)
            .mime_str(&upload.mime_type)
            .map_err(|e| {
                DermaError::image_read(format!("Invalid MIME type '{}': {}", upload.mime_type, e))
            })?;
        let form = Form::new().part(IMAGE_FIELD, part);

        let response = self
            .client
            .post(&url)
            .multipart(form)
            .timeout(self.config.request_timeout())
            .send()
            .await
            .map_err(|e| transport_error("Predict", &url, e))?;

        read_json(response, "Predict").await
    }
}

fn transport_error(operation: &str, url: &str, err: reqwest::Error) -> DermaError {
    let kind = if err.is_timeout() {
        "timed out"
    } else if err.is_connect() {
        "could not connect"
    } else {
        "failed"
    };
    DermaError::transport(format!("{} request to {} {}: {}", operation, url, kind, err))
}

async fn read_json<T: DeserializeOwned>(response: Response, operation: &str) -> Result<T> {
    let status = response.status();
    if !status.is_success() {
        let body = response
            .text()
            .await
            .unwrap_or_else(|_| "Unknown error".to_string());
        return Err(DermaError::status(
            status.as_u16(),
            format!("{} API error: {}", operation, truncate(&body, MAX_ERROR_BODY_CHARS)),
        ));
    }

    let body = response.text().await.map_err(|e| {
        DermaError::transport(format!("Failed to read {} response body: {}", operation, e))
    })?;

    parse_json_object(&body).inspect_err(|e| {
        tracing::warn!("[HttpBackend] Unexpected {} response body: {}", operation, e);
    })
}

fn truncate(text: &str, max_chars: usize) -> String {
    if text.chars().count() <= max_chars {
        return text.to_string();
    }
    let mut truncated: String = text.chars().take(max_chars).collect();
    truncated.push_str("...");
    truncated
}
