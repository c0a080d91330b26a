//! Remote service implementations for the Derma-AI backend.

pub mod http_backend;

pub use http_backend::{HttpBackend, IMAGE_FIELD, UPLOAD_FILE_NAME};
