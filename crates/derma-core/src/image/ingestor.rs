//! Validation and encoding of user-selected images.

use super::payload::{FileSource, ImagePayload, SelectedFile};
use crate::error::{DermaError, MAX_IMAGE_BYTES, Result, ValidationError};
use crate::notification::{Notification, Notifier};
use std::sync::Arc;

const UPLOAD_SUCCESS_MESSAGE: &str = "Image uploaded successfully";
const NOT_AN_IMAGE_MESSAGE: &str = "Please upload an image file";
const TOO_LARGE_MESSAGE: &str = "Image size should be less than 10MB";
const READ_FAILURE_MESSAGE: &str = "Failed to read the selected image";

/// Turns a [`SelectedFile`] into an [`ImagePayload`].
///
/// The ingestor keeps no record of previous selections, so the same file can
/// be ingested again after the user clears it.
pub struct ImageIngestor {
    notifier: Arc<dyn Notifier>,
    max_bytes: u64,
}

impl ImageIngestor {
    pub fn new(notifier: Arc<dyn Notifier>) -> Self {
        Self {
            notifier,
            max_bytes: MAX_IMAGE_BYTES,
        }
    }

    /// Checks the declared type and size without touching the bytes.
    pub fn validate(&self, file: &SelectedFile) -> std::result::Result<(), ValidationError> {
        if !is_image_mime(&file.mime_type) {
            return Err(ValidationError::NotAnImage {
                mime_type: file.mime_type.clone(),
            });
        }
        check_size(file.size, self.max_bytes)
    }

    /// Validates, reads and encodes `file`.
    ///
    /// Emits a notification on success and on every failure.
    ///
    /// # Errors
    ///
    /// - [`DermaError::Validation`] if the file is not an image or is too large
    /// - [`DermaError::ImageRead`] if the bytes cannot be read
    pub async fn ingest(&self, file: SelectedFile) -> Result<ImagePayload> {
        if let Err(rejection) = self.validate(&file) {
            tracing::debug!("[ImageIngestor] Rejected '{}': {}", file.name, rejection);
            self.notify_rejection(&rejection);
            return Err(rejection.into());
        }

        let SelectedFile {
            name,
            mime_type,
            source,
            ..
        } = file;

        let bytes = match read_source(source).await {
            Ok(bytes) => bytes,
            Err(e) => {
                tracing::warn!("[ImageIngestor] Failed to read '{}': {}", name, e);
                self.notifier.notify(Notification::error(READ_FAILURE_MESSAGE));
                return Err(e);
            }
        };

        // The declared size can be stale by the time the bytes are read.
        if let Err(rejection) = check_size(bytes.len() as u64, self.max_bytes) {
            self.notify_rejection(&rejection);
            return Err(rejection.into());
        }

        let payload = ImagePayload::encode(name, mime_type, &bytes);
        tracing::debug!(
            "[ImageIngestor] Ingested '{}' ({}, {} bytes)",
            payload.file_name(),
            payload.mime_type(),
            payload.byte_len()
        );
        self.notifier.notify(Notification::success(UPLOAD_SUCCESS_MESSAGE));

        Ok(payload)
    }

    fn notify_rejection(&self, rejection: &ValidationError) {
        let message = match rejection {
            ValidationError::NotAnImage { .. } => NOT_AN_IMAGE_MESSAGE,
            ValidationError::TooLarge { .. } => TOO_LARGE_MESSAGE,
        };
        self.notifier.notify(Notification::error(message));
    }
}

fn is_image_mime(mime_type: &str) -> bool {
    mime_type.trim().to_ascii_lowercase().starts_with("image/")
}

fn check_size(size: u64, limit: u64) -> std::result::Result<(), ValidationError> {
    if size > limit {
        return Err(ValidationError::TooLarge { size, limit });
    }
    Ok(())
}

async fn read_source(source: FileSource) -> Result<Vec<u8>> {
    match source {
        FileSource::Bytes(bytes) => Ok(bytes),
        FileSource::Path(path) => tokio::fs::read(&path).await.map_err(|e| {
            DermaError::image_read(format!("Failed to read {}: {}", path.display(), e))
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::notification::{NotificationLevel, NotificationQueue};

    fn ingestor() -> (ImageIngestor, Arc<NotificationQueue>) {
        let queue = Arc::new(NotificationQueue::new());
        (ImageIngestor::new(queue.clone()), queue)
    }

    #[tokio::test]
    async fn test_rejects_oversized_file() {
        let (ingestor, queue) = ingestor();
        let file = SelectedFile::from_bytes("big.png", "image/png", vec![0u8; 15 * 1024 * 1024]);

        let err = ingestor.ingest(file).await.unwrap_err();

        assert!(matches!(
            err,
            DermaError::Validation(ValidationError::TooLarge { size, .. }) if size == 15 * 1024 * 1024
        ));
        let notes = queue.drain();
        assert_eq!(notes, vec![Notification::error("Image size should be less than 10MB")]);
    }

    #[tokio::test]
    async fn test_rejects_text_file() {
        let (ingestor, queue) = ingestor();
        let file = SelectedFile::from_bytes("notes.txt", "text/plain", b"not a picture".to_vec());

        let err = ingestor.ingest(file).await.unwrap_err();

        assert!(matches!(
            err,
            DermaError::Validation(ValidationError::NotAnImage { ref mime_type }) if mime_type == "text/plain"
        ));
        assert_eq!(queue.drain()[0].message, "Please upload an image file");
    }

    #[tokio::test]
    async fn test_accepts_exactly_ten_mib() {
        let (ingestor, _) = ingestor();
        let file = SelectedFile::from_bytes("edge.jpg", "image/jpeg", vec![1u8; 10 * 1024 * 1024]);

        let payload = ingestor.ingest(file).await.unwrap();
        assert_eq!(payload.byte_len(), MAX_IMAGE_BYTES);
    }

    #[tokio::test]
    async fn test_same_file_can_be_ingested_again() {
        let (ingestor, queue) = ingestor();
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("spot.png");
        std::fs::write(&path, b"\x89PNG fake").unwrap();

        let first = ingestor
            .ingest(SelectedFile::from_path(&path).await.unwrap())
            .await
            .unwrap();
        let second = ingestor
            .ingest(SelectedFile::from_path(&path).await.unwrap())
            .await
            .unwrap();

        assert_eq!(first, second);
        assert_eq!(first.mime_type(), "image/png");
        let notes = queue.drain();
        assert_eq!(notes.len(), 2);
        assert!(notes.iter().all(|n| n.level == NotificationLevel::Success));
    }

    #[tokio::test]
    async fn test_read_failure_is_reported() {
        let (ingestor, queue) = ingestor();
        let file = SelectedFile {
            name: "gone.png".to_string(),
            mime_type: "image/png".to_string(),
            size: 10,
            source: FileSource::Path("/definitely/not/here/gone.png".into()),
        };

        let err = ingestor.ingest(file).await.unwrap_err();
        assert!(matches!(err, DermaError::ImageRead(_)));
        assert_eq!(queue.drain()[0].level, NotificationLevel::Error);
    }
}
