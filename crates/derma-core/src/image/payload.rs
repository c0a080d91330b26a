//! Transport-ready image payloads and the files they are made from.

use crate::error::{DermaError, Result};
use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use std::path::{Path, PathBuf};

/// Where the bytes of a selected file live.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FileSource {
    Path(PathBuf),
    Bytes(Vec<u8>),
}

/// A file the user picked, described by what the picker declared.
///
/// Declared type and size are trusted for validation; bytes are only read
/// once validation passes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SelectedFile {
    pub name: String,
    pub mime_type: String,
    pub size: u64,
    pub source: FileSource,
}

impl SelectedFile {
    /// Describes an in-memory file.
    pub fn from_bytes(name: impl Into<String>, mime_type: impl Into<String>, bytes: Vec<u8>) -> Self {
        Self {
            name: name.into(),
            mime_type: mime_type.into(),
            size: bytes.len() as u64,
            source: FileSource::Bytes(bytes),
        }
    }

    /// Describes a file on disk, guessing its MIME type from the extension.
    ///
    /// # Errors
    ///
    /// Returns an error if the file metadata cannot be read.
    pub async fn from_path(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let metadata = tokio::fs::metadata(path).await.map_err(|e| {
            DermaError::image_read(format!("Failed to stat {}: {}", path.display(), e))
        })?;

        let mime_type = mime_guess::from_path(path)
            .first_or_octet_stream()
            .essence_str()
            .to_string();
        let name = path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_else(|| path.display().to_string());

        Ok(Self {
            name,
            mime_type,
            size: metadata.len(),
            source: FileSource::Path(path.to_path_buf()),
        })
    }
}

/// A validated image, base64-encoded for transport.
///
/// Created by the ingestor and never mutated afterwards.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImagePayload {
    file_name: String,
    mime_type: String,
    byte_len: u64,
    encoded: String,
}

impl ImagePayload {
    pub(crate) fn encode(file_name: String, mime_type: String, bytes: &[u8]) -> Self {
        Self {
            file_name,
            mime_type,
            byte_len: bytes.len() as u64,
            encoded: STANDARD.encode(bytes),
        }
    }

    pub fn file_name(&self) -> &str {
        &self.file_name
    }

    pub fn mime_type(&self) -> &str {
        &self.mime_type
    }

    pub fn byte_len(&self) -> u64 {
        self.byte_len
    }

    /// The payload as a `data:` URI, suitable for previews.
    pub fn data_uri(&self) -> String {
        format!("data:{};base64,{}", self.mime_type, self.encoded)
    }

    /// Re-materializes the original bytes.
    ///
    /// # Errors
    ///
    /// Returns an error if the encoded form is not valid base64.
    pub fn decode(&self) -> Result<Vec<u8>> {
        Ok(STANDARD.decode(&self.encoded)?)
    }
}
