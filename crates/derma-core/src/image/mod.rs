//! Image selection: validation, reading and encoding.

pub mod ingestor;
pub mod payload;

pub use ingestor::ImageIngestor;
pub use payload::{FileSource, ImagePayload, SelectedFile};
