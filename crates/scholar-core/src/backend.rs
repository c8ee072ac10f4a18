use thiserror::Error;

#[derive(Error, Debug)]
pub enum BackendError {
    #[error("failed to open PDF: {0}")]
    OpenError(String),
    #[error("failed to extract text: {0}")]
    ExtractionError(String),
}

/// Trait for PDF text extraction backends.
///
/// Implementors only read text items; joining items and pages into the final
/// string is done by the extractor in `scholar-ingest`, so every backend
/// produces the same spacing.
pub trait PdfBackend: Send + Sync {
    /// Text items of every page, pages in ascending order starting at page 1.
    fn page_items(&self, data: &[u8]) -> Result<Vec<Vec<String>>, BackendError>;
}
