use serde::Serialize;
use thiserror::Error;

pub mod docx;

// Re-export domain types for convenience
pub use scholar_core::{ActionResult, ExtractedText, MediaType, PdfBackend, SourceDocument};

/// Shown when extraction of an accepted file type fails.
pub const UNREADABLE_FILE: &str =
    "Could not read the file. It may be corrupt or password-protected; please try another file.";
/// Shown when an accepted file yields only whitespace.
pub const NO_TEXT: &str = "No text could be extracted from the file.";

#[derive(Error, Debug)]
pub enum IngestError {
    #[error("Unsupported file type. Please upload a PDF or DOCX file.")]
    UnsupportedFormat { declared: String },
    #[error("failed to read {kind} file: {reason}")]
    Extraction { kind: &'static str, reason: String },
    #[cfg(not(feature = "pdf"))]
    #[error("PDF support not compiled in (enable the `pdf` feature of scholar-ingest)")]
    NoPdfSupport,
}

/// Extract the plain text of an uploaded PDF or DOCX document.
///
/// Dispatches on the declared media type only:
/// - `Pdf` → MuPDF backend (requires the `pdf` feature)
/// - `Docx` → raw-text routine in [`docx`]
/// - anything else → [`IngestError::UnsupportedFormat`], without reading the bytes
pub fn extract_text(doc: &SourceDocument) -> Result<ExtractedText, IngestError> {
    dispatch(doc, extract_pdf)
}

/// [`extract_text`] with an explicit PDF backend.
pub fn extract_text_with(
    doc: &SourceDocument,
    pdf: &dyn PdfBackend,
) -> Result<ExtractedText, IngestError> {
    dispatch(doc, |data| extract_pdf_with(data, pdf))
}

fn dispatch(
    doc: &SourceDocument,
    pdf: impl FnOnce(&[u8]) -> Result<ExtractedText, IngestError>,
) -> Result<ExtractedText, IngestError> {
    match doc.media_type() {
        MediaType::Pdf => pdf(doc.bytes()),
        MediaType::Docx => docx::extract_raw_text(doc.bytes())
            .map(ExtractedText::from)
            .map_err(|reason| IngestError::Extraction {
                kind: "DOCX",
                reason,
            }),
        MediaType::Unsupported(declared) => Err(IngestError::UnsupportedFormat {
            declared: declared.clone(),
        }),
    }
}

#[cfg(feature = "pdf")]
fn extract_pdf(data: &[u8]) -> Result<ExtractedText, IngestError> {
    let backend = scholar_pdf_mupdf::MupdfBackend::new();
    extract_pdf_with(data, &backend)
}

#[cfg(not(feature = "pdf"))]
fn extract_pdf(_data: &[u8]) -> Result<ExtractedText, IngestError> {
    Err(IngestError::NoPdfSupport)
}

fn extract_pdf_with(data: &[u8], pdf: &dyn PdfBackend) -> Result<ExtractedText, IngestError> {
    let pages = pdf
        .page_items(data)
        .map_err(|e| IngestError::Extraction {
            kind: "PDF",
            reason: e.to_string(),
        })?;
    Ok(ExtractedText::from(join_pdf_pages(&pages)))
}

/// Items within a page are joined by one space; pages follow each other
/// with no separator.
pub fn join_pdf_pages(pages: &[Vec<String>]) -> String {
    let mut text = String::new();
    for items in pages {
        text.push_str(&items.join(" "));
    }
    text
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ExtractData {
    pub text: ExtractedText,
}

/// Extraction entry point with the `{data, error}` result shape.
pub fn handle_extract(doc: &SourceDocument) -> ActionResult<ExtractData> {
    finish_extract(doc, extract_text(doc))
}

/// [`handle_extract`] with an explicit PDF backend.
pub fn handle_extract_with(doc: &SourceDocument, pdf: &dyn PdfBackend) -> ActionResult<ExtractData> {
    finish_extract(doc, extract_text_with(doc, pdf))
}

fn finish_extract(
    doc: &SourceDocument,
    outcome: Result<ExtractedText, IngestError>,
) -> ActionResult<ExtractData> {
    let filename = doc.filename().unwrap_or("<unnamed>");
    match outcome {
        Ok(text) if text.is_blank() => {
            tracing::warn!(filename, media_type = doc.media_type().label(), "no text extracted");
            ActionResult::failure(NO_TEXT)
        }
        Ok(text) => {
            tracing::info!(
                filename,
                media_type = doc.media_type().label(),
                bytes = doc.bytes().len(),
                chars = text.char_count(),
                "extracted text"
            );
            ActionResult::success(ExtractData { text })
        }
        Err(e @ IngestError::UnsupportedFormat { .. }) => {
            tracing::info!(filename, media_type = doc.media_type().label(), "rejected upload");
            ActionResult::rejected(e.to_string())
        }
        #[cfg(not(feature = "pdf"))]
        Err(e @ IngestError::NoPdfSupport) => ActionResult::rejected(e.to_string()),
        Err(e) => {
            tracing::error!(filename, error = %e, "extraction failed");
            ActionResult::failure(UNREADABLE_FILE)
        }
    }
}
