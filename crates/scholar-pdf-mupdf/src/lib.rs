use mupdf::{Document, TextPageFlags};

use scholar_core::{BackendError, PDF_MIME, PdfBackend};

/// MuPDF-based implementation of [`PdfBackend`].
///
/// This crate is the sole AGPL island: it isolates the mupdf dependency
/// (which is AGPL-3.0) so that non-PDF code paths do not transitively
/// depend on it.
///
/// Each text line MuPDF reports is one item. Pages are read in document
/// order and nothing is filtered out.
#[derive(Debug, Default)]
pub struct MupdfBackend;

impl MupdfBackend {
    pub fn new() -> Self {
        Self
    }
}

impl PdfBackend for MupdfBackend {
    fn page_items(&self, data: &[u8]) -> Result<Vec<Vec<String>>, BackendError> {
        let document =
            Document::from_bytes(data, PDF_MIME).map_err(|e| BackendError::OpenError(e.to_string()))?;

        let mut pages = Vec::new();
        for page_result in document
            .pages()
            .map_err(|e| BackendError::ExtractionError(e.to_string()))?
        {
            let page = page_result.map_err(|e| BackendError::ExtractionError(e.to_string()))?;
            let text_page = page
                .to_text_page(TextPageFlags::empty())
                .map_err(|e| BackendError::ExtractionError(e.to_string()))?;

            let mut items = Vec::new();
            for block in text_page.blocks() {
                for line in block.lines() {
                    let text: String = line
                        .chars()
                        .map(|c| c.char().unwrap_or('\u{FFFD}'))
                        .collect();
                    items.push(text);
                }
            }
            pages.push(items);
        }

        Ok(pages)
    }
}
