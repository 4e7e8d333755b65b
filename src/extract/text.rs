//! Per-page text extraction.

use std::path::Path;

use crate::error::{Error, Result};
use crate::model::TextPageMap;
use crate::parser::{PageLayout, PdfDocument};
use crate::pipeline::ErrorMode;

/// Extracts the plain text of every page.
#[derive(Debug, Clone, Default)]
pub struct TextExtractor {
    error_mode: ErrorMode,
}

impl TextExtractor {
    /// Create an extractor in strict mode.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set error mode.
    pub fn with_error_mode(mut self, mode: ErrorMode) -> Self {
        self.error_mode = mode;
        self
    }

    /// Open `path` and extract the text of each page, in page order.
    pub fn extract<P: AsRef<Path>>(&self, path: P) -> Result<TextPageMap> {
        let pdf = PdfDocument::open(path)?;
        self.extract_document(&pdf)
    }

    /// Extract text from an opened document.
    pub fn extract_document(&self, pdf: &PdfDocument) -> Result<TextPageMap> {
        let mut text = TextPageMap::new();

        for (page_num, page_id) in pdf.pages() {
            let page_text = match PageLayout::from_page(pdf, page_id) {
                Ok(layout) => layout.text(),
                Err(e) => match self.error_mode {
                    ErrorMode::Strict => {
                        return Err(Error::TextExtract(format!("page {page_num}: {e}")))
                    }
                    ErrorMode::Lenient => {
                        log::warn!("Text extraction failed on page {}: {}", page_num, e);
                        String::new()
                    }
                },
            };

            log::debug!("Page {}: {} chars of text", page_num, page_text.len());
            text.push(page_text);
        }

        Ok(text)
    }
}
