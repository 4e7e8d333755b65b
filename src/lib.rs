//! # pdfsift
//!
//! Text, table and image extraction from PDF documents.
//!
//! Three independent passes run over the same document: per-page text,
//! tables (ruled "lattice" detection plus an alignment-based "stream"
//! fallback, merged side by side), and embedded images saved as PNG. The
//! pipeline joins them by page number into one [`ResultRecord`] and writes it
//! as JSON.
//!
//! ## Quick Start
//!
//! ```no_run
//! fn main() -> pdfsift::Result<()> {
//!     // Writes outputs/report.pdf.json and outputs/images/*.png
//!     let record = pdfsift::pipeline("report.pdf", "outputs")?;
//!     println!("{} pages, {} images", record.page_count(), record.images.len());
//!     Ok(())
//! }
//! ```
//!
//! ## Features
//!
//! - **Per-page text**: layout-ordered lines, CJK aware spacing
//! - **Two table strategies**: lattice from ruling lines, stream from text alignment
//! - **Image export**: Flate, LZW, ASCIIHex, ASCII85, RunLength, DCT; gray, RGB, CMYK, Indexed colour spaces
//! - **Strict or lenient** handling of text and image failures

pub mod detect;
pub mod error;
pub mod extract;
pub mod model;
pub mod parser;
pub mod pipeline;
pub mod render;

// Re-export commonly used types
pub use detect::{is_pdf, sniff_bytes, sniff_path, PdfHeader};
pub use error::{Error, Result};
pub use extract::{
    ImageExtractor, LatticeConfig, Strategy, StrategyFailure, StrategyOutcome,
    StreamDetectorConfig, TableExtraction, TableExtractor, TableOptions, TextExtractor,
};
pub use model::{ImageRecord, ResultRecord, TableColumn, TableRecord, TablesByPage, TextPageMap};
pub use parser::PdfDocument;
pub use pipeline::{pipeline, ErrorMode, PageSelection, Pipeline, PipelineConfig, Stage};
pub use render::JsonFormat;

use std::path::Path;

/// Extract the text of every page, keyed by 1-based page number.
///
/// # Example
///
/// ```no_run
/// let text = pdfsift::extract_text("document.pdf").unwrap();
/// for (page, content) in text.iter() {
///     println!("--- page {page} ---\n{content}");
/// }
/// ```
pub fn extract_text<P: AsRef<Path>>(path: P) -> Result<TextPageMap> {
    TextExtractor::new().extract(path)
}

/// Detect tables with both strategies, keyed by page number.
///
/// Pages without tables have no entry.
pub fn extract_tables<P: AsRef<Path>>(path: P) -> Result<TablesByPage> {
    TableExtractor::new().extract(path)
}

/// Save every embedded image as PNG into `out_dir`.
///
/// # Example
///
/// ```no_run
/// let images = pdfsift::extract_images("document.pdf", "images").unwrap();
/// for image in &images {
///     println!("page {}: {}", image.page, image.file.display());
/// }
/// ```
pub fn extract_images<P: AsRef<Path>, Q: AsRef<Path>>(
    path: P,
    out_dir: Q,
) -> Result<Vec<ImageRecord>> {
    ImageExtractor::new().extract(path, out_dir)
}
