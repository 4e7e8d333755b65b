//! Embedded image extraction.
//!
//! Every image XObject reachable from a page is decoded and written as PNG.
//! Images with fewer than four colour components are written as they are;
//! anything else (CMYK and wider) is converted to RGB first.

mod decode;
mod pixmap;

use std::fs;
use std::path::Path;

pub use decode::{decode_image, ColorSpace};
pub use pixmap::{cmyk_to_rgb, Pixmap};

use crate::error::{Error, Result};
use crate::model::ImageRecord;
use crate::parser::PdfDocument;
use crate::pipeline::{
    render_image_name, validate_image_template, ErrorMode, DEFAULT_IMAGE_TEMPLATE,
};

/// Extracts embedded images to PNG files.
#[derive(Debug, Clone)]
pub struct ImageExtractor {
    error_mode: ErrorMode,
    name_template: String,
}

impl Default for ImageExtractor {
    fn default() -> Self {
        Self {
            error_mode: ErrorMode::default(),
            name_template: DEFAULT_IMAGE_TEMPLATE.to_string(),
        }
    }
}

impl ImageExtractor {
    /// Create an extractor in strict mode with the default name template.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set error mode.
    pub fn with_error_mode(mut self, mode: ErrorMode) -> Self {
        self.error_mode = mode;
        self
    }

    /// Set the file name template (`{page}` and `{index}` placeholders).
    pub fn with_name_template(mut self, template: impl Into<String>) -> Self {
        self.name_template = template.into();
        self
    }

    /// Extract all images of the document at `path` into `out_dir`.
    ///
    /// `out_dir` is created if needed and existing files are overwritten.
    pub fn extract<P: AsRef<Path>, Q: AsRef<Path>>(
        &self,
        path: P,
        out_dir: Q,
    ) -> Result<Vec<ImageRecord>> {
        validate_image_template(&self.name_template)?;
        let out_dir = out_dir.as_ref();
        fs::create_dir_all(out_dir)?;

        let pdf = PdfDocument::open(path)?;
        self.extract_document(&pdf, out_dir)
    }

    /// Extract images from an opened document into an existing directory.
    pub fn extract_document(&self, pdf: &PdfDocument, out_dir: &Path) -> Result<Vec<ImageRecord>> {
        let mut records = Vec::new();

        for (page_num, page_id) in pdf.pages() {
            for (index, xobject) in pdf.page_images(page_id).into_iter().enumerate() {
                let file = out_dir.join(format!(
                    "{}.png",
                    render_image_name(&self.name_template, page_num, index)
                ));

                match save_image(pdf, xobject.stream, &file) {
                    Ok(()) => {
                        log::debug!("Saved image {:?} from page {}", file, page_num);
                        records.push(ImageRecord::new(page_num, file));
                    }
                    // Filesystem problems are never skipped
                    Err(Error::Io(e)) => return Err(Error::Io(e)),
                    Err(e) => match self.error_mode {
                        ErrorMode::Strict => {
                            log::error!(
                                "Image {} on page {} (object {} {}) failed: {}",
                                index,
                                page_num,
                                xobject.id.0,
                                xobject.id.1,
                                e
                            );
                            return Err(e);
                        }
                        ErrorMode::Lenient => {
                            log::warn!(
                                "Skipping image {} on page {}: {}",
                                index,
                                page_num,
                                e
                            );
                        }
                    },
                }
            }
        }

        Ok(records)
    }
}

/// Decode one image and write it, converting to RGB when it has four or more
/// colour components.
fn save_image(pdf: &PdfDocument, stream: &lopdf::Stream, file: &Path) -> Result<()> {
    let pixmap = decode_image(pdf, stream)?;
    if pixmap.is_gray_or_rgb() {
        pixmap.save_png(file)
    } else {
        pixmap.to_rgb().save_png(file)
    }
}
