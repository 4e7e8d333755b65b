//! Image records.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

/// Metadata for one image saved to disk.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImageRecord {
    /// Page the image was found on (1-based)
    pub page: u32,

    /// Path of the saved PNG file
    pub file: PathBuf,
}

impl ImageRecord {
    /// Create an image record.
    pub fn new(page: u32, file: impl Into<PathBuf>) -> Self {
        Self {
            page,
            file: file.into(),
        }
    }

    /// Path of the saved file.
    pub fn path(&self) -> &Path {
        &self.file
    }
}
