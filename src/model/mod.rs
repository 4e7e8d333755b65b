//! Output model for extraction results.
//!
//! Every extractor produces one of these types independently; the pipeline
//! only joins them by page index in [`ResultRecord`].

mod image;
mod record;
mod table;

pub use self::image::ImageRecord;
pub use record::{ResultRecord, TablesByPage, TextPageMap};
pub use table::{TableColumn, TableRecord};
