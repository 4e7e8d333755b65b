//! The three extraction passes.
//!
//! Each extractor opens the document on its own; none depends on another's
//! output.

pub mod image;
pub mod table;
mod text;

pub use self::image::{ImageExtractor, Pixmap};
pub use table::{
    merge_outcomes, LatticeConfig, LatticeDetector, PageTable, Strategy, StrategyFailure,
    StrategyOutcome, StreamDetector, StreamDetectorConfig, TableExtraction, TableExtractor,
    TableOptions,
};
pub use text::TextExtractor;
