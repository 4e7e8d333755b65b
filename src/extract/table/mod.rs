//! Table extraction.
//!
//! Two strategies run over every document. The lattice strategy reads ruling
//! lines and runs once for the whole document; the stream strategy infers
//! tables from text alignment page by page. Each run yields a
//! [`StrategyOutcome`], and [`merge_outcomes`] folds them into one
//! [`TableExtraction`]. Tables from both strategies are kept side by side.

mod lattice;
mod stream;

use std::fmt;
use std::path::Path;

pub use lattice::{LatticeConfig, LatticeDetector};
pub use stream::{StreamDetector, StreamDetectorConfig};

use crate::error::Result;
use crate::model::{TableRecord, TablesByPage};
use crate::parser::{PageLayout, PdfDocument};
use crate::pipeline::PageSelection;

/// A detection strategy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Strategy {
    /// Ruling-line detection
    Lattice,
    /// Text-alignment detection
    Stream,
}

impl fmt::Display for Strategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Strategy::Lattice => f.write_str("lattice"),
            Strategy::Stream => f.write_str("stream"),
        }
    }
}

/// A table attributed to the page it was found on.
#[derive(Debug, Clone, PartialEq)]
pub struct PageTable {
    /// 1-based page index
    pub page: u32,
    /// Table contents
    pub record: TableRecord,
}

impl PageTable {
    pub fn new(page: u32, record: TableRecord) -> Self {
        Self { page, record }
    }
}

/// Why a strategy run produced nothing.
#[derive(Debug, Clone, PartialEq)]
pub struct StrategyFailure {
    /// The strategy that failed
    pub strategy: Strategy,
    /// The page being processed, `None` for whole-document failures
    pub page: Option<u32>,
    /// Human readable reason
    pub reason: String,
}

impl fmt::Display for StrategyFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.page {
            Some(page) => write!(f, "{} failed on page {}: {}", self.strategy, page, self.reason),
            None => write!(f, "{} failed: {}", self.strategy, self.reason),
        }
    }
}

/// Result of one strategy invocation.
#[derive(Debug, Clone, PartialEq)]
pub enum StrategyOutcome {
    /// Tables found (possibly none)
    Detected(Vec<PageTable>),
    /// The invocation failed and contributes nothing
    Failed(StrategyFailure),
}

impl StrategyOutcome {
    fn failed(strategy: Strategy, page: Option<u32>, reason: impl ToString) -> Self {
        StrategyOutcome::Failed(StrategyFailure {
            strategy,
            page,
            reason: reason.to_string(),
        })
    }
}

/// Merged tables plus the failures that were tolerated along the way.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TableExtraction {
    /// Tables per page
    pub tables: TablesByPage,
    /// Failed strategy invocations, in the order they ran
    pub failures: Vec<StrategyFailure>,
}

impl TableExtraction {
    /// Total number of tables across all pages.
    pub fn table_count(&self) -> usize {
        self.tables.values().map(Vec::len).sum()
    }
}

/// Fold strategy outcomes into one per-page mapping.
///
/// Tables are appended to their page's list in outcome order, so earlier
/// strategies come first within a page. Nothing is deduplicated, and a page
/// only gets a key once a table is attributed to it.
pub fn merge_outcomes<I>(outcomes: I) -> TableExtraction
where
    I: IntoIterator<Item = StrategyOutcome>,
{
    let mut merged = TableExtraction::default();
    for outcome in outcomes {
        match outcome {
            StrategyOutcome::Detected(tables) => {
                for table in tables {
                    merged.tables.entry(table.page).or_default().push(table.record);
                }
            }
            StrategyOutcome::Failed(failure) => merged.failures.push(failure),
        }
    }
    merged
}

/// Options for table extraction.
#[derive(Debug, Clone, Default)]
pub struct TableOptions {
    /// Pages the lattice strategy examines
    pub lattice_pages: PageSelection,
    /// Lattice detector tuning
    pub lattice: LatticeConfig,
    /// Stream detector tuning
    pub stream: StreamDetectorConfig,
}

impl TableOptions {
    /// Create options with defaults.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the pages searched by the lattice strategy.
    pub fn with_lattice_pages(mut self, pages: PageSelection) -> Self {
        self.lattice_pages = pages;
        self
    }

    /// Set the lattice detector configuration.
    pub fn with_lattice_config(mut self, config: LatticeConfig) -> Self {
        self.lattice = config;
        self
    }

    /// Set the stream detector configuration.
    pub fn with_stream_config(mut self, config: StreamDetectorConfig) -> Self {
        self.stream = config;
        self
    }
}

/// Runs both table strategies over a document.
#[derive(Debug, Clone, Default)]
pub struct TableExtractor {
    options: TableOptions,
}

impl TableExtractor {
    /// Create an extractor with default options.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create an extractor with custom options.
    pub fn with_options(options: TableOptions) -> Self {
        Self { options }
    }

    /// Extract tables from the document at `path`.
    pub fn extract<P: AsRef<Path>>(&self, path: P) -> Result<TablesByPage> {
        Ok(self.extract_report(path)?.tables)
    }

    /// Extract tables and report tolerated failures.
    ///
    /// A lattice failure is never fatal. The stream pass opens the document
    /// itself and an unreadable document is an error; failures on single
    /// pages are recorded and skipped.
    pub fn extract_report<P: AsRef<Path>>(&self, path: P) -> Result<TableExtraction> {
        let path = path.as_ref();
        let mut outcomes = vec![self.run_lattice(path)];

        let pdf = PdfDocument::open(path)?;
        outcomes.extend(self.run_stream(&pdf));

        let extraction = merge_outcomes(outcomes);
        log::debug!(
            "Table extraction: {} tables on {} pages, {} failures",
            extraction.table_count(),
            extraction.tables.len(),
            extraction.failures.len()
        );
        Ok(extraction)
    }

    /// Run the lattice strategy once for the whole document.
    pub fn run_lattice(&self, path: &Path) -> StrategyOutcome {
        let detector = LatticeDetector::with_config(self.options.lattice.clone());
        match detector.detect_document(path, &self.options.lattice_pages) {
            Ok(tables) => {
                log::debug!("Lattice strategy detected {} tables", tables.len());
                StrategyOutcome::Detected(tables)
            }
            Err(e) => {
                log::warn!("Lattice table detection failed: {}", e);
                StrategyOutcome::failed(Strategy::Lattice, None, e)
            }
        }
    }

    /// Run the stream strategy on every page, one outcome per page.
    pub fn run_stream(&self, pdf: &PdfDocument) -> Vec<StrategyOutcome> {
        let detector = StreamDetector::with_config(self.options.stream.clone());

        pdf.pages()
            .into_iter()
            .map(|(page_num, page_id)| match PageLayout::from_page(pdf, page_id) {
                Ok(layout) => StrategyOutcome::Detected(
                    detector
                        .detect(&layout.spans)
                        .into_iter()
                        .map(|record| PageTable::new(page_num, record))
                        .collect(),
                ),
                Err(e) => {
                    log::debug!("Stream table detection skipped page {}: {}", page_num, e);
                    StrategyOutcome::failed(Strategy::Stream, Some(page_num), e)
                }
            })
            .collect()
    }
}
