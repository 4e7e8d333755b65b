//! Pipeline orchestration.
//!
//! Runs the text, table and image passes one after another over the same
//! document, assembles a [`ResultRecord`] and writes it as JSON next to the
//! extracted images.

mod options;

use std::fmt;
use std::fs;
use std::path::Path;

pub use options::{
    render_image_name, validate_image_template, ErrorMode, PageSelection, PipelineConfig,
    DEFAULT_IMAGE_SUBDIR, DEFAULT_IMAGE_TEMPLATE, DEFAULT_OUTPUT_ROOT,
};

use crate::error::Result;
use crate::extract::{ImageExtractor, TableExtractor, TableOptions, TextExtractor};
use crate::model::ResultRecord;
use crate::render::{write_json, JsonFormat};

/// A step of a pipeline run, reported before the step starts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Text,
    Tables,
    Images,
    Write,
}

impl Stage {
    /// All stages in execution order.
    pub const ALL: [Stage; 4] = [Stage::Text, Stage::Tables, Stage::Images, Stage::Write];
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Stage::Text => "Extracting text",
            Stage::Tables => "Detecting tables",
            Stage::Images => "Extracting images",
            Stage::Write => "Writing record",
        };
        f.write_str(name)
    }
}

/// Text, table and image extraction for one document at a time.
///
/// # Example
///
/// ```no_run
/// use pdfsift::Pipeline;
///
/// let record = Pipeline::new()
///     .with_output_root("out")
///     .lenient()
///     .run("report.pdf")?;
/// println!("{} pages, {} tables", record.page_count(), record.table_count());
/// # Ok::<(), pdfsift::Error>(())
/// ```
#[derive(Debug, Clone, Default)]
pub struct Pipeline {
    config: PipelineConfig,
}

impl Pipeline {
    /// Create a pipeline with the default configuration.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a pipeline from an existing configuration.
    pub fn with_config(config: PipelineConfig) -> Self {
        Self { config }
    }

    /// Current configuration.
    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// Set the output root directory.
    pub fn with_output_root(mut self, dir: impl AsRef<Path>) -> Self {
        self.config = self.config.with_output_root(dir.as_ref());
        self
    }

    /// Set the image file name template.
    pub fn with_image_template(mut self, template: impl Into<String>) -> Self {
        self.config = self.config.with_image_template(template);
        self
    }

    /// Set the JSON format of the written record.
    pub fn with_json_format(mut self, format: JsonFormat) -> Self {
        self.config = self.config.with_json_format(format);
        self
    }

    /// Set error mode.
    pub fn with_error_mode(mut self, mode: ErrorMode) -> Self {
        self.config = self.config.with_error_mode(mode);
        self
    }

    /// Enable lenient mode.
    pub fn lenient(mut self) -> Self {
        self.config = self.config.lenient();
        self
    }

    /// Set the pages searched by the lattice table strategy.
    pub fn with_lattice_pages(mut self, pages: PageSelection) -> Self {
        self.config = self.config.with_lattice_pages(pages);
        self
    }

    /// Run every pass over the document at `path` and persist the record.
    pub fn run<P: AsRef<Path>>(&self, path: P) -> Result<ResultRecord> {
        self.run_with_progress(path, |_| {})
    }

    /// Like [`Pipeline::run`], calling `on_stage` before each step.
    pub fn run_with_progress<P, F>(&self, path: P, mut on_stage: F) -> Result<ResultRecord>
    where
        P: AsRef<Path>,
        F: FnMut(Stage),
    {
        let path = path.as_ref();
        let config = &self.config;
        config.validate()?;
        let record_path = config.record_path(path)?;

        log::info!("Processing {}", path.display());
        fs::create_dir_all(&config.output_root)?;

        on_stage(Stage::Text);
        let text = TextExtractor::new()
            .with_error_mode(config.error_mode)
            .extract(path)?;
        log::info!("Extracted text from {} pages", text.len());

        on_stage(Stage::Tables);
        let table_options = TableOptions::new().with_lattice_pages(config.lattice_pages.clone());
        let tables = TableExtractor::with_options(table_options).extract(path)?;
        log::info!(
            "Detected {} tables on {} pages",
            tables.values().map(Vec::len).sum::<usize>(),
            tables.len()
        );

        on_stage(Stage::Images);
        let images = ImageExtractor::new()
            .with_error_mode(config.error_mode)
            .with_name_template(config.image_name_template.clone())
            .extract(path, config.image_dir())?;
        log::info!("Saved {} images", images.len());

        let record = ResultRecord::new(path.to_string_lossy(), text, tables, images);
        record.validate()?;

        on_stage(Stage::Write);
        write_json(&record_path, &record, config.json_format)?;
        log::info!("Wrote {}", record_path.display());

        Ok(record)
    }
}

/// Run the default pipeline with `out_dir` as output root.
pub fn pipeline<P: AsRef<Path>, Q: AsRef<Path>>(path: P, out_dir: Q) -> Result<ResultRecord> {
    Pipeline::new().with_output_root(out_dir).run(path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;

    #[test]
    fn test_stage_order() {
        assert_eq!(Stage::ALL[0], Stage::Text);
        assert_eq!(Stage::ALL[3], Stage::Write);
        assert_eq!(Stage::Tables.to_string(), "Detecting tables");
    }

    #[test]
    fn test_builder_passthrough() {
        let pipeline = Pipeline::new()
            .with_output_root("out")
            .with_image_template("p{page}-{index}")
            .lenient();
        let config = pipeline.config();
        assert_eq!(config.output_root, Path::new("out"));
        assert_eq!(config.image_name_template, "p{page}-{index}");
        assert_eq!(config.error_mode, ErrorMode::Lenient);
    }

    #[test]
    fn test_invalid_template_rejected_before_io() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path().join("never-created");
        let result = Pipeline::new()
            .with_output_root(&root)
            .with_image_template("img{index}")
            .run(dir.path().join("missing.pdf"));

        assert!(matches!(result, Err(Error::InvalidConfig(_))));
        assert!(!root.exists());
    }

    #[test]
    fn test_missing_input_is_io_error() {
        let dir = tempfile::tempdir().unwrap();
        let result = pipeline(dir.path().join("missing.pdf"), dir.path());
        assert!(matches!(result, Err(Error::Io(_))));
    }
}
