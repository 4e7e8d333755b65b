//! Pipeline options and configuration.

use std::ops::RangeInclusive;
use std::path::{Path, PathBuf};

use regex::Regex;

use crate::error::{Error, Result};
use crate::render::JsonFormat;

/// Default output directory.
pub const DEFAULT_OUTPUT_ROOT: &str = "outputs";

/// Default image sub-directory below the output root.
pub const DEFAULT_IMAGE_SUBDIR: &str = "images";

/// Default image file name template (without extension).
pub const DEFAULT_IMAGE_TEMPLATE: &str = "page{page}_img{index}";

/// How extraction failures are handled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ErrorMode {
    /// Text and image failures abort the run
    #[default]
    Strict,
    /// Failing text pages become empty and failing images are skipped
    Lenient,
}

/// Which pages an operation applies to.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum PageSelection {
    /// Every page
    #[default]
    All,
    /// A range of pages (inclusive, 1-indexed)
    Range(RangeInclusive<u32>),
    /// Specific pages (1-indexed)
    Pages(Vec<u32>),
}

impl PageSelection {
    /// Check if a page number should be included.
    pub fn includes(&self, page: u32) -> bool {
        match self {
            PageSelection::All => true,
            PageSelection::Range(range) => range.contains(&page),
            PageSelection::Pages(pages) => pages.contains(&page),
        }
    }

    /// Parse a page selection string (e.g., "all", "1-10", "1,3,5,7-10").
    pub fn parse(s: &str) -> Result<Self> {
        let s = s.trim();

        if s.is_empty() || s == "all" {
            return Ok(PageSelection::All);
        }

        let invalid = || Error::InvalidPageRange(s.to_string());
        let page = |p: &str| -> Result<u32> {
            match p.trim().parse::<u32>() {
                Ok(0) | Err(_) => Err(invalid()),
                Ok(n) => Ok(n),
            }
        };

        if let Some((start, end)) = s.split_once('-') {
            if !s.contains(',') {
                let (start, end) = (page(start)?, page(end)?);
                if start > end {
                    return Err(invalid());
                }
                return Ok(PageSelection::Range(start..=end));
            }
        }

        let mut pages = Vec::new();
        for part in s.split(',') {
            let (start, end) = match part.split_once('-') {
                Some((start, end)) => (page(start)?, page(end)?),
                None => {
                    let p = page(part)?;
                    (p, p)
                }
            };
            if start > end {
                return Err(invalid());
            }
            pages.extend(start..=end);
        }

        pages.sort_unstable();
        pages.dedup();
        Ok(PageSelection::Pages(pages))
    }
}

/// Configuration for a pipeline run.
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    /// Directory receiving the JSON record and the image sub-directory
    pub output_root: PathBuf,

    /// Image directory, relative to `output_root`
    pub image_subdir: PathBuf,

    /// Image file name template; `{page}` and `{index}` are substituted
    pub image_name_template: String,

    /// JSON layout of the persisted record
    pub json_format: JsonFormat,

    /// Error handling mode
    pub error_mode: ErrorMode,

    /// Pages handed to the lattice table strategy
    pub lattice_pages: PageSelection,
}

impl PipelineConfig {
    /// Create a new configuration with defaults.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the output root directory.
    pub fn with_output_root(mut self, dir: impl Into<PathBuf>) -> Self {
        self.output_root = dir.into();
        self
    }

    /// Set the image sub-directory.
    pub fn with_image_subdir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.image_subdir = dir.into();
        self
    }

    /// Set the image file name template.
    pub fn with_image_template(mut self, template: impl Into<String>) -> Self {
        self.image_name_template = template.into();
        self
    }

    /// Set the JSON format.
    pub fn with_json_format(mut self, format: JsonFormat) -> Self {
        self.json_format = format;
        self
    }

    /// Set error mode.
    pub fn with_error_mode(mut self, mode: ErrorMode) -> Self {
        self.error_mode = mode;
        self
    }

    /// Enable lenient mode.
    pub fn lenient(mut self) -> Self {
        self.error_mode = ErrorMode::Lenient;
        self
    }

    /// Set the pages searched by the lattice strategy.
    pub fn with_lattice_pages(mut self, pages: PageSelection) -> Self {
        self.lattice_pages = pages;
        self
    }

    /// Directory images are written to.
    pub fn image_dir(&self) -> PathBuf {
        self.output_root.join(&self.image_subdir)
    }

    /// Path of the JSON record for a source document.
    pub fn record_path(&self, source: &Path) -> Result<PathBuf> {
        let name = source
            .file_name()
            .ok_or_else(|| Error::InvalidConfig(format!("{} has no file name", source.display())))?;
        let mut file = name.to_os_string();
        file.push(".json");
        Ok(self.output_root.join(file))
    }

    /// Check the configuration before any work starts.
    pub fn validate(&self) -> Result<()> {
        validate_image_template(&self.image_name_template)?;
        if self.image_subdir.is_absolute() {
            return Err(Error::InvalidConfig(format!(
                "image sub-directory must be relative: {}",
                self.image_subdir.display()
            )));
        }
        Ok(())
    }
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            output_root: PathBuf::from(DEFAULT_OUTPUT_ROOT),
            image_subdir: PathBuf::from(DEFAULT_IMAGE_SUBDIR),
            image_name_template: DEFAULT_IMAGE_TEMPLATE.to_string(),
            json_format: JsonFormat::default(),
            error_mode: ErrorMode::default(),
            lattice_pages: PageSelection::default(),
        }
    }
}

/// Check that an image name template uses exactly the `{page}` and `{index}`
/// placeholders and names a file, not a path.
pub fn validate_image_template(template: &str) -> Result<()> {
    let invalid = |reason: &str| Err(Error::InvalidConfig(format!("image template {template:?} {reason}")));

    if template.contains(['/', '\\']) {
        return invalid("must not contain path separators");
    }

    let placeholder = Regex::new(r"\{([^{}]*)\}").map_err(|e| Error::InvalidConfig(e.to_string()))?;
    let mut has_page = false;
    let mut has_index = false;
    for caps in placeholder.captures_iter(template) {
        match &caps[1] {
            "page" => has_page = true,
            "index" => has_index = true,
            other => return invalid(&format!("has unknown placeholder {{{other}}}")),
        }
    }

    if placeholder.replace_all(template, "").contains(['{', '}']) {
        return invalid("has an unbalanced brace");
    }
    if !has_page || !has_index {
        return invalid("must contain both {page} and {index}");
    }
    Ok(())
}

/// Substitute a validated template.
pub fn render_image_name(template: &str, page: u32, index: usize) -> String {
    template
        .replace("{page}", &page.to_string())
        .replace("{index}", &index.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_builder() {
        let config = PipelineConfig::new()
            .with_output_root("out")
            .with_image_subdir("img")
            .with_json_format(JsonFormat::Compact)
            .lenient()
            .with_lattice_pages(PageSelection::Pages(vec![2]));

        assert_eq!(config.image_dir(), PathBuf::from("out/img"));
        assert_eq!(config.json_format, JsonFormat::Compact);
        assert_eq!(config.error_mode, ErrorMode::Lenient);
        assert!(config.lattice_pages.includes(2));
        assert!(!config.lattice_pages.includes(1));
    }

    #[test]
    fn test_config_defaults() {
        let config = PipelineConfig::default();
        assert_eq!(config.output_root, PathBuf::from("outputs"));
        assert_eq!(config.image_dir(), PathBuf::from("outputs/images"));
        assert_eq!(config.error_mode, ErrorMode::Strict);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_record_path_uses_full_file_name() {
        let config = PipelineConfig::new().with_output_root("out");
        let path = config.record_path(Path::new("/data/report.pdf")).unwrap();
        assert_eq!(path, PathBuf::from("out/report.pdf.json"));
    }

    #[test]
    fn test_image_template_validation() {
        assert!(validate_image_template("page{page}_img{index}").is_ok());
        assert!(validate_image_template("{index}-{page}").is_ok());

        for bad in [
            "page{page}",
            "img{index}",
            "p{page}_{index}_{name}",
            "p{page}_{index}}",
            "dir/p{page}_{index}",
            "",
        ] {
            assert!(
                matches!(validate_image_template(bad), Err(Error::InvalidConfig(_))),
                "{bad:?} should be rejected"
            );
        }
    }

    #[test]
    fn test_render_image_name() {
        assert_eq!(render_image_name(DEFAULT_IMAGE_TEMPLATE, 3, 0), "page3_img0");
    }

    #[test]
    fn test_page_selection_includes() {
        let range = PageSelection::Range(5..=10);
        assert!(!range.includes(4));
        assert!(range.includes(5));
        assert!(range.includes(10));
        assert!(!range.includes(11));
        assert!(PageSelection::All.includes(100));
    }

    #[test]
    fn test_page_selection_parse() {
        assert_eq!(PageSelection::parse("all").unwrap(), PageSelection::All);
        assert_eq!(PageSelection::parse("1-10").unwrap(), PageSelection::Range(1..=10));
        assert_eq!(
            PageSelection::parse("7-8,1,3,5-7").unwrap(),
            PageSelection::Pages(vec![1, 3, 5, 6, 7, 8])
        );

        for bad in ["0", "3-1", "a", "1,,2"] {
            assert!(matches!(
                PageSelection::parse(bad),
                Err(Error::InvalidPageRange(_))
            ));
        }
    }
}
