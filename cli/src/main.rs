//! pdfsift CLI - PDF text, table and image extraction tool

use std::fs;
use std::path::{Path, PathBuf};

use clap::{Parser, Subcommand};
use colored::Colorize;
use indicatif::{ProgressBar, ProgressStyle};

use pdfsift::render::to_json;
use pdfsift::{
    ErrorMode, ImageExtractor, JsonFormat, PageSelection, PdfDocument, Pipeline, PipelineConfig,
    Stage, TableExtractor, TableOptions, TextExtractor,
};

#[derive(Parser)]
#[command(name = "pdfsift")]
#[command(version)]
#[command(about = "Extract text, tables and images from PDF files", long_about = None)]
struct Cli {
    /// Input PDF file
    #[arg(value_name = "FILE")]
    input: Option<PathBuf>,

    /// Output directory
    #[arg(value_name = "OUTPUT", env = "PDFSIFT_OUTPUT")]
    output: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Run text, table and image extraction and write the JSON record
    Run {
        /// Input PDF file
        #[arg(value_name = "FILE")]
        input: PathBuf,

        /// Output directory
        #[arg(short, long, value_name = "DIR", env = "PDFSIFT_OUTPUT")]
        output: Option<PathBuf>,

        /// Write compact JSON
        #[arg(long)]
        compact: bool,

        /// Keep going when a page's text or an image cannot be decoded
        #[arg(long)]
        lenient: bool,

        /// Pages searched for ruled tables (e.g., "all", "1-10", "1,3,5")
        #[arg(long, value_name = "SPEC")]
        lattice_pages: Option<String>,

        /// Image file name template, needs {page} and {index}
        #[arg(long, value_name = "TEMPLATE")]
        image_template: Option<String>,
    },

    /// Extract per-page text as JSON
    Text {
        /// Input PDF file
        #[arg(value_name = "FILE")]
        input: PathBuf,

        /// Output file (stdout if not specified)
        #[arg(short, long, value_name = "FILE")]
        output: Option<PathBuf>,

        /// Use an empty string for pages that fail
        #[arg(long)]
        lenient: bool,
    },

    /// Detect tables and print them as JSON
    Tables {
        /// Input PDF file
        #[arg(value_name = "FILE")]
        input: PathBuf,

        /// Output file (stdout if not specified)
        #[arg(short, long, value_name = "FILE")]
        output: Option<PathBuf>,

        /// Pages searched for ruled tables (e.g., "all", "1-10", "1,3,5")
        #[arg(long, value_name = "SPEC")]
        lattice_pages: Option<String>,
    },

    /// Extract embedded images as PNG
    Images {
        /// Input PDF file
        #[arg(value_name = "FILE")]
        input: PathBuf,

        /// Output directory
        #[arg(short, long, value_name = "DIR")]
        output: Option<PathBuf>,

        /// Skip images that cannot be decoded
        #[arg(long)]
        lenient: bool,
    },

    /// Show document information
    Info {
        /// Input PDF file
        #[arg(value_name = "FILE")]
        input: PathBuf,
    },
}

fn main() {
    env_logger::init();

    let cli = Cli::parse();

    let result = match cli.command {
        Some(Commands::Run {
            input,
            output,
            compact,
            lenient,
            lattice_pages,
            image_template,
        }) => cmd_run(
            &input,
            output.as_deref(),
            compact,
            lenient,
            lattice_pages.as_deref(),
            image_template,
        ),
        Some(Commands::Text {
            input,
            output,
            lenient,
        }) => cmd_text(&input, output.as_deref(), lenient),
        Some(Commands::Tables {
            input,
            output,
            lattice_pages,
        }) => cmd_tables(&input, output.as_deref(), lattice_pages.as_deref()),
        Some(Commands::Images {
            input,
            output,
            lenient,
        }) => cmd_images(&input, output.as_deref(), lenient),
        Some(Commands::Info { input }) => cmd_info(&input),
        None => {
            // Default behavior: run the pipeline if input is provided
            if let Some(input) = cli.input {
                cmd_run(&input, cli.output.as_deref(), false, false, None, None)
            } else {
                println!("{}", "Usage: pdfsift <FILE> [OUTPUT]".yellow());
                println!("       pdfsift --help for more information");
                Ok(())
            }
        }
    };

    if let Err(e) = result {
        eprintln!("{}: {}", "Error".red().bold(), e);
        std::process::exit(1);
    }
}

fn error_mode(lenient: bool) -> ErrorMode {
    if lenient {
        ErrorMode::Lenient
    } else {
        ErrorMode::Strict
    }
}

fn parse_pages(spec: Option<&str>) -> Result<PageSelection, Box<dyn std::error::Error>> {
    match spec {
        Some(s) => Ok(PageSelection::parse(s)?),
        None => Ok(PageSelection::All),
    }
}

/// Print to a file if given, stdout otherwise.
fn emit(output: Option<&Path>, content: &str) -> Result<(), Box<dyn std::error::Error>> {
    if let Some(path) = output {
        fs::write(path, content)?;
        println!("{} {}", "Saved to".green(), path.display());
    } else {
        println!("{}", content);
    }
    Ok(())
}

fn cmd_run(
    input: &Path,
    output: Option<&Path>,
    compact: bool,
    lenient: bool,
    lattice_pages: Option<&str>,
    image_template: Option<String>,
) -> Result<(), Box<dyn std::error::Error>> {
    let mut config = PipelineConfig::new()
        .with_error_mode(error_mode(lenient))
        .with_lattice_pages(parse_pages(lattice_pages)?);
    if let Some(dir) = output {
        config = config.with_output_root(dir);
    }
    if compact {
        config = config.with_json_format(JsonFormat::Compact);
    }
    if let Some(template) = image_template {
        config = config.with_image_template(template);
    }
    let record_path = config.record_path(input)?;
    let image_dir = config.image_dir();
    log::debug!(
        "Running pipeline on {} into {}",
        input.display(),
        record_path.display()
    );

    let pb = ProgressBar::new(Stage::ALL.len() as u64);
    pb.set_style(
        ProgressStyle::default_bar()
            .template("{spinner:.green} [{bar:40.cyan/blue}] {msg}")?
            .progress_chars("#>-"),
    );

    let mut started = 0;
    let record = Pipeline::with_config(config).run_with_progress(input, |stage| {
        if started > 0 {
            pb.inc(1);
        }
        started += 1;
        pb.set_message(format!("{}...", stage));
    })?;
    pb.inc(1);
    pb.finish_with_message("Done!");

    println!("\n{}", "Summary:".green().bold());
    println!("  {} {} pages", "├─".dimmed(), record.page_count());
    println!("  {} {} tables", "├─".dimmed(), record.table_count());
    println!(
        "  {} {} images in {}",
        "├─".dimmed(),
        record.images.len(),
        image_dir.display()
    );
    println!("  {} {}", "└─".dimmed(), record_path.display());

    Ok(())
}

fn cmd_text(
    input: &Path,
    output: Option<&Path>,
    lenient: bool,
) -> Result<(), Box<dyn std::error::Error>> {
    let text = TextExtractor::new()
        .with_error_mode(error_mode(lenient))
        .extract(input)?;
    log::debug!("Extracted text from {} pages", text.len());
    emit(output, &to_json(&text, JsonFormat::Pretty)?)
}

fn cmd_tables(
    input: &Path,
    output: Option<&Path>,
    lattice_pages: Option<&str>,
) -> Result<(), Box<dyn std::error::Error>> {
    let options = TableOptions::new().with_lattice_pages(parse_pages(lattice_pages)?);
    let extraction = TableExtractor::with_options(options).extract_report(input)?;
    log::debug!(
        "Detected {} tables, {} strategy failures",
        extraction.table_count(),
        extraction.failures.len()
    );

    for failure in &extraction.failures {
        eprintln!("{} {}", "Skipped:".yellow(), failure);
    }

    emit(output, &to_json(&extraction.tables, JsonFormat::Pretty)?)
}

fn cmd_images(
    input: &Path,
    output: Option<&Path>,
    lenient: bool,
) -> Result<(), Box<dyn std::error::Error>> {
    let output_dir = output
        .map(|p| p.to_path_buf())
        .unwrap_or_else(|| PathBuf::from("."));
    log::debug!("Writing images to {}", output_dir.display());

    let images = ImageExtractor::new()
        .with_error_mode(error_mode(lenient))
        .extract(input, &output_dir)?;

    for image in &images {
        println!(
            "{} {} (page {})",
            "Extracted".green(),
            image.file.display(),
            image.page
        );
    }
    println!("\n{} {} images extracted", "Done!".green().bold(), images.len());

    Ok(())
}

fn cmd_info(input: &Path) -> Result<(), Box<dyn std::error::Error>> {
    let pdf = PdfDocument::open(input)?;
    log::debug!("Opened {} ({} pages)", input.display(), pdf.page_count());

    println!("{}", "Document Information".cyan().bold());
    println!("{}", "─".repeat(40).dimmed());

    println!("{}: {}", "File".bold(), input.display());
    println!("{}: PDF {}", "Format".bold(), pdf.version());
    println!("{}: {}", "Pages".bold(), pdf.page_count());
    println!(
        "{}: {}",
        "Encrypted".bold(),
        if pdf.is_encrypted() { "Yes" } else { "No" }
    );

    println!();
    println!("{}", "Images per Page".cyan().bold());
    println!("{}", "─".repeat(40).dimmed());

    let mut total = 0;
    for (page_num, page_id) in pdf.pages() {
        let count = pdf.page_images(page_id).len();
        total += count;
        if count > 0 {
            println!("{} {}: {}", "Page".bold(), page_num, count);
        }
    }
    println!("{}: {}", "Total".bold(), total);

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_run_arguments() {
        let cli = Cli::try_parse_from([
            "pdfsift",
            "run",
            "report.pdf",
            "-o",
            "out",
            "--lenient",
            "--lattice-pages",
            "1-3",
        ])
        .unwrap();
        match cli.command {
            Some(Commands::Run {
                input,
                output,
                lenient,
                compact,
                lattice_pages,
                ..
            }) => {
                assert_eq!(input, PathBuf::from("report.pdf"));
                assert_eq!(output, Some(PathBuf::from("out")));
                assert!(lenient);
                assert!(!compact);
                assert_eq!(lattice_pages.as_deref(), Some("1-3"));
            }
            _ => panic!("expected the run command"),
        }
    }

    #[test]
    fn test_parse_pages() {
        assert_eq!(parse_pages(None).unwrap(), PageSelection::All);
        assert_eq!(
            parse_pages(Some("1,3")).unwrap(),
            PageSelection::Pages(vec![1, 3])
        );
        assert!(parse_pages(Some("x-")).is_err());
    }

    #[test]
    fn test_emit_writes_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("tables.json");

        emit(Some(&path), "{}").unwrap();
        assert_eq!(fs::read_to_string(&path).unwrap(), "{}");
    }

    #[test]
    fn test_info_rejects_non_pdf() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("notes.txt");
        fs::write(&path, "plain text").unwrap();

        assert!(cmd_info(&path).is_err());
    }
}
