//! Table detection using text position analysis (Stream mode algorithm).
//!
//! Tables are found by analyzing text alignment patterns without relying on
//! graphical lines: rows come from baseline proximity, columns from left edges
//! that recur across rows.

use std::cmp::Ordering;
use std::collections::{HashMap, HashSet};

use crate::model::TableRecord;
use crate::parser::TextSpan;

/// Bucket width used to group left edges, in points.
const EDGE_BUCKET: f32 = 5.0;

/// A row of text spans in a candidate table.
#[derive(Debug, Clone)]
struct RowData {
    /// Average baseline of the row
    y: f32,
    /// Spans in this row, sorted by X
    spans: Vec<TextSpan>,
}

/// Stream detector configuration.
#[derive(Debug, Clone)]
pub struct StreamDetectorConfig {
    /// Minimum number of rows to consider as table
    pub min_rows: usize,
    /// Minimum number of columns to consider as table
    pub min_columns: usize,
    /// Maximum number of columns (above this, likely word-level splitting)
    pub max_columns: usize,
    /// Y tolerance for grouping spans into rows (fraction of font size)
    pub y_tolerance_factor: f32,
    /// Minimum column alignment ratio (0.0-1.0)
    pub min_alignment_ratio: f32,
    /// Minimum gap between columns (points)
    pub min_column_gap: f32,
}

impl Default for StreamDetectorConfig {
    fn default() -> Self {
        Self {
            min_rows: 2,
            min_columns: 2,
            max_columns: 6,
            y_tolerance_factor: 0.4,
            min_alignment_ratio: 0.3,
            min_column_gap: 15.0,
        }
    }
}

/// Detects tables in the text spans of one page.
#[derive(Debug, Clone, Default)]
pub struct StreamDetector {
    config: StreamDetectorConfig,
}

impl StreamDetector {
    /// Create a new detector with default configuration.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a new detector with custom configuration.
    pub fn with_config(config: StreamDetectorConfig) -> Self {
        Self { config }
    }

    /// Detect tables in the given spans, top to bottom.
    pub fn detect(&self, spans: &[TextSpan]) -> Vec<TableRecord> {
        if spans.len() < self.config.min_rows * self.config.min_columns {
            log::debug!(
                "StreamDetector: not enough spans ({} < {})",
                spans.len(),
                self.config.min_rows * self.config.min_columns
            );
            return vec![];
        }

        let rows = self.group_into_rows(spans);
        if rows.len() < self.config.min_rows {
            log::debug!("StreamDetector: not enough rows ({})", rows.len());
            return vec![];
        }

        let columns = self.detect_columns(&rows);
        log::debug!("StreamDetector: column edges {:?}", columns);
        if columns.len() < self.config.min_columns {
            return vec![];
        }

        let mut tables = Vec::new();
        for (start, end) in self.find_table_regions(&rows, &columns) {
            let region = &rows[start..=end];

            // Re-detect columns for this specific region
            let region_columns = self.detect_columns(region);
            if region_columns.len() < self.config.min_columns {
                continue;
            }
            if region_columns.len() > self.config.max_columns {
                log::debug!(
                    "StreamDetector: skipping region, too many columns ({} > {})",
                    region_columns.len(),
                    self.config.max_columns
                );
                continue;
            }
            if is_list_pattern(region, &region_columns) {
                log::debug!("StreamDetector: skipping region, detected as list pattern");
                continue;
            }

            tables.push(to_record(region, &region_columns));
        }

        tables
    }

    /// Group spans into rows by Y position.
    fn group_into_rows(&self, spans: &[TextSpan]) -> Vec<RowData> {
        let mut sorted = spans.to_vec();
        sorted.sort_by(|a, b| {
            b.y.partial_cmp(&a.y)
                .unwrap_or(Ordering::Equal)
                .then_with(|| a.x.partial_cmp(&b.x).unwrap_or(Ordering::Equal))
        });

        let mut rows: Vec<RowData> = Vec::new();
        let mut current: Vec<TextSpan> = Vec::new();
        let mut current_y: Option<f32> = None;

        for span in sorted {
            let y_tolerance = span.font_size * self.config.y_tolerance_factor;
            match current_y {
                Some(y) if (span.y - y).abs() <= y_tolerance => current.push(span),
                _ => {
                    if !current.is_empty() {
                        rows.push(RowData::new(std::mem::take(&mut current)));
                    }
                    current_y = Some(span.y);
                    current.push(span);
                }
            }
        }

        if !current.is_empty() {
            rows.push(RowData::new(current));
        }

        rows
    }

    /// Detect column boundaries from recurring left edges.
    ///
    /// Rows with two or more spans are the best evidence; when too few exist
    /// every row is counted instead.
    fn detect_columns(&self, rows: &[RowData]) -> Vec<f32> {
        let multi_span_rows: Vec<&RowData> = rows.iter().filter(|r| r.spans.len() >= 2).collect();

        let mut edge_counts: HashMap<i32, usize> = HashMap::new();
        let considered = if multi_span_rows.len() >= self.config.min_rows {
            for row in &multi_span_rows {
                // Count each bucket once per row
                let buckets: HashSet<i32> = row.spans.iter().map(|s| edge_bucket(s.x)).collect();
                for bucket in buckets {
                    *edge_counts.entry(bucket).or_insert(0) += 1;
                }
            }
            multi_span_rows.len()
        } else {
            for span in rows.iter().flat_map(|r| r.spans.iter()) {
                *edge_counts.entry(edge_bucket(span.x)).or_insert(0) += 1;
            }
            rows.len()
        };

        let min_occurrences =
            ((considered as f32 * self.config.min_alignment_ratio) as usize).max(2);

        let mut edges: Vec<f32> = edge_counts
            .iter()
            .filter(|(_, count)| **count >= min_occurrences)
            .map(|(bucket, _)| *bucket as f32 * EDGE_BUCKET)
            .collect();
        edges.sort_by(|a, b| a.partial_cmp(b).unwrap_or(Ordering::Equal));

        // Merge close edges
        let mut merged: Vec<f32> = Vec::new();
        for edge in edges {
            match merged.last() {
                Some(last) if edge - last < self.config.min_column_gap => {}
                _ => merged.push(edge),
            }
        }
        merged
    }

    /// Find contiguous row regions that form tables.
    fn find_table_regions(&self, rows: &[RowData], columns: &[f32]) -> Vec<(usize, usize)> {
        let mut regions = Vec::new();
        let mut start: Option<usize> = None;

        for (i, row) in rows.iter().enumerate() {
            if alignment_score(row, columns) >= self.config.min_alignment_ratio {
                start.get_or_insert(i);
                continue;
            }
            if let Some(s) = start.take() {
                if i - s >= self.config.min_rows {
                    regions.push((s, i - 1));
                }
            }
        }

        if let Some(s) = start {
            if rows.len() - s >= self.config.min_rows {
                regions.push((s, rows.len() - 1));
            }
        }

        regions
    }
}

impl RowData {
    fn new(spans: Vec<TextSpan>) -> Self {
        let y = spans.iter().map(|s| s.y).sum::<f32>() / spans.len() as f32;
        Self { y, spans }
    }
}

fn edge_bucket(x: f32) -> i32 {
    (x / EDGE_BUCKET).round() as i32
}

/// Fraction of a row's spans that start on a column edge.
fn alignment_score(row: &RowData, columns: &[f32]) -> f32 {
    if row.spans.is_empty() || columns.is_empty() {
        return 0.0;
    }
    let tolerance = 5.0;
    let aligned = row
        .spans
        .iter()
        .filter(|span| columns.iter().any(|col| (span.x - col).abs() <= tolerance))
        .count();
    aligned as f32 / row.spans.len() as f32
}

/// Build a record from a region. Cells without text are `None`.
fn to_record(rows: &[RowData], columns: &[f32]) -> TableRecord {
    let right_x = rows
        .iter()
        .flat_map(|r| r.spans.iter())
        .map(TextSpan::right)
        .fold(f32::MIN, f32::max);

    let cells: Vec<Vec<Option<String>>> = rows
        .iter()
        .map(|row| {
            let mut contents: Vec<Vec<&str>> = vec![Vec::new(); columns.len()];
            for span in &row.spans {
                let col = column_for_span(span.x, columns, right_x);
                contents[col].push(span.text.trim());
            }
            contents
                .into_iter()
                .map(|parts| (!parts.is_empty()).then(|| parts.join(" ")))
                .collect()
        })
        .collect();

    log::debug!(
        "StreamDetector: table of {} rows between y={:.1} and y={:.1}",
        rows.len(),
        rows.first().map(|r| r.y).unwrap_or_default(),
        rows.last().map(|r| r.y).unwrap_or_default()
    );

    TableRecord::from_rows(cells)
}

/// Find which column a span belongs to based on its X position.
fn column_for_span(span_x: f32, columns: &[f32], right_x: f32) -> usize {
    // Allow 10pt for spans slightly before column start
    for (i, &col_start) in columns.iter().enumerate() {
        let col_end = columns.get(i + 1).copied().unwrap_or(right_x + 100.0);
        if span_x >= col_start - 10.0 && span_x < col_end - 10.0 {
            return i;
        }
    }

    columns
        .iter()
        .enumerate()
        .min_by(|(_, a), (_, b)| {
            (span_x - **a)
                .abs()
                .partial_cmp(&(span_x - **b).abs())
                .unwrap_or(Ordering::Equal)
        })
        .map(|(i, _)| i)
        .unwrap_or(0)
}

/// Check if rows actually represent a numbered or bulleted list.
///
/// A numbered list like "1. Item" often yields the marker and the text as
/// separate spans at different X positions, which looks like two columns.
fn is_list_pattern(rows: &[RowData], columns: &[f32]) -> bool {
    if columns.len() < 2 || rows.is_empty() {
        return false;
    }

    let mut bullet_count = 0;
    let mut number_count = 0;

    for row in rows {
        let first_span = row
            .spans
            .iter()
            .min_by(|a, b| a.x.partial_cmp(&b.x).unwrap_or(Ordering::Equal));

        if let Some(span) = first_span {
            let text = span.text.trim();
            if is_bullet_marker(text) {
                bullet_count += 1;
            } else if is_number_marker(text) {
                number_count += 1;
            }
        }
    }

    let bullet_ratio = bullet_count as f32 / rows.len() as f32;
    let total_ratio = (bullet_count + number_count) as f32 / rows.len() as f32;

    // Bullets are almost never table data; numbered first columns are only
    // suspicious in two-column regions.
    bullet_ratio >= 0.5 || (columns.len() == 2 && total_ratio >= 0.5)
}

/// Check if text is a bullet marker (•, -, etc.).
fn is_bullet_marker(text: &str) -> bool {
    matches!(
        text.trim(),
        "-" | "–" | "—" | "•" | "·" | "*" | "○" | "▪" | "◦" | "▸" | "▹" | "►" | "■" | "●" | "※"
            | "□" | "◆" | "◇" | "▶" | "▷" | "☞" | "➤" | "➜"
    )
}

/// Check if text is a number-style list marker (1., 2), a., etc.).
fn is_number_marker(text: &str) -> bool {
    let cleaned: String = text.chars().filter(|c| !c.is_whitespace()).collect();
    if cleaned.is_empty() {
        return false;
    }

    // "1.", "12.", "1)"
    if let Some(pos) = cleaned.find(|c: char| !c.is_ascii_digit()) {
        let (prefix, suffix) = cleaned.split_at(pos);
        if !prefix.is_empty() && (suffix == "." || suffix == ")") {
            return true;
        }
    }

    if cleaned.parse::<u32>().is_ok() {
        return true;
    }

    // "a.", "B)"
    let mut chars = cleaned.chars();
    matches!(
        (chars.next(), chars.next(), chars.next()),
        (Some(c), Some('.' | ')'), None) if c.is_alphabetic()
    )
}
