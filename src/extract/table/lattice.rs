//! Table detection from ruling lines (Lattice mode algorithm).
//!
//! Horizontal and vertical rulings that touch each other form a grid. The
//! distinct ruling positions of a grid give its row and column boundaries, and
//! each text span lands in the cell containing its anchor point.
//!
//! Unlike the text pass, the lattice pass also reads the content of form
//! XObjects a page paints, since generators often draw table rulings inside
//! forms. A form whose content cannot be decoded fails the lattice run.

use std::cmp::Ordering;
use std::path::Path;

use lopdf::Dictionary;

use super::PageTable;
use crate::error::{Error, Result};
use crate::model::TableRecord;
use crate::parser::{
    form_matrix, group_spans_into_lines, interpret_with_ctm, Orientation, PageLayout,
    PdfDocument, Segment, TextLine, TextSpan,
};
use crate::pipeline::PageSelection;

/// Forms nested deeper than this are not read.
const MAX_FORM_DEPTH: usize = 16;

/// Lattice detector configuration.
#[derive(Debug, Clone)]
pub struct LatticeConfig {
    /// Maximum thickness of a segment still treated as a ruling (points)
    pub line_tolerance: f32,
    /// Distance within which rulings are considered to meet, and within which
    /// ruling positions are merged (points)
    pub joint_tolerance: f32,
    /// Minimum length of a ruling (points)
    pub min_line_length: f32,
}

impl Default for LatticeConfig {
    fn default() -> Self {
        Self {
            line_tolerance: 1.0,
            joint_tolerance: 3.0,
            min_line_length: 5.0,
        }
    }
}

/// Detects ruled tables.
#[derive(Debug, Clone, Default)]
pub struct LatticeDetector {
    config: LatticeConfig,
}

/// Boundaries of one detected grid, rows top to bottom.
#[derive(Debug, Clone, PartialEq)]
struct Grid {
    /// Row boundaries, descending
    rows: Vec<f32>,
    /// Column boundaries, ascending
    columns: Vec<f32>,
}

impl LatticeDetector {
    /// Create a new detector with default configuration.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a new detector with custom configuration.
    pub fn with_config(config: LatticeConfig) -> Self {
        Self { config }
    }

    /// Detect tables on the selected pages of the document at `path`.
    ///
    /// Any error fails the whole run.
    pub fn detect_document(&self, path: &Path, pages: &PageSelection) -> Result<Vec<PageTable>> {
        let pdf = PdfDocument::open(path)?;
        let mut tables = Vec::new();

        for (page_num, page_id) in pdf.pages() {
            if !pages.includes(page_num) {
                continue;
            }
            let mut layout = PageLayout::from_page(&pdf, page_id)?;
            expand_forms(&pdf, pdf.page_resources(page_id), &mut layout, 0)?;
            tables.extend(
                self.detect(&layout)
                    .into_iter()
                    .map(|record| PageTable::new(page_num, record)),
            );
        }

        Ok(tables)
    }

    /// Detect ruled tables on one page, top to bottom.
    pub fn detect(&self, layout: &PageLayout) -> Vec<TableRecord> {
        self.find_grids(&layout.segments)
            .iter()
            .map(|grid| fill_grid(grid, &layout.spans))
            .collect()
    }

    fn find_grids(&self, segments: &[Segment]) -> Vec<Grid> {
        let tol = self.config.line_tolerance;
        let min_len = self.config.min_line_length;

        let horizontal: Vec<Segment> = segments
            .iter()
            .filter(|s| s.orientation(tol) == Orientation::Horizontal && s.width() >= min_len)
            .copied()
            .collect();
        let vertical: Vec<Segment> = segments
            .iter()
            .filter(|s| s.orientation(tol) == Orientation::Vertical && s.height() >= min_len)
            .copied()
            .collect();

        if horizontal.is_empty() || vertical.is_empty() {
            return vec![];
        }

        // Union rulings that meet; horizontal rulings come first in the index space.
        let joint = self.config.joint_tolerance;
        let mut sets = DisjointSet::new(horizontal.len() + vertical.len());
        for (hi, h) in horizontal.iter().enumerate() {
            for (vi, v) in vertical.iter().enumerate() {
                if meets(h, v, joint) {
                    sets.union(hi, horizontal.len() + vi);
                }
            }
        }

        let mut grids: Vec<Grid> = sets
            .groups()
            .into_iter()
            .filter_map(|members| {
                let mut ys = Vec::new();
                let mut xs = Vec::new();
                for i in members {
                    match i.checked_sub(horizontal.len()) {
                        None => ys.push((horizontal[i].y0 + horizontal[i].y1) / 2.0),
                        Some(vi) => xs.push((vertical[vi].x0 + vertical[vi].x1) / 2.0),
                    }
                }

                let mut rows = cluster(ys, joint);
                let columns = cluster(xs, joint);
                if rows.len() < 2 || columns.len() < 2 {
                    return None;
                }
                rows.reverse();
                Some(Grid { rows, columns })
            })
            .collect();

        grids.sort_by(|a, b| {
            b.rows[0]
                .partial_cmp(&a.rows[0])
                .unwrap_or(Ordering::Equal)
                .then_with(|| a.columns[0].partial_cmp(&b.columns[0]).unwrap_or(Ordering::Equal))
        });

        log::debug!("LatticeDetector: {} grids", grids.len());
        grids
    }
}

/// Interpret the form XObjects painted in `layout` and add their spans and
/// segments to it, recursively.
///
/// Forms without their own `/Resources` use the resources they were painted
/// with. Undecodable form content is a [`Error::TableDetect`].
fn expand_forms<'a>(
    pdf: &'a PdfDocument,
    resources: Option<&'a Dictionary>,
    layout: &mut PageLayout,
    depth: usize,
) -> Result<()> {
    let calls = std::mem::take(&mut layout.xobject_calls);
    let Some(resources) = resources else {
        return Ok(());
    };

    for call in calls {
        let Some(form) = pdf.form_xobject(resources, &call.name) else {
            continue;
        };
        let name = String::from_utf8_lossy(&call.name);
        if depth >= MAX_FORM_DEPTH {
            log::debug!("Form XObject /{} nested too deep, skipping", name);
            continue;
        }
        let form_failed = |e: Error| Error::TableDetect(format!("form XObject /{name}: {e}"));

        let content = pdf.stream_content(form).map_err(form_failed)?;
        let form_resources = pdf
            .resolve_dict(&form.dict, b"Resources")
            .unwrap_or(resources);
        let fonts = pdf.resource_fonts(form_resources);
        let ctm = form_matrix(form).then(&call.ctm);

        let mut nested = interpret_with_ctm(&content, ctm, |font, bytes| {
            pdf.decode_text(&fonts, font, bytes)
        })
        .map_err(form_failed)?;
        expand_forms(pdf, Some(form_resources), &mut nested, depth + 1)?;

        log::debug!(
            "Form XObject /{}: {} spans, {} segments",
            name,
            nested.spans.len(),
            nested.segments.len()
        );
        layout.absorb(nested);
    }
    Ok(())
}

/// Check whether a horizontal and a vertical ruling touch.
fn meets(h: &Segment, v: &Segment, tol: f32) -> bool {
    let x = (v.x0 + v.x1) / 2.0;
    let y = (h.y0 + h.y1) / 2.0;
    x >= h.x0 - tol && x <= h.x1 + tol && y >= v.y0 - tol && y <= v.y1 + tol
}

/// Sort positions and merge those closer than `tol`, averaging each cluster.
fn cluster(mut values: Vec<f32>, tol: f32) -> Vec<f32> {
    values.sort_by(|a, b| a.partial_cmp(b).unwrap_or(Ordering::Equal));

    let mut clusters: Vec<Vec<f32>> = Vec::new();
    for v in values {
        match clusters.last_mut() {
            Some(current) if current.last().is_some_and(|last| v - last <= tol) => current.push(v),
            _ => clusters.push(vec![v]),
        }
    }

    clusters
        .iter()
        .map(|c| c.iter().sum::<f32>() / c.len() as f32)
        .collect()
}

/// Assign spans to the cells of a grid. Cells without text are empty strings.
fn fill_grid(grid: &Grid, spans: &[TextSpan]) -> TableRecord {
    let row_count = grid.rows.len() - 1;
    let col_count = grid.columns.len() - 1;
    let mut cells: Vec<Vec<Vec<TextSpan>>> = vec![vec![Vec::new(); col_count]; row_count];

    for span in spans {
        // A point just inside the glyph box, clear of the ruling it may sit on.
        let ax = span.x + span.width.min(1.0);
        let ay = span.y + span.font_size * 0.3;

        let row = grid.rows.windows(2).position(|w| ay <= w[0] && ay > w[1]);
        let col = grid.columns.windows(2).position(|w| ax >= w[0] && ax < w[1]);
        if let (Some(r), Some(c)) = (row, col) {
            cells[r][c].push(span.clone());
        }
    }

    let rows: Vec<Vec<Option<String>>> = cells
        .into_iter()
        .map(|row| {
            row.into_iter()
                .map(|spans| {
                    let text = group_spans_into_lines(spans)
                        .iter()
                        .map(TextLine::text)
                        .collect::<Vec<_>>()
                        .join("\n");
                    Some(text)
                })
                .collect::<Vec<_>>()
        })
        .collect();

    TableRecord::from_rows(rows)
}

/// Union-find over ruling indices.
struct DisjointSet {
    parent: Vec<usize>,
}

impl DisjointSet {
    fn new(n: usize) -> Self {
        Self {
            parent: (0..n).collect(),
        }
    }

    fn find(&mut self, mut i: usize) -> usize {
        while self.parent[i] != i {
            self.parent[i] = self.parent[self.parent[i]];
            i = self.parent[i];
        }
        i
    }

    fn union(&mut self, a: usize, b: usize) {
        let (ra, rb) = (self.find(a), self.find(b));
        if ra != rb {
            self.parent[rb] = ra;
        }
    }

    /// Members of each set, sets ordered by their smallest member.
    fn groups(&mut self) -> Vec<Vec<usize>> {
        let mut groups: Vec<Vec<usize>> = Vec::new();
        let mut slot_of_root: Vec<Option<usize>> = vec![None; self.parent.len()];
        for i in 0..self.parent.len() {
            let root = self.find(i);
            match slot_of_root[root] {
                Some(slot) => groups[slot].push(i),
                None => {
                    slot_of_root[root] = Some(groups.len());
                    groups.push(vec![i]);
                }
            }
        }
        groups
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Rulings of a 2x2 grid spanning x 100..300 and y 660..700.
    fn grid_segments() -> Vec<Segment> {
        vec![
            Segment::new(100.0, 700.0, 300.0, 700.0),
            Segment::new(100.0, 680.0, 300.0, 680.0),
            Segment::new(100.0, 660.0, 300.0, 660.0),
            Segment::new(100.0, 660.0, 100.0, 700.0),
            Segment::new(200.0, 660.0, 200.0, 700.0),
            Segment::new(300.0, 660.0, 300.0, 700.0),
        ]
    }

    fn span(text: &str, x: f32, y: f32) -> TextSpan {
        TextSpan::new(text, x, y, 12.0)
    }

    #[test]
    fn test_cluster_merges_close_values() {
        assert_eq!(cluster(vec![10.0, 200.0, 11.0, 12.0], 3.0), vec![11.0, 200.0]);
        assert!(cluster(vec![], 3.0).is_empty());
    }

    #[test]
    fn test_detects_ruled_grid() {
        let layout = PageLayout {
            spans: vec![
                span("Item", 110.0, 685.0),
                span("Qty", 210.0, 685.0),
                span("Apple", 110.0, 665.0),
                span("Outside", 400.0, 665.0),
            ],
            segments: grid_segments(),
            ..PageLayout::default()
        };

        let tables = LatticeDetector::new().detect(&layout);
        assert_eq!(tables.len(), 1);

        let table = &tables[0];
        assert_eq!(table.column_count(), 2);
        assert_eq!(table.row_count(), 2);
        assert_eq!(table.columns[0].cells, vec![Some("Item".into()), Some("Apple".into())]);
        assert_eq!(table.columns[1].cells, vec![Some("Qty".into()), Some(String::new())]);
    }

    #[test]
    fn test_filled_rectangles_form_grid() {
        // Thin filled rectangles, as many generators draw rulings
        let mut segments = Vec::new();
        for y in [700.0, 680.0, 660.0] {
            let (x0, x1, y1) = (100.0, 300.0, y + 0.5);
            segments.push(Segment::new(x0, y, x1, y));
            segments.push(Segment::new(x1, y, x1, y1));
            segments.push(Segment::new(x1, y1, x0, y1));
            segments.push(Segment::new(x0, y1, x0, y));
        }
        for x in [100.0, 200.0, 300.0] {
            segments.push(Segment::new(x, 660.0, x, 700.0));
        }

        let layout = PageLayout {
            segments,
            ..PageLayout::default()
        };
        let tables = LatticeDetector::new().detect(&layout);
        assert_eq!(tables.len(), 1);
        assert_eq!(tables[0].row_count(), 2);
        assert_eq!(tables[0].column_count(), 2);
    }

    #[test]
    fn test_separate_grids_are_separate_tables() {
        let mut segments = grid_segments();
        for s in grid_segments() {
            segments.push(Segment::new(s.x0, s.y0 - 300.0, s.x1, s.y1 - 300.0));
        }
        let layout = PageLayout {
            spans: vec![span("Lower", 110.0, 385.0)],
            segments,
            ..PageLayout::default()
        };

        let tables = LatticeDetector::new().detect(&layout);
        assert_eq!(tables.len(), 2);
        assert_eq!(tables[0].cell(0, 0), Some(""));
        assert_eq!(tables[1].cell(0, 0), Some("Lower"));
    }

    #[test]
    fn test_lone_rulings_are_not_tables() {
        let layout = PageLayout {
            spans: vec![span("Heading", 100.0, 710.0)],
            segments: vec![
                Segment::new(100.0, 700.0, 500.0, 700.0),
                Segment::new(50.0, 100.0, 50.0, 600.0),
            ],
            ..PageLayout::default()
        };
        assert!(LatticeDetector::new().detect(&layout).is_empty());
    }
}
