//! Content stream interpretation.
//!
//! Turns a page content stream into positioned text spans and the ruling
//! segments (stroked lines and rectangle edges) that table detection works on.
//! Coordinates are in default user space with the origin at the bottom left.

use std::cmp::Ordering;

use lopdf::content::Content;
use lopdf::{Object, Stream};

use super::document::{PageId, PdfDocument};
use super::geometry::{Matrix, Segment};
use crate::error::{Error, Result};

/// Average glyph advance as a fraction of the font size.
const GLYPH_WIDTH_FACTOR: f32 = 0.5;

/// A text span with position and font information.
#[derive(Debug, Clone)]
pub struct TextSpan {
    /// The text content
    pub text: String,
    /// X position (left edge)
    pub x: f32,
    /// Y position (baseline)
    pub y: f32,
    /// Estimated width of the text
    pub width: f32,
    /// Font size in points, after the text and graphics transforms
    pub font_size: f32,
    /// Font resource name (e.g., "F1")
    pub font_name: String,
}

impl TextSpan {
    /// Create a new text span with a width estimated from its length.
    pub fn new(text: impl Into<String>, x: f32, y: f32, font_size: f32) -> Self {
        let text = text.into();
        let width = text.chars().count() as f32 * font_size * GLYPH_WIDTH_FACTOR;
        Self {
            text,
            x,
            y,
            width,
            font_size,
            font_name: String::new(),
        }
    }

    /// Set the font resource name.
    pub fn with_font(mut self, font_name: impl Into<String>) -> Self {
        self.font_name = font_name.into();
        self
    }

    /// Right edge.
    pub fn right(&self) -> f32 {
        self.x + self.width
    }
}

/// A text line composed of spans on the same baseline.
#[derive(Debug, Clone)]
pub struct TextLine {
    /// The spans in this line, sorted by X position
    pub spans: Vec<TextSpan>,
    /// Y position (baseline of the first span)
    pub y: f32,
}

impl TextLine {
    /// Create a new text line from spans.
    pub fn from_spans(mut spans: Vec<TextSpan>) -> Self {
        spans.sort_by(|a, b| a.x.partial_cmp(&b.x).unwrap_or(Ordering::Equal));
        let y = spans.first().map(|s| s.y).unwrap_or(0.0);
        Self { spans, y }
    }

    /// Get the combined text of all spans with appropriate spacing.
    ///
    /// A space is inserted where the gap between two spans exceeds a fifth of
    /// the average glyph width, except between characters of scripts that do
    /// not separate words with spaces.
    pub fn text(&self) -> String {
        let mut result = String::new();

        for (i, span) in self.spans.iter().enumerate() {
            if i > 0 {
                let prev = &self.spans[i - 1];
                let gap = span.x - prev.right();

                let char_count = span.text.chars().count();
                let avg_char_width = if char_count > 0 && span.width > 0.0 {
                    span.width / char_count as f32
                } else {
                    span.font_size * GLYPH_WIDTH_FACTOR
                };

                let spaceless = prev
                    .text
                    .chars()
                    .last()
                    .is_some_and(is_spaceless_script_char)
                    && span.text.chars().next().is_some_and(is_spaceless_script_char);
                let has_space = prev.text.ends_with([' ', '\u{00A0}'])
                    || span.text.starts_with([' ', '\u{00A0}']);

                if gap > avg_char_width * 0.2 && !spaceless && !has_space {
                    result.push(' ');
                }
            }
            result.push_str(&span.text);
        }

        result
    }
}

/// An XObject painted with `Do`.
#[derive(Debug, Clone, PartialEq)]
pub struct XObjectCall {
    /// Resource name of the XObject
    pub name: Vec<u8>,
    /// Transform in effect when it was painted
    pub ctm: Matrix,
}

/// Everything table and text extraction need from one page.
#[derive(Debug, Clone, Default)]
pub struct PageLayout {
    /// Text spans in content stream order
    pub spans: Vec<TextSpan>,
    /// Painted straight segments, including rectangle edges
    pub segments: Vec<Segment>,
    /// XObjects painted by the stream, not interpreted
    pub xobject_calls: Vec<XObjectCall>,
}

impl PageLayout {
    /// Interpret the content stream of a page.
    pub fn from_page(pdf: &PdfDocument, page_id: PageId) -> Result<Self> {
        let content = pdf.page_content(page_id)?;
        if content.is_empty() {
            return Ok(Self::default());
        }
        let fonts = pdf.page_fonts(page_id);
        interpret(&content, |font, bytes| pdf.decode_text(&fonts, font, bytes))
    }

    /// Add the spans and segments of a nested layout, such as a form XObject's.
    pub fn absorb(&mut self, other: PageLayout) {
        self.spans.extend(other.spans);
        self.segments.extend(other.segments);
    }

    /// Group spans into lines, top to bottom.
    pub fn lines(&self) -> Vec<TextLine> {
        group_spans_into_lines(self.spans.clone())
    }

    /// Plain text of the page, one line per text line.
    pub fn text(&self) -> String {
        self.lines()
            .iter()
            .map(TextLine::text)
            .collect::<Vec<_>>()
            .join("\n")
    }
}

/// Group spans into lines based on Y position.
///
/// Spans whose baselines are within 30% of the font size of the line's first
/// span share a line. Lines are returned top to bottom.
pub fn group_spans_into_lines(mut spans: Vec<TextSpan>) -> Vec<TextLine> {
    // PDF Y grows upwards
    spans.sort_by(|a, b| {
        b.y.partial_cmp(&a.y)
            .unwrap_or(Ordering::Equal)
            .then_with(|| a.x.partial_cmp(&b.x).unwrap_or(Ordering::Equal))
    });

    let mut lines: Vec<TextLine> = Vec::new();
    let mut current: Vec<TextSpan> = Vec::new();
    let mut current_y: Option<f32> = None;

    for span in spans {
        let y_tolerance = span.font_size * 0.3;
        match current_y {
            Some(y) if (span.y - y).abs() <= y_tolerance => current.push(span),
            _ => {
                if !current.is_empty() {
                    lines.push(TextLine::from_spans(std::mem::take(&mut current)));
                }
                current_y = Some(span.y);
                current.push(span);
            }
        }
    }

    if !current.is_empty() {
        lines.push(TextLine::from_spans(current));
    }

    lines
}

/// Text state kept between `BT` and `ET`.
#[derive(Debug, Clone)]
struct TextState {
    tm: Matrix,
    tlm: Matrix,
    font_name: Vec<u8>,
    font_size: f32,
    leading: f32,
}

impl Default for TextState {
    fn default() -> Self {
        Self {
            tm: Matrix::IDENTITY,
            tlm: Matrix::IDENTITY,
            font_name: Vec::new(),
            font_size: 12.0,
            leading: 0.0,
        }
    }
}

impl TextState {
    fn move_line(&mut self, tx: f32, ty: f32) {
        self.tlm = Matrix::translation(tx, ty).then(&self.tlm);
        self.tm = self.tlm;
    }

    fn next_line(&mut self) {
        self.move_line(0.0, -self.leading);
    }

    /// Advance along the baseline by `tx` text space units.
    fn advance(&mut self, tx: f32) {
        self.tm = Matrix::translation(tx, 0.0).then(&self.tm);
    }
}

/// Interpret decoded content stream bytes.
///
/// `decode` turns a string operand into text given the current font's
/// resource name.
pub fn interpret<F>(content: &[u8], decode: F) -> Result<PageLayout>
where
    F: Fn(&[u8], &[u8]) -> String,
{
    interpret_with_ctm(content, Matrix::IDENTITY, decode)
}

/// Interpret content painted under an initial transform, as a form XObject's
/// content is.
pub fn interpret_with_ctm<F>(content: &[u8], ctm: Matrix, decode: F) -> Result<PageLayout>
where
    F: Fn(&[u8], &[u8]) -> String,
{
    let content = Content::decode(content).map_err(|e| Error::PdfParse(e.to_string()))?;
    let mut interpreter = Interpreter::new(ctm, decode);
    for op in &content.operations {
        interpreter.apply(&op.operator, &op.operands);
    }
    Ok(interpreter.layout)
}

struct Interpreter<F> {
    decode: F,
    ctm: Matrix,
    stack: Vec<(Matrix, TextState)>,
    text: TextState,
    in_text: bool,
    path: Vec<Segment>,
    current_point: Option<(f32, f32)>,
    subpath_start: Option<(f32, f32)>,
    layout: PageLayout,
}

impl<F> Interpreter<F>
where
    F: Fn(&[u8], &[u8]) -> String,
{
    fn new(ctm: Matrix, decode: F) -> Self {
        Self {
            decode,
            ctm,
            stack: Vec::new(),
            text: TextState::default(),
            in_text: false,
            path: Vec::new(),
            current_point: None,
            subpath_start: None,
            layout: PageLayout::default(),
        }
    }

    fn apply(&mut self, operator: &str, operands: &[Object]) {
        let num = |i: usize| operands.get(i).and_then(get_number);

        match operator {
            "q" => self.stack.push((self.ctm, self.text.clone())),
            "Q" => {
                if let Some((ctm, text)) = self.stack.pop() {
                    self.ctm = ctm;
                    // Text state parameters are part of the graphics state, the
                    // text matrices are not.
                    self.text.font_name = text.font_name;
                    self.text.font_size = text.font_size;
                    self.text.leading = text.leading;
                }
            }
            "cm" => {
                if let Some(m) = matrix_operands(operands) {
                    self.ctm = m.then(&self.ctm);
                }
            }

            "BT" => {
                self.in_text = true;
                self.text.tm = Matrix::IDENTITY;
                self.text.tlm = Matrix::IDENTITY;
            }
            "ET" => self.in_text = false,
            "Tf" => {
                if let Some(Object::Name(name)) = operands.first() {
                    self.text.font_name = name.clone();
                }
                if let Some(size) = num(1) {
                    self.text.font_size = size;
                }
            }
            "TL" => {
                if let Some(leading) = num(0) {
                    self.text.leading = leading;
                }
            }
            "Td" => {
                if let (Some(tx), Some(ty)) = (num(0), num(1)) {
                    self.text.move_line(tx, ty);
                }
            }
            "TD" => {
                if let (Some(tx), Some(ty)) = (num(0), num(1)) {
                    self.text.leading = -ty;
                    self.text.move_line(tx, ty);
                }
            }
            "Tm" => {
                if let Some(m) = matrix_operands(operands) {
                    self.text.tm = m;
                    self.text.tlm = m;
                }
            }
            "T*" => self.text.next_line(),
            "Tj" => {
                if let Some(Object::String(bytes, _)) = operands.first() {
                    self.show_text(bytes);
                }
            }
            "'" => {
                self.text.next_line();
                if let Some(Object::String(bytes, _)) = operands.first() {
                    self.show_text(bytes);
                }
            }
            "\"" => {
                self.text.next_line();
                if let Some(Object::String(bytes, _)) = operands.get(2) {
                    self.show_text(bytes);
                }
            }
            "TJ" => {
                if let Some(Object::Array(items)) = operands.first() {
                    self.show_text_array(items);
                }
            }

            "m" => {
                if let (Some(x), Some(y)) = (num(0), num(1)) {
                    let p = self.ctm.apply(x, y);
                    self.current_point = Some(p);
                    self.subpath_start = Some(p);
                }
            }
            "l" => {
                if let (Some(x), Some(y)) = (num(0), num(1)) {
                    let p = self.ctm.apply(x, y);
                    if let Some((x0, y0)) = self.current_point {
                        self.path.push(Segment::new(x0, y0, p.0, p.1));
                    }
                    self.current_point = Some(p);
                }
            }
            "re" => {
                if let (Some(x), Some(y), Some(w), Some(h)) = (num(0), num(1), num(2), num(3)) {
                    let corners = [
                        self.ctm.apply(x, y),
                        self.ctm.apply(x + w, y),
                        self.ctm.apply(x + w, y + h),
                        self.ctm.apply(x, y + h),
                    ];
                    for i in 0..4 {
                        let (a, b) = (corners[i], corners[(i + 1) % 4]);
                        self.path.push(Segment::new(a.0, a.1, b.0, b.1));
                    }
                    self.current_point = Some(corners[0]);
                    self.subpath_start = Some(corners[0]);
                }
            }
            "h" => self.close_subpath(),
            "S" | "f" | "F" | "f*" | "B" | "B*" => self.paint_path(),
            "s" | "b" | "b*" => {
                self.close_subpath();
                self.paint_path();
            }
            "n" => self.discard_path(),

            "Do" => {
                if let Some(Object::Name(name)) = operands.first() {
                    self.layout.xobject_calls.push(XObjectCall {
                        name: name.clone(),
                        ctm: self.ctm,
                    });
                }
            }
            _ => {}
        }
    }

    fn close_subpath(&mut self) {
        if let (Some((x0, y0)), Some((x1, y1))) = (self.current_point, self.subpath_start) {
            if (x0, y0) != (x1, y1) {
                self.path.push(Segment::new(x0, y0, x1, y1));
            }
        }
        self.current_point = self.subpath_start;
    }

    fn paint_path(&mut self) {
        self.layout.segments.append(&mut self.path);
        self.discard_path();
    }

    fn discard_path(&mut self) {
        self.path.clear();
        self.current_point = None;
        self.subpath_start = None;
    }

    fn show_text(&mut self, bytes: &[u8]) {
        if !self.in_text {
            return;
        }
        let text = (self.decode)(&self.text.font_name, bytes);
        self.push_span(text);
    }

    fn show_text_array(&mut self, items: &[Object]) {
        if !self.in_text {
            return;
        }

        // Adjustments are in thousandths of text space; large negative values
        // are word gaps.
        let space_threshold = 200.0;
        let mut combined = String::new();
        let start = self.text.tm;
        let mut offset = 0.0;

        for item in items {
            match item {
                Object::String(bytes, _) => {
                    let text = (self.decode)(&self.text.font_name, bytes);
                    offset += text_advance(&text, self.text.font_size);
                    combined.push_str(&text);
                }
                other => {
                    if let Some(adjustment) = get_number(other) {
                        offset -= adjustment / 1000.0 * self.text.font_size;
                        let ends_with_word = combined
                            .chars()
                            .last()
                            .is_some_and(|c| !c.is_whitespace() && !is_spaceless_script_char(c));
                        if -adjustment > space_threshold && ends_with_word {
                            combined.push(' ');
                        }
                    }
                }
            }
        }

        self.record_span(combined, start);
        self.text.tm = start;
        self.text.advance(offset);
    }

    fn push_span(&mut self, text: String) {
        let start = self.text.tm;
        let advance = text_advance(&text, self.text.font_size);
        self.record_span(text, start);
        self.text.advance(advance);
    }

    fn record_span(&mut self, text: String, tm: Matrix) {
        if text.trim().is_empty() {
            return;
        }
        let trm = tm.then(&self.ctm);
        let (x, y) = trm.apply(0.0, 0.0);
        let font_size = self.text.font_size * trm.vertical_scale();
        let span = TextSpan::new(text, x, y, font_size)
            .with_font(String::from_utf8_lossy(&self.text.font_name));
        self.layout.spans.push(span);
    }
}

/// The `/Matrix` of a form XObject, identity when absent or malformed.
pub fn form_matrix(form: &Stream) -> Matrix {
    form.dict
        .get(b"Matrix")
        .and_then(Object::as_array)
        .ok()
        .and_then(|values| matrix_operands(values))
        .unwrap_or(Matrix::IDENTITY)
}

fn text_advance(text: &str, font_size: f32) -> f32 {
    text.chars().count() as f32 * font_size * GLYPH_WIDTH_FACTOR
}

fn matrix_operands(operands: &[Object]) -> Option<Matrix> {
    if operands.len() < 6 {
        return None;
    }
    let v: Vec<f32> = operands[..6].iter().filter_map(get_number).collect();
    (v.len() == 6).then(|| Matrix::new(v[0], v[1], v[2], v[3], v[4], v[5]))
}

/// Helper to extract number from PDF object.
fn get_number(obj: &Object) -> Option<f32> {
    match obj {
        Object::Integer(i) => Some(*i as f32),
        Object::Real(r) => Some(*r),
        _ => None,
    }
}

/// Check if character is from a script that doesn't use word spaces.
/// Chinese and Japanese don't use spaces between words, but Korean does.
fn is_spaceless_script_char(c: char) -> bool {
    let code = c as u32;

    // CJK Unified Ideographs and extensions
    (0x4E00..=0x9FFF).contains(&code)
    || (0x3400..=0x4DBF).contains(&code)
    || (0x20000..=0x2EBEF).contains(&code)
    // Hiragana, Katakana
    || (0x3040..=0x30FF).contains(&code)
    // CJK Symbols and Punctuation
    || (0x3000..=0x303F).contains(&code)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::geometry::Orientation;
    use lopdf::dictionary;

    fn run(content: &str) -> PageLayout {
        interpret(content.as_bytes(), |_, bytes| {
            String::from_utf8_lossy(bytes).to_string()
        })
        .unwrap()
    }

    #[test]
    fn test_td_positions_span() {
        let layout = run("BT /F1 12 Tf 100 700 Td (Hello) Tj ET");
        assert_eq!(layout.spans.len(), 1);
        let span = &layout.spans[0];
        assert_eq!(span.text, "Hello");
        assert_eq!((span.x, span.y), (100.0, 700.0));
        assert_eq!(span.font_size, 12.0);
        assert_eq!(span.font_name, "F1");
        assert_eq!(span.width, 30.0);
    }

    #[test]
    fn test_cm_scales_font_and_position() {
        let layout = run("q 2 0 0 2 10 20 cm BT /F1 10 Tf 5 5 Td (x) Tj ET Q");
        let span = &layout.spans[0];
        assert_eq!((span.x, span.y), (20.0, 30.0));
        assert_eq!(span.font_size, 20.0);
    }

    #[test]
    fn test_leading_and_next_line() {
        let layout = run("BT /F1 10 Tf 14 TL 50 500 Td (one) Tj T* (two) Tj T* (three) Tj ET");
        let ys: Vec<f32> = layout.spans.iter().map(|s| s.y).collect();
        assert_eq!(ys, vec![500.0, 486.0, 472.0]);
        assert_eq!(layout.text(), "one\ntwo\nthree");
    }

    #[test]
    fn test_consecutive_tj_advance() {
        let layout = run("BT /F1 10 Tf 0 0 Td (ab) Tj (cd) Tj ET");
        assert_eq!(layout.spans[1].x, 10.0);
        assert_eq!(layout.text(), "abcd");
    }

    #[test]
    fn test_tj_array_word_gap() {
        let layout = run("BT /F1 10 Tf 0 0 Td [(Hello) -250 (World) 10 (!)] TJ ET");
        assert_eq!(layout.spans.len(), 1);
        assert_eq!(layout.spans[0].text, "Hello World!");
    }

    #[test]
    fn test_text_outside_bt_is_ignored() {
        let layout = run("(stray) Tj BT ET");
        assert!(layout.spans.is_empty());
    }

    #[test]
    fn test_lines_are_top_to_bottom() {
        let layout = run(
            "BT /F1 12 Tf 1 0 0 1 200 600 Tm (right) Tj 1 0 0 1 50 600 Tm (left) Tj \
             1 0 0 1 50 700 Tm (top) Tj ET",
        );
        assert_eq!(layout.text(), "top\nleft right");
    }

    #[test]
    fn test_paths_become_segments() {
        let layout = run("100 700 m 300 700 l S 10 10 50 20 re f 0 0 m 5 5 l n");
        assert_eq!(layout.segments.len(), 5);
        assert_eq!(layout.segments[0].orientation(1.0), Orientation::Horizontal);
        let verticals = layout
            .segments
            .iter()
            .filter(|s| s.orientation(1.0) == Orientation::Vertical)
            .count();
        assert_eq!(verticals, 2);
    }

    #[test]
    fn test_close_path_adds_edge() {
        let layout = run("0 0 m 10 0 l 10 10 l s");
        assert_eq!(layout.segments.len(), 3);
    }

    #[test]
    fn test_do_records_call_with_ctm() {
        let layout = run("q 1 0 0 1 10 20 cm /Fm0 Do Q /Im1 Do");
        assert_eq!(
            layout.xobject_calls,
            vec![
                XObjectCall {
                    name: b"Fm0".to_vec(),
                    ctm: Matrix::translation(10.0, 20.0),
                },
                XObjectCall {
                    name: b"Im1".to_vec(),
                    ctm: Matrix::IDENTITY,
                },
            ]
        );
    }

    #[test]
    fn test_initial_ctm_applies_to_content() {
        let layout = interpret_with_ctm(
            b"BT /F1 10 Tf 5 5 Td (x) Tj ET 0 0 m 10 0 l S",
            Matrix::translation(100.0, 200.0),
            |_, bytes| String::from_utf8_lossy(bytes).to_string(),
        )
        .unwrap();
        assert_eq!((layout.spans[0].x, layout.spans[0].y), (105.0, 205.0));
        assert_eq!(layout.segments[0], Segment::new(100.0, 200.0, 110.0, 200.0));
    }

    #[test]
    fn test_form_matrix() {
        let form = Stream::new(
            lopdf::dictionary! {
                "Matrix" => vec![1.into(), 0.into(), 0.into(), 1.into(), 50.into(), (-10).into()],
            },
            vec![],
        );
        assert_eq!(form_matrix(&form), Matrix::translation(50.0, -10.0));
        assert_eq!(
            form_matrix(&Stream::new(lopdf::dictionary! {}, vec![])),
            Matrix::IDENTITY
        );
    }

    #[test]
    fn test_cjk_spans_join_without_space() {
        let line = TextLine::from_spans(vec![
            TextSpan::new("漢", 0.0, 0.0, 10.0),
            TextSpan::new("字", 20.0, 0.0, 10.0),
            TextSpan::new("ok", 40.0, 0.0, 10.0),
        ]);
        assert_eq!(line.text(), "漢字 ok");
    }
}
