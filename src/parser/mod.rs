//! PDF parsing module.

mod document;
mod filter;
pub mod geometry;
mod layout;

pub use document::{decode_text_simple, ImageXObject, PageId, PdfDocument};
pub use filter::{decode_stream, Decoded, ImageCodec};
pub use geometry::{Matrix, Orientation, Segment};
pub use layout::{
    form_matrix, group_spans_into_lines, interpret, interpret_with_ctm, PageLayout, TextLine,
    TextSpan, XObjectCall,
};
