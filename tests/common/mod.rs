//! Synthetic PDF fixtures for integration tests.

#![allow(dead_code)]

use std::path::{Path, PathBuf};

use lopdf::{dictionary, Dictionary, Document, Object, ObjectId, Stream};

/// Builds small PDFs page by page.
pub struct PdfBuilder {
    doc: Document,
    pages_id: ObjectId,
    kids: Vec<Object>,
}

impl PdfBuilder {
    pub fn new() -> Self {
        let mut doc = Document::with_version("1.5");
        let pages_id = doc.new_object_id();
        Self {
            doc,
            pages_id,
            kids: Vec::new(),
        }
    }

    /// Add an image or form XObject and return its id.
    pub fn add_image(&mut self, stream: Stream) -> ObjectId {
        self.doc.add_object(stream)
    }

    /// Add a page with the given content stream and named XObjects.
    pub fn page(mut self, content: &str, images: &[(&str, ObjectId)]) -> Self {
        let mut xobjects = Dictionary::new();
        for (name, id) in images {
            xobjects.set(*name, *id);
        }
        let content_id = self
            .doc
            .add_object(Stream::new(dictionary! {}, content.as_bytes().to_vec()));
        let page_id = self.doc.add_object(dictionary! {
            "Type" => "Page",
            "Parent" => self.pages_id,
            "MediaBox" => vec![0.into(), 0.into(), 612.into(), 792.into()],
            "Contents" => content_id,
            "Resources" => dictionary! { "XObject" => xobjects },
        });
        self.kids.push(page_id.into());
        self
    }

    /// Add a page whose `/Contents` is not a stream, so it cannot be read.
    pub fn broken_page(mut self) -> Self {
        let page_id = self.doc.add_object(dictionary! {
            "Type" => "Page",
            "Parent" => self.pages_id,
            "MediaBox" => vec![0.into(), 0.into(), 612.into(), 792.into()],
            "Contents" => 42,
        });
        self.kids.push(page_id.into());
        self
    }

    pub fn to_bytes(mut self) -> Vec<u8> {
        let count = self.kids.len() as i64;
        self.doc.objects.insert(
            self.pages_id,
            Object::Dictionary(dictionary! {
                "Type" => "Pages",
                "Kids" => self.kids,
                "Count" => count,
            }),
        );
        let catalog_id = self.doc.add_object(dictionary! {
            "Type" => "Catalog",
            "Pages" => self.pages_id,
        });
        self.doc.trailer.set("Root", catalog_id);

        let mut bytes = Vec::new();
        self.doc.save_to(&mut bytes).unwrap();
        bytes
    }

    pub fn save(self, dir: &Path, name: &str) -> PathBuf {
        let path = dir.join(name);
        std::fs::write(&path, self.to_bytes()).unwrap();
        path
    }
}

/// An uncompressed 8-bit image.
pub fn raw_image(width: i64, height: i64, color_space: &str, samples: Vec<u8>) -> Stream {
    Stream::new(
        dictionary! {
            "Type" => "XObject",
            "Subtype" => "Image",
            "Width" => width,
            "Height" => height,
            "ColorSpace" => color_space,
            "BitsPerComponent" => 8,
        },
        samples,
    )
}

/// A 2x2 RGB image.
pub fn rgb_image() -> Stream {
    raw_image(
        2,
        2,
        "DeviceRGB",
        vec![255, 0, 0, 0, 255, 0, 0, 0, 255, 255, 255, 255],
    )
}

/// A 1x2 CMYK image: white, then black.
pub fn cmyk_image() -> Stream {
    raw_image(1, 2, "DeviceCMYK", vec![0, 0, 0, 0, 0, 0, 0, 255])
}

/// An image in an encoding that cannot be decoded.
pub fn undecodable_image() -> Stream {
    let mut stream = raw_image(1, 1, "DeviceGray", vec![0]);
    stream.dict.set("Filter", "JBIG2Decode");
    stream
}

/// A form XObject painting `content`.
pub fn form_xobject(content: &str) -> Stream {
    Stream::new(
        dictionary! {
            "Type" => "XObject",
            "Subtype" => "Form",
            "BBox" => vec![0.into(), 0.into(), 612.into(), 792.into()],
        },
        content.as_bytes().to_vec(),
    )
}

/// A form XObject whose content is in an image codec, so it cannot be read.
pub fn undecodable_form() -> Stream {
    let mut stream = form_xobject("100 600 m 300 600 l S\n");
    stream.dict.set("Filter", "JBIG2Decode");
    stream
}

/// One line of text at a position.
pub fn text_at(text: &str, x: f32, y: f32) -> String {
    format!("BT /F1 12 Tf {x} {y} Td ({text}) Tj ET\n")
}

/// Draw a single image across part of the page.
pub fn draw_image(name: &str) -> String {
    format!("q 100 0 0 100 50 600 cm /{name} Do Q\n")
}

/// Content of a ruled 2x3 table: "Item"/"Qty" header, then two data rows.
pub fn ruled_table() -> String {
    let mut content = String::new();

    // Rows at 660, 640, 620, 600; columns at 100, 200, 300
    for y in [660, 640, 620, 600] {
        content.push_str(&format!("100 {y} m 300 {y} l S\n"));
    }
    for x in [100, 200, 300] {
        content.push_str(&format!("{x} 600 m {x} 660 l S\n"));
    }

    for (row, (item, qty)) in [("Item", "Qty"), ("Apple", "3"), ("Pear", "5")]
        .iter()
        .enumerate()
    {
        let y = 645.0 - row as f32 * 20.0;
        content.push_str(&text_at(item, 110.0, y));
        content.push_str(&text_at(qty, 210.0, y));
    }
    content
}

/// Three pages: an RGB image on page 1, a ruled table on page 2, plain text
/// on page 3.
pub fn three_page_report(dir: &Path) -> PathBuf {
    let mut builder = PdfBuilder::new();
    let image = builder.add_image(rgb_image());

    let page1 = format!("{}{}", text_at("Quarterly report", 72.0, 720.0), draw_image("Im0"));
    let page2 = format!("{}{}", text_at("Inventory", 72.0, 720.0), ruled_table());
    let page3 = text_at("The end", 72.0, 720.0);

    builder
        .page(&page1, &[("Im0", image)])
        .page(&page2, &[])
        .page(&page3, &[])
        .save(dir, "report.pdf")
}
