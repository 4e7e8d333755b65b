//! Document access backed by `lopdf`.
//!
//! [`PdfDocument`] is the only type that touches `lopdf::Document` directly
//! for page enumeration, content streams, fonts, and embedded images. The
//! extractors each open their own instance.

use std::collections::{BTreeMap, HashSet};
use std::path::Path;

use lopdf::{Dictionary, Document as LopdfDocument, Object, ObjectId, Stream};

use super::filter::decode_stream;
use crate::detect::sniff_path;
use crate::error::{Error, Result};

/// Page identifier: (object number, generation number).
pub type PageId = ObjectId;

/// Maximum depth when following `/Parent` links or nested form XObjects.
const MAX_NESTING: usize = 32;

/// An image XObject reachable from a page.
#[derive(Debug, Clone, Copy)]
pub struct ImageXObject<'a> {
    /// Object id of the image stream
    pub id: ObjectId,
    /// The image stream (dictionary + raw content)
    pub stream: &'a Stream,
}

/// An opened PDF document.
pub struct PdfDocument {
    doc: LopdfDocument,
}

impl PdfDocument {
    /// Open a PDF file.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        sniff_path(path)?;

        let doc = LopdfDocument::load(path)?;
        Ok(Self::from_lopdf(doc))
    }

    /// Load a PDF held in memory.
    pub fn from_bytes(data: &[u8]) -> Result<Self> {
        crate::detect::sniff_bytes(data)?;
        let doc = LopdfDocument::load_mem(data)?;
        Ok(Self::from_lopdf(doc))
    }

    fn from_lopdf(doc: LopdfDocument) -> Self {
        if doc.is_encrypted() {
            log::warn!("Document is encrypted; extracted content may be incomplete");
        }
        Self { doc }
    }

    /// Direct access to the underlying `lopdf::Document`.
    pub fn raw_doc(&self) -> &LopdfDocument {
        &self.doc
    }

    /// PDF version string from the header.
    pub fn version(&self) -> &str {
        &self.doc.version
    }

    pub fn is_encrypted(&self) -> bool {
        self.doc.is_encrypted()
    }

    /// All pages as (page number → PageId), page numbers starting at 1.
    pub fn pages(&self) -> BTreeMap<u32, PageId> {
        self.doc.get_pages()
    }

    /// Number of pages.
    pub fn page_count(&self) -> u32 {
        self.doc.get_pages().len() as u32
    }

    /// Look up a page by number.
    pub fn page_id(&self, page: u32) -> Result<PageId> {
        let pages = self.doc.get_pages();
        pages
            .get(&page)
            .copied()
            .ok_or(Error::PageOutOfRange(page, pages.len() as u32))
    }

    /// Follow a reference chain to the referenced object.
    pub fn resolve<'a>(&'a self, obj: &'a Object) -> Result<&'a Object> {
        let mut current = obj;
        for _ in 0..MAX_NESTING {
            match current {
                Object::Reference(id) => current = self.doc.get_object(*id)?,
                other => return Ok(other),
            }
        }
        Err(Error::PdfParse("Reference chain too deep".to_string()))
    }

    /// Resolve `key` in `dict` to a dictionary, following references.
    pub fn resolve_dict<'a>(&'a self, dict: &'a Dictionary, key: &[u8]) -> Option<&'a Dictionary> {
        let obj = dict.get(key).ok()?;
        match self.resolve(obj).ok()? {
            Object::Dictionary(d) => Some(d),
            Object::Stream(s) => Some(&s.dict),
            _ => None,
        }
    }

    /// Return the decoded content stream bytes for a page.
    ///
    /// A page without `/Contents` has empty content.
    pub fn page_content(&self, page_id: PageId) -> Result<Vec<u8>> {
        let page_dict = self.doc.get_dictionary(page_id)?;

        let contents = match page_dict.get(b"Contents") {
            Ok(contents) => contents,
            Err(_) => return Ok(Vec::new()),
        };

        match self.resolve(contents)? {
            Object::Stream(s) => self.stream_content(s),
            Object::Array(arr) => {
                let mut content = Vec::new();
                for obj in arr {
                    if let Object::Stream(s) = self.resolve(obj)? {
                        content.extend_from_slice(&self.stream_content(s)?);
                        content.push(b'\n');
                    }
                }
                Ok(content)
            }
            _ => Err(Error::PdfParse("Invalid content stream".to_string())),
        }
    }

    /// Decoded bytes of a content stream or form XObject.
    pub fn stream_content(&self, stream: &Stream) -> Result<Vec<u8>> {
        let decoded = decode_stream(self, stream)?;
        match decoded.codec {
            None => Ok(decoded.data),
            Some(codec) => Err(Error::UnsupportedFilter(format!(
                "{} in a content stream",
                codec.name()
            ))),
        }
    }

    /// Resource dictionary of a page, inherited from ancestors when absent.
    pub fn page_resources(&self, page_id: PageId) -> Option<&Dictionary> {
        let mut node = self.doc.get_dictionary(page_id).ok()?;
        for _ in 0..MAX_NESTING {
            if let Some(resources) = self.resolve_dict(node, b"Resources") {
                return Some(resources);
            }
            node = self.resolve_dict(node, b"Parent")?;
        }
        None
    }

    /// Fonts available to a page, keyed by resource name.
    pub fn page_fonts(&self, page_id: PageId) -> BTreeMap<Vec<u8>, &Dictionary> {
        self.doc.get_page_fonts(page_id).unwrap_or_default()
    }

    /// Fonts of a resource dictionary, such as a form XObject's.
    pub fn resource_fonts<'a>(
        &'a self,
        resources: &'a Dictionary,
    ) -> BTreeMap<Vec<u8>, &'a Dictionary> {
        let mut fonts = BTreeMap::new();
        if let Some(font_dict) = self.resolve_dict(resources, b"Font") {
            for (name, obj) in font_dict.iter() {
                if let Ok(Object::Dictionary(font)) = self.resolve(obj) {
                    fonts.insert(name.clone(), font);
                }
            }
        }
        fonts
    }

    /// The form XObject registered as `name` in `resources`.
    ///
    /// `None` when the name is missing or refers to anything but a form.
    pub fn form_xobject<'a>(
        &'a self,
        resources: &'a Dictionary,
        name: &[u8],
    ) -> Option<&'a Stream> {
        let xobjects = self.resolve_dict(resources, b"XObject")?;
        let stream = self.resolve(xobjects.get(name).ok()?).ok()?.as_stream().ok()?;
        match stream.dict.get(b"Subtype").and_then(Object::as_name) {
            Ok(b"Form") => Some(stream),
            _ => None,
        }
    }

    /// Decode a string operand using the named font's encoding.
    ///
    /// Falls back to [`decode_text_simple`] when the font or its encoding is
    /// unavailable.
    pub fn decode_text(
        &self,
        fonts: &BTreeMap<Vec<u8>, &Dictionary>,
        font_name: &[u8],
        bytes: &[u8],
    ) -> String {
        if let Some(font_dict) = fonts.get(font_name) {
            if let Ok(enc) = font_dict.get_font_encoding(&self.doc) {
                if let Ok(text) = LopdfDocument::decode_text(&enc, bytes) {
                    return text;
                }
            }
        }
        decode_text_simple(bytes)
    }

    /// Image XObjects reachable from a page, in resource order.
    ///
    /// Form XObjects are searched recursively; each image is reported once.
    pub fn page_images(&self, page_id: PageId) -> Vec<ImageXObject<'_>> {
        let mut images = Vec::new();
        let mut seen = HashSet::new();
        if let Some(resources) = self.page_resources(page_id) {
            self.collect_images(resources, 0, &mut seen, &mut images);
        }
        images
    }

    fn collect_images<'a>(
        &'a self,
        resources: &'a Dictionary,
        depth: usize,
        seen: &mut HashSet<ObjectId>,
        images: &mut Vec<ImageXObject<'a>>,
    ) {
        if depth > MAX_NESTING {
            return;
        }
        let Some(xobjects) = self.resolve_dict(resources, b"XObject") else {
            return;
        };

        for (name, obj) in xobjects.iter() {
            let Ok(id) = obj.as_reference() else {
                log::debug!(
                    "Skipping inline XObject {}",
                    String::from_utf8_lossy(name)
                );
                continue;
            };
            if !seen.insert(id) {
                continue;
            }
            let stream = match self.doc.get_object(id) {
                Ok(Object::Stream(stream)) => stream,
                Ok(_) => {
                    log::warn!(
                        "XObject {} ({} {} R) is not a stream, skipping",
                        String::from_utf8_lossy(name),
                        id.0,
                        id.1
                    );
                    continue;
                }
                Err(e) => {
                    log::warn!(
                        "XObject {} ({} {} R) cannot be resolved, skipping: {}",
                        String::from_utf8_lossy(name),
                        id.0,
                        id.1,
                        e
                    );
                    continue;
                }
            };

            match stream.dict.get(b"Subtype").and_then(Object::as_name) {
                Ok(b"Image") => images.push(ImageXObject { id, stream }),
                Ok(b"Form") => {
                    if let Some(form_resources) = self.resolve_dict(&stream.dict, b"Resources") {
                        self.collect_images(form_resources, depth + 1, seen, images);
                    }
                }
                _ => {}
            }
        }
    }
}

/// Simple text decoding fallback when no encoding is available.
pub fn decode_text_simple(bytes: &[u8]) -> String {
    // UTF-16BE with BOM
    if bytes.len() >= 2 && bytes[0] == 0xFE && bytes[1] == 0xFF {
        let utf16: Vec<u16> = bytes[2..]
            .chunks_exact(2)
            .map(|c| u16::from_be_bytes([c[0], c[1]]))
            .collect();
        return String::from_utf16_lossy(&utf16);
    }

    if let Ok(s) = std::str::from_utf8(bytes) {
        return s.to_string();
    }

    // Latin-1
    bytes.iter().map(|&b| b as char).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use lopdf::dictionary;

    fn two_page_doc() -> LopdfDocument {
        let mut doc = LopdfDocument::with_version("1.5");
        let pages_id = doc.new_object_id();
        let image_id = doc.add_object(Stream::new(
            dictionary! {
                "Type" => "XObject",
                "Subtype" => "Image",
                "Width" => 1,
                "Height" => 1,
                "ColorSpace" => "DeviceGray",
                "BitsPerComponent" => 8,
            },
            vec![0x80],
        ));
        let form_id = doc.add_object(Stream::new(
            dictionary! {
                "Type" => "XObject",
                "Subtype" => "Form",
                "Resources" => dictionary! {
                    "XObject" => dictionary! { "Inner" => image_id },
                },
            },
            b"/Inner Do".to_vec(),
        ));
        let content_id = doc.add_object(Stream::new(dictionary! {}, b"BT ET".to_vec()));
        let page1 = doc.add_object(dictionary! {
            "Type" => "Page",
            "Parent" => pages_id,
            "Contents" => content_id,
        });
        let page2 = doc.add_object(dictionary! {
            "Type" => "Page",
            "Parent" => pages_id,
            "Resources" => dictionary! {
                "XObject" => dictionary! { "Fm0" => form_id, "Im0" => image_id },
            },
        });
        doc.objects.insert(
            pages_id,
            Object::Dictionary(dictionary! {
                "Type" => "Pages",
                "Kids" => vec![page1.into(), page2.into()],
                "Count" => 2,
                "Resources" => dictionary! {
                    "XObject" => dictionary! { "Im0" => image_id },
                },
            }),
        );
        let catalog_id = doc.add_object(dictionary! {
            "Type" => "Catalog",
            "Pages" => pages_id,
        });
        doc.trailer.set("Root", catalog_id);
        doc
    }

    #[test]
    fn test_decode_text_simple_utf8() {
        assert_eq!(decode_text_simple(b"Hello"), "Hello");
    }

    #[test]
    fn test_decode_text_simple_latin1() {
        let bytes = vec![0x48, 0x65, 0x6C, 0x6C, 0xE9];
        assert_eq!(decode_text_simple(&bytes), "Hellé");
    }

    #[test]
    fn test_decode_text_simple_utf16be() {
        let bytes = vec![0xFE, 0xFF, 0x00, 0x48, 0x00, 0x69];
        assert_eq!(decode_text_simple(&bytes), "Hi");
    }

    #[test]
    fn test_pages_and_content() {
        let pdf = PdfDocument::from_lopdf(two_page_doc());
        assert_eq!(pdf.page_count(), 2);

        let page1 = pdf.page_id(1).unwrap();
        assert_eq!(pdf.page_content(page1).unwrap(), b"BT ET".to_vec());

        let page2 = pdf.page_id(2).unwrap();
        assert!(pdf.page_content(page2).unwrap().is_empty());

        assert!(matches!(pdf.page_id(3), Err(Error::PageOutOfRange(3, 2))));
    }

    #[test]
    fn test_resources_are_inherited() {
        let pdf = PdfDocument::from_lopdf(two_page_doc());
        let page1 = pdf.page_id(1).unwrap();
        let resources = pdf.page_resources(page1).unwrap();
        assert!(resources.has(b"XObject"));
        assert_eq!(pdf.page_images(page1).len(), 1);
    }

    #[test]
    fn test_images_found_through_forms_once() {
        let pdf = PdfDocument::from_lopdf(two_page_doc());
        let page2 = pdf.page_id(2).unwrap();
        let images = pdf.page_images(page2);
        assert_eq!(images.len(), 1);
    }

    #[test]
    fn test_dangling_image_reference_is_skipped() {
        let mut doc = two_page_doc();
        let image_id = doc
            .objects
            .iter()
            .find_map(|(id, obj)| match obj {
                Object::Stream(s)
                    if matches!(s.dict.get(b"Subtype").and_then(Object::as_name), Ok(b"Image")) =>
                {
                    Some(*id)
                }
                _ => None,
            })
            .unwrap();
        let page2 = doc.get_pages()[&2];
        doc.get_dictionary_mut(page2).unwrap().set(
            "Resources",
            dictionary! {
                "XObject" => dictionary! { "Gone" => (999u32, 0u16), "Im0" => image_id },
            },
        );

        let pdf = PdfDocument::from_lopdf(doc);
        let images = pdf.page_images(pdf.page_id(2).unwrap());
        assert_eq!(images.len(), 1);
        assert_eq!(images[0].id, image_id);
    }

    #[test]
    fn test_filtered_content_and_forms() {
        let mut doc = two_page_doc();
        let content_id = doc.add_object(Stream::new(
            dictionary! { "Filter" => "ASCIIHexDecode" },
            b"42 54 20 45 54>".to_vec(),
        ));
        let page1 = doc.get_pages()[&1];
        doc.get_dictionary_mut(page1)
            .unwrap()
            .set("Contents", content_id);

        let pdf = PdfDocument::from_lopdf(doc);
        let page1 = pdf.page_id(1).unwrap();
        assert_eq!(pdf.page_content(page1).unwrap(), b"BT ET".to_vec());

        let page2 = pdf.page_id(2).unwrap();
        let resources = pdf.page_resources(page2).unwrap();
        let form = pdf.form_xobject(resources, b"Fm0").unwrap();
        assert_eq!(pdf.stream_content(form).unwrap(), b"/Inner Do".to_vec());
        // Images are not forms
        assert!(pdf.form_xobject(resources, b"Im0").is_none());
        assert!(pdf.form_xobject(resources, b"Missing").is_none());
    }

    #[test]
    fn test_image_codec_is_not_content() {
        let pdf = PdfDocument::from_lopdf(two_page_doc());
        let stream = Stream::new(dictionary! { "Filter" => "JBIG2Decode" }, vec![0]);
        assert!(matches!(
            pdf.stream_content(&stream),
            Err(Error::UnsupportedFilter(_))
        ));
    }

    #[test]
    fn test_from_bytes_rejects_non_pdf() {
        assert!(matches!(
            PdfDocument::from_bytes(b"not a pdf at all"),
            Err(Error::UnknownFormat)
        ));
    }
}
