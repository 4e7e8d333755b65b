//! The unified result record.

use std::collections::BTreeMap;
use std::fmt;

use serde::de::{Error as DeError, MapAccess, Visitor};
use serde::ser::SerializeMap;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use super::{ImageRecord, TableRecord};
use crate::error::{Error, Result};

/// Tables found on each page, keyed by 1-based page index.
///
/// A page appears only when at least one strategy produced a table for it.
pub type TablesByPage = BTreeMap<u32, Vec<TableRecord>>;

/// Plain text of every page, in page order.
///
/// Stored as a sequence so pages `1..=len` are always present; serialized as a
/// map from page number (as a string) to text.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TextPageMap {
    pages: Vec<String>,
}

impl TextPageMap {
    /// Create an empty map.
    pub fn new() -> Self {
        Self::default()
    }

    /// Append the text of the next page and return its page index.
    pub fn push(&mut self, text: impl Into<String>) -> u32 {
        self.pages.push(text.into());
        self.pages.len() as u32
    }

    /// Text of a page (1-based).
    pub fn get(&self, page: u32) -> Option<&str> {
        let idx = (page as usize).checked_sub(1)?;
        self.pages.get(idx).map(String::as_str)
    }

    /// Number of pages.
    pub fn len(&self) -> usize {
        self.pages.len()
    }

    /// Check if the map has no pages.
    pub fn is_empty(&self) -> bool {
        self.pages.is_empty()
    }

    /// Iterate `(page, text)` pairs in page order.
    pub fn iter(&self) -> impl Iterator<Item = (u32, &str)> {
        self.pages
            .iter()
            .enumerate()
            .map(|(i, text)| (i as u32 + 1, text.as_str()))
    }

    /// Page indices present in the map.
    pub fn pages(&self) -> impl Iterator<Item = u32> + '_ {
        1..=self.pages.len() as u32
    }

    /// Concatenate all pages, separated by blank lines.
    pub fn joined(&self) -> String {
        self.pages.join("\n\n")
    }
}

impl FromIterator<String> for TextPageMap {
    fn from_iter<I: IntoIterator<Item = String>>(iter: I) -> Self {
        Self {
            pages: iter.into_iter().collect(),
        }
    }
}

impl Serialize for TextPageMap {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.pages.len()))?;
        for (page, text) in self.iter() {
            map.serialize_entry(&page.to_string(), text)?;
        }
        map.end()
    }
}

impl<'de> Deserialize<'de> for TextPageMap {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        struct PagesVisitor;

        impl<'de> Visitor<'de> for PagesVisitor {
            type Value = TextPageMap;

            fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
                f.write_str("a map of page number to text")
            }

            fn visit_map<A: MapAccess<'de>>(
                self,
                mut access: A,
            ) -> std::result::Result<TextPageMap, A::Error> {
                let mut pages = BTreeMap::new();
                while let Some((key, text)) = access.next_entry::<String, String>()? {
                    let page: u32 = key
                        .parse()
                        .map_err(|_| A::Error::custom(format!("invalid page key {key:?}")))?;
                    pages.insert(page, text);
                }

                // Keys must be exactly 1..=n.
                if let Some((i, page)) = pages
                    .keys()
                    .enumerate()
                    .find(|(i, page)| **page != *i as u32 + 1)
                {
                    return Err(A::Error::custom(format!(
                        "page {} found where page {} was expected",
                        page,
                        i + 1
                    )));
                }

                Ok(pages.into_values().collect())
            }
        }

        deserializer.deserialize_map(PagesVisitor)
    }
}

/// Everything extracted from one document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResultRecord {
    /// Source path as given by the caller
    pub pdf: String,

    /// Text of every page
    pub text: TextPageMap,

    /// Tables per page, from both detection strategies
    pub tables: TablesByPage,

    /// Saved images in extraction order
    pub images: Vec<ImageRecord>,
}

impl ResultRecord {
    /// Assemble a record from the three extraction passes.
    pub fn new(
        pdf: impl Into<String>,
        text: TextPageMap,
        tables: TablesByPage,
        images: Vec<ImageRecord>,
    ) -> Self {
        Self {
            pdf: pdf.into(),
            text,
            tables,
            images,
        }
    }

    /// Number of pages in the source document.
    pub fn page_count(&self) -> usize {
        self.text.len()
    }

    /// Total number of tables across all pages.
    pub fn table_count(&self) -> usize {
        self.tables.values().map(Vec::len).sum()
    }

    /// Check that every table and image refers to an existing page.
    pub fn validate(&self) -> Result<()> {
        let page_count = self.page_count() as u32;
        let in_range = |page: u32| (1..=page_count).contains(&page);

        if let Some(page) = self.tables.keys().copied().find(|p| !in_range(*p)) {
            return Err(Error::PageOutOfRange(page, page_count));
        }
        if let Some(image) = self.images.iter().find(|img| !in_range(img.page)) {
            return Err(Error::PageOutOfRange(image.page, page_count));
        }
        Ok(())
    }
}
