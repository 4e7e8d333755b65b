//! Table records.

use std::fmt;

use serde::de::{MapAccess, Visitor};
use serde::ser::SerializeMap;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// One column of a [`TableRecord`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableColumn {
    /// Column label (the column position for detected tables)
    pub label: String,
    /// Cells from top to bottom; `None` marks a position no text was assigned to
    pub cells: Vec<Option<String>>,
}

impl TableColumn {
    /// Create a column.
    pub fn new(label: impl Into<String>, cells: Vec<Option<String>>) -> Self {
        Self {
            label: label.into(),
            cells,
        }
    }
}

/// A table detected on one page, stored column-major.
///
/// Serializes as `{ "<label>": [<cell>, ...], ... }` with columns in order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TableRecord {
    /// Columns from left to right
    pub columns: Vec<TableColumn>,
}

impl TableRecord {
    /// Create an empty table record.
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a record from row-major cells.
    ///
    /// Columns are labelled by position. Short rows are padded with `None` so
    /// every column has one cell per row.
    pub fn from_rows(rows: Vec<Vec<Option<String>>>) -> Self {
        let width = rows.iter().map(Vec::len).max().unwrap_or(0);
        let mut columns: Vec<TableColumn> = (0..width)
            .map(|i| TableColumn::new(i.to_string(), Vec::with_capacity(rows.len())))
            .collect();

        for row in rows {
            let mut cells = row.into_iter();
            for column in &mut columns {
                column.cells.push(cells.next().flatten());
            }
        }

        Self { columns }
    }

    /// Add a column.
    pub fn push_column(&mut self, column: TableColumn) {
        self.columns.push(column);
    }

    /// Number of columns.
    pub fn column_count(&self) -> usize {
        self.columns.len()
    }

    /// Number of rows (length of the longest column).
    pub fn row_count(&self) -> usize {
        self.columns.iter().map(|c| c.cells.len()).max().unwrap_or(0)
    }

    /// Check if the table has no cells.
    pub fn is_empty(&self) -> bool {
        self.row_count() == 0
    }

    /// Look up a column by label.
    pub fn column(&self, label: &str) -> Option<&TableColumn> {
        self.columns.iter().find(|c| c.label == label)
    }

    /// Get a cell's text by row and column position.
    pub fn cell(&self, row: usize, column: usize) -> Option<&str> {
        self.columns
            .get(column)
            .and_then(|c| c.cells.get(row))
            .and_then(|cell| cell.as_deref())
    }

    /// Rebuild the row-major view of the table.
    pub fn rows(&self) -> Vec<Vec<Option<&str>>> {
        (0..self.row_count())
            .map(|r| {
                self.columns
                    .iter()
                    .map(|c| c.cells.get(r).and_then(|cell| cell.as_deref()))
                    .collect()
            })
            .collect()
    }
}

impl Serialize for TableRecord {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.columns.len()))?;
        for column in &self.columns {
            map.serialize_entry(&column.label, &column.cells)?;
        }
        map.end()
    }
}

impl<'de> Deserialize<'de> for TableRecord {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        struct RecordVisitor;

        impl<'de> Visitor<'de> for RecordVisitor {
            type Value = TableRecord;

            fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
                f.write_str("a map of column label to cell list")
            }

            fn visit_map<A: MapAccess<'de>>(self, mut access: A) -> Result<TableRecord, A::Error> {
                let mut record = TableRecord::new();
                while let Some((label, cells)) =
                    access.next_entry::<String, Vec<Option<String>>>()?
                {
                    record.push_column(TableColumn::new(label, cells));
                }
                Ok(record)
            }
        }

        deserializer.deserialize_map(RecordVisitor)
    }
}
