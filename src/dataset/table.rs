//! In-memory tabular dataset: named `f32` columns, row-major storage.

use serde::{Deserialize, Serialize};

use super::DatasetError;
use super::encode::Encoding;

/// Meaning of a column's values.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ColumnKind {
    /// Bin content used as a classifier input.
    Feature,
    /// Bin-center time (s).
    Time,
    /// Bin content (V).
    Amplitude,
    /// Synthetic event drawn from a waveform's density.
    Event,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Column {
    pub name: String,
    pub kind: ColumnKind,
}

/// One named table (a "tree" in the training engine's vocabulary).
#[derive(Debug, Clone, PartialEq)]
pub struct Table {
    name: String,
    columns: Vec<Column>,
    values: Vec<f32>,
    /// Source waveform per row; empty when rows carry no waveform identity.
    sources: Vec<String>,
}

impl Table {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            columns: Vec::new(),
            values: Vec::new(),
            sources: Vec::new(),
        }
    }

    pub(crate) fn from_parts(
        name: String,
        columns: Vec<Column>,
        values: Vec<f32>,
        sources: Vec<String>,
    ) -> Result<Self, DatasetError> {
        let mut table = Self::new(name);
        for column in columns {
            table.add_column(column.name, column.kind)?;
        }
        let width = table.columns.len();
        let ragged = if width == 0 {
            !values.is_empty()
        } else {
            values.len() % width != 0
        };
        if ragged {
            return Err(DatasetError::DataSizeMismatch { table: table.name });
        }
        table.values = values;
        if !sources.is_empty() && sources.len() != table.row_count() {
            return Err(DatasetError::DataSizeMismatch { table: table.name });
        }
        table.sources = sources;
        Ok(table)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn columns(&self) -> &[Column] {
        &self.columns
    }

    pub fn column_count(&self) -> usize {
        self.columns.len()
    }

    pub fn row_count(&self) -> usize {
        if self.columns.is_empty() {
            0
        } else {
            self.values.len() / self.columns.len()
        }
    }

    pub fn is_empty(&self) -> bool {
        self.row_count() == 0
    }

    /// Declare a column. The schema is frozen once the first row is appended.
    pub fn add_column(&mut self, name: impl Into<String>, kind: ColumnKind) -> Result<(), DatasetError> {
        let name = name.into();
        if !self.values.is_empty() {
            return Err(DatasetError::SchemaFrozen { table: self.name.clone() });
        }
        if self.columns.iter().any(|column| column.name == name) {
            return Err(DatasetError::DuplicateColumn {
                table: self.name.clone(),
                column: name,
            });
        }
        self.columns.push(Column { name, kind });
        Ok(())
    }

    pub fn append_row(&mut self, values: &[f32]) -> Result<(), DatasetError> {
        if !self.sources.is_empty() {
            return Err(DatasetError::MixedRowIdentity { table: self.name.clone() });
        }
        self.push_values(values)
    }

    /// Append a row that remembers which waveform it came from.
    pub fn append_row_from(&mut self, source: impl Into<String>, values: &[f32]) -> Result<(), DatasetError> {
        if self.sources.len() != self.row_count() {
            return Err(DatasetError::MixedRowIdentity { table: self.name.clone() });
        }
        self.push_values(values)?;
        self.sources.push(source.into());
        Ok(())
    }

    fn push_values(&mut self, values: &[f32]) -> Result<(), DatasetError> {
        if self.columns.is_empty() || values.len() != self.columns.len() {
            return Err(DatasetError::RowLength {
                table: self.name.clone(),
                expected: self.columns.len(),
                found: values.len(),
            });
        }
        self.values.extend_from_slice(values);
        Ok(())
    }

    pub fn row(&self, index: usize) -> Option<&[f32]> {
        let width = self.columns.len();
        if width == 0 {
            return None;
        }
        self.values.get(index * width..(index + 1) * width)
    }

    pub fn rows(&self) -> impl Iterator<Item = &[f32]> {
        self.values.chunks_exact(self.columns.len().max(1))
    }

    /// Row-major values of the whole table.
    pub fn values(&self) -> &[f32] {
        &self.values
    }

    pub fn sources(&self) -> &[String] {
        &self.sources
    }

    pub fn source(&self, index: usize) -> Option<&str> {
        self.sources.get(index).map(String::as_str)
    }
}

/// A set of tables sharing one encoding, persisted together.
#[derive(Debug, Clone, PartialEq)]
pub struct Dataset {
    pub name: String,
    pub encoding: Encoding,
    /// Bin count shared by every waveform that went into the dataset.
    pub bin_count: usize,
    /// Seed used by the resampled encoding.
    pub resample_seed: Option<u64>,
    pub tables: Vec<Table>,
}

impl Dataset {
    pub fn new(name: impl Into<String>, encoding: Encoding, bin_count: usize) -> Self {
        Self {
            name: name.into(),
            encoding,
            bin_count,
            resample_seed: None,
            tables: Vec::new(),
        }
    }

    pub fn table(&self, name: &str) -> Option<&Table> {
        self.tables.iter().find(|table| table.name() == name)
    }

    pub fn total_rows(&self) -> usize {
        self.tables.iter().map(Table::row_count).sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn two_columns() -> Table {
        let mut table = Table::new("t");
        table.add_column("x", ColumnKind::Time).unwrap();
        table.add_column("y", ColumnKind::Amplitude).unwrap();
        table
    }

    #[test]
    fn rows_follow_schema() {
        let mut table = two_columns();
        table.append_row(&[1.0, 2.0]).unwrap();
        table.append_row(&[3.0, 4.0]).unwrap();
        assert_eq!(table.row_count(), 2);
        assert_eq!(table.row(1), Some(&[3.0, 4.0][..]));
        assert_eq!(table.row(2), None);
        assert_eq!(table.rows().count(), 2);
        assert!(matches!(
            table.append_row(&[1.0]),
            Err(DatasetError::RowLength { expected: 2, found: 1, .. })
        ));
    }

    #[test]
    fn schema_freezes_after_first_row() {
        let mut table = two_columns();
        assert!(matches!(
            table.add_column("x", ColumnKind::Time),
            Err(DatasetError::DuplicateColumn { .. })
        ));
        table.append_row(&[0.0, 0.0]).unwrap();
        assert!(matches!(
            table.add_column("z", ColumnKind::Feature),
            Err(DatasetError::SchemaFrozen { .. })
        ));
    }

    #[test]
    fn row_identity_is_all_or_nothing() {
        let mut table = two_columns();
        table.append_row_from("w1", &[0.0, 1.0]).unwrap();
        assert_eq!(table.source(0), Some("w1"));
        assert!(matches!(
            table.append_row(&[0.0, 1.0]),
            Err(DatasetError::MixedRowIdentity { .. })
        ));

        let mut anonymous = two_columns();
        anonymous.append_row(&[0.0, 1.0]).unwrap();
        assert!(matches!(
            anonymous.append_row_from("w1", &[0.0, 1.0]),
            Err(DatasetError::MixedRowIdentity { .. })
        ));
    }
}
