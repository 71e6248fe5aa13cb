//! Tabular datasets: feature encodings, in-memory tables, and on-disk persistence.

pub mod encode;
pub mod store;
pub mod table;

use std::path::PathBuf;

use thiserror::Error;

pub use encode::{Encoded, EncodeError, Encoding, EncodingOptions, encode, encode_with_bins, linear_row};
pub use store::{
    DatasetManifest, LoadedDataset, LoadedTable, RowRecord, Split, SplitPolicy, TableManifest, load_dataset,
    persist,
};
pub use table::{Column, ColumnKind, Dataset, Table};

#[derive(Debug, Error)]
pub enum DatasetError {
    #[error("io error at {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("invalid manifest: {0}")]
    InvalidManifest(String),
    #[error("dataset has no table named {0}")]
    MissingTable(String),
    #[error("table name {0:?} is not a plain file name")]
    InvalidTableName(String),
    #[error("data size does not match the schema of table {table}")]
    DataSizeMismatch { table: String },
    #[error("table {table} expects {expected} values per row, got {found}")]
    RowLength {
        table: String,
        expected: usize,
        found: usize,
    },
    #[error("table {table} already has a column named {column}")]
    DuplicateColumn { table: String, column: String },
    #[error("table {table} already holds rows; its columns are frozen")]
    SchemaFrozen { table: String },
    #[error("table {table} mixes rows with and without a source waveform")]
    MixedRowIdentity { table: String },
}

impl DatasetError {
    pub(crate) fn io(path: impl Into<PathBuf>) -> impl FnOnce(std::io::Error) -> Self {
        let path = path.into();
        move |source| DatasetError::Io { path, source }
    }
}
