//! Dataset directories (`manifest.json`, `<table>.f32le`, `<table>.rows.jsonl`).

use std::fs::File;
use std::io::{BufRead, BufReader, BufWriter, Read, Write};
use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::info;

use super::DatasetError;
use super::encode::Encoding;
use super::table::{Column, Dataset, Table};

const DATASET_FORMAT_VERSION: i64 = 1;
pub const MANIFEST_FILE_NAME: &str = "manifest.json";
const DATA_SUFFIX: &str = "f32le";
const ROWS_SUFFIX: &str = "rows.jsonl";

/// Deterministic train/test assignment.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SplitPolicy {
    /// Fraction of rows assigned to `train`.
    #[serde(default = "default_train_fraction", alias = "trainSplitFraction")]
    pub train_fraction: f64,
    #[serde(default = "default_split_seed", alias = "splitSeed")]
    pub seed: String,
}

fn default_train_fraction() -> f64 {
    0.8
}

fn default_split_seed() -> String {
    "dualreadout-split-v1".to_string()
}

impl Default for SplitPolicy {
    fn default() -> Self {
        Self {
            train_fraction: default_train_fraction(),
            seed: default_split_seed(),
        }
    }
}

impl SplitPolicy {
    /// Split for a row keyed by `key` (waveform id, or row index for anonymous rows).
    pub fn split_for(&self, table: &str, key: &str) -> Split {
        let hash = blake3::hash(format!("{}|{table}|{key}", self.seed).as_bytes());
        let mut head = [0u8; 8];
        head.copy_from_slice(&hash.as_bytes()[0..8]);
        let frac = (u64::from_le_bytes(head) as f64) / (u64::MAX as f64);
        if frac < self.train_fraction {
            Split::Train
        } else {
            Split::Test
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Split {
    Train,
    Test,
}

/// Per-row metadata written for tables that track waveform identity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RowRecord {
    pub source: String,
    pub split: Split,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TableManifest {
    pub name: String,
    pub columns: Vec<Column>,
    pub row_count: usize,
    /// Row-major `f32` little-endian values.
    pub data: String,
    #[serde(default)]
    pub rows: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DatasetManifest {
    pub format_version: i64,
    pub name: String,
    pub encoding: Encoding,
    /// Bin count of the waveforms behind every table; the scorer checks it.
    pub bin_count: usize,
    #[serde(default)]
    pub resample_seed: Option<u64>,
    pub split: SplitPolicy,
    pub tables: Vec<TableManifest>,
}

#[derive(Debug, Clone)]
pub struct LoadedTable {
    pub table: Table,
    /// One record per row, or empty when the table has no row identity.
    pub rows: Vec<RowRecord>,
}

impl LoadedTable {
    /// Split of row `index`, derived from the row index when rows are anonymous.
    pub fn split_of(&self, index: usize, policy: &SplitPolicy) -> Split {
        match self.rows.get(index) {
            Some(record) => record.split,
            None => policy.split_for(self.table.name(), &index.to_string()),
        }
    }
}

#[derive(Debug, Clone)]
pub struct LoadedDataset {
    pub manifest: DatasetManifest,
    pub tables: Vec<LoadedTable>,
}

impl LoadedDataset {
    pub fn table(&self, name: &str) -> Result<&LoadedTable, DatasetError> {
        self.tables
            .iter()
            .find(|loaded| loaded.table.name() == name)
            .ok_or_else(|| DatasetError::MissingTable(name.to_string()))
    }
}

/// Write `dataset` into `dir` (created if missing), assigning row splits.
pub fn persist(dataset: &Dataset, dir: &Path, split: &SplitPolicy) -> Result<DatasetManifest, DatasetError> {
    std::fs::create_dir_all(dir).map_err(DatasetError::io(dir))?;
    let mut tables = Vec::with_capacity(dataset.tables.len());
    for table in &dataset.tables {
        tables.push(write_table(table, dir, split)?);
    }
    let manifest = DatasetManifest {
        format_version: DATASET_FORMAT_VERSION,
        name: dataset.name.clone(),
        encoding: dataset.encoding,
        bin_count: dataset.bin_count,
        resample_seed: dataset.resample_seed,
        split: split.clone(),
        tables,
    };
    let manifest_path = dir.join(MANIFEST_FILE_NAME);
    let bytes = serde_json::to_vec_pretty(&manifest)?;
    std::fs::write(&manifest_path, bytes).map_err(DatasetError::io(&manifest_path))?;
    info!(
        "Persisted dataset {} ({} rows in {} tables) to {}",
        dataset.name,
        dataset.total_rows(),
        dataset.tables.len(),
        dir.display()
    );
    Ok(manifest)
}

fn write_table(table: &Table, dir: &Path, split: &SplitPolicy) -> Result<TableManifest, DatasetError> {
    let name = table.name();
    if !is_plain_name(name) {
        return Err(DatasetError::InvalidTableName(name.to_string()));
    }
    let data_name = format!("{name}.{DATA_SUFFIX}");
    let data_path = dir.join(&data_name);
    let file = File::create(&data_path).map_err(DatasetError::io(&data_path))?;
    let mut writer = BufWriter::new(file);
    for value in table.values() {
        writer
            .write_all(&value.to_le_bytes())
            .map_err(DatasetError::io(&data_path))?;
    }
    writer.flush().map_err(DatasetError::io(&data_path))?;

    let rows = if table.sources().is_empty() {
        None
    } else {
        let rows_name = format!("{name}.{ROWS_SUFFIX}");
        let rows_path = dir.join(&rows_name);
        let file = File::create(&rows_path).map_err(DatasetError::io(&rows_path))?;
        let mut writer = BufWriter::new(file);
        for source in table.sources() {
            let record = RowRecord {
                source: source.clone(),
                split: split.split_for(name, source),
            };
            serde_json::to_writer(&mut writer, &record)?;
            writer.write_all(b"\n").map_err(DatasetError::io(&rows_path))?;
        }
        writer.flush().map_err(DatasetError::io(&rows_path))?;
        Some(rows_name)
    };

    Ok(TableManifest {
        name: name.to_string(),
        columns: table.columns().to_vec(),
        row_count: table.row_count(),
        data: data_name,
        rows,
    })
}

fn is_plain_name(name: &str) -> bool {
    !name.is_empty()
        && name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-')
}

/// Load a dataset directory written by [`persist`].
pub fn load_dataset(dir: &Path) -> Result<LoadedDataset, DatasetError> {
    let manifest_path = dir.join(MANIFEST_FILE_NAME);
    let mut bytes = Vec::new();
    File::open(&manifest_path)
        .and_then(|mut file| file.read_to_end(&mut bytes))
        .map_err(DatasetError::io(&manifest_path))?;
    let manifest: DatasetManifest = serde_json::from_slice(&bytes)?;
    if manifest.format_version != DATASET_FORMAT_VERSION {
        return Err(DatasetError::InvalidManifest(format!(
            "unsupported format_version {}",
            manifest.format_version
        )));
    }

    let mut tables = Vec::with_capacity(manifest.tables.len());
    for entry in &manifest.tables {
        if !is_plain_name(&entry.name) {
            return Err(DatasetError::InvalidTableName(entry.name.clone()));
        }
        check_file_name(&entry.data, &entry.name, DATA_SUFFIX)?;
        let values = load_f32le(&dir.join(&entry.data))?;
        let rows = match &entry.rows {
            Some(rows_name) => {
                check_file_name(rows_name, &entry.name, ROWS_SUFFIX)?;
                load_rows(&dir.join(rows_name))?
            }
            None => Vec::new(),
        };
        let sources = rows.iter().map(|record| record.source.clone()).collect();
        let table = Table::from_parts(entry.name.clone(), entry.columns.clone(), values, sources)?;
        if table.row_count() != entry.row_count {
            return Err(DatasetError::DataSizeMismatch {
                table: entry.name.clone(),
            });
        }
        tables.push(LoadedTable { table, rows });
    }
    Ok(LoadedDataset { manifest, tables })
}

/// Table files must be the `<table>.<suffix>` names [`persist`] writes.
fn check_file_name(file_name: &str, table: &str, suffix: &str) -> Result<(), DatasetError> {
    if file_name == format!("{table}.{suffix}") {
        Ok(())
    } else {
        Err(DatasetError::InvalidManifest(format!(
            "table {table} points at unexpected file {file_name:?}"
        )))
    }
}

fn load_rows(path: &Path) -> Result<Vec<RowRecord>, DatasetError> {
    let file = File::open(path).map_err(DatasetError::io(path))?;
    let mut out = Vec::new();
    for (idx, line) in BufReader::new(file).lines().enumerate() {
        let line = line.map_err(DatasetError::io(path))?;
        if line.trim().is_empty() {
            continue;
        }
        let record: RowRecord = serde_json::from_str(&line).map_err(|err| {
            DatasetError::InvalidManifest(format!("{} line {}: {err}", path.display(), idx + 1))
        })?;
        out.push(record);
    }
    Ok(out)
}

fn load_f32le(path: &Path) -> Result<Vec<f32>, DatasetError> {
    let mut bytes = Vec::new();
    File::open(path)
        .and_then(|mut file| file.read_to_end(&mut bytes))
        .map_err(DatasetError::io(path))?;
    if bytes.len() % 4 != 0 {
        return Err(DatasetError::InvalidManifest(format!(
            "{} is not a whole number of f32 values",
            path.display()
        )));
    }
    Ok(bytes
        .chunks_exact(4)
        .map(|chunk| f32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]))
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dataset::table::ColumnKind;
    use tempfile::tempdir;

    fn linear_table(name: &str) -> Table {
        let mut table = Table::new(name);
        table.add_column("var0", ColumnKind::Feature).unwrap();
        table.add_column("var1", ColumnKind::Feature).unwrap();
        table.append_row_from("w1", &[0.5, 1.5]).unwrap();
        table.append_row_from("w2", &[2.5, 3.5]).unwrap();
        table
    }

    #[test]
    fn persist_and_load_roundtrip() {
        let dir = tempdir().unwrap();
        let mut dataset = Dataset::new("run", Encoding::Linear, 2);
        dataset.tables.push(linear_table("signal"));
        let mut anonymous = Table::new("background");
        anonymous.add_column("x", ColumnKind::Time).unwrap();
        anonymous.append_row(&[9.0]).unwrap();
        dataset.tables.push(anonymous);

        let policy = SplitPolicy::default();
        persist(&dataset, dir.path(), &policy).unwrap();
        assert!(dir.path().join("signal.rows.jsonl").is_file());
        assert!(!dir.path().join("background.rows.jsonl").exists());

        let loaded = load_dataset(dir.path()).unwrap();
        assert_eq!(loaded.manifest.bin_count, 2);
        assert_eq!(loaded.manifest.encoding, Encoding::Linear);
        let signal = loaded.table("signal").unwrap();
        assert_eq!(signal.table, dataset.tables[0]);
        assert_eq!(signal.rows.len(), 2);
        assert_eq!(signal.rows[1].split, policy.split_for("signal", "w2"));
        let background = loaded.table("background").unwrap();
        assert!(background.rows.is_empty());
        assert_eq!(background.table.row(0), Some(&[9.0][..]));
        assert!(matches!(loaded.table("missing"), Err(DatasetError::MissingTable(_))));
    }

    #[test]
    fn split_is_deterministic_and_respects_fraction() {
        let policy = SplitPolicy::default();
        assert_eq!(policy.split_for("t", "w1"), policy.split_for("t", "w1"));
        let all_train = SplitPolicy {
            train_fraction: 1.0,
            ..SplitPolicy::default()
        };
        assert!((0..100).all(|i| all_train.split_for("t", &i.to_string()) == Split::Train));
        let train = (0..1000)
            .filter(|i| policy.split_for("t", &i.to_string()) == Split::Train)
            .count();
        assert!((700..900).contains(&train));
    }

    #[test]
    fn rejects_path_like_table_names() {
        let dir = tempdir().unwrap();
        let mut dataset = Dataset::new("run", Encoding::Linear, 2);
        dataset.tables.push(linear_table("../escape"));
        assert!(matches!(
            persist(&dataset, dir.path(), &SplitPolicy::default()),
            Err(DatasetError::InvalidTableName(_))
        ));
    }

    #[test]
    fn manifest_file_names_outside_the_dataset_are_rejected() {
        let dir = tempdir().unwrap();
        let mut dataset = Dataset::new("run", Encoding::Linear, 2);
        dataset.tables.push(linear_table("signal"));
        persist(&dataset, dir.path(), &SplitPolicy::default()).unwrap();
        let manifest_path = dir.path().join(MANIFEST_FILE_NAME);
        let original: DatasetManifest =
            serde_json::from_slice(&std::fs::read(&manifest_path).unwrap()).unwrap();

        let mut escaping = original.clone();
        escaping.tables[0].data = "../signal.f32le".to_string();
        std::fs::write(&manifest_path, serde_json::to_vec(&escaping).unwrap()).unwrap();
        assert!(matches!(load_dataset(dir.path()), Err(DatasetError::InvalidManifest(_))));

        let mut escaping = original;
        escaping.tables[0].rows = Some("../../rows.jsonl".to_string());
        std::fs::write(&manifest_path, serde_json::to_vec(&escaping).unwrap()).unwrap();
        assert!(matches!(load_dataset(dir.path()), Err(DatasetError::InvalidManifest(_))));
    }

    #[test]
    fn truncated_data_file_is_rejected() {
        let dir = tempdir().unwrap();
        let mut dataset = Dataset::new("run", Encoding::Linear, 2);
        dataset.tables.push(linear_table("signal"));
        persist(&dataset, dir.path(), &SplitPolicy::default()).unwrap();
        std::fs::write(dir.path().join("signal.f32le"), [0u8; 6]).unwrap();
        assert!(load_dataset(dir.path()).is_err());
    }
}
