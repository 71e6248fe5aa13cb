//! Engine boundary: train a method on a persisted dataset, load a serialized
//! model, and score one linear feature row with it.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use super::gbdt_stump::{BdtOptions, BoostedStumps, train_bdt};
use super::metrics::{ConfusionMatrix, Evaluation, accuracy, precision_recall_by_class};
use super::mlp::{DnnOptions, MlpModel, train_dnn};
use super::{BACKGROUND_CLASS, ModelError, SIGNAL_CLASS, TrainSet};
use crate::atomic_write::atomic_write;
use crate::dataset::{Encoding, LoadedTable, Split, SplitPolicy, load_dataset};

/// File extension of serialized models; the file stem is the method name.
pub const MODEL_EXTENSION: &str = "model";
const EVALUATION_SUFFIX: &str = "evaluation.json";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MethodKind {
    Bdt,
    Dnn,
}

impl MethodKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            MethodKind::Bdt => "bdt",
            MethodKind::Dnn => "dnn",
        }
    }

    /// Response at or above which a row is called signal.
    pub fn decision_cut(&self) -> f64 {
        match self {
            MethodKind::Bdt => 0.0,
            MethodKind::Dnn => 0.5,
        }
    }
}

/// One `[[methods]]` entry of the configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MethodConfig {
    pub name: String,
    pub kind: MethodKind,
    #[serde(default)]
    pub bdt: BdtOptions,
    #[serde(default)]
    pub dnn: DnnOptions,
}

impl MethodConfig {
    pub fn bdt(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            kind: MethodKind::Bdt,
            bdt: BdtOptions::default(),
            dnn: DnnOptions::default(),
        }
    }

    pub fn dnn(name: impl Into<String>) -> Self {
        Self {
            kind: MethodKind::Dnn,
            ..Self::bdt(name)
        }
    }
}

/// Serialized model payload, tagged by method kind.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum ModelArtifact {
    Bdt(BoostedStumps),
    Dnn(MlpModel),
}

impl ModelArtifact {
    pub fn kind(&self) -> MethodKind {
        match self {
            ModelArtifact::Bdt(_) => MethodKind::Bdt,
            ModelArtifact::Dnn(_) => MethodKind::Dnn,
        }
    }

    pub fn feature_len(&self) -> usize {
        match self {
            ModelArtifact::Bdt(model) => model.feature_len,
            ModelArtifact::Dnn(model) => model.feature_len,
        }
    }

    pub fn validate(&self) -> Result<(), ModelError> {
        match self {
            ModelArtifact::Bdt(model) => model.validate(),
            ModelArtifact::Dnn(model) => model.validate(),
        }
    }
}

/// A loaded model, named by its method.
#[derive(Debug, Clone, PartialEq)]
pub struct ModelHandle {
    pub name: String,
    pub artifact: ModelArtifact,
}

impl ModelHandle {
    pub fn feature_len(&self) -> usize {
        self.artifact.feature_len()
    }

    pub fn kind(&self) -> MethodKind {
        self.artifact.kind()
    }
}

#[derive(Debug, Clone)]
pub struct TrainOutcome {
    pub model_path: PathBuf,
    pub train_rows: usize,
    pub test_metrics: Evaluation,
}

/// Train `method` on the `train` rows of two tables and write `<name>.model`
/// plus a held-out evaluation into `out_dir`.
pub fn train(
    dataset_dir: &Path,
    signal_table: &str,
    background_table: &str,
    method: &MethodConfig,
    out_dir: &Path,
) -> Result<TrainOutcome, ModelError> {
    check_method_name(&method.name)?;
    let loaded = load_dataset(dataset_dir)?;
    if loaded.manifest.encoding != Encoding::Linear {
        return Err(ModelError::Training(format!(
            "dataset {} uses {} encoding; training needs linear rows",
            dataset_dir.display(),
            loaded.manifest.encoding.as_str()
        )));
    }
    let signal = loaded.table(signal_table)?;
    let background = loaded.table(background_table)?;
    for table in [signal, background] {
        if table.table.is_empty() {
            return Err(ModelError::Training(format!(
                "table {} has no rows",
                table.table.name()
            )));
        }
    }
    let feature_len = signal.table.column_count();
    if background.table.column_count() != feature_len {
        return Err(ModelError::SchemaMismatch {
            model: method.name.clone(),
            expected: feature_len,
            found: background.table.column_count(),
        });
    }

    let policy = &loaded.manifest.split;
    let mut train_set = TrainSet::new(feature_len);
    let mut test_set = TrainSet::new(feature_len);
    collect_rows(signal, true, policy, &mut train_set, &mut test_set);
    collect_rows(background, false, policy, &mut train_set, &mut test_set);
    info!(
        method = %method.name,
        kind = method.kind.as_str(),
        train_rows = train_set.len(),
        test_rows = test_set.len(),
        features = feature_len,
        "Training model"
    );

    let artifact = match method.kind {
        MethodKind::Bdt => ModelArtifact::Bdt(train_bdt(&train_set, &method.bdt)?),
        MethodKind::Dnn => ModelArtifact::Dnn(train_dnn(&train_set, &method.dnn)?),
    };
    let handle = ModelHandle {
        name: method.name.clone(),
        artifact,
    };
    let model_path = save_model(&handle, out_dir)?;
    let test_metrics = evaluate(&handle, &test_set)?;
    let evaluation_path = out_dir.join(format!("{}.{EVALUATION_SUFFIX}", handle.name));
    let bytes = serde_json::to_vec_pretty(&test_metrics).map_err(|source| ModelError::Parse {
        path: evaluation_path.clone(),
        source,
    })?;
    atomic_write(&evaluation_path, &bytes).map_err(|source| ModelError::Io {
        path: evaluation_path.clone(),
        source,
    })?;
    info!(
        method = %handle.name,
        accuracy = test_metrics.accuracy,
        path = %model_path.display(),
        "Model written"
    );
    Ok(TrainOutcome {
        model_path,
        train_rows: train_set.len(),
        test_metrics,
    })
}

fn collect_rows(
    loaded: &LoadedTable,
    signal: bool,
    policy: &SplitPolicy,
    train_set: &mut TrainSet,
    test_set: &mut TrainSet,
) {
    for (index, row) in loaded.table.rows().enumerate() {
        match loaded.split_of(index, policy) {
            Split::Train => train_set.push(row, signal),
            Split::Test => test_set.push(row, signal),
        }
    }
}

/// Accuracy and per-class precision/recall of `handle` on labeled rows.
pub fn evaluate(handle: &ModelHandle, set: &TrainSet) -> Result<Evaluation, ModelError> {
    let cut = handle.kind().decision_cut();
    let mut cm = ConfusionMatrix::new(2);
    for (row, &signal) in set.x.iter().zip(&set.y) {
        let predicted = score(handle, row)? >= cut;
        cm.add(signal as usize, predicted as usize);
    }
    Ok(Evaluation {
        method: handle.name.clone(),
        cut,
        rows: cm.total(),
        accuracy: accuracy(&cm),
        per_class: precision_recall_by_class(&cm, &[BACKGROUND_CLASS, SIGNAL_CLASS]),
    })
}

/// Write `<dir>/<name>.model`, replacing any previous model of that name.
pub fn save_model(handle: &ModelHandle, dir: &Path) -> Result<PathBuf, ModelError> {
    check_method_name(&handle.name)?;
    std::fs::create_dir_all(dir).map_err(|source| ModelError::Io {
        path: dir.to_path_buf(),
        source,
    })?;
    let path = dir.join(format!("{}.{MODEL_EXTENSION}", handle.name));
    let bytes = serde_json::to_vec_pretty(&handle.artifact).map_err(|source| ModelError::Parse {
        path: path.clone(),
        source,
    })?;
    atomic_write(&path, &bytes).map_err(|source| ModelError::Io {
        path: path.clone(),
        source,
    })?;
    Ok(path)
}

/// Read and validate a serialized model. The method name is the file stem.
pub fn load_model(path: &Path) -> Result<ModelHandle, ModelError> {
    let name = path
        .file_stem()
        .and_then(|stem| stem.to_str())
        .filter(|stem| !stem.is_empty())
        .ok_or_else(|| ModelError::InvalidName(path.display().to_string()))?
        .to_string();
    let bytes = std::fs::read(path).map_err(|source| ModelError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    let artifact: ModelArtifact =
        serde_json::from_slice(&bytes).map_err(|source| ModelError::Parse {
            path: path.to_path_buf(),
            source,
        })?;
    artifact.validate()?;
    debug!(method = %name, kind = artifact.kind().as_str(), "Loaded model");
    Ok(ModelHandle { name, artifact })
}

/// Score one linear feature row.
pub fn score(handle: &ModelHandle, row: &[f32]) -> Result<f64, ModelError> {
    let expected = handle.feature_len();
    if row.len() != expected {
        return Err(ModelError::SchemaMismatch {
            model: handle.name.clone(),
            expected,
            found: row.len(),
        });
    }
    Ok(match &handle.artifact {
        ModelArtifact::Bdt(model) => model.response(row),
        ModelArtifact::Dnn(model) => model.response(row),
    })
}

/// Model files in `dir`, sorted by file name.
pub fn model_paths(dir: &Path) -> std::io::Result<Vec<PathBuf>> {
    let mut paths = Vec::new();
    for entry in std::fs::read_dir(dir)? {
        let path = entry?.path();
        let is_model = path
            .extension()
            .and_then(|ext| ext.to_str())
            .is_some_and(|ext| ext.eq_ignore_ascii_case(MODEL_EXTENSION));
        if is_model && path.is_file() {
            paths.push(path);
        }
    }
    paths.sort();
    Ok(paths)
}

fn check_method_name(name: &str) -> Result<(), ModelError> {
    let plain = !name.is_empty()
        && name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-');
    if plain {
        Ok(())
    } else {
        Err(ModelError::InvalidName(name.to_string()))
    }
}
