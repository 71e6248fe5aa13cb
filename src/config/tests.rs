use super::*;
use crate::dataset::Encoding;
use crate::ml::engine::MethodKind;
use tempfile::tempdir;

fn with_config_home<T>(dir: &std::path::Path, f: impl FnOnce() -> T) -> T {
    let _guard = crate::app_dirs::ConfigBaseGuard::set(dir.to_path_buf());
    f()
}

#[test]
fn defaults_match_documented_values() {
    let config = PipelineConfig::default();
    assert_eq!(config.gate.voltage_threshold, -0.03);
    assert_eq!(config.gate.min_peak_position, -1e-8);
    assert_eq!(config.gate.max_peak_position, 2e-8);
    assert_eq!(config.gate.expected_bin_count, 10_000);
    assert_eq!(config.normalize.right_edge_seconds, 3e-7);
    assert_eq!(config.encoding.kind, Encoding::Linear);
    assert_eq!(config.encoding.resample_count, 10_000);
    assert_eq!(config.split.train_fraction, 0.8);
    config.validate().unwrap();
}

#[test]
fn partial_file_with_camel_case_keys_loads() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("config.toml");
    std::fs::write(
        &path,
        r#"
[gate]
voltageThreshold = -0.05
expectedBinCount = 2000

[normalize]
rightEdgeSeconds = 2e-7

[encoding]
encoding = "resampled"
resampleCount = 500
resampleSeed = 7

[split]
trainSplitFraction = 0.5
splitSeed = "run-a"

[[methods]]
name = "Stumps"
kind = "bdt"

[methods.bdt]
rounds = 10
"#,
    )
    .unwrap();
    let config = load_from_path(&path).unwrap();
    assert_eq!(config.gate.voltage_threshold, -0.05);
    assert_eq!(config.gate.expected_bin_count, 2000);
    assert_eq!(config.gate.max_peak_position, 2e-8);
    assert_eq!(config.normalize.right_edge_seconds, 2e-7);
    assert_eq!(config.encoding.kind, Encoding::Resampled);
    assert_eq!(config.encoding.resample_count, 500);
    assert_eq!(config.encoding.resample_seed, Some(7));
    assert_eq!(config.split.train_fraction, 0.5);
    assert_eq!(config.split.seed, "run-a");
    assert_eq!(config.methods.len(), 1);
    let method = config.method("Stumps").unwrap();
    assert_eq!(method.kind, MethodKind::Bdt);
    assert_eq!(method.bdt.rounds, 10);
    assert_eq!(method.bdt.bins, 32);
}

#[test]
fn contradictory_peak_window_is_rejected() {
    let mut config = PipelineConfig::default();
    config.gate.min_peak_position = 5e-8;
    let err = config.validate().unwrap_err();
    assert!(matches!(err, ConfigError::Invalid(message) if message.contains("min_peak_position")));
}

#[test]
fn invalid_values_are_rejected() {
    let cases: Vec<fn(&mut PipelineConfig)> = vec![
        |c| c.gate.expected_bin_count = 0,
        |c| c.gate.voltage_threshold = f64::NAN,
        |c| c.normalize.right_edge_seconds = f64::INFINITY,
        |c| c.encoding.resample_count = 0,
        |c| c.split.train_fraction = 0.0,
        |c| c.split.train_fraction = 1.5,
        |c| c.methods[1].name = "BDT".into(),
        |c| c.methods[0].name = String::new(),
        |c| c.methods[0].name = "a/b".into(),
        |c| c.methods[0].bdt.bins = 1,
        |c| c.methods[1].dnn.epochs = 0,
    ];
    for (idx, mutate) in cases.into_iter().enumerate() {
        let mut config = PipelineConfig::default();
        mutate(&mut config);
        assert!(
            matches!(config.validate(), Err(ConfigError::Invalid(_))),
            "case {idx} should be invalid"
        );
    }
}

#[test]
fn save_then_load_round_trips() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("nested").join("config.toml");
    let mut config = PipelineConfig::default();
    config.gate.voltage_threshold = -0.1;
    config.methods[1].dnn.hidden_size = 8;
    save_to_path(&config, &path).unwrap();
    assert_eq!(load_from_path(&path).unwrap(), config);
}

#[test]
fn load_or_default_uses_config_home() {
    let dir = tempdir().unwrap();
    with_config_home(dir.path(), || {
        assert_eq!(load_or_default().unwrap(), PipelineConfig::default());
        let mut config = PipelineConfig::default();
        config.split.seed = "saved".into();
        save(&config).unwrap();
        let expected = dir
            .path()
            .join(crate::app_dirs::APP_DIR_NAME)
            .join(CONFIG_FILE_NAME);
        assert_eq!(config_path().unwrap(), expected);
        assert_eq!(load_or_default().unwrap().split.seed, "saved");
    });
}

#[test]
fn malformed_toml_reports_path() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("config.toml");
    std::fs::write(&path, "[gate\nvoltage_threshold = ").unwrap();
    let err = load_from_path(&path).unwrap_err();
    assert!(matches!(err, ConfigError::ParseToml { path: ref p, .. } if p == &path));
}
