mod support;

use dualreadout::config::{self, PipelineConfig};
use dualreadout::pipeline::prepare_dataset;
use support::waveforms::{background_like, signal_like, write_mixed_dir};
use support::{small_config, with_config_home};
use tempfile::tempdir;

#[test]
fn saved_config_drives_the_next_run() {
    let home = tempdir().unwrap();
    let work = tempdir().unwrap();
    write_mixed_dir(&work.path().join("signal"), 3, signal_like);
    write_mixed_dir(&work.path().join("background"), 3, background_like);

    let outcome = with_config_home(home.path(), || {
        assert_eq!(config::load_or_default().unwrap(), PipelineConfig::default());
        config::save(&small_config()).unwrap();
        let loaded = config::load_or_default().unwrap();
        assert_eq!(loaded, small_config());
        prepare_dataset(
            &loaded,
            &work.path().join("signal"),
            &work.path().join("background"),
            &work.path().join("out"),
        )
        .unwrap()
    });

    assert_eq!(outcome.counts().accepted, 6);
    assert!(home.path().join(".dualreadout").join("config.toml").is_file());
}

#[test]
fn default_thresholds_reject_short_synthetic_acquisitions() {
    let work = tempdir().unwrap();
    write_mixed_dir(&work.path().join("signal"), 2, signal_like);
    write_mixed_dir(&work.path().join("background"), 2, background_like);

    let outcome = prepare_dataset(
        &PipelineConfig::default(),
        &work.path().join("signal"),
        &work.path().join("background"),
        &work.path().join("out"),
    )
    .unwrap();

    assert!(outcome.is_empty());
    assert_eq!(outcome.counts().rejected, 10);
}
