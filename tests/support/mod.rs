#![allow(dead_code)]

pub mod waveforms;

use dualreadout::config::PipelineConfig;
use dualreadout::ml::engine::MethodConfig;

/// Bins per synthetic acquisition.
pub const BINS: usize = 100;

/// Config sized for the synthetic waveforms: 100 bins, a cropped window that
/// ends at 50 ns, and small models that train quickly.
pub fn small_config() -> PipelineConfig {
    let mut config = PipelineConfig::default();
    config.gate.expected_bin_count = BINS;
    config.normalize.right_edge_seconds = 50e-9;
    config.split.train_fraction = 1.0;
    let mut bdt = MethodConfig::bdt("BDT");
    bdt.bdt.rounds = 20;
    bdt.bdt.bins = 8;
    let mut dnn = MethodConfig::dnn("DNN");
    dnn.dnn.hidden_size = 8;
    dnn.dnn.epochs = 40;
    dnn.dnn.batch_size = 4;
    config.methods = vec![bdt, dnn];
    config
}

/// Run `f` with the application root redirected into `dir`.
pub fn with_config_home<T>(dir: &std::path::Path, f: impl FnOnce() -> T) -> T {
    let _guard = dualreadout::app_dirs::ConfigBaseGuard::set(dir.to_path_buf());
    f()
}
