//! Library exports for the pipeline binaries, benchmarks and tests.
/// Application directory resolution.
pub mod app_dirs;
mod atomic_write;
/// Pipeline configuration.
pub mod config;
/// Tabular datasets, feature encodings and persistence.
pub mod dataset;
/// Run-level error taxonomy.
pub mod error;
/// Quality gate for raw waveforms.
pub mod gate;
/// Tracing setup.
pub mod logging;
/// Signal/background classifiers.
pub mod ml;
/// Waveform inversion and cropping.
pub mod normalize;
/// Preparation and classification runs.
pub mod pipeline;
/// JSON report artifacts.
pub mod report;
/// Multi-model classification scorer.
pub mod scoring;
/// Histograms, ingestion and waveform parameters.
pub mod waveform;
