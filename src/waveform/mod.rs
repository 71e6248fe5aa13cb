//! Detector waveforms: the binned-series store, sample-file ingestion and
//! per-waveform shape parameters.

pub mod histogram;
pub mod ingest;
pub mod params;

pub use histogram::{Histogram, HistogramError};
pub use ingest::{
    IngestError, IngestItem, IngestedBatch, ItemKind, Sample, ingest_directory, read_waveform,
    strip_extension, waveform_id,
};
pub use params::WaveformParameters;
