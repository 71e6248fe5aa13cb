//! Gradient-boosted decision stumps for signal/background separation.
//!
//! - Logistic loss on a single logit; each round adds one stump.
//! - Split search over quantized features, Newton-step leaf values.
//! - Reproducible JSON export/load through the engine.

mod model;
mod train;

pub use model::{BoostedStumps, Stump};
pub use train::{BdtOptions, train_bdt};
