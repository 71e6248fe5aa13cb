//! Small fully connected network for signal/background separation.

mod model;
mod train;

pub use model::MlpModel;
pub use train::{DnnOptions, train_dnn};
