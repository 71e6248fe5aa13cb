//! Pipeline configuration: TOML surface, validation, and load/save helpers.

use crate::app_dirs;

mod load;
mod save;
mod types;

#[cfg(test)]
mod tests;

/// Default filename used to store the pipeline configuration.
pub const CONFIG_FILE_NAME: &str = "config.toml";

pub use load::{config_path, load_from_path, load_or_default};
pub use save::{save, save_to_path};
pub use types::{ConfigError, PipelineConfig};

fn map_app_dir_error(error: app_dirs::AppDirError) -> ConfigError {
    match error {
        app_dirs::AppDirError::NoBaseDir => ConfigError::NoConfigDir,
        app_dirs::AppDirError::CreateDir { path, source } => {
            ConfigError::CreateDir { path, source }
        }
    }
}
