use std::path::{Path, PathBuf};

use crate::app_dirs;

use super::CONFIG_FILE_NAME;
use super::map_app_dir_error;
use super::types::{ConfigError, PipelineConfig};

/// Resolve the configuration file path, ensuring the parent directory exists.
pub fn config_path() -> Result<PathBuf, ConfigError> {
    let dir = app_dirs::app_root_dir().map_err(map_app_dir_error)?;
    Ok(dir.join(CONFIG_FILE_NAME))
}

/// Load the user configuration, returning defaults if it does not exist yet.
pub fn load_or_default() -> Result<PipelineConfig, ConfigError> {
    let path = config_path()?;
    if !path.exists() {
        return Ok(PipelineConfig::default());
    }
    load_from_path(&path)
}

/// Parse and validate a TOML configuration file. Missing keys take defaults.
pub fn load_from_path(path: &Path) -> Result<PipelineConfig, ConfigError> {
    let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    let config: PipelineConfig = toml::from_str(&text).map_err(|source| ConfigError::ParseToml {
        path: path.to_path_buf(),
        source,
    })?;
    config.validate()?;
    Ok(config)
}
