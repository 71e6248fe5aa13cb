//! Application directory helpers anchored to a single `.dualreadout` folder.
//!
//! Config and log files live under the OS config directory by default; a
//! `DUALREADOUT_CONFIG_HOME` override points them elsewhere for tests or
//! portable setups.

use std::{
    path::PathBuf,
    sync::{LazyLock, Mutex, MutexGuard},
};

use directories::BaseDirs;
use thiserror::Error;

/// Name of the application directory that lives under the OS config root.
pub const APP_DIR_NAME: &str = ".dualreadout";
/// Environment variable that replaces the OS config root.
pub const CONFIG_HOME_ENV: &str = "DUALREADOUT_CONFIG_HOME";

static CONFIG_BASE_OVERRIDE: LazyLock<Mutex<Option<PathBuf>>> = LazyLock::new(|| Mutex::new(None));
static OVERRIDE_HOLDER: Mutex<()> = Mutex::new(());

#[derive(Debug, Error)]
pub enum AppDirError {
    #[error("No suitable base config directory available for application files")]
    NoBaseDir,
    #[error("Failed to create application directory at {path}: {source}")]
    CreateDir {
        path: PathBuf,
        source: std::io::Error,
    },
}

/// Return the root `.dualreadout` directory, creating it if needed.
pub fn app_root_dir() -> Result<PathBuf, AppDirError> {
    let base = config_base_dir().ok_or(AppDirError::NoBaseDir)?;
    ensure_dir(base.join(APP_DIR_NAME))
}

/// Return the logs directory inside the app root, creating it if needed.
pub fn logs_dir() -> Result<PathBuf, AppDirError> {
    ensure_dir(app_root_dir()?.join("logs"))
}

fn ensure_dir(path: PathBuf) -> Result<PathBuf, AppDirError> {
    std::fs::create_dir_all(&path).map_err(|source| AppDirError::CreateDir {
        path: path.clone(),
        source,
    })?;
    Ok(path)
}

fn config_base_dir() -> Option<PathBuf> {
    if let Some(path) = CONFIG_BASE_OVERRIDE
        .lock()
        .ok()
        .and_then(|guard| guard.clone())
    {
        return Some(path);
    }
    if let Some(path) = std::env::var_os(CONFIG_HOME_ENV).filter(|value| !value.is_empty()) {
        return Some(PathBuf::from(path));
    }
    BaseDirs::new().map(|dirs| dirs.config_dir().to_path_buf())
}

fn set_config_base_override(path: Option<PathBuf>) {
    let mut guard = CONFIG_BASE_OVERRIDE
        .lock()
        .unwrap_or_else(|poisoned| poisoned.into_inner());
    *guard = path;
}

/// Redirects the app root to another directory until dropped.
///
/// Guards are serialized process-wide, so concurrent tests never observe each
/// other's override.
pub struct ConfigBaseGuard {
    _holder: MutexGuard<'static, ()>,
}

impl ConfigBaseGuard {
    pub fn set(path: PathBuf) -> Self {
        let holder = OVERRIDE_HOLDER
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        set_config_base_override(Some(path));
        Self { _holder: holder }
    }
}

impl Drop for ConfigBaseGuard {
    fn drop(&mut self) {
        set_config_base_override(None);
    }
}
