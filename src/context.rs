//! Instance context resolution for runkit.
//!
//! An instance is identified by a single path given on the command line:
//! - a directory: the instance directory itself, profile `default`,
//!   default config
//! - a file: a YAML config; its parent is the instance directory and its
//!   name up to the first `.` is the profile (`prod.yaml` → `prod`)
//!
//! Relative `run_dir` and `log_dir` settings are resolved against the
//! instance directory.

use crate::config::Config;
use crate::error::{Result, RunkitError};
use std::fs;
use std::path::{Path, PathBuf};

/// Profile name used when the instance is given as a directory.
pub const DEFAULT_PROFILE: &str = "default";

/// Resolved paths and settings for one instance.
#[derive(Debug, Clone)]
pub struct InstanceContext {
    /// Absolute path of the instance directory.
    pub instance_dir: PathBuf,

    /// Profile name derived from the config file name.
    pub profile: String,

    /// Absolute path of the config file, if one was given.
    pub config_path: Option<PathBuf>,

    /// Loaded (or default) configuration.
    pub config: Config,
}

impl InstanceContext {
    /// Resolve an instance from a directory or config file path.
    ///
    /// # Returns
    ///
    /// * `Ok(InstanceContext)` - Successfully resolved context
    /// * `Err(RunkitError::FilesystemError)` - The path does not exist
    /// * `Err(RunkitError::ConfigError)` - The config file is invalid
    pub fn resolve<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let absolute = std::path::absolute(path).map_err(|e| RunkitError::filesystem(path, e))?;
        let metadata = fs::metadata(&absolute).map_err(|e| RunkitError::filesystem(&absolute, e))?;

        if metadata.is_dir() {
            return Ok(Self {
                instance_dir: absolute,
                profile: DEFAULT_PROFILE.to_string(),
                config_path: None,
                config: Config::default(),
            });
        }

        let config = Config::load(&absolute)?;
        let instance_dir = absolute
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_else(|| PathBuf::from("/"));
        let profile = profile_from_path(&absolute);

        Ok(Self {
            instance_dir,
            profile,
            config_path: Some(absolute),
            config,
        })
    }

    /// Directory for locks and PID files.
    pub fn run_dir(&self) -> PathBuf {
        join_path(&self.instance_dir, &self.config.run_dir)
    }

    /// Directory for log files.
    pub fn log_dir(&self) -> PathBuf {
        join_path(&self.instance_dir, &self.config.log_dir)
    }

    /// Create the run and log directories if they don't exist.
    pub fn ensure_directories(&self) -> Result<()> {
        for dir in [self.log_dir(), self.run_dir()] {
            fs::create_dir_all(&dir).map_err(|e| RunkitError::filesystem(&dir, e))?;
        }
        Ok(())
    }
}

/// Join `path` onto `directory` unless `path` is already absolute, in which
/// case it is returned unchanged.
pub fn join_path<P: AsRef<Path>>(directory: &Path, path: P) -> PathBuf {
    let path = path.as_ref();
    if path.is_absolute() {
        path.to_path_buf()
    } else {
        directory.join(path)
    }
}

/// Profile name for a config file: the file name up to its first `.`.
fn profile_from_path(path: &Path) -> String {
    let file_name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    match file_name.split('.').next() {
        Some(stem) if !stem.is_empty() => stem.to_string(),
        _ => DEFAULT_PROFILE.to_string(),
    }
}
