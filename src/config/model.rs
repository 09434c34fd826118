//! Config struct definition and default implementation.

use serde::{Deserialize, Serialize};

/// Instance configuration.
///
/// Loaded from the YAML file passed on the command line. Unknown fields are
/// ignored for forward compatibility, so the same file can carry settings
/// for the application being bootstrapped.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    // =========================================================================
    // Directories
    // =========================================================================
    /// Directory for locks and PID files, relative to the instance directory
    /// unless absolute.
    #[serde(default = "default_run_dir")]
    pub run_dir: String,

    /// Directory for log files, relative to the instance directory unless
    /// absolute.
    #[serde(default = "default_log_dir")]
    pub log_dir: String,

    // =========================================================================
    // Logging
    // =========================================================================
    /// Disable logging to the console.
    #[serde(default)]
    pub no_console_log: bool,

    /// Enable debug-level logging.
    #[serde(default)]
    pub debug: bool,

    // =========================================================================
    // Layering
    // =========================================================================
    /// Path to a second YAML file whose keys override this one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub extra_config: Option<String>,
}

fn default_run_dir() -> String {
    "run".to_string()
}

fn default_log_dir() -> String {
    "log".to_string()
}

impl Default for Config {
    fn default() -> Self {
        Self {
            run_dir: default_run_dir(),
            log_dir: default_log_dir(),
            no_console_log: false,
            debug: false,
            extra_config: None,
        }
    }
}
