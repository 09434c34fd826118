//! Holder record written into the PID-qualified lock file.
//!
//! `{name}.lock` is a hard link to the holder's `{name}-{pid}.lock`, so
//! whoever loses the race can read who won.

use crate::error::{Result, RunkitError};
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::path::Path;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LockMetadata {
    /// `user@host` of the holding process.
    pub owner: String,
    pub pid: u32,
    pub created_at: DateTime<Utc>,
}

impl LockMetadata {
    /// Record for this process, stamped now.
    pub fn current() -> Self {
        Self {
            owner: owner_label(),
            pid: std::process::id(),
            created_at: Utc::now(),
        }
    }

    /// Read the record stored at `path` (either lock file name works).
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let bytes = std::fs::read(path).map_err(|e| RunkitError::filesystem(path, e))?;
        serde_json::from_slice(&bytes).map_err(|e| {
            RunkitError::LockError(format!("unreadable lock record '{}': {}", path.display(), e))
        })
    }

    /// Single-line JSON form.
    pub fn to_json(&self) -> Result<String> {
        serde_json::to_string(self)
            .map_err(|e| RunkitError::LockError(format!("cannot encode lock record: {}", e)))
    }

    pub fn age(&self) -> Duration {
        Utc::now() - self.created_at
    }

    /// Age at its two most significant units, e.g. `3d 4h`, `12m 5s`.
    pub fn age_string(&self) -> String {
        let secs = self.age().num_seconds().max(0);
        let (d, h, m, s) = (secs / 86_400, secs / 3_600 % 24, secs / 60 % 60, secs % 60);
        match (d, h, m) {
            (0, 0, 0) => format!("{}s", s),
            (0, 0, _) => format!("{}m {}s", m, s),
            (0, _, _) => format!("{}h {}m", h, m),
            _ => format!("{}d {}h", d, h),
        }
    }
}

fn owner_label() -> String {
    let user = ["USER", "LOGNAME", "USERNAME"]
        .iter()
        .find_map(|key| std::env::var(key).ok().filter(|v| !v.is_empty()))
        .unwrap_or_else(|| "unknown".to_string());
    let host = hostname::get()
        .ok()
        .and_then(|h| h.into_string().ok())
        .unwrap_or_else(|| "unknown".to_string());
    format!("{user}@{host}")
}
