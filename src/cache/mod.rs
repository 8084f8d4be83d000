//! Time-windowed JSON result cache.
//!
//! Freshness is judged from the file's modification time. There is no
//! locking: two concurrent runs may both miss and both write.

use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime};

use anyhow::{Context, Result};
use serde::Serialize;
use serde::de::DeserializeOwned;

pub const SOFTWARE_AUDIT_FILE: &str = "software-audit.json";
pub const OPTIMIZATION_FILE: &str = "optimization.json";
pub const DEFAULT_MAX_AGE: Duration = Duration::from_secs(15 * 60);

pub fn cache_dir(data_dir: &Path) -> PathBuf {
    data_dir.join("cache")
}

#[derive(Debug, Clone)]
pub struct ResultCache {
    path: PathBuf,
    max_age: Duration,
}

impl ResultCache {
    pub fn new(path: impl Into<PathBuf>, max_age: Duration) -> Self {
        Self {
            path: path.into(),
            max_age,
        }
    }

    pub fn in_dir(data_dir: &Path, file_name: &str, max_age: Duration) -> Self {
        Self::new(cache_dir(data_dir).join(file_name), max_age)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn is_enabled(&self) -> bool {
        !self.max_age.is_zero()
    }

    /// Age of the cache file, or `None` if it is missing.
    pub fn age(&self) -> Option<Duration> {
        let modified = std::fs::metadata(&self.path).ok()?.modified().ok()?;
        Some(
            SystemTime::now()
                .duration_since(modified)
                .unwrap_or(Duration::ZERO),
        )
    }

    pub fn is_fresh(&self) -> bool {
        self.is_enabled() && self.age().is_some_and(|age| age < self.max_age)
    }

    pub fn load<T: DeserializeOwned>(&self) -> Option<T> {
        if !self.is_fresh() {
            return None;
        }
        let s = std::fs::read_to_string(&self.path).ok()?;
        match serde_json::from_str(&s) {
            Ok(v) => {
                tracing::debug!(path = %self.path.display(), "cache hit");
                Some(v)
            }
            Err(err) => {
                tracing::warn!(path = %self.path.display(), "ignoring unreadable cache: {err}");
                None
            }
        }
    }

    pub fn store<T: Serialize>(&self, value: &T) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent).with_context(|| {
                format!("failed to create cache directory: {}", parent.display())
            })?;
        }
        let buf = serde_json::to_vec_pretty(value).context("failed to serialize cache entry")?;
        std::fs::write(&self.path, buf)
            .with_context(|| format!("failed to write cache: {}", self.path.display()))
    }
}
