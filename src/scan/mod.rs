use std::path::Path;
use std::time::{Duration, Instant};

use anyhow::{Result, anyhow};
use walkdir::WalkDir;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SizeEstimateMethod {
    WalkDir,
    WalkDirTruncated,
    BudgetExhausted,
}

#[derive(Debug, Clone, Copy)]
pub struct SizeEstimate {
    pub bytes: u64,
    pub file_count: u64,
    pub error_count: u64,
    pub method: SizeEstimateMethod,
}

impl SizeEstimate {
    /// A truncated walk still reports a lower bound, which is enough to
    /// cross a size threshold.
    pub fn is_lower_bound(self) -> bool {
        self.method != SizeEstimateMethod::WalkDir || self.error_count > 0
    }
}

pub fn estimate_dir_size(
    path: &Path,
    max_duration: Duration,
    deadline: Option<Instant>,
) -> Result<SizeEstimate> {
    if !path.is_dir() {
        return Err(anyhow!("directory not found: {}", path.display()));
    }

    let mut end = Instant::now() + max_duration;
    if let Some(d) = deadline {
        if d < end {
            end = d;
        }
    }
    if Instant::now() >= end {
        return Ok(SizeEstimate {
            bytes: 0,
            file_count: 0,
            error_count: 1,
            method: SizeEstimateMethod::BudgetExhausted,
        });
    }

    Ok(estimate_dir_size_walkdir(path, end))
}

fn estimate_dir_size_walkdir(path: &Path, end: Instant) -> SizeEstimate {
    let mut bytes: u64 = 0;
    let mut files: u64 = 0;
    let mut errors: u64 = 0;
    let mut truncated = false;

    for entry in WalkDir::new(path).follow_links(false) {
        if Instant::now() >= end {
            truncated = true;
            break;
        }
        match entry {
            Ok(entry) => {
                if !entry.file_type().is_file() {
                    continue;
                }
                match entry.metadata() {
                    Ok(meta) => {
                        bytes = bytes.saturating_add(meta.len());
                        files = files.saturating_add(1);
                    }
                    Err(_) => {
                        errors = errors.saturating_add(1);
                    }
                }
            }
            Err(_) => {
                errors = errors.saturating_add(1);
            }
        }
    }

    if truncated {
        errors = errors.max(1);
    }

    SizeEstimate {
        bytes,
        file_count: files,
        error_count: errors,
        method: if truncated {
            SizeEstimateMethod::WalkDirTruncated
        } else {
            SizeEstimateMethod::WalkDir
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU64, Ordering};

    fn temp_dir(tag: &str) -> std::path::PathBuf {
        static SEQ: AtomicU64 = AtomicU64::new(0);
        let seq = SEQ.fetch_add(1, Ordering::Relaxed);
        let dir = std::env::temp_dir().join(format!(
            "winaudit-{tag}-{}-{seq}",
            std::process::id()
        ));
        let _ = std::fs::remove_dir_all(&dir);
        std::fs::create_dir_all(&dir).expect("create dir");
        dir
    }

    #[test]
    fn estimate_dir_size_sums_nested_files() {
        let dir = temp_dir("estimate-sum");
        std::fs::create_dir_all(dir.join("nested")).expect("mkdir");
        std::fs::write(dir.join("a.bin"), b"hello").expect("write");
        std::fs::write(dir.join("nested/b.bin"), b"world!").expect("write");

        let est = estimate_dir_size(&dir, Duration::from_secs(5), None).expect("estimate");
        assert_eq!(est.bytes, 11);
        assert_eq!(est.file_count, 2);
        assert_eq!(est.method, SizeEstimateMethod::WalkDir);
        assert!(!est.is_lower_bound());

        let _ = std::fs::remove_dir_all(&dir);
    }

    #[test]
    fn estimate_dir_size_respects_deadline_and_returns_budget_exhausted() {
        let dir = temp_dir("estimate-deadline");
        std::fs::write(dir.join("file.bin"), b"hello").expect("write");

        let deadline = Instant::now() - Duration::from_secs(1);
        let est =
            estimate_dir_size(&dir, Duration::from_secs(5), Some(deadline)).expect("estimate");
        assert_eq!(est.bytes, 0);
        assert!(est.error_count > 0);
        assert_eq!(est.method, SizeEstimateMethod::BudgetExhausted);

        let _ = std::fs::remove_dir_all(&dir);
    }

    #[test]
    fn estimate_dir_size_errors_for_missing_directory() {
        let dir = std::env::temp_dir().join("winaudit-definitely-missing-dir");
        assert!(estimate_dir_size(&dir, Duration::from_secs(1), None).is_err());
    }
}
