//! Optimization opportunity scanners.
//!
//! Each scanner looks at one facet of the host and never fails as a whole: a
//! check whose data source is unavailable is recorded in
//! `ScanOutcome::skipped_checks` and the scanner moves on.

use std::path::PathBuf;

use crate::core::ScanOutcome;
use crate::probe::SystemProbe;

mod disk;
mod network;
mod registry;
mod startup;
mod ui;

pub use disk::{LOW_FREE_SPACE_PERCENT, TEMP_DIR_THRESHOLD_BYTES};
pub use network::{FAST_DNS_SERVERS, HIGH_SPEED_BPS};
pub use registry::DIAGNOSTIC_HISTORY_THRESHOLD;

pub struct ScanContext<'a> {
    pub probe: &'a dyn SystemProbe,
    pub temp_dirs: Vec<PathBuf>,
}

impl<'a> ScanContext<'a> {
    pub fn new(probe: &'a dyn SystemProbe) -> Self {
        Self {
            probe,
            temp_dirs: default_temp_dirs(),
        }
    }
}

pub type Scanner = fn(&ScanContext<'_>) -> ScanOutcome;

pub const SCANNERS: [(&str, Scanner); 5] = [
    ("startup", startup::scan),
    ("ui", ui::scan),
    ("registry", registry::scan),
    ("disk", disk::scan),
    ("network", network::scan),
];

/// Runs every scanner in a fixed order, one after another.
pub fn run_all(ctx: &ScanContext<'_>) -> Vec<ScanOutcome> {
    SCANNERS
        .iter()
        .map(|(name, scan)| {
            let outcome = scan(ctx);
            tracing::info!(
                scanner = name,
                opportunities = outcome.opportunities.len(),
                skipped = outcome.skipped_checks.len(),
                "scanner finished"
            );
            outcome
        })
        .collect()
}

/// User and system temp folders plus the Windows Update download cache.
pub fn default_temp_dirs() -> Vec<PathBuf> {
    let mut dirs = vec![std::env::temp_dir()];
    if cfg!(windows) {
        if let Some(local) = std::env::var_os("LOCALAPPDATA") {
            dirs.push(PathBuf::from(local).join("Temp"));
        }
        let root = std::env::var_os("SystemRoot")
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from("C:\\Windows"));
        dirs.push(root.join("Temp"));
        dirs.push(root.join("SoftwareDistribution").join("Download"));
    }

    let mut unique: Vec<PathBuf> = Vec::new();
    for dir in dirs {
        let key = dir.display().to_string().to_lowercase();
        let key = key.trim_end_matches(['\\', '/']).to_string();
        if !unique.iter().any(|d| {
            d.display()
                .to_string()
                .to_lowercase()
                .trim_end_matches(['\\', '/'])
                == key
        }) {
            unique.push(dir);
        }
    }
    unique
}

pub(crate) fn contains_any(haystack: &str, needles: &[&str]) -> bool {
    needles.iter().any(|n| haystack.contains(n))
}

#[cfg(test)]
pub(crate) mod testing {
    use crate::probe::SnapshotProbe;

    pub fn probe(json: &str) -> SnapshotProbe {
        serde_json::from_str(json).expect("parse snapshot")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::probe::SnapshotProbe;

    #[test]
    fn run_all_tolerates_an_empty_probe() {
        let probe = SnapshotProbe::default();
        let ctx = ScanContext {
            probe: &probe,
            temp_dirs: vec![PathBuf::from("C:\\Windows\\Temp")],
        };
        let outcomes = run_all(&ctx);
        assert_eq!(outcomes.len(), 5);
        assert!(outcomes.iter().all(|o| o.opportunities.is_empty()));
        assert!(outcomes.iter().all(|o| !o.skipped_checks.is_empty()));
    }

    #[test]
    fn default_temp_dirs_are_unique() {
        let dirs = default_temp_dirs();
        assert!(!dirs.is_empty());
        let mut keys: Vec<String> = dirs
            .iter()
            .map(|d| d.display().to_string().to_lowercase())
            .collect();
        let before = keys.len();
        keys.sort();
        keys.dedup();
        assert_eq!(keys.len(), before);
    }
}
