use crate::core::{Impact, OptimizationCategory, OptimizationOpportunity, ScanOutcome};
use crate::optimize::ScanContext;

/// Value count above which an MRU list is worth clearing.
pub const DIAGNOSTIC_HISTORY_THRESHOLD: usize = 100;

const HISTORY_KEYS: [&str; 3] = [
    "HKCU\\Software\\Microsoft\\Windows\\CurrentVersion\\Explorer\\RecentDocs",
    "HKCU\\Software\\Microsoft\\Windows\\CurrentVersion\\Explorer\\RunMRU",
    "HKCU\\Software\\Microsoft\\Windows\\CurrentVersion\\Explorer\\ComDlg32\\OpenSavePidlMRU",
];

const PREFETCH_KEY: &str = "HKLM\\SYSTEM\\CurrentControlSet\\Control\\Session Manager\\Memory Management\\PrefetchParameters";

pub fn scan(ctx: &ScanContext<'_>) -> ScanOutcome {
    let mut out = ScanOutcome::new(OptimizationCategory::Registry);

    for key in HISTORY_KEYS {
        match ctx.probe.registry_value_count(key) {
            Ok(count) => {
                out.count("keys_checked", 1);
                if count > DIAGNOSTIC_HISTORY_THRESHOLD {
                    out.opportunities.push(OptimizationOpportunity::new(
                        OptimizationCategory::Registry,
                        "diagnostic_history",
                        Impact::Low,
                        key,
                        format!("History list holds {count} entries"),
                        "Smaller registry hive and less history retained",
                    ));
                }
            }
            Err(err) => out.skip(key, &err),
        }
    }

    match ctx.probe.registry_value(PREFETCH_KEY, "EnablePrefetcher") {
        Ok(value) => {
            out.count("keys_checked", 1);
            if value.and_then(|v| v.as_u64()) == Some(0) {
                out.opportunities.push(OptimizationOpportunity::new(
                    OptimizationCategory::Registry,
                    "prefetch_disabled",
                    Impact::Medium,
                    format!("{PREFETCH_KEY}\\EnablePrefetcher"),
                    "Prefetch is disabled",
                    "Faster application launch",
                ));
            }
        }
        Err(err) => out.skip("EnablePrefetcher", &err),
    }

    out
}
