use crate::core::{Impact, OptimizationCategory, OptimizationOpportunity, ScanOutcome};
use crate::optimize::ScanContext;
use crate::ui::format_bytes;

pub const LOW_FREE_SPACE_PERCENT: f64 = 20.0;
pub const TEMP_DIR_THRESHOLD_BYTES: u64 = 100 * 1024 * 1024;

pub fn scan(ctx: &ScanContext<'_>) -> ScanOutcome {
    let mut out = ScanOutcome::new(OptimizationCategory::Disk);

    match ctx.probe.volumes() {
        Ok(volumes) => {
            out.count("volumes", volumes.len() as u64);
            for vol in &volumes {
                let free = vol.free_percent();
                if vol.is_system && free < LOW_FREE_SPACE_PERCENT {
                    out.opportunities.push(OptimizationOpportunity::new(
                        OptimizationCategory::Disk,
                        "low_disk_space",
                        Impact::High,
                        vol.mount_point.clone(),
                        format!(
                            "System drive {} has only {free:.1}% free ({} of {})",
                            vol.mount_point,
                            format_bytes(vol.available_bytes),
                            format_bytes(vol.total_bytes)
                        ),
                        "Prevents slowdowns from a full drive and keeps room for updates",
                    ));
                }
                if !vol.is_removable && vol.is_ssd == Some(false) {
                    out.opportunities.push(OptimizationOpportunity::new(
                        OptimizationCategory::Disk,
                        "fragmentation",
                        Impact::Low,
                        vol.mount_point.clone(),
                        format!("Hard disk {} may benefit from defragmentation", vol.mount_point),
                        "Faster sequential reads on rotational media",
                    ));
                }
            }
        }
        Err(err) => out.skip("volumes", &err),
    }

    for dir in &ctx.temp_dirs {
        let label = dir.display().to_string();
        match ctx.probe.dir_size(dir) {
            Ok(bytes) => {
                out.count("temp_dirs_checked", 1);
                out.count("temp_bytes", bytes);
                if bytes > TEMP_DIR_THRESHOLD_BYTES {
                    out.opportunities.push(OptimizationOpportunity::new(
                        OptimizationCategory::Disk,
                        "temp_files",
                        Impact::Medium,
                        label.clone(),
                        format!("Temporary files in {label} use {}", format_bytes(bytes)),
                        format!("Up to {} of disk space", format_bytes(bytes)),
                    ));
                }
            }
            Err(err) => out.skip(&label, &err),
        }
    }

    out
}
