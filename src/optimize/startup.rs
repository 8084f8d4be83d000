use crate::core::{Impact, OptimizationCategory, OptimizationOpportunity, ScanOutcome};
use crate::optimize::{ScanContext, contains_any};

const NON_ESSENTIAL_PROGRAMS: [&str; 14] = [
    "spotify", "discord", "steam", "skype", "teams", "onedrive", "dropbox", "itunes",
    "epicgames", "zoom", "slack", "adobe", "ccleaner", "utorrent",
];

const SAFE_PROGRAMS: [&str; 11] = [
    "security", "defender", "antivirus", "realtek", "audio", "nvidia", "intel", "amd",
    "synaptics", "driver", "bluetooth",
];

const NON_ESSENTIAL_SERVICES: [&str; 10] = [
    "xbox", "xbl", "fax", "retaildemo", "mapsbroker", "diagtrack", "dmwappushservice",
    "wmpnetworksvc", "remoteregistry", "wisvc",
];

const PROTECTED_SERVICES: [&str; 11] = [
    "defender", "security", "update", "audio", "dhcp", "dns", "rpc", "eventlog", "firewall",
    "wuauserv", "bits",
];

pub fn scan(ctx: &ScanContext<'_>) -> ScanOutcome {
    let mut out = ScanOutcome::new(OptimizationCategory::Startup);

    match ctx.probe.startup_items() {
        Ok(items) => {
            out.count("startup_items", items.len() as u64);
            for item in items {
                let haystack = format!("{} {}", item.name, item.command).to_lowercase();
                if !contains_any(&haystack, &NON_ESSENTIAL_PROGRAMS)
                    || contains_any(&haystack, &SAFE_PROGRAMS)
                {
                    continue;
                }
                out.opportunities.push(OptimizationOpportunity::new(
                    OptimizationCategory::Startup,
                    "startup_program",
                    Impact::Medium,
                    item.name.clone(),
                    format!("Disable non-essential startup program: {}", item.name),
                    "Faster boot (roughly 1-3 seconds per program)",
                ));
            }
        }
        Err(err) => out.skip("startup_items", &err),
    }

    match ctx.probe.services() {
        Ok(services) => {
            out.count("services_checked", services.len() as u64);
            for svc in services.iter().filter(|s| s.is_auto_running()) {
                let haystack = format!("{} {}", svc.name, svc.display_name).to_lowercase();
                if !contains_any(&haystack, &NON_ESSENTIAL_SERVICES)
                    || contains_any(&haystack, &PROTECTED_SERVICES)
                {
                    continue;
                }
                let label = if svc.display_name.is_empty() {
                    svc.name.as_str()
                } else {
                    svc.display_name.as_str()
                };
                out.opportunities.push(OptimizationOpportunity::new(
                    OptimizationCategory::Startup,
                    "service",
                    Impact::Low,
                    svc.name.clone(),
                    format!("Set non-essential service to manual start: {label}"),
                    "Lower memory use and slightly faster boot",
                ));
            }
        }
        Err(err) => out.skip("services", &err),
    }

    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::optimize::testing::probe;

    #[test]
    fn flags_non_essential_programs_but_not_safe_ones() {
        let probe = probe(
            r#"{
                "startup_items": [
                    {"name": "Spotify", "command": "C:\\Users\\me\\AppData\\Roaming\\Spotify\\Spotify.exe /minimized"},
                    {"name": "RtkAudUService", "command": "C:\\Windows\\System32\\RtkAudUService64.exe"},
                    {"name": "Steam", "command": "steam.exe -silent"},
                    {"name": "NVIDIA Share", "command": "C:\\Program Files\\NVIDIA\\discord-overlay.exe"}
                ],
                "services": []
            }"#,
        );
        let ctx = ScanContext {
            probe: &probe,
            temp_dirs: vec![],
        };
        let out = scan(&ctx);
        let targets: Vec<&str> = out.opportunities.iter().map(|o| o.target.as_str()).collect();
        assert_eq!(targets, vec!["Spotify", "Steam"]);
        assert!(out.opportunities.iter().all(|o| o.impact == Impact::Medium));
        assert_eq!(out.counters.get("startup_items"), Some(&4));
        assert!(out.skipped_checks.is_empty());
    }

    #[test]
    fn flags_only_auto_running_unprotected_services() {
        let probe = probe(
            r#"{
                "startup_items": [],
                "services": [
                    {"name": "DiagTrack", "display_name": "Connected User Experiences and Telemetry", "start_mode": "Auto", "state": "Running"},
                    {"name": "XblGameSave", "display_name": "Xbox Live Game Save", "start_mode": "Manual", "state": "Stopped"},
                    {"name": "Fax", "display_name": "Fax", "start_mode": "Auto", "state": "Stopped"},
                    {"name": "XboxNetApiSvc", "display_name": "Xbox Live Networking Security Service", "start_mode": "Auto", "state": "Running"}
                ]
            }"#,
        );
        let ctx = ScanContext {
            probe: &probe,
            temp_dirs: vec![],
        };
        let out = scan(&ctx);
        assert_eq!(out.opportunities.len(), 1);
        assert_eq!(out.opportunities[0].target, "DiagTrack");
        assert_eq!(out.opportunities[0].impact, Impact::Low);
        assert_eq!(out.counters.get("services_checked"), Some(&4));
    }

    #[test]
    fn missing_sources_are_skipped_not_fatal() {
        let probe = probe(r#"{"services": []}"#);
        let ctx = ScanContext {
            probe: &probe,
            temp_dirs: vec![],
        };
        let out = scan(&ctx);
        assert!(out.opportunities.is_empty());
        assert_eq!(out.skipped_checks.len(), 1);
        assert!(out.skipped_checks[0].starts_with("startup_items"));
    }
}
