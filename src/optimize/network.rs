use crate::core::{Impact, OptimizationCategory, OptimizationOpportunity, ScanOutcome};
use crate::optimize::ScanContext;

/// Adapters faster than this benefit noticeably from receive-side scaling.
pub const HIGH_SPEED_BPS: u64 = 1_000_000_000;

pub const FAST_DNS_SERVERS: [&str; 6] = [
    "1.1.1.1",
    "1.0.0.1",
    "8.8.8.8",
    "8.8.4.4",
    "9.9.9.9",
    "208.67.222.222",
];

pub fn scan(ctx: &ScanContext<'_>) -> ScanOutcome {
    let mut out = ScanOutcome::new(OptimizationCategory::Network);

    match ctx.probe.network_adapters() {
        Ok(adapters) => {
            out.count("adapters", adapters.len() as u64);
            for nic in adapters
                .iter()
                .filter(|a| a.is_up && a.link_speed_bps > HIGH_SPEED_BPS)
            {
                if nic.rss_enabled != Some(false) {
                    continue;
                }
                out.opportunities.push(OptimizationOpportunity::new(
                    OptimizationCategory::Network,
                    "rss_disabled",
                    Impact::Medium,
                    nic.name.clone(),
                    format!(
                        "Receive-side scaling is disabled on high-speed adapter {}",
                        nic.name
                    ),
                    "Higher throughput and lower CPU load under network traffic",
                ));
            }
        }
        Err(err) => out.skip("network_adapters", &err),
    }

    match ctx.probe.dns_servers() {
        Ok(servers) => {
            out.count("dns_servers", servers.len() as u64);
            let uses_fast = servers
                .iter()
                .any(|s| FAST_DNS_SERVERS.contains(&s.trim()));
            if !servers.is_empty() && !uses_fast {
                out.opportunities.push(OptimizationOpportunity::new(
                    OptimizationCategory::Network,
                    "dns",
                    Impact::Low,
                    servers.join(", "),
                    "No fast public DNS resolver is configured",
                    "Quicker name resolution when browsing",
                ));
            }
        }
        Err(err) => out.skip("dns_servers", &err),
    }

    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::optimize::testing::probe;

    #[test]
    fn flags_rss_only_on_fast_up_adapters() {
        let probe = probe(
            r#"{
                "network_adapters": [
                    {"name": "Ethernet", "is_up": true, "link_speed_bps": 2500000000, "rss_enabled": false},
                    {"name": "Ethernet 2", "is_up": true, "link_speed_bps": 1000000000, "rss_enabled": false},
                    {"name": "Ethernet 3", "is_up": false, "link_speed_bps": 10000000000, "rss_enabled": false},
                    {"name": "Wi-Fi", "is_up": true, "link_speed_bps": 2400000000}
                ],
                "dns_servers": ["1.1.1.1"]
            }"#,
        );
        let ctx = ScanContext {
            probe: &probe,
            temp_dirs: vec![],
        };
        let out = scan(&ctx);
        assert_eq!(out.opportunities.len(), 1);
        assert_eq!(out.opportunities[0].target, "Ethernet");
        assert_eq!(out.opportunities[0].impact, Impact::Medium);
        assert_eq!(out.counters.get("adapters"), Some(&4));
    }

    #[test]
    fn flags_isp_dns() {
        let probe = probe(r#"{"network_adapters": [], "dns_servers": ["192.168.1.1", "fe80::1"]}"#);
        let ctx = ScanContext {
            probe: &probe,
            temp_dirs: vec![],
        };
        let out = scan(&ctx);
        assert_eq!(out.opportunities.len(), 1);
        assert_eq!(out.opportunities[0].opportunity_type, "dns");
        assert_eq!(out.opportunities[0].impact, Impact::Low);
    }

    #[test]
    fn no_dns_servers_means_nothing_to_recommend() {
        let probe = probe(r#"{"network_adapters": [], "dns_servers": []}"#);
        let ctx = ScanContext {
            probe: &probe,
            temp_dirs: vec![],
        };
        assert!(scan(&ctx).opportunities.is_empty());
    }
}
