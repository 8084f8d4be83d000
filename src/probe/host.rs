use std::path::Path;
use std::time::{Duration, Instant};

use anyhow::{Result, anyhow};
use serde_json::Value;

use crate::platform::windows::{
    json_rows, parse_reg_number, parse_reg_query, powershell_json, reg_query, reg_query_value,
};
use crate::probe::{
    NetworkAdapter, ProbeBudget, RegistryValue, ServiceInfo, StartupItem, SystemProbe, VolumeInfo,
};

const STARTUP_SCRIPT: &str =
    "Get-CimInstance Win32_StartupCommand | Select-Object Name, Command, Location";
const SERVICES_SCRIPT: &str =
    "Get-CimInstance Win32_Service | Select-Object Name, DisplayName, StartMode, State";
const ADAPTERS_SCRIPT: &str = "Get-NetAdapter | Select-Object Name, InterfaceDescription, Status, ReceiveLinkSpeed, LinkSpeed";
const RSS_SCRIPT: &str =
    "Get-NetAdapterRss -ErrorAction SilentlyContinue | Select-Object Name, Enabled";
const DNS_SCRIPT: &str = "Get-DnsClientServerAddress -AddressFamily IPv4 | Select-Object -ExpandProperty ServerAddresses";

#[derive(Debug, Clone)]
pub struct HostProbe {
    budget: ProbeBudget,
}

impl HostProbe {
    pub fn new(timeout: Duration, deadline: Option<Instant>) -> Self {
        Self {
            budget: ProbeBudget { timeout, deadline },
        }
    }

    fn timeout(&self) -> Result<Duration> {
        let t = self.budget.command_timeout();
        if t == Duration::from_secs(0) {
            return Err(anyhow!("time budget exhausted"));
        }
        Ok(t)
    }

    fn require_windows(&self, what: &str) -> Result<()> {
        if crate::platform::is_windows() {
            Ok(())
        } else {
            Err(crate::platform::unsupported(what))
        }
    }

    fn powershell_rows(&self, what: &str, script: &str) -> Result<Vec<Value>> {
        self.require_windows(what)?;
        Ok(json_rows(powershell_json(script, self.timeout()?)?))
    }
}

impl SystemProbe for HostProbe {
    fn command_available(&self, name: &str) -> bool {
        crate::platform::find_in_path(name).is_some()
    }

    fn registry_key_exists(&self, key: &str) -> Result<bool> {
        self.require_windows("registry access")?;
        let output = reg_query(key, false, self.timeout()?)?;
        Ok(output.success())
    }

    fn registry_value(&self, key: &str, name: &str) -> Result<Option<RegistryValue>> {
        self.require_windows("registry access")?;
        let output = reg_query_value(key, name, self.timeout()?)?;
        if !output.success() {
            return Ok(None);
        }
        let blocks = parse_reg_query(&output.stdout);
        let Some(line) = blocks.iter().find_map(|b| b.get(name)) else {
            return Ok(None);
        };
        Ok(Some(registry_value_from_line(&line.kind, &line.data)))
    }

    fn registry_value_count(&self, key: &str) -> Result<usize> {
        self.require_windows("registry access")?;
        let output = reg_query(key, false, self.timeout()?)?;
        if !output.success() {
            return Ok(0);
        }
        Ok(parse_reg_query(&output.stdout)
            .first()
            .map(|b| b.values.len())
            .unwrap_or(0))
    }

    fn startup_items(&self) -> Result<Vec<StartupItem>> {
        let rows = self.powershell_rows("startup item enumeration", STARTUP_SCRIPT)?;
        Ok(parse_startup_rows(&rows))
    }

    fn services(&self) -> Result<Vec<ServiceInfo>> {
        let rows = self.powershell_rows("service enumeration", SERVICES_SCRIPT)?;
        Ok(parse_service_rows(&rows))
    }

    fn volumes(&self) -> Result<Vec<VolumeInfo>> {
        let disks = sysinfo::Disks::new_with_refreshed_list();
        let system_root = system_mount_point();
        let volumes: Vec<VolumeInfo> = disks
            .list()
            .iter()
            .map(|d| {
                let mount_point = d.mount_point().display().to_string();
                VolumeInfo {
                    is_system: mount_point.eq_ignore_ascii_case(&system_root),
                    mount_point,
                    total_bytes: d.total_space(),
                    available_bytes: d.available_space(),
                    is_removable: d.is_removable(),
                    is_ssd: match d.kind() {
                        sysinfo::DiskKind::SSD => Some(true),
                        sysinfo::DiskKind::HDD => Some(false),
                        sysinfo::DiskKind::Unknown(_) => None,
                    },
                }
            })
            .collect();
        if volumes.is_empty() {
            return Err(anyhow!("no volumes reported"));
        }
        Ok(volumes)
    }

    fn dir_size(&self, path: &Path) -> Result<u64> {
        let estimate =
            crate::scan::estimate_dir_size(path, self.budget.timeout, self.budget.deadline)?;
        if estimate.method == crate::scan::SizeEstimateMethod::BudgetExhausted {
            return Err(anyhow!("time budget exhausted: {}", path.display()));
        }
        if estimate.is_lower_bound() {
            tracing::debug!(
                path = %path.display(),
                bytes = estimate.bytes,
                errors = estimate.error_count,
                "directory size is a lower bound"
            );
        }
        Ok(estimate.bytes)
    }

    fn network_adapters(&self) -> Result<Vec<NetworkAdapter>> {
        let adapters = self.powershell_rows("network adapter enumeration", ADAPTERS_SCRIPT)?;
        let rss = match self.powershell_rows("RSS query", RSS_SCRIPT) {
            Ok(rows) => rows,
            Err(err) => {
                tracing::debug!("RSS query failed: {err:#}");
                Vec::new()
            }
        };
        Ok(parse_adapter_rows(&adapters, &rss))
    }

    fn dns_servers(&self) -> Result<Vec<String>> {
        let rows = self.powershell_rows("DNS client query", DNS_SCRIPT)?;
        let mut servers: Vec<String> = rows
            .iter()
            .filter_map(|v| v.as_str())
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect();
        servers.dedup();
        Ok(servers)
    }
}

fn system_mount_point() -> String {
    if cfg!(windows) {
        let drive = std::env::var("SystemDrive").unwrap_or_else(|_| "C:".to_string());
        format!("{}\\", drive.trim_end_matches('\\'))
    } else {
        "/".to_string()
    }
}

fn registry_value_from_line(kind: &str, data: &str) -> RegistryValue {
    if kind == "REG_DWORD" || kind == "REG_QWORD" {
        if let Some(n) = parse_reg_number(data) {
            return RegistryValue::Dword(n);
        }
    }
    RegistryValue::Text(data.trim().to_string())
}

fn str_field(row: &Value, key: &str) -> String {
    match row.get(key) {
        Some(Value::String(s)) => s.trim().to_string(),
        Some(Value::Number(n)) => n.to_string(),
        Some(Value::Bool(b)) => b.to_string(),
        _ => String::new(),
    }
}

pub(crate) fn parse_startup_rows(rows: &[Value]) -> Vec<StartupItem> {
    rows.iter()
        .map(|row| StartupItem {
            name: str_field(row, "Name"),
            command: str_field(row, "Command"),
            location: str_field(row, "Location"),
        })
        .filter(|item| !item.name.is_empty())
        .collect()
}

pub(crate) fn parse_service_rows(rows: &[Value]) -> Vec<ServiceInfo> {
    rows.iter()
        .map(|row| ServiceInfo {
            name: str_field(row, "Name"),
            display_name: str_field(row, "DisplayName"),
            start_mode: str_field(row, "StartMode"),
            state: str_field(row, "State"),
        })
        .filter(|svc| !svc.name.is_empty())
        .collect()
}

pub(crate) fn parse_adapter_rows(adapters: &[Value], rss: &[Value]) -> Vec<NetworkAdapter> {
    adapters
        .iter()
        .map(|row| {
            let name = str_field(row, "Name");
            let link_speed_bps = row
                .get("ReceiveLinkSpeed")
                .and_then(Value::as_u64)
                .or_else(|| parse_link_speed(&str_field(row, "LinkSpeed")))
                .unwrap_or(0);
            let rss_enabled = rss
                .iter()
                .find(|r| str_field(r, "Name") == name)
                .and_then(|r| r.get("Enabled"))
                .and_then(Value::as_bool);
            NetworkAdapter {
                description: str_field(row, "InterfaceDescription"),
                is_up: str_field(row, "Status").eq_ignore_ascii_case("up"),
                link_speed_bps,
                rss_enabled,
                name,
            }
        })
        .filter(|a| !a.name.is_empty())
        .collect()
}

/// Parses `Get-NetAdapter` speed strings such as `2.5 Gbps` or `100 Mbps`.
pub(crate) fn parse_link_speed(s: &str) -> Option<u64> {
    let mut parts = s.split_whitespace();
    let value: f64 = parts.next()?.parse().ok()?;
    let multiplier = match parts.next()?.to_ascii_lowercase().as_str() {
        "gbps" => 1_000_000_000.0,
        "mbps" => 1_000_000.0,
        "kbps" => 1_000.0,
        "bps" => 1.0,
        _ => return None,
    };
    Some((value * multiplier) as u64)
}
