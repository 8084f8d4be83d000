//! Read access to host state for reconciliation and the optimization
//! scanners.
//!
//! [`HostProbe`] queries the running machine; [`SnapshotProbe`] replays a
//! captured JSON snapshot so another machine's state can be analyzed offline.

use std::collections::BTreeMap;
use std::path::Path;
use std::time::{Duration, Instant};

use anyhow::{Result, anyhow};
use serde::{Deserialize, Serialize};

mod host;

pub use host::HostProbe;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RegistryValue {
    Dword(u64),
    Text(String),
}

impl RegistryValue {
    pub fn as_u64(&self) -> Option<u64> {
        match self {
            RegistryValue::Dword(n) => Some(*n),
            RegistryValue::Text(s) => s.trim().parse::<u64>().ok(),
        }
    }

    pub fn as_text(&self) -> String {
        match self {
            RegistryValue::Dword(n) => n.to_string(),
            RegistryValue::Text(s) => s.trim().to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StartupItem {
    pub name: String,
    #[serde(default)]
    pub command: String,
    #[serde(default)]
    pub location: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServiceInfo {
    pub name: String,
    #[serde(default)]
    pub display_name: String,
    #[serde(default)]
    pub start_mode: String,
    #[serde(default)]
    pub state: String,
}

impl ServiceInfo {
    pub fn is_auto_running(&self) -> bool {
        self.start_mode.eq_ignore_ascii_case("auto") && self.state.eq_ignore_ascii_case("running")
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VolumeInfo {
    pub mount_point: String,
    pub total_bytes: u64,
    pub available_bytes: u64,
    #[serde(default)]
    pub is_removable: bool,
    /// `None` when the media type could not be determined.
    #[serde(default)]
    pub is_ssd: Option<bool>,
    #[serde(default)]
    pub is_system: bool,
}

impl VolumeInfo {
    pub fn free_percent(&self) -> f64 {
        if self.total_bytes == 0 {
            return 100.0;
        }
        self.available_bytes as f64 / self.total_bytes as f64 * 100.0
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NetworkAdapter {
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub is_up: bool,
    #[serde(default)]
    pub link_speed_bps: u64,
    /// `None` when the adapter does not expose receive-side scaling.
    #[serde(default)]
    pub rss_enabled: Option<bool>,
}

pub trait SystemProbe {
    fn command_available(&self, name: &str) -> bool;
    fn registry_key_exists(&self, key: &str) -> Result<bool>;
    fn registry_value(&self, key: &str, name: &str) -> Result<Option<RegistryValue>>;
    fn registry_value_count(&self, key: &str) -> Result<usize>;
    fn startup_items(&self) -> Result<Vec<StartupItem>>;
    fn services(&self) -> Result<Vec<ServiceInfo>>;
    fn volumes(&self) -> Result<Vec<VolumeInfo>>;
    fn dir_size(&self, path: &Path) -> Result<u64>;
    fn network_adapters(&self) -> Result<Vec<NetworkAdapter>>;
    fn dns_servers(&self) -> Result<Vec<String>>;
}

/// Time budget shared by probes that shell out.
#[derive(Debug, Clone, Copy)]
pub struct ProbeBudget {
    pub timeout: Duration,
    pub deadline: Option<Instant>,
}

impl ProbeBudget {
    pub fn command_timeout(&self) -> Duration {
        let Some(deadline) = self.deadline else {
            return self.timeout;
        };
        let remaining = deadline.saturating_duration_since(Instant::now());
        std::cmp::min(self.timeout, remaining)
    }
}

/// Host state captured as JSON. Absent sections behave like an unreachable
/// data source.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SnapshotProbe {
    #[serde(default)]
    pub tools: Vec<String>,
    #[serde(default)]
    pub registry: Option<BTreeMap<String, BTreeMap<String, RegistryValue>>>,
    #[serde(default)]
    pub startup_items: Option<Vec<StartupItem>>,
    #[serde(default)]
    pub services: Option<Vec<ServiceInfo>>,
    #[serde(default)]
    pub volumes: Option<Vec<VolumeInfo>>,
    #[serde(default)]
    pub dir_sizes: Option<BTreeMap<String, u64>>,
    #[serde(default)]
    pub network_adapters: Option<Vec<NetworkAdapter>>,
    #[serde(default)]
    pub dns_servers: Option<Vec<String>>,
}

impl SnapshotProbe {
    pub fn load(path: &Path) -> Result<Self> {
        use anyhow::Context;

        let s = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read host snapshot: {}", path.display()))?;
        serde_json::from_str(&s)
            .with_context(|| format!("failed to parse host snapshot: {}", path.display()))
    }

    fn registry_key(&self, key: &str) -> Result<Option<&BTreeMap<String, RegistryValue>>> {
        let registry = self
            .registry
            .as_ref()
            .ok_or_else(|| missing_section("registry"))?;
        Ok(registry
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(key))
            .map(|(_, v)| v))
    }
}

fn missing_section(name: &str) -> anyhow::Error {
    anyhow!("host snapshot has no {name} section")
}

impl SystemProbe for SnapshotProbe {
    fn command_available(&self, name: &str) -> bool {
        self.tools.iter().any(|t| t.eq_ignore_ascii_case(name))
    }

    fn registry_key_exists(&self, key: &str) -> Result<bool> {
        Ok(self.registry_key(key)?.is_some())
    }

    fn registry_value(&self, key: &str, name: &str) -> Result<Option<RegistryValue>> {
        let Some(values) = self.registry_key(key)? else {
            return Ok(None);
        };
        Ok(values
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.clone()))
    }

    fn registry_value_count(&self, key: &str) -> Result<usize> {
        Ok(self.registry_key(key)?.map(|v| v.len()).unwrap_or(0))
    }

    fn startup_items(&self) -> Result<Vec<StartupItem>> {
        self.startup_items
            .clone()
            .ok_or_else(|| missing_section("startup_items"))
    }

    fn services(&self) -> Result<Vec<ServiceInfo>> {
        self.services.clone().ok_or_else(|| missing_section("services"))
    }

    fn volumes(&self) -> Result<Vec<VolumeInfo>> {
        self.volumes.clone().ok_or_else(|| missing_section("volumes"))
    }

    fn dir_size(&self, path: &Path) -> Result<u64> {
        let sizes = self
            .dir_sizes
            .as_ref()
            .ok_or_else(|| missing_section("dir_sizes"))?;
        let wanted = path.display().to_string();
        sizes
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(&wanted))
            .map(|(_, v)| *v)
            .ok_or_else(|| anyhow!("no size recorded for {wanted}"))
    }

    fn network_adapters(&self) -> Result<Vec<NetworkAdapter>> {
        self.network_adapters
            .clone()
            .ok_or_else(|| missing_section("network_adapters"))
    }

    fn dns_servers(&self) -> Result<Vec<String>> {
        self.dns_servers
            .clone()
            .ok_or_else(|| missing_section("dns_servers"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn registry_value_accepts_numbers_and_text() {
        let v: RegistryValue = serde_json::from_str("2").expect("number");
        assert_eq!(v.as_u64(), Some(2));
        let v: RegistryValue = serde_json::from_str("\"400\"").expect("text");
        assert_eq!(v.as_u64(), Some(400));
        assert_eq!(v.as_text(), "400");
    }

    #[test]
    fn snapshot_probe_lookups_are_case_insensitive() {
        let probe: SnapshotProbe = serde_json::from_str(
            r#"{
                "tools": ["winget"],
                "registry": {
                    "HKCU\\Control Panel\\Desktop": {"MenuShowDelay": "400"}
                }
            }"#,
        )
        .expect("parse snapshot");

        assert!(probe.command_available("WINGET"));
        assert!(!probe.command_available("choco"));
        assert!(
            probe
                .registry_key_exists("hkcu\\control panel\\desktop")
                .expect("exists")
        );
        let v = probe
            .registry_value("HKCU\\Control Panel\\Desktop", "menushowdelay")
            .expect("value")
            .expect("present");
        assert_eq!(v.as_u64(), Some(400));
        assert_eq!(probe.registry_value_count("HKCU\\Missing").expect("count"), 0);
    }

    #[test]
    fn snapshot_probe_missing_sections_are_errors() {
        let probe = SnapshotProbe::default();
        assert!(probe.services().is_err());
        assert!(probe.registry_key_exists("HKLM\\SOFTWARE").is_err());
        assert!(probe.dir_size(Path::new("C:\\Windows\\Temp")).is_err());
    }

    #[test]
    fn free_percent_handles_zero_total() {
        let v = VolumeInfo {
            mount_point: "C:\\".to_string(),
            total_bytes: 0,
            available_bytes: 0,
            is_removable: false,
            is_ssd: None,
            is_system: true,
        };
        assert_eq!(v.free_percent(), 100.0);
    }
}
