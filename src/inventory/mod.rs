//! Installed-software collection.
//!
//! Every source yields [`RawRecord`]s in its own shape; they are normalized
//! into [`InstalledRecord`] here and nowhere else.

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::core::{InstallSourceKind, InstalledRecord};

mod parse;

pub use parse::{parse_appx_rows, parse_choco_list, parse_registry_uninstall, parse_winget_list};

const UNINSTALL_KEYS: [&str; 3] = [
    "HKLM\\SOFTWARE\\Microsoft\\Windows\\CurrentVersion\\Uninstall",
    "HKLM\\SOFTWARE\\WOW6432Node\\Microsoft\\Windows\\CurrentVersion\\Uninstall",
    "HKCU\\SOFTWARE\\Microsoft\\Windows\\CurrentVersion\\Uninstall",
];

const APPX_SCRIPT: &str = "Get-AppxPackage | Select-Object Name, PackageFamilyName, Version, InstallLocation, Publisher";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum RawRecord {
    Registry {
        display_name: String,
        #[serde(default)]
        display_version: Option<String>,
        #[serde(default)]
        install_location: Option<String>,
        #[serde(default)]
        publisher: Option<String>,
        #[serde(default)]
        key_name: Option<String>,
    },
    Winget {
        name: String,
        id: String,
        #[serde(default)]
        version: Option<String>,
    },
    Chocolatey {
        name: String,
        #[serde(default)]
        version: Option<String>,
    },
    Appx {
        name: String,
        #[serde(default)]
        package_family_name: Option<String>,
        #[serde(default)]
        version: Option<String>,
        #[serde(default)]
        install_location: Option<String>,
        #[serde(default)]
        publisher: Option<String>,
    },
    Record(InstalledRecord),
}

impl RawRecord {
    /// Returns `None` for records without a usable display name.
    pub fn normalize(self) -> Option<InstalledRecord> {
        let record = match self {
            RawRecord::Registry {
                display_name,
                display_version,
                install_location,
                publisher,
                key_name,
            } => InstalledRecord {
                display_name,
                alt_name: None,
                identifier: key_name,
                version: display_version,
                install_path: install_location,
                publisher,
                source: InstallSourceKind::Registry,
            },
            RawRecord::Winget { name, id, version } => InstalledRecord {
                display_name: name,
                alt_name: None,
                identifier: Some(id),
                version,
                install_path: None,
                publisher: None,
                source: InstallSourceKind::Winget,
            },
            RawRecord::Chocolatey { name, version } => InstalledRecord {
                identifier: Some(name.clone()),
                display_name: name,
                alt_name: None,
                version,
                install_path: None,
                publisher: None,
                source: InstallSourceKind::Chocolatey,
            },
            RawRecord::Appx {
                name,
                package_family_name,
                version,
                install_location,
                publisher,
            } => InstalledRecord {
                display_name: name,
                alt_name: None,
                identifier: package_family_name,
                version,
                install_path: install_location,
                publisher,
                source: InstallSourceKind::Appx,
            },
            RawRecord::Record(record) => record,
        };

        let display_name = record.display_name.trim().to_string();
        if display_name.is_empty() {
            return None;
        }
        Some(InstalledRecord {
            display_name,
            alt_name: non_empty(record.alt_name),
            identifier: non_empty(record.identifier),
            version: non_empty(record.version),
            install_path: non_empty(record.install_path),
            publisher: non_empty(record.publisher),
            source: record.source,
        })
    }
}

fn non_empty(s: Option<String>) -> Option<String> {
    s.map(|s| s.trim().to_string()).filter(|s| !s.is_empty())
}

pub trait InventorySource {
    fn kind(&self) -> InstallSourceKind;
    fn collect(&self) -> Result<Vec<RawRecord>>;
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceFailure {
    pub source: InstallSourceKind,
    pub error: String,
}

#[derive(Debug, Clone, Default)]
pub struct Inventory {
    pub records: Vec<InstalledRecord>,
    pub failures: Vec<SourceFailure>,
}

/// Runs every source in order. A failing source contributes no records and
/// never aborts the collection.
pub fn collect(sources: &[Box<dyn InventorySource>]) -> Inventory {
    let mut inventory = Inventory::default();
    for source in sources {
        let kind = source.kind();
        match source.collect() {
            Ok(raw) => {
                let before = inventory.records.len();
                inventory
                    .records
                    .extend(raw.into_iter().filter_map(RawRecord::normalize));
                tracing::info!(
                    source = %kind,
                    records = inventory.records.len() - before,
                    "inventory source collected"
                );
            }
            Err(err) => {
                tracing::warn!(source = %kind, "inventory source unavailable: {err:#}");
                inventory.failures.push(SourceFailure {
                    source: kind,
                    error: format!("{err:#}"),
                });
            }
        }
    }
    inventory
}

pub fn host_sources(timeout: Duration) -> Vec<Box<dyn InventorySource>> {
    vec![
        Box::new(RegistrySource { timeout }),
        Box::new(WingetSource { timeout }),
        Box::new(ChocolateySource { timeout }),
        Box::new(AppxSource { timeout }),
    ]
}

#[derive(Debug, Clone)]
pub struct RegistrySource {
    pub timeout: Duration,
}

impl InventorySource for RegistrySource {
    fn kind(&self) -> InstallSourceKind {
        InstallSourceKind::Registry
    }

    fn collect(&self) -> Result<Vec<RawRecord>> {
        if !crate::platform::is_windows() {
            return Err(crate::platform::unsupported("registry enumeration"));
        }
        let mut out = Vec::new();
        let mut last_err = None;
        let mut any_ok = false;
        for key in UNINSTALL_KEYS {
            match crate::platform::windows::reg_query(key, true, self.timeout) {
                Ok(output) if output.success() => {
                    any_ok = true;
                    out.extend(parse_registry_uninstall(&output.stdout));
                }
                Ok(output) => {
                    tracing::debug!(key, exit_code = output.exit_code, "uninstall key not readable");
                }
                Err(err) => {
                    tracing::debug!(key, "uninstall key query failed: {err:#}");
                    last_err = Some(err);
                }
            }
        }
        match (any_ok, last_err) {
            (false, Some(err)) => Err(err.context("no uninstall key could be queried")),
            _ => Ok(out),
        }
    }
}

#[derive(Debug, Clone)]
pub struct WingetSource {
    pub timeout: Duration,
}

impl InventorySource for WingetSource {
    fn kind(&self) -> InstallSourceKind {
        InstallSourceKind::Winget
    }

    fn collect(&self) -> Result<Vec<RawRecord>> {
        let output = crate::platform::run_command_checked(
            "winget",
            &["list", "--accept-source-agreements", "--disable-interactivity"],
            self.timeout,
        )?;
        Ok(parse_winget_list(&output.stdout))
    }
}

#[derive(Debug, Clone)]
pub struct ChocolateySource {
    pub timeout: Duration,
}

impl InventorySource for ChocolateySource {
    fn kind(&self) -> InstallSourceKind {
        InstallSourceKind::Chocolatey
    }

    fn collect(&self) -> Result<Vec<RawRecord>> {
        let output =
            crate::platform::run_command_checked("choco", &["list", "--limit-output"], self.timeout)?;
        Ok(parse_choco_list(&output.stdout))
    }
}

#[derive(Debug, Clone)]
pub struct AppxSource {
    pub timeout: Duration,
}

impl InventorySource for AppxSource {
    fn kind(&self) -> InstallSourceKind {
        InstallSourceKind::Appx
    }

    fn collect(&self) -> Result<Vec<RawRecord>> {
        if !crate::platform::is_windows() {
            return Err(crate::platform::unsupported("app package enumeration"));
        }
        let rows = crate::platform::windows::json_rows(crate::platform::windows::powershell_json(
            APPX_SCRIPT,
            self.timeout,
        )?);
        Ok(parse_appx_rows(&rows))
    }
}

/// Replays an inventory captured as a JSON array of [`RawRecord`]s.
#[derive(Debug, Clone)]
pub struct SnapshotSource {
    path: PathBuf,
}

impl SnapshotSource {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl InventorySource for SnapshotSource {
    fn kind(&self) -> InstallSourceKind {
        InstallSourceKind::Snapshot
    }

    fn collect(&self) -> Result<Vec<RawRecord>> {
        let s = std::fs::read_to_string(&self.path)
            .with_context(|| format!("failed to read inventory: {}", self.path.display()))?;
        serde_json::from_str(&s)
            .with_context(|| format!("failed to parse inventory: {}", self.path.display()))
    }
}
