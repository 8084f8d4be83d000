use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::core::{AppCategory, AppDefinition, InstallSourceKind};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Priority {
    High,
    Medium,
    Low,
}

impl Priority {
    pub const fn as_str(self) -> &'static str {
        match self {
            Priority::High => "High",
            Priority::Medium => "Medium",
            Priority::Low => "Low",
        }
    }

    /// Higher rank means more urgent.
    pub const fn rank(self) -> u8 {
        match self {
            Priority::High => 3,
            Priority::Medium => 2,
            Priority::Low => 1,
        }
    }

    pub fn at_least(self, min: Priority) -> bool {
        self.rank() >= min.rank()
    }
}

impl fmt::Display for Priority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Priority {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "high" => Ok(Priority::High),
            "medium" => Ok(Priority::Medium),
            "low" => Ok(Priority::Low),
            other => Err(format!(
                "invalid priority: {other} (expected high|medium|low)"
            )),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum InstallMethod {
    Winget,
    Chocolatey,
    Manual,
}

impl InstallMethod {
    pub const fn as_str(self) -> &'static str {
        match self {
            InstallMethod::Winget => "Winget",
            InstallMethod::Chocolatey => "Chocolatey",
            InstallMethod::Manual => "Manual",
        }
    }
}

impl fmt::Display for InstallMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct InstallationStatus {
    pub is_installed: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source: Option<InstallSourceKind>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub install_path: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InstalledApp {
    #[serde(flatten)]
    pub app: AppDefinition,
    pub status: InstallationStatus,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MissingApp {
    #[serde(flatten)]
    pub app: AppDefinition,
    pub priority: Priority,
    pub recommended_method: InstallMethod,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SkippedApp {
    pub name: String,
    pub category: AppCategory,
    pub reason: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuditSummary {
    pub installed_count: usize,
    pub missing_count: usize,
    pub skipped_count: usize,
    pub completion_percentage: f64,
    pub category_breakdown: BTreeMap<AppCategory, usize>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuditResult {
    pub schema_version: String,
    pub tool_version: String,
    pub generated_at: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category_filter: Option<AppCategory>,
    pub include_installed: bool,
    /// `builtin` or `file:<path>`.
    #[serde(default)]
    pub catalog_source: String,
    pub total_apps: usize,
    pub installed: Vec<InstalledApp>,
    pub missing: Vec<MissingApp>,
    pub recommended_installs: Vec<MissingApp>,
    pub skipped: Vec<SkippedApp>,
    pub summary: AuditSummary,
    #[serde(default)]
    pub notes: Vec<String>,
}

impl AuditResult {
    /// `installed + missing + skipped` always accounts for every catalog entry.
    pub fn is_consistent(&self) -> bool {
        self.summary.installed_count + self.summary.missing_count + self.summary.skipped_count
            == self.total_apps
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn priority_ordering_by_rank() {
        assert!(Priority::High.at_least(Priority::Medium));
        assert!(Priority::Medium.at_least(Priority::Medium));
        assert!(!Priority::Low.at_least(Priority::Medium));
    }

    #[test]
    fn missing_app_flattens_definition() {
        let missing = MissingApp {
            app: AppDefinition::new("VLC", AppCategory::Media).with_winget("VideoLAN.VLC"),
            priority: Priority::Low,
            recommended_method: InstallMethod::Manual,
        };
        let v = serde_json::to_value(&missing).expect("serialize");
        assert_eq!(v["name"], "VLC");
        assert_eq!(v["category"], "Media");
        assert_eq!(v["winget_id"], "VideoLAN.VLC");
        assert_eq!(v["priority"], "Low");
        assert_eq!(v["recommended_method"], "Manual");
    }
}
