use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InstallSourceKind {
    Registry,
    Winget,
    Chocolatey,
    Appx,
    Snapshot,
}

impl InstallSourceKind {
    pub const fn as_str(self) -> &'static str {
        match self {
            InstallSourceKind::Registry => "registry",
            InstallSourceKind::Winget => "winget",
            InstallSourceKind::Chocolatey => "chocolatey",
            InstallSourceKind::Appx => "appx",
            InstallSourceKind::Snapshot => "snapshot",
        }
    }
}

impl fmt::Display for InstallSourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// An observed installation, normalized from whichever source reported it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InstalledRecord {
    pub display_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub alt_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub identifier: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub install_path: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub publisher: Option<String>,
    pub source: InstallSourceKind,
}

impl InstalledRecord {
    pub fn new(display_name: impl Into<String>, source: InstallSourceKind) -> Self {
        Self {
            display_name: display_name.into(),
            alt_name: None,
            identifier: None,
            version: None,
            install_path: None,
            publisher: None,
            source,
        }
    }

    /// Fields that search terms are matched against, in match order.
    pub fn match_fields(&self) -> impl Iterator<Item = &str> {
        std::iter::once(self.display_name.as_str())
            .chain(self.alt_name.as_deref())
            .chain(self.identifier.as_deref())
    }
}
