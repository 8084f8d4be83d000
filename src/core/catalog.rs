use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum AppCategory {
    System,
    Runtime,
    Security,
    Office,
    Document,
    Editor,
    Browsers,
    Media,
    Development,
}

impl AppCategory {
    pub const ALL: [AppCategory; 9] = [
        AppCategory::System,
        AppCategory::Runtime,
        AppCategory::Security,
        AppCategory::Office,
        AppCategory::Document,
        AppCategory::Editor,
        AppCategory::Browsers,
        AppCategory::Media,
        AppCategory::Development,
    ];

    pub const fn as_str(self) -> &'static str {
        match self {
            AppCategory::System => "System",
            AppCategory::Runtime => "Runtime",
            AppCategory::Security => "Security",
            AppCategory::Office => "Office",
            AppCategory::Document => "Document",
            AppCategory::Editor => "Editor",
            AppCategory::Browsers => "Browsers",
            AppCategory::Media => "Media",
            AppCategory::Development => "Development",
        }
    }
}

impl fmt::Display for AppCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AppCategory {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        AppCategory::ALL
            .into_iter()
            .find(|c| c.as_str().eq_ignore_ascii_case(s))
            .ok_or_else(|| {
                let names: Vec<&str> = AppCategory::ALL.iter().map(|c| c.as_str()).collect();
                format!("invalid category: {s} (expected one of {})", names.join("|"))
            })
    }
}

/// One entry of the essential-apps catalog.
///
/// `winget_id` is the primary package identifier: its dot-separated segments
/// double as search terms during reconciliation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AppDefinition {
    pub name: String,
    pub category: AppCategory,
    #[serde(default)]
    pub description: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub winget_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub choco_id: Option<String>,
}

impl AppDefinition {
    pub fn new(name: impl Into<String>, category: AppCategory) -> Self {
        Self {
            name: name.into(),
            category,
            description: String::new(),
            winget_id: None,
            choco_id: None,
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    pub fn with_winget(mut self, id: impl Into<String>) -> Self {
        self.winget_id = Some(id.into());
        self
    }

    pub fn with_choco(mut self, id: impl Into<String>) -> Self {
        self.choco_id = Some(id.into());
        self
    }
}
