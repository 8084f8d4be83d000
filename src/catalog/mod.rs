use std::collections::HashSet;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result, anyhow};
use serde::Deserialize;

use crate::core::{AppCategory, AppDefinition};

pub trait CatalogProvider {
    fn load(&self) -> Result<Vec<AppDefinition>>;

    /// Identifies where the entries come from; cached audits are only reused
    /// for the same source.
    fn source(&self) -> String {
        "custom".to_string()
    }
}

/// The curated essential-apps list shipped with the tool.
#[derive(Debug, Clone, Copy, Default)]
pub struct BuiltinCatalog;

impl CatalogProvider for BuiltinCatalog {
    fn load(&self) -> Result<Vec<AppDefinition>> {
        Ok(builtin_apps())
    }

    fn source(&self) -> String {
        "builtin".to_string()
    }
}

#[derive(Debug, Clone)]
pub struct FileCatalog {
    path: PathBuf,
}

impl FileCatalog {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[derive(Debug, Deserialize)]
struct CatalogFile {
    apps: Vec<AppDefinition>,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum JsonCatalog {
    Wrapped(CatalogFile),
    Bare(Vec<AppDefinition>),
}

impl CatalogProvider for FileCatalog {
    fn load(&self) -> Result<Vec<AppDefinition>> {
        let s = std::fs::read_to_string(&self.path)
            .with_context(|| format!("failed to read catalog: {}", self.path.display()))?;
        let is_toml = self
            .path
            .extension()
            .map(|e| e.eq_ignore_ascii_case("toml"))
            .unwrap_or(false);
        let apps = if is_toml {
            toml::from_str::<CatalogFile>(&s)
                .with_context(|| format!("failed to parse catalog (TOML): {}", self.path.display()))?
                .apps
        } else {
            match serde_json::from_str::<JsonCatalog>(&s)
                .with_context(|| format!("failed to parse catalog (JSON): {}", self.path.display()))?
            {
                JsonCatalog::Wrapped(file) => file.apps,
                JsonCatalog::Bare(apps) => apps,
            }
        };
        Ok(apps)
    }

    fn source(&self) -> String {
        format!("file:{}", self.path.display())
    }
}

/// Names must be non-empty and unique within their category.
pub fn validate(apps: &[AppDefinition]) -> Result<()> {
    let mut seen: HashSet<(AppCategory, String)> = HashSet::new();
    for app in apps {
        let name = app.name.trim();
        if name.is_empty() {
            return Err(anyhow!(
                "catalog entry in category {} has an empty name",
                app.category
            ));
        }
        if !seen.insert((app.category, name.to_ascii_lowercase())) {
            return Err(anyhow!(
                "duplicate catalog entry: {name} (category {})",
                app.category
            ));
        }
    }
    Ok(())
}

fn app(
    name: &str,
    category: AppCategory,
    description: &str,
    winget: Option<&str>,
    choco: Option<&str>,
) -> AppDefinition {
    AppDefinition {
        name: name.to_string(),
        category,
        description: description.to_string(),
        winget_id: winget.map(str::to_string),
        choco_id: choco.map(str::to_string),
    }
}

pub fn builtin_apps() -> Vec<AppDefinition> {
    use AppCategory::*;

    vec![
        app("7-Zip", System, "File archiver with high compression ratio", Some("7zip.7zip"), Some("7zip")),
        app("Everything", System, "Instant file name search", Some("voidtools.Everything"), Some("everything")),
        app("PowerToys", System, "Windows power-user utilities", Some("Microsoft.PowerToys"), Some("powertoys")),
        app("Microsoft Visual C++ Redistributable", Runtime, "Runtime libraries required by many applications", Some("Microsoft.VCRedist.2015+.x64"), Some("vcredist140")),
        app(".NET Desktop Runtime", Runtime, "Runtime for .NET desktop applications", Some("Microsoft.DotNet.DesktopRuntime.8"), Some("dotnet-desktopruntime")),
        app("Java Runtime Environment", Runtime, "Runtime for Java applications", Some("Oracle.JavaRuntimeEnvironment"), Some("javaruntime")),
        app("Malwarebytes", Security, "On-demand malware scanner", Some("Malwarebytes.Malwarebytes"), Some("malwarebytes")),
        app("Bitwarden", Security, "Password manager", Some("Bitwarden.Bitwarden"), Some("bitwarden")),
        app("LibreOffice", Office, "Free office suite", Some("TheDocumentFoundation.LibreOffice"), Some("libreoffice-fresh")),
        app("Adobe Acrobat Reader", Document, "PDF viewer", Some("Adobe.Acrobat.Reader.64-bit"), Some("adobereader")),
        app("SumatraPDF", Document, "Lightweight PDF and e-book reader", Some("SumatraPDF.SumatraPDF"), Some("sumatrapdf")),
        app("Notepad++", Editor, "Source code and text editor", Some("Notepad++.Notepad++"), Some("notepadplusplus")),
        app("Visual Studio Code", Editor, "Code editor", Some("Microsoft.VisualStudioCode"), Some("vscode")),
        app("Google Chrome", Browsers, "Web browser", Some("Google.Chrome"), Some("googlechrome")),
        app("Mozilla Firefox", Browsers, "Web browser", Some("Mozilla.Firefox"), Some("firefox")),
        app("VLC media player", Media, "Plays most audio and video formats", Some("VideoLAN.VLC"), Some("vlc")),
        app("IrfanView", Media, "Image viewer", Some("IrfanSkiljan.IrfanView"), Some("irfanview")),
        app("Git", Development, "Distributed version control", Some("Git.Git"), Some("git")),
        app("Windows Terminal", Development, "Tabbed terminal", Some("Microsoft.WindowsTerminal"), Some("microsoft-windows-terminal")),
        app("Python", Development, "Python interpreter", Some("Python.Python.3.12"), Some("python")),
    ]
}
