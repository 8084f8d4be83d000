use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::core::AppCategory;
use crate::report::ReportFormat;

#[derive(Debug, Clone, Serialize)]
pub struct EffectiveConfig {
    pub general: GeneralConfig,
    pub ui: UiConfig,
    pub audit: AuditConfig,
    pub catalog: CatalogConfig,
    pub cache: CacheConfig,
    pub paths: PathsConfig,
    pub report: ReportConfig,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub config_path: Option<String>,
}

/// Which phases `report` runs when no `--skip-*` flag is given.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RunMode {
    Full,
    Apps,
    Optimize,
}

impl RunMode {
    pub fn runs_apps(self) -> bool {
        matches!(self, RunMode::Full | RunMode::Apps)
    }

    pub fn runs_optimize(self) -> bool {
        matches!(self, RunMode::Full | RunMode::Optimize)
    }
}

impl fmt::Display for RunMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            RunMode::Full => "full",
            RunMode::Apps => "apps",
            RunMode::Optimize => "optimize",
        })
    }
}

impl FromStr for RunMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "full" => Ok(RunMode::Full),
            "apps" => Ok(RunMode::Apps),
            "optimize" => Ok(RunMode::Optimize),
            other => Err(format!(
                "invalid mode: {other} (expected full|apps|optimize)"
            )),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct GeneralConfig {
    pub mode: RunMode,
    pub dry_run: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct UiConfig {
    pub color: bool,
    pub max_table_rows: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct AuditConfig {
    pub include_installed: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub default_category: Option<AppCategory>,
}

#[derive(Debug, Clone, Serialize)]
pub struct CatalogConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub path: Option<PathBuf>,
}

#[derive(Debug, Clone, Serialize)]
pub struct CacheConfig {
    pub max_age_minutes: u64,
}

impl CacheConfig {
    pub fn max_age(&self) -> Duration {
        Duration::from_secs(self.max_age_minutes.saturating_mul(60))
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct PathsConfig {
    pub data_dir: PathBuf,
}

#[derive(Debug, Clone, Serialize)]
pub struct ReportConfig {
    pub html: bool,
    pub text: bool,
    pub json: bool,
}

impl ReportConfig {
    pub fn formats(&self) -> Vec<ReportFormat> {
        let mut out = Vec::new();
        if self.html {
            out.push(ReportFormat::Html);
        }
        if self.text {
            out.push(ReportFormat::Text);
        }
        if self.json {
            out.push(ReportFormat::Json);
        }
        out
    }
}

impl EffectiveConfig {
    pub fn defaults(home_dir: &Path) -> Self {
        Self {
            general: GeneralConfig {
                mode: RunMode::Full,
                dry_run: false,
            },
            ui: UiConfig {
                color: true,
                max_table_rows: 20,
            },
            audit: AuditConfig {
                include_installed: false,
                default_category: None,
            },
            catalog: CatalogConfig { path: None },
            cache: CacheConfig { max_age_minutes: 15 },
            paths: PathsConfig {
                data_dir: default_data_dir(home_dir),
            },
            report: ReportConfig {
                html: true,
                text: true,
                json: true,
            },
            config_path: None,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct RawConfig {
    general: Option<RawGeneralConfig>,
    ui: Option<RawUiConfig>,
    audit: Option<RawAuditConfig>,
    catalog: Option<RawCatalogConfig>,
    cache: Option<RawCacheConfig>,
    paths: Option<RawPathsConfig>,
    report: Option<RawReportConfig>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct RawGeneralConfig {
    mode: Option<RunMode>,
    dry_run: Option<bool>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct RawUiConfig {
    color: Option<bool>,
    max_table_rows: Option<usize>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct RawAuditConfig {
    include_installed: Option<bool>,
    default_category: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct RawCatalogConfig {
    path: Option<PathBuf>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct RawCacheConfig {
    max_age_minutes: Option<u64>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct RawPathsConfig {
    data_dir: Option<PathBuf>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct RawReportConfig {
    html: Option<bool>,
    text: Option<bool>,
    json: Option<bool>,
}

pub fn default_config_path(home_dir: &Path) -> PathBuf {
    home_dir.join(".config").join("winaudit").join("config.toml")
}

pub fn default_data_dir(home_dir: &Path) -> PathBuf {
    home_dir.join(".config").join("winaudit")
}

pub fn load(config_path: Option<&Path>, home_dir: &Path) -> Result<EffectiveConfig> {
    let mut cfg = EffectiveConfig::defaults(home_dir);

    let explicit = config_path.is_some();
    let path = config_path
        .map(ToOwned::to_owned)
        .unwrap_or_else(|| default_config_path(home_dir));

    if path.exists() {
        let s = std::fs::read_to_string(&path)
            .with_context(|| format!("failed to read config file: {}", path.display()))?;
        let raw: RawConfig = toml::from_str(&s)
            .with_context(|| format!("failed to parse config file (TOML): {}", path.display()))?;
        apply_raw_config(&mut cfg, raw)?;
        cfg.config_path = Some(path.display().to_string());
    } else if explicit {
        return Err(anyhow::anyhow!(
            "config file not found: {}",
            path.display()
        ));
    }

    apply_env_overrides(&mut cfg)?;

    Ok(cfg)
}

fn apply_raw_config(cfg: &mut EffectiveConfig, raw: RawConfig) -> Result<()> {
    if let Some(general) = raw.general {
        if let Some(mode) = general.mode {
            cfg.general.mode = mode;
        }
        if let Some(dry_run) = general.dry_run {
            cfg.general.dry_run = dry_run;
        }
    }

    if let Some(ui) = raw.ui {
        if let Some(color) = ui.color {
            cfg.ui.color = color;
        }
        if let Some(max_table_rows) = ui.max_table_rows {
            cfg.ui.max_table_rows = max_table_rows;
        }
    }

    if let Some(audit) = raw.audit {
        if let Some(include_installed) = audit.include_installed {
            cfg.audit.include_installed = include_installed;
        }
        if let Some(category) = audit.default_category {
            cfg.audit.default_category = parse_category(&category)
                .context("audit.default_category")?;
        }
    }

    if let Some(catalog) = raw.catalog {
        if let Some(path) = catalog.path {
            cfg.catalog.path = Some(path);
        }
    }

    if let Some(cache) = raw.cache {
        if let Some(max_age_minutes) = cache.max_age_minutes {
            cfg.cache.max_age_minutes = max_age_minutes;
        }
    }

    if let Some(paths) = raw.paths {
        if let Some(data_dir) = paths.data_dir {
            cfg.paths.data_dir = data_dir;
        }
    }

    if let Some(report) = raw.report {
        if let Some(html) = report.html {
            cfg.report.html = html;
        }
        if let Some(text) = report.text {
            cfg.report.text = text;
        }
        if let Some(json) = report.json {
            cfg.report.json = json;
        }
    }

    Ok(())
}

fn apply_env_overrides(cfg: &mut EffectiveConfig) -> Result<()> {
    if let Ok(v) = std::env::var("WINAUDIT_GENERAL_MODE") {
        cfg.general.mode = v
            .parse::<RunMode>()
            .map_err(anyhow::Error::msg)
            .context("WINAUDIT_GENERAL_MODE")?;
    }
    if let Ok(v) = std::env::var("WINAUDIT_GENERAL_DRY_RUN") {
        cfg.general.dry_run = parse_bool(&v).context("WINAUDIT_GENERAL_DRY_RUN")?;
    }
    if let Ok(v) = std::env::var("WINAUDIT_UI_COLOR") {
        cfg.ui.color = parse_bool(&v).context("WINAUDIT_UI_COLOR")?;
    }
    if let Ok(v) = std::env::var("WINAUDIT_UI_MAX_TABLE_ROWS") {
        cfg.ui.max_table_rows = v
            .trim()
            .parse::<usize>()
            .context("WINAUDIT_UI_MAX_TABLE_ROWS")?;
    }
    if let Ok(v) = std::env::var("WINAUDIT_AUDIT_INCLUDE_INSTALLED") {
        cfg.audit.include_installed =
            parse_bool(&v).context("WINAUDIT_AUDIT_INCLUDE_INSTALLED")?;
    }
    if let Ok(v) = std::env::var("WINAUDIT_AUDIT_DEFAULT_CATEGORY") {
        cfg.audit.default_category =
            parse_category(&v).context("WINAUDIT_AUDIT_DEFAULT_CATEGORY")?;
    }
    if let Ok(v) = std::env::var("WINAUDIT_CATALOG_PATH") {
        let v = v.trim();
        cfg.catalog.path = if v.is_empty() {
            None
        } else {
            Some(PathBuf::from(v))
        };
    }
    if let Ok(v) = std::env::var("WINAUDIT_CACHE_MAX_AGE_MINUTES") {
        cfg.cache.max_age_minutes = v
            .trim()
            .parse::<u64>()
            .context("WINAUDIT_CACHE_MAX_AGE_MINUTES")?;
    }
    if let Ok(v) = std::env::var("WINAUDIT_DATA_DIR") {
        let v = v.trim();
        if !v.is_empty() {
            cfg.paths.data_dir = PathBuf::from(v);
        }
    }
    if let Ok(v) = std::env::var("WINAUDIT_REPORT_HTML") {
        cfg.report.html = parse_bool(&v).context("WINAUDIT_REPORT_HTML")?;
    }
    if let Ok(v) = std::env::var("WINAUDIT_REPORT_TEXT") {
        cfg.report.text = parse_bool(&v).context("WINAUDIT_REPORT_TEXT")?;
    }
    if let Ok(v) = std::env::var("WINAUDIT_REPORT_JSON") {
        cfg.report.json = parse_bool(&v).context("WINAUDIT_REPORT_JSON")?;
    }

    Ok(())
}

/// Empty text or `all` means no category filter.
pub fn parse_category(s: &str) -> Result<Option<AppCategory>> {
    let s = s.trim();
    if s.is_empty() || s.eq_ignore_ascii_case("all") {
        return Ok(None);
    }
    s.parse::<AppCategory>()
        .map(Some)
        .map_err(anyhow::Error::msg)
}

fn parse_bool(s: &str) -> Result<bool> {
    let s = s.trim().to_ascii_lowercase();
    match s.as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        _ => Err(anyhow::anyhow!(
            "invalid boolean: {s} (expected true|false|1|0|yes|no|on|off)"
        )),
    }
}
