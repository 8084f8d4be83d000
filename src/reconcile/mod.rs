//! Matches observed installations against the essential-apps catalog.
//!
//! Matching is deliberately first-hit: search terms are tried in order and
//! the first record (in collection order) containing the current term wins.
//! There is no ranking between candidates.

use std::collections::BTreeMap;

use anyhow::{Context, Result};
use globset::{GlobBuilder, GlobSet, GlobSetBuilder};
use time::OffsetDateTime;
use time::format_description::well_known::Rfc3339;

use crate::catalog::{self, CatalogProvider};
use crate::core::{
    AppCategory, AppDefinition, AuditResult, AuditSummary, InstallMethod, InstallationStatus,
    InstalledApp, InstalledRecord, MissingApp, Priority, SCHEMA_VERSION, SkippedApp,
};
use crate::probe::SystemProbe;

pub const SUPPRESSED_BY_OFFICE: &str = "LibreOffice";

const OFFICE_NAME_PATTERNS: [&str; 7] = [
    "*Microsoft Office*",
    "*Microsoft 365*",
    "*Office 16*",
    "Microsoft Word*",
    "Microsoft Excel*",
    "Microsoft PowerPoint*",
    "Microsoft Outlook*",
];

const OFFICE_PUBLISHER_PATTERNS: [&str; 1] = ["*Microsoft Office*"];

const OFFICE_REGISTRY_KEYS: [&str; 3] = [
    "HKLM\\SOFTWARE\\Microsoft\\Office\\ClickToRun\\Configuration",
    "HKLM\\SOFTWARE\\Microsoft\\Office\\16.0\\Common\\InstallRoot",
    "HKLM\\SOFTWARE\\Microsoft\\Office\\15.0\\Common\\InstallRoot",
];

const HIGH_PRIORITY_NAMES: [&str; 5] = [
    "7-Zip",
    "Google Chrome",
    "Mozilla Firefox",
    "Adobe Acrobat Reader",
    "Microsoft Visual C++ Redistributable",
];

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AuditRequest {
    pub category: Option<AppCategory>,
    pub include_installed: bool,
}

pub struct Reconciler<'a> {
    catalog: &'a dyn CatalogProvider,
    probe: &'a dyn SystemProbe,
}

impl<'a> Reconciler<'a> {
    pub fn new(catalog: &'a dyn CatalogProvider, probe: &'a dyn SystemProbe) -> Self {
        Self { catalog, probe }
    }

    pub fn reconcile(
        &self,
        records: &[InstalledRecord],
        request: &AuditRequest,
    ) -> Result<AuditResult> {
        let apps = self.catalog.load().context("failed to load the app catalog")?;
        catalog::validate(&apps).context("app catalog is invalid")?;

        let apps: Vec<AppDefinition> = match request.category {
            Some(category) => apps.into_iter().filter(|a| a.category == category).collect(),
            None => apps,
        };
        let total_apps = apps.len();

        let office = OfficeDetector::new()?;
        let office_evidence = office.detect(records, self.probe);
        if let Some(evidence) = &office_evidence {
            tracing::info!(%evidence, "Microsoft Office detected");
        }

        let mut installed = Vec::new();
        let mut missing = Vec::new();
        let mut skipped = Vec::new();
        let mut installed_count = 0usize;
        let mut notes = Vec::new();

        for app in apps {
            if office_evidence.is_some() && app.name == SUPPRESSED_BY_OFFICE {
                skipped.push(SkippedApp {
                    name: app.name.clone(),
                    category: app.category,
                    reason: "Microsoft Office is installed".to_string(),
                });
                continue;
            }

            match find_match(&app, records) {
                Some(record) => {
                    tracing::debug!(app = %app.name, matched = %record.display_name, "installed");
                    installed_count += 1;
                    if request.include_installed {
                        installed.push(InstalledApp {
                            status: InstallationStatus {
                                is_installed: true,
                                version: record.version.clone(),
                                source: Some(record.source),
                                install_path: record.install_path.clone(),
                            },
                            app,
                        });
                    }
                }
                None => {
                    let priority = priority(&app);
                    let recommended_method = recommended_method(&app, self.probe);
                    missing.push(MissingApp {
                        app,
                        priority,
                        recommended_method,
                    });
                }
            }
        }

        if let Some(evidence) = office_evidence {
            if !skipped.is_empty() {
                notes.push(format!(
                    "{SUPPRESSED_BY_OFFICE} skipped: Microsoft Office detected ({evidence})"
                ));
            }
        }

        let recommended_installs: Vec<MissingApp> = missing
            .iter()
            .filter(|m| m.priority == Priority::High)
            .cloned()
            .collect();

        let mut category_breakdown: BTreeMap<AppCategory, usize> = BTreeMap::new();
        for m in &missing {
            *category_breakdown.entry(m.app.category).or_insert(0) += 1;
        }

        let summary = AuditSummary {
            installed_count,
            missing_count: missing.len(),
            skipped_count: skipped.len(),
            completion_percentage: completion_percentage(installed_count, total_apps),
            category_breakdown,
        };

        let result = AuditResult {
            schema_version: SCHEMA_VERSION.to_string(),
            tool_version: env!("CARGO_PKG_VERSION").to_string(),
            generated_at: now_rfc3339(),
            category_filter: request.category,
            include_installed: request.include_installed,
            catalog_source: self.catalog.source(),
            total_apps,
            installed,
            missing,
            recommended_installs,
            skipped,
            summary,
            notes,
        };
        debug_assert!(result.is_consistent());
        Ok(result)
    }
}

/// The app name first, then each dot-separated segment of its primary
/// package id (`Mozilla.Firefox` adds `Mozilla` and `Firefox`).
pub fn search_terms(app: &AppDefinition) -> Vec<String> {
    let mut terms = vec![app.name.clone()];
    if let Some(id) = &app.winget_id {
        terms.extend(
            id.split('.')
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(str::to_string),
        );
    }
    terms
}

pub fn find_match<'r>(
    app: &AppDefinition,
    records: &'r [InstalledRecord],
) -> Option<&'r InstalledRecord> {
    for term in search_terms(app) {
        let needle = term.to_lowercase();
        if needle.is_empty() {
            continue;
        }
        let hit = records.iter().find(|r| {
            r.match_fields()
                .any(|field| field.to_lowercase().contains(&needle))
        });
        if hit.is_some() {
            return hit;
        }
    }
    None
}

pub fn priority(app: &AppDefinition) -> Priority {
    let high_by_name = HIGH_PRIORITY_NAMES
        .iter()
        .any(|n| n.eq_ignore_ascii_case(&app.name));
    match app.category {
        AppCategory::System | AppCategory::Runtime | AppCategory::Security => Priority::High,
        _ if high_by_name => Priority::High,
        AppCategory::Office | AppCategory::Editor | AppCategory::Browsers => Priority::Medium,
        _ => Priority::Low,
    }
}

pub fn recommended_method(app: &AppDefinition, probe: &dyn SystemProbe) -> InstallMethod {
    if app.winget_id.is_some() && probe.command_available("winget") {
        return InstallMethod::Winget;
    }
    if app.choco_id.is_some() && probe.command_available("choco") {
        return InstallMethod::Chocolatey;
    }
    InstallMethod::Manual
}

/// `installed / total * 100` rounded to two decimals; `0` for an empty
/// catalog.
pub fn completion_percentage(installed: usize, total: usize) -> f64 {
    if total == 0 {
        return 0.0;
    }
    let pct = installed as f64 / total as f64 * 100.0;
    (pct * 100.0).round() / 100.0
}

pub struct OfficeDetector {
    names: GlobSet,
    publishers: GlobSet,
}

impl OfficeDetector {
    pub fn new() -> Result<Self> {
        Ok(Self {
            names: build_globset(&OFFICE_NAME_PATTERNS)?,
            publishers: build_globset(&OFFICE_PUBLISHER_PATTERNS)?,
        })
    }

    pub fn matches(&self, record: &InstalledRecord) -> bool {
        self.names.is_match(&record.display_name)
            || record
                .publisher
                .as_deref()
                .map(|p| self.publishers.is_match(p))
                .unwrap_or(false)
    }

    /// Returns a short description of what gave Office away, checking the
    /// records first and the registry second.
    pub fn detect(&self, records: &[InstalledRecord], probe: &dyn SystemProbe) -> Option<String> {
        if let Some(record) = records.iter().find(|r| self.matches(r)) {
            return Some(format!("installed: {}", record.display_name));
        }
        for key in OFFICE_REGISTRY_KEYS {
            match probe.registry_key_exists(key) {
                Ok(true) => return Some(format!("registry: {key}")),
                Ok(false) => {}
                Err(err) => tracing::debug!(key, "office registry probe failed: {err:#}"),
            }
        }
        None
    }
}

fn build_globset(patterns: &[&str]) -> Result<GlobSet> {
    let mut builder = GlobSetBuilder::new();
    for pat in patterns {
        let glob = GlobBuilder::new(pat)
            .case_insensitive(true)
            .build()
            .with_context(|| format!("invalid glob: {pat}"))?;
        builder.add(glob);
    }
    Ok(builder.build()?)
}

fn now_rfc3339() -> String {
    OffsetDateTime::now_utc()
        .format(&Rfc3339)
        .unwrap_or_else(|_| "unknown".to_string())
}
