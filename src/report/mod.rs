//! Rendering of audit and optimization results to HTML, plain text and JSON,
//! plus per-session persistence of raw results.

use std::fmt::Write as _;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::core::{AuditResult, OptimizationReport};
use crate::ui::format_bytes;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReportFormat {
    Html,
    Text,
    Json,
}

impl ReportFormat {
    pub const ALL: [ReportFormat; 3] = [ReportFormat::Html, ReportFormat::Text, ReportFormat::Json];

    pub const fn extension(self) -> &'static str {
        match self {
            ReportFormat::Html => "html",
            ReportFormat::Text => "txt",
            ReportFormat::Json => "json",
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ReportBundle {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub audit: Option<AuditResult>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub optimization: Option<OptimizationReport>,
}

#[derive(Debug, Clone, Default)]
pub struct ReportWriteOutcome {
    pub written: Vec<PathBuf>,
    pub failed: Vec<(PathBuf, String)>,
}

pub fn render(bundle: &ReportBundle, format: ReportFormat) -> Result<String> {
    match format {
        ReportFormat::Html => Ok(render_html(bundle)),
        ReportFormat::Text => Ok(render_text(bundle)),
        ReportFormat::Json => render_json(bundle),
    }
}

pub fn render_json(bundle: &ReportBundle) -> Result<String> {
    serde_json::to_string_pretty(bundle).context("failed to serialize report")
}

pub fn render_text(bundle: &ReportBundle) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "WINDOWS AUDIT REPORT");
    let _ = writeln!(out, "====================");

    if let Some(audit) = &bundle.audit {
        let s = &audit.summary;
        let _ = writeln!(out);
        let _ = writeln!(out, "SOFTWARE AUDIT");
        let _ = writeln!(out, "--------------");
        let _ = writeln!(out, "Generated: {}", audit.generated_at);
        if let Some(category) = audit.category_filter {
            let _ = writeln!(out, "Category: {category}");
        }
        let _ = writeln!(out, "Catalog entries: {}", audit.total_apps);
        let _ = writeln!(
            out,
            "Installed: {}  Missing: {}  Skipped: {}",
            s.installed_count, s.missing_count, s.skipped_count
        );
        let _ = writeln!(out, "Completion: {:.2}%", s.completion_percentage);

        if !audit.recommended_installs.is_empty() {
            let _ = writeln!(out);
            let _ = writeln!(out, "Recommended installs:");
            for m in &audit.recommended_installs {
                let _ = writeln!(out, "- {} ({})", m.app.name, m.recommended_method);
            }
        }
        if !audit.missing.is_empty() {
            let _ = writeln!(out);
            let _ = writeln!(out, "Missing:");
            for m in &audit.missing {
                let _ = writeln!(
                    out,
                    "- [{}] {} / {} ({})",
                    m.priority, m.app.name, m.app.category, m.recommended_method
                );
            }
        }
        if !audit.installed.is_empty() {
            let _ = writeln!(out);
            let _ = writeln!(out, "Installed:");
            for i in &audit.installed {
                match &i.status.version {
                    Some(v) => {
                        let _ = writeln!(out, "- {} {v}", i.app.name);
                    }
                    None => {
                        let _ = writeln!(out, "- {}", i.app.name);
                    }
                }
            }
        }
        for skipped in &audit.skipped {
            let _ = writeln!(out, "Skipped: {} ({})", skipped.name, skipped.reason);
        }
        for note in &audit.notes {
            let _ = writeln!(out, "Note: {note}");
        }
    }

    if let Some(opt) = &bundle.optimization {
        let _ = writeln!(out);
        let _ = writeln!(out, "OPTIMIZATION");
        let _ = writeln!(out, "------------");
        let _ = writeln!(out, "Generated: {}", opt.generated_at);
        let _ = writeln!(out, "OS: {} {}", opt.os.name, opt.os.version);
        let _ = writeln!(
            out,
            "Score: {}/100 ({})",
            opt.score.overall, opt.score.category
        );
        let _ = writeln!(out, "Opportunities: {}", opt.score.opportunity_count);
        for o in &opt.opportunities {
            let _ = writeln!(
                out,
                "- [{}] {}: {} (savings: {})",
                o.impact, o.category, o.description, o.estimated_savings
            );
        }
        if let Some(bytes) = temp_bytes(opt) {
            let _ = writeln!(out, "Temporary files scanned: {}", format_bytes(bytes));
        }
        let _ = writeln!(out);
        let _ = writeln!(out, "Recommendations:");
        for r in &opt.recommendations {
            let _ = writeln!(out, "- {r}");
        }
    }

    out
}

pub fn render_html(bundle: &ReportBundle) -> String {
    let mut out = String::new();
    out.push_str("<!DOCTYPE html>\n<html lang=\"en\">\n<head>\n<meta charset=\"utf-8\">\n");
    out.push_str("<title>Windows Audit Report</title>\n");
    out.push_str(
        "<style>body{font-family:Segoe UI,sans-serif;margin:2em}table{border-collapse:collapse}\
td,th{border:1px solid #ccc;padding:4px 8px;text-align:left}.High{color:#b00020}\
.Medium{color:#b26a00}.Low{color:#555}</style>\n",
    );
    out.push_str("</head>\n<body>\n<h1>Windows Audit Report</h1>\n");

    if let Some(audit) = &bundle.audit {
        let s = &audit.summary;
        let _ = writeln!(out, "<h2>Software audit</h2>");
        let _ = writeln!(
            out,
            "<p>Generated {}. {} of {} essential apps installed ({:.2}%), {} missing, {} skipped.</p>",
            escape_html(&audit.generated_at),
            s.installed_count,
            audit.total_apps,
            s.completion_percentage,
            s.missing_count,
            s.skipped_count
        );
        if !audit.missing.is_empty() {
            out.push_str(
                "<table>\n<tr><th>Priority</th><th>Name</th><th>Category</th><th>Method</th></tr>\n",
            );
            for m in &audit.missing {
                let _ = writeln!(
                    out,
                    "<tr><td class=\"{p}\">{p}</td><td>{}</td><td>{}</td><td>{}</td></tr>",
                    escape_html(&m.app.name),
                    m.app.category,
                    m.recommended_method,
                    p = m.priority
                );
            }
            out.push_str("</table>\n");
        }
        if !audit.installed.is_empty() {
            out.push_str("<h3>Installed</h3>\n<ul>\n");
            for i in &audit.installed {
                let version = i.status.version.as_deref().unwrap_or("");
                let _ = writeln!(
                    out,
                    "<li>{} {}</li>",
                    escape_html(&i.app.name),
                    escape_html(version)
                );
            }
            out.push_str("</ul>\n");
        }
        for note in &audit.notes {
            let _ = writeln!(out, "<p class=\"note\">{}</p>", escape_html(note));
        }
    }

    if let Some(opt) = &bundle.optimization {
        let _ = writeln!(out, "<h2>Optimization</h2>");
        let _ = writeln!(
            out,
            "<p>{} {}. Score <strong>{}/100</strong> ({}).</p>",
            escape_html(&opt.os.name),
            escape_html(&opt.os.version),
            opt.score.overall,
            opt.score.category
        );
        if !opt.opportunities.is_empty() {
            out.push_str("<table>\n<tr><th>Impact</th><th>Category</th><th>Description</th><th>Estimated savings</th></tr>\n");
            for o in &opt.opportunities {
                let _ = writeln!(
                    out,
                    "<tr><td class=\"{i}\">{i}</td><td>{}</td><td>{}</td><td>{}</td></tr>",
                    o.category,
                    escape_html(&o.description),
                    escape_html(&o.estimated_savings),
                    i = o.impact
                );
            }
            out.push_str("</table>\n");
        }
        out.push_str("<h3>Recommendations</h3>\n<ul>\n");
        for r in &opt.recommendations {
            let _ = writeln!(out, "<li>{}</li>", escape_html(r));
        }
        out.push_str("</ul>\n");
    }

    out.push_str("</body>\n</html>\n");
    out
}

pub fn escape_html(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for ch in s.chars() {
        match ch {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(ch),
        }
    }
    out
}

fn temp_bytes(opt: &OptimizationReport) -> Option<u64> {
    opt.scans
        .iter()
        .find_map(|s| s.counters.get("temp_bytes").copied())
}

/// `<base>.<ext>` without replacing an existing dotted suffix in `base`.
pub fn output_path(base: &Path, format: ReportFormat) -> PathBuf {
    let mut s = base.as_os_str().to_owned();
    s.push(".");
    s.push(format.extension());
    PathBuf::from(s)
}

/// Writes one file per format. A failed write is logged and collected; it
/// never stops the remaining formats.
pub fn write_reports(
    base: &Path,
    bundle: &ReportBundle,
    formats: &[ReportFormat],
) -> ReportWriteOutcome {
    let mut outcome = ReportWriteOutcome::default();
    for &format in formats {
        let path = output_path(base, format);
        let result = render(bundle, format).and_then(|body| write_file(&path, body.as_bytes()));
        match result {
            Ok(()) => {
                tracing::info!(path = %path.display(), "report written");
                outcome.written.push(path);
            }
            Err(err) => {
                tracing::warn!(path = %path.display(), "failed to write report: {err:#}");
                outcome.failed.push((path, format!("{err:#}")));
            }
        }
    }
    outcome
}

fn write_file(path: &Path, bytes: &[u8]) -> Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("failed to create directory: {}", parent.display()))?;
    }
    std::fs::write(path, bytes).with_context(|| format!("failed to write: {}", path.display()))
}

pub fn session_dir(data_dir: &Path, session_id: &str) -> PathBuf {
    data_dir.join("sessions").join(session_id)
}

/// Process id plus a nanosecond timestamp, unique enough per machine.
pub fn new_session_id() -> String {
    let ts = time::OffsetDateTime::now_utc().unix_timestamp_nanos();
    format!("{}-{ts}", std::process::id())
}

pub fn persist_result<T: Serialize>(
    data_dir: &Path,
    session_id: &str,
    file_name: &str,
    value: &T,
) -> Result<PathBuf> {
    let path = session_dir(data_dir, session_id).join(file_name);
    let buf = serde_json::to_vec_pretty(value).context("failed to serialize session result")?;
    write_file(&path, &buf)?;
    Ok(path)
}
