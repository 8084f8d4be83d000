use anyhow::Error;
use std::io::{self, Write};
use unicode_width::UnicodeWidthChar;

use crate::core::{AuditResult, Impact, OptimizationReport, Priority};
use crate::install::{InstallAction, InstallOutcome};

#[derive(Debug, Clone)]
pub struct UiConfig {
    pub color: bool,
    pub stdin_is_tty: bool,
    pub stdout_is_tty: bool,
    pub stderr_is_tty: bool,
    pub max_table_rows: usize,
    pub quiet: bool,
    pub verbose: bool,
}

pub fn eprintln_error(err: &Error) {
    let mut stderr = io::stderr().lock();
    let _ = writeln!(stderr, "error:");
    let _ = writeln!(stderr, "  {err}");

    let mut causes = err.chain().skip(1).peekable();
    if causes.peek().is_some() {
        let _ = writeln!(stderr, "caused by:");
        for cause in causes {
            let _ = writeln!(stderr, "  - {cause}");
        }
    }

    let _ = writeln!(stderr, "next steps:");
    let _ = writeln!(stderr, "  - re-run with `--verbose` for more detail");
    let _ = writeln!(
        stderr,
        "  - see `winaudit --help` for available commands and options"
    );
}

pub fn print_audit(result: &AuditResult, cfg: &UiConfig) {
    if cfg.quiet {
        return;
    }

    let s = &result.summary;
    let mut out = io::stdout().lock();
    let _ = writeln!(
        out,
        "Summary: {}/{} installed ({:.2}%)  missing={}  skipped={}",
        s.installed_count, result.total_apps, s.completion_percentage, s.missing_count, s.skipped_count
    );
    if let Some(category) = result.category_filter {
        let _ = writeln!(out, "- category: {category}");
    }
    for note in &result.notes {
        let _ = writeln!(out, "- {note}");
    }

    if !result.recommended_installs.is_empty() {
        let names: Vec<&str> = result
            .recommended_installs
            .iter()
            .map(|m| m.app.name.as_str())
            .collect();
        let _ = writeln!(out, "\nRecommended installs: {}", names.join(", "));
    }

    if !result.missing.is_empty() {
        let rows = result.missing.len().min(cfg.max_table_rows.max(1));
        let _ = writeln!(out);
        if result.missing.len() > rows {
            let _ = writeln!(out, "Missing ({rows} of {}):", result.missing.len());
        } else {
            let _ = writeln!(out, "Missing:");
        }
        let table: Vec<[String; 4]> = result
            .missing
            .iter()
            .take(rows)
            .map(|m| {
                [
                    format_priority(m.priority, cfg.color),
                    truncate_middle(&m.app.name, 40),
                    m.app.category.to_string(),
                    m.recommended_method.to_string(),
                ]
            })
            .collect();
        print_table(&mut out, ["Priority", "Name", "Category", "Method"], &table);
    }

    if !result.installed.is_empty() {
        let rows = result.installed.len().min(cfg.max_table_rows.max(1));
        let _ = writeln!(out, "\nInstalled:");
        let table: Vec<[String; 4]> = result
            .installed
            .iter()
            .take(rows)
            .map(|i| {
                [
                    truncate_middle(&i.app.name, 40),
                    i.app.category.to_string(),
                    i.status.version.clone().unwrap_or_default(),
                    i.status
                        .source
                        .map(|s| s.to_string())
                        .unwrap_or_default(),
                ]
            })
            .collect();
        print_table(&mut out, ["Name", "Category", "Version", "Source"], &table);
        if result.installed.len() > rows {
            let _ = writeln!(out, "- ... ({} more)", result.installed.len() - rows);
        }
    }

    for skipped in &result.skipped {
        let _ = writeln!(out, "\nSkipped: {} ({})", skipped.name, skipped.reason);
    }
}

pub fn print_optimization(report: &OptimizationReport, cfg: &UiConfig) {
    if cfg.quiet {
        return;
    }

    let mut out = io::stdout().lock();
    let _ = writeln!(
        out,
        "Score: {}/100 ({})  opportunities={}  os={} {}",
        report.score.overall,
        report.score.category,
        report.score.opportunity_count,
        report.os.name,
        report.os.version
    );

    if !report.opportunities.is_empty() {
        let rows = report.opportunities.len().min(cfg.max_table_rows.max(1));
        let _ = writeln!(out);
        let table: Vec<[String; 4]> = report
            .opportunities
            .iter()
            .take(rows)
            .map(|o| {
                [
                    format_impact(o.impact, cfg.color),
                    o.category.to_string(),
                    truncate_middle(&o.description, 70),
                    o.estimated_savings.clone(),
                ]
            })
            .collect();
        print_table(&mut out, ["Impact", "Category", "Description", "Savings"], &table);
        if report.opportunities.len() > rows {
            let _ = writeln!(
                out,
                "- ... ({} more)",
                report.opportunities.len() - rows
            );
        }
    }

    let skipped: Vec<&String> = report
        .scans
        .iter()
        .flat_map(|s| s.skipped_checks.iter())
        .collect();
    if !skipped.is_empty() {
        let _ = writeln!(out, "\nSkipped checks: {}", skipped.len());
        if cfg.verbose {
            for s in skipped {
                let _ = writeln!(out, "- {s}");
            }
        }
    }

    let _ = writeln!(out, "\nRecommendations:");
    for r in &report.recommendations {
        let _ = writeln!(out, "- {r}");
    }
}

pub fn print_install_plan(actions: &[InstallAction], cfg: &UiConfig) {
    if cfg.quiet {
        return;
    }

    let mut out = io::stdout().lock();
    if actions.is_empty() {
        let _ = writeln!(out, "Nothing to install.");
        return;
    }

    let _ = writeln!(out, "Install plan ({} apps):", actions.len());
    for (idx, action) in actions.iter().enumerate() {
        let priority = format_priority(action.priority, cfg.color);
        let _ = writeln!(out, "[{}] {} [{priority}]", idx + 1, action.app);
        match action.cmdline() {
            Some(cmdline) => {
                let _ = writeln!(out, "  - command: {cmdline}");
            }
            None => {
                if let Some(note) = &action.note {
                    let _ = writeln!(out, "  - manual: {note}");
                }
            }
        }
    }
}

pub fn print_install_outcome(outcome: &InstallOutcome, cfg: &UiConfig) {
    if cfg.quiet {
        return;
    }

    let mut out = io::stdout().lock();
    let ok = outcome.attempts.iter().filter(|a| a.succeeded()).count();
    let _ = writeln!(
        out,
        "installed: {ok} / failed: {} / skipped: {}",
        outcome.failed_count(),
        outcome.skipped.len()
    );
    for attempt in outcome.attempts.iter().filter(|a| !a.succeeded()) {
        let detail = match (&attempt.error, &attempt.output) {
            (Some(err), _) => err.clone(),
            (None, Some(o)) => format!("exit_code={}", o.exit_code),
            (None, None) => "unknown error".to_string(),
        };
        let _ = writeln!(out, "- failed: {} ({detail})", attempt.action.app);
    }
    if cfg.verbose {
        for (action, reason) in &outcome.skipped {
            let _ = writeln!(out, "- skipped: {} ({reason})", action.app);
        }
    }
}

fn print_table<const N: usize>(out: &mut dyn Write, headers: [&str; N], rows: &[[String; N]]) {
    let mut widths = [0usize; N];
    for (i, h) in headers.iter().enumerate() {
        widths[i] = visible_width_ansi(h);
    }
    for row in rows {
        for (i, cell) in row.iter().enumerate() {
            widths[i] = widths[i].max(visible_width_ansi(cell));
        }
    }

    let header: Vec<String> = headers
        .iter()
        .enumerate()
        .map(|(i, h)| pad_end_ansi(h, widths[i]))
        .collect();
    let _ = writeln!(out, "{}", header.join("  ").trim_end());
    let rule: Vec<String> = widths.iter().map(|w| "-".repeat(*w)).collect();
    let _ = writeln!(out, "{}", rule.join("  "));
    for row in rows {
        let cells: Vec<String> = row
            .iter()
            .enumerate()
            .map(|(i, c)| pad_end_ansi(c, widths[i]))
            .collect();
        let _ = writeln!(out, "{}", cells.join("  ").trim_end());
    }
}

fn truncate_middle(s: &str, max_chars: usize) -> String {
    let len = s.chars().count();
    if len <= max_chars {
        return s.to_string();
    }

    let keep = max_chars.saturating_sub(3);
    let left = keep / 2;
    let right = keep.saturating_sub(left);

    let prefix: String = s.chars().take(left).collect();
    let suffix: String = s.chars().skip(len - right).collect();

    format!("{prefix}...{suffix}")
}

fn colorize(s: &str, code: &str, color: bool) -> String {
    if !color {
        return s.to_string();
    }
    format!("\x1b[{code}m{s}\x1b[0m")
}

fn format_priority(p: Priority, color: bool) -> String {
    let code = match p {
        Priority::High => "31",
        Priority::Medium => "33",
        Priority::Low => "90",
    };
    colorize(p.as_str(), code, color)
}

fn format_impact(i: Impact, color: bool) -> String {
    let code = match i {
        Impact::High => "31",
        Impact::Medium => "33",
        Impact::Low => "90",
    };
    colorize(i.as_str(), code, color)
}

fn pad_end_ansi(s: &str, width: usize) -> String {
    let w = visible_width_ansi(s);
    if w >= width {
        return s.to_string();
    }
    format!("{s}{}", " ".repeat(width - w))
}

fn visible_width_ansi(s: &str) -> usize {
    let mut width: usize = 0;
    let mut chars = s.chars().peekable();
    while let Some(ch) = chars.next() {
        if ch == '\x1b' && chars.peek() == Some(&'[') {
            let _ = chars.next();
            for ch2 in chars.by_ref() {
                if ch2 == 'm' {
                    break;
                }
            }
            continue;
        }
        width = width.saturating_add(UnicodeWidthChar::width(ch).unwrap_or(0));
    }
    width
}

pub fn format_bytes(bytes: u64) -> String {
    const KB: f64 = 1024.0;
    const MB: f64 = KB * 1024.0;
    const GB: f64 = MB * 1024.0;
    const TB: f64 = GB * 1024.0;

    let b = bytes as f64;
    if b < KB {
        return format!("{bytes} B");
    }
    if b < MB {
        return format!("{:.1} KiB", b / KB);
    }
    if b < GB {
        return format!("{:.1} MiB", b / MB);
    }
    if b < TB {
        return format!("{:.1} GiB", b / GB);
    }
    format!("{:.1} TiB", b / TB)
}
