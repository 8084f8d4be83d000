use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::Serialize;
use time::OffsetDateTime;
use time::format_description::well_known::Rfc3339;

use crate::install::{InstallAttempt, InstallOutcome};

const MAX_CMD_OUTPUT_BYTES: usize = 64 * 1024;

#[derive(Debug, Serialize)]
struct InstallLog {
    schema_version: &'static str,
    tool_version: String,
    command: &'static str,
    started_at: String,
    finished_at: String,
    status: &'static str,
    attempts: Vec<CommandAttemptLog>,
    skipped: Vec<SkippedLog>,
}

#[derive(Debug, Serialize)]
struct CommandAttemptLog {
    app: String,
    cmd: String,
    args: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    exit_code: Option<i32>,
    #[serde(skip_serializing_if = "String::is_empty")]
    stdout: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    stderr: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
}

#[derive(Debug, Serialize)]
struct SkippedLog {
    app: String,
    reason: String,
}

pub fn logs_dir(data_dir: &Path) -> PathBuf {
    data_dir.join("logs")
}

pub fn write_install_log(
    data_dir: &Path,
    started_at: OffsetDateTime,
    finished_at: OffsetDateTime,
    outcome: &InstallOutcome,
) -> Result<PathBuf> {
    let dir = logs_dir(data_dir);
    std::fs::create_dir_all(&dir)
        .with_context(|| format!("failed to create log directory: {}", dir.display()))?;

    let pid = std::process::id();
    let ts = finished_at.unix_timestamp_nanos();
    let path = dir.join(format!("install-{pid}-{ts}.json"));

    let status = if outcome.failed_count() == 0 {
        "ok"
    } else {
        "partial_error"
    };

    let log = InstallLog {
        schema_version: crate::core::SCHEMA_VERSION,
        tool_version: env!("CARGO_PKG_VERSION").to_string(),
        command: "install",
        started_at: format_ts(started_at),
        finished_at: format_ts(finished_at),
        status,
        attempts: outcome.attempts.iter().map(command_attempt).collect(),
        skipped: outcome
            .skipped
            .iter()
            .map(|(action, reason)| SkippedLog {
                app: action.app.clone(),
                reason: reason.clone(),
            })
            .collect(),
    };

    let buf = serde_json::to_vec_pretty(&log).context("failed to serialize install log")?;
    std::fs::write(&path, buf)
        .with_context(|| format!("failed to write log: {}", path.display()))?;
    Ok(path)
}

fn format_ts(ts: OffsetDateTime) -> String {
    ts.format(&Rfc3339).unwrap_or_else(|_| "unknown".to_string())
}

fn command_attempt(attempt: &InstallAttempt) -> CommandAttemptLog {
    let action = &attempt.action;
    let (exit_code, stdout, stderr) = match &attempt.output {
        Some(out) => (
            Some(out.exit_code),
            truncate_string(&out.stdout, MAX_CMD_OUTPUT_BYTES),
            truncate_string(&out.stderr, MAX_CMD_OUTPUT_BYTES),
        ),
        None => (None, String::new(), String::new()),
    };
    CommandAttemptLog {
        app: action.app.clone(),
        cmd: action.cmd.clone().unwrap_or_default(),
        args: action.args.clone(),
        exit_code,
        stdout,
        stderr,
        error: attempt.error.clone(),
    }
}

fn truncate_string(s: &str, max_bytes: usize) -> String {
    if s.len() <= max_bytes {
        return s.to_string();
    }
    let mut idx = max_bytes;
    while idx > 0 && !s.is_char_boundary(idx) {
        idx = idx.saturating_sub(1);
    }
    let head = &s[..idx];
    format!("{head}\n...(truncated, total={} bytes)", s.len())
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicU64, Ordering};

    use super::*;
    use crate::core::{InstallMethod, Priority};
    use crate::install::InstallAction;
    use crate::platform::CommandOutput;

    fn action(app: &str) -> InstallAction {
        InstallAction {
            app: app.to_string(),
            priority: Priority::High,
            method: InstallMethod::Chocolatey,
            package_id: Some(app.to_lowercase()),
            cmd: Some("choco".to_string()),
            args: vec!["install".to_string(), app.to_lowercase(), "-y".to_string()],
            note: None,
        }
    }

    #[test]
    fn write_install_log_records_attempts_and_status() {
        static SEQ: AtomicU64 = AtomicU64::new(0);

        let seq = SEQ.fetch_add(1, Ordering::Relaxed);
        let data_dir = std::env::temp_dir().join(format!(
            "winaudit-log-test-{}-{seq}",
            std::process::id()
        ));
        let _ = std::fs::remove_dir_all(&data_dir);

        let outcome = InstallOutcome {
            attempts: vec![
                InstallAttempt {
                    action: action("Git"),
                    output: Some(CommandOutput {
                        exit_code: 0,
                        stdout: "installed".to_string(),
                        stderr: String::new(),
                    }),
                    error: None,
                },
                InstallAttempt {
                    action: action("VLC"),
                    output: None,
                    error: Some("timed out".to_string()),
                },
            ],
            skipped: vec![],
        };

        let now = OffsetDateTime::now_utc();
        let path = write_install_log(&data_dir, now, now, &outcome).expect("write log");
        assert!(path.starts_with(logs_dir(&data_dir)));

        let v: serde_json::Value =
            serde_json::from_slice(&std::fs::read(&path).expect("read")).expect("parse");
        assert_eq!(v["command"], "install");
        assert_eq!(v["status"], "partial_error");
        let attempts = v["attempts"].as_array().expect("attempts");
        assert_eq!(attempts.len(), 2);
        assert_eq!(attempts[0]["exit_code"], 0);
        assert_eq!(attempts[1]["error"], "timed out");
        assert!(attempts[1].get("exit_code").is_none());

        let _ = std::fs::remove_dir_all(&data_dir);
    }

    #[test]
    fn truncate_string_keeps_char_boundaries() {
        let s = "ééééé";
        let out = truncate_string(s, 3);
        assert!(out.starts_with("é\n"));
        assert!(out.contains("total=10 bytes"));
    }
}
