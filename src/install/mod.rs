//! Install plans for missing catalog apps and their guarded execution.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::core::{AuditResult, InstallMethod, MissingApp, Priority};
use crate::platform::CommandOutput;

const WINGET_FLAGS: [&str; 4] = [
    "-e",
    "--silent",
    "--accept-source-agreements",
    "--accept-package-agreements",
];

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InstallAction {
    pub app: String,
    pub priority: Priority,
    pub method: InstallMethod,
    /// Catalog identifier the command was built from.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub package_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cmd: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub args: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub note: Option<String>,
}

impl InstallAction {
    pub fn cmdline(&self) -> Option<String> {
        let cmd = self.cmd.as_deref()?;
        let mut out = cmd.to_string();
        for arg in &self.args {
            out.push(' ');
            out.push_str(arg);
        }
        Some(out)
    }

    fn manual(m: &MissingApp, note: String) -> Self {
        Self {
            app: m.app.name.clone(),
            priority: m.priority,
            method: InstallMethod::Manual,
            package_id: None,
            cmd: None,
            args: vec![],
            note: Some(note),
        }
    }
}

/// Builds one action per missing app at or above `min_priority`, most urgent
/// first. Catalog order is kept within a priority.
pub fn plan(audit: &AuditResult, min_priority: Priority) -> Vec<InstallAction> {
    let mut missing: Vec<&MissingApp> = audit
        .missing
        .iter()
        .filter(|m| m.priority.at_least(min_priority))
        .collect();
    missing.sort_by_key(|m| std::cmp::Reverse(m.priority.rank()));
    missing.into_iter().map(action_for).collect()
}

fn action_for(m: &MissingApp) -> InstallAction {
    match m.recommended_method {
        InstallMethod::Winget => match m.app.winget_id.as_deref() {
            Some(id) => {
                let mut args = vec!["install".to_string(), "--id".to_string(), id.to_string()];
                args.extend(WINGET_FLAGS.iter().map(|s| s.to_string()));
                InstallAction {
                    app: m.app.name.clone(),
                    priority: m.priority,
                    method: InstallMethod::Winget,
                    package_id: Some(id.to_string()),
                    cmd: Some("winget".to_string()),
                    args,
                    note: None,
                }
            }
            None => InstallAction::manual(m, "no winget identifier in catalog".to_string()),
        },
        InstallMethod::Chocolatey => match m.app.choco_id.as_deref() {
            Some(id) => InstallAction {
                app: m.app.name.clone(),
                priority: m.priority,
                method: InstallMethod::Chocolatey,
                package_id: Some(id.to_string()),
                cmd: Some("choco".to_string()),
                args: vec!["install".to_string(), id.to_string(), "-y".to_string()],
                note: None,
            },
            None => InstallAction::manual(m, "no chocolatey identifier in catalog".to_string()),
        },
        InstallMethod::Manual => InstallAction::manual(
            m,
            format!("download {} from the vendor's website", m.app.name),
        ),
    }
}

fn is_safe_package_id(id: &str) -> bool {
    !id.is_empty()
        && !id.starts_with('-')
        && id
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '.' | '-' | '_' | '+'))
}

/// Only the exact command shapes produced by [`plan`] may run.
pub fn is_allowlisted(action: &InstallAction) -> bool {
    let (Some(cmd), Some(id)) = (action.cmd.as_deref(), action.package_id.as_deref()) else {
        return false;
    };
    if !is_safe_package_id(id) {
        return false;
    }
    let args: Vec<&str> = action.args.iter().map(String::as_str).collect();
    match (action.method, cmd) {
        (InstallMethod::Winget, "winget") => {
            args.len() == 3 + WINGET_FLAGS.len()
                && args[..3] == ["install", "--id", id]
                && args[3..] == WINGET_FLAGS
        }
        (InstallMethod::Chocolatey, "choco") => args == ["install", id, "-y"],
        _ => false,
    }
}

#[derive(Debug, Clone)]
pub struct InstallAttempt {
    pub action: InstallAction,
    pub output: Option<CommandOutput>,
    pub error: Option<String>,
}

impl InstallAttempt {
    pub fn succeeded(&self) -> bool {
        self.error.is_none() && self.output.as_ref().is_some_and(CommandOutput::success)
    }
}

#[derive(Debug, Clone, Default)]
pub struct InstallOutcome {
    pub attempts: Vec<InstallAttempt>,
    pub skipped: Vec<(InstallAction, String)>,
}

impl InstallOutcome {
    pub fn failed_count(&self) -> usize {
        self.attempts.iter().filter(|a| !a.succeeded()).count()
    }
}

/// Runs allowlisted actions one after another. Anything else is reported as
/// skipped. A failing install does not stop the rest.
pub fn apply(actions: &[InstallAction], timeout: Duration) -> InstallOutcome {
    let mut outcome = InstallOutcome::default();
    for action in actions {
        if !is_allowlisted(action) {
            let reason = match action.method {
                InstallMethod::Manual => "manual install".to_string(),
                _ => "command is not allowlisted".to_string(),
            };
            outcome.skipped.push((action.clone(), reason));
            continue;
        }
        let Some(cmd) = action.cmd.as_deref() else {
            continue;
        };
        let args: Vec<&str> = action.args.iter().map(String::as_str).collect();
        tracing::info!(app = %action.app, cmd, "installing");
        let attempt = match crate::platform::run_command(cmd, &args, timeout) {
            Ok(output) => {
                if !output.success() {
                    tracing::warn!(app = %action.app, exit_code = output.exit_code, "install failed");
                }
                InstallAttempt {
                    action: action.clone(),
                    output: Some(output),
                    error: None,
                }
            }
            Err(err) => {
                tracing::warn!(app = %action.app, "install failed: {err:#}");
                InstallAttempt {
                    action: action.clone(),
                    output: None,
                    error: Some(format!("{err:#}")),
                }
            }
        };
        outcome.attempts.push(attempt);
    }
    outcome
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;

    use super::*;
    use crate::core::{AppCategory, AppDefinition, AuditSummary, SCHEMA_VERSION};

    fn missing(app: AppDefinition, priority: Priority, method: InstallMethod) -> MissingApp {
        MissingApp {
            app,
            priority,
            recommended_method: method,
        }
    }

    fn audit(missing: Vec<MissingApp>) -> AuditResult {
        AuditResult {
            schema_version: SCHEMA_VERSION.to_string(),
            tool_version: "0.1.0".to_string(),
            generated_at: "2024-01-01T00:00:00Z".to_string(),
            category_filter: None,
            include_installed: false,
            catalog_source: "builtin".to_string(),
            total_apps: missing.len(),
            installed: vec![],
            recommended_installs: vec![],
            skipped: vec![],
            summary: AuditSummary {
                installed_count: 0,
                missing_count: missing.len(),
                skipped_count: 0,
                completion_percentage: 0.0,
                category_breakdown: BTreeMap::new(),
            },
            missing,
            notes: vec![],
        }
    }

    fn sample() -> AuditResult {
        audit(vec![
            missing(
                AppDefinition::new("VLC", AppCategory::Media).with_choco("vlc"),
                Priority::Low,
                InstallMethod::Chocolatey,
            ),
            missing(
                AppDefinition::new("7-Zip", AppCategory::System).with_winget("7zip.7zip"),
                Priority::High,
                InstallMethod::Winget,
            ),
            missing(
                AppDefinition::new("Notepad++", AppCategory::Editor),
                Priority::Medium,
                InstallMethod::Manual,
            ),
        ])
    }

    #[test]
    fn plan_orders_by_priority_and_builds_commands() {
        let actions = plan(&sample(), Priority::Low);
        let names: Vec<&str> = actions.iter().map(|a| a.app.as_str()).collect();
        assert_eq!(names, vec!["7-Zip", "Notepad++", "VLC"]);

        assert_eq!(
            actions[0].cmdline().as_deref(),
            Some(
                "winget install --id 7zip.7zip -e --silent --accept-source-agreements --accept-package-agreements"
            )
        );
        assert_eq!(actions[1].cmd, None);
        assert!(actions[1].note.is_some());
        assert_eq!(actions[2].cmdline().as_deref(), Some("choco install vlc -y"));
    }

    #[test]
    fn plan_respects_min_priority() {
        let actions = plan(&sample(), Priority::Medium);
        assert_eq!(actions.len(), 2);
        assert!(actions.iter().all(|a| a.priority.at_least(Priority::Medium)));
    }

    #[test]
    fn planned_commands_are_allowlisted() {
        let actions = plan(&sample(), Priority::Low);
        assert!(is_allowlisted(&actions[0]));
        assert!(!is_allowlisted(&actions[1]));
        assert!(is_allowlisted(&actions[2]));
    }

    #[test]
    fn tampered_commands_are_rejected() {
        let actions = plan(&sample(), Priority::Low);

        let mut extra = actions[0].clone();
        extra.args.push("--force".to_string());
        assert!(!is_allowlisted(&extra));

        let mut other_id = actions[2].clone();
        other_id.args[1] = "malware".to_string();
        assert!(!is_allowlisted(&other_id));

        let mut other_cmd = actions[2].clone();
        other_cmd.cmd = Some("powershell".to_string());
        assert!(!is_allowlisted(&other_cmd));

        let mut flag_id = actions[2].clone();
        flag_id.package_id = Some("--source=evil".to_string());
        flag_id.args[1] = "--source=evil".to_string();
        assert!(!is_allowlisted(&flag_id));
    }

    #[test]
    fn apply_skips_manual_and_unlisted_actions() {
        let mut actions = plan(&sample(), Priority::Medium);
        actions.retain(|a| a.method == InstallMethod::Manual);
        let outcome = apply(&actions, Duration::from_secs(1));
        assert!(outcome.attempts.is_empty());
        assert_eq!(outcome.skipped.len(), 1);
        assert_eq!(outcome.skipped[0].1, "manual install");
        assert_eq!(outcome.failed_count(), 0);
    }
}
