use std::time::Duration;

use anyhow::{Context, Result};

use crate::platform::{CommandOutput, run_command, run_command_checked};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RegValueLine {
    pub name: String,
    pub kind: String,
    pub data: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct RegKeyBlock {
    pub key: String,
    pub values: Vec<RegValueLine>,
}

impl RegKeyBlock {
    pub fn get(&self, name: &str) -> Option<&RegValueLine> {
        self.values
            .iter()
            .find(|v| v.name.eq_ignore_ascii_case(name))
    }

    pub fn text(&self, name: &str) -> Option<String> {
        self.get(name)
            .map(|v| v.data.trim().to_string())
            .filter(|s| !s.is_empty())
    }
}

pub fn reg_query(key: &str, recursive: bool, timeout: Duration) -> Result<CommandOutput> {
    let mut args = vec!["query", key];
    if recursive {
        args.push("/s");
    }
    run_command("reg", &args, timeout)
}

pub fn reg_query_value(key: &str, name: &str, timeout: Duration) -> Result<CommandOutput> {
    run_command("reg", &["query", key, "/v", name], timeout)
}

/// Runs a PowerShell pipeline and parses its `ConvertTo-Json` output.
pub fn powershell_json(script: &str, timeout: Duration) -> Result<serde_json::Value> {
    let full = format!("{script} | ConvertTo-Json -Depth 4 -Compress");
    let output = run_command_checked(
        "powershell",
        &["-NoProfile", "-NonInteractive", "-Command", full.as_str()],
        timeout,
    )?;
    let stdout = output.stdout.trim();
    if stdout.is_empty() {
        return Ok(serde_json::Value::Array(Vec::new()));
    }
    serde_json::from_str(stdout).context("failed to parse PowerShell JSON output")
}

/// `ConvertTo-Json` emits a bare object for a single result and an array
/// otherwise.
pub fn json_rows(value: serde_json::Value) -> Vec<serde_json::Value> {
    match value {
        serde_json::Value::Array(items) => items,
        serde_json::Value::Null => Vec::new(),
        other => vec![other],
    }
}

pub fn parse_reg_query(stdout: &str) -> Vec<RegKeyBlock> {
    let mut blocks = Vec::new();
    let mut cur: Option<RegKeyBlock> = None;

    for line in stdout.lines() {
        let trimmed_end = line.trim_end_matches(['\r', '\n']);
        if trimmed_end.trim().is_empty() {
            continue;
        }
        if trimmed_end.starts_with("HKEY_") {
            if let Some(block) = cur.take() {
                blocks.push(block);
            }
            cur = Some(RegKeyBlock {
                key: trimmed_end.trim().to_string(),
                values: Vec::new(),
            });
            continue;
        }
        let Some(block) = cur.as_mut() else { continue };
        if let Some(value) = parse_reg_value_line(trimmed_end) {
            block.values.push(value);
        }
    }

    if let Some(block) = cur {
        blocks.push(block);
    }
    blocks
}

fn parse_reg_value_line(line: &str) -> Option<RegValueLine> {
    let line = line.trim_start();
    let type_at = line.find("    REG_")?;
    let name = line[..type_at].trim().to_string();
    let rest = line[type_at..].trim_start();
    let (kind, data) = match rest.find("    ") {
        Some(idx) => (&rest[..idx], rest[idx..].trim()),
        None => (rest.trim(), ""),
    };
    Some(RegValueLine {
        name,
        kind: kind.to_string(),
        data: data.to_string(),
    })
}

/// `REG_DWORD`/`REG_QWORD` data is printed as hex (`0x1f`).
pub fn parse_reg_number(data: &str) -> Option<u64> {
    let data = data.trim();
    if let Some(hex) = data
        .strip_prefix("0x")
        .or_else(|| data.strip_prefix("0X"))
    {
        return u64::from_str_radix(hex, 16).ok();
    }
    data.parse::<u64>().ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = "\r
HKEY_LOCAL_MACHINE\\SOFTWARE\\Microsoft\\Windows\\CurrentVersion\\Uninstall\\7-Zip\r
    DisplayName    REG_SZ    7-Zip 23.01 (x64)\r
    DisplayVersion    REG_SZ    23.01\r
    Publisher    REG_SZ    Igor Pavlov\r
    EstimatedSize    REG_DWORD    0x1496\r
    Comments    REG_SZ    \r
\r
HKEY_LOCAL_MACHINE\\SOFTWARE\\Microsoft\\Windows\\CurrentVersion\\Uninstall\\VLC media player\r
    DisplayName    REG_SZ    VLC media player\r
    InstallLocation    REG_SZ    C:\\Program Files\\VideoLAN\\VLC\r
";

    #[test]
    fn parse_reg_query_splits_blocks_and_values() {
        let blocks = parse_reg_query(SAMPLE);
        assert_eq!(blocks.len(), 2);
        assert!(blocks[0].key.ends_with("\\7-Zip"));
        assert_eq!(blocks[0].text("displayname").as_deref(), Some("7-Zip 23.01 (x64)"));
        assert_eq!(blocks[0].text("Publisher").as_deref(), Some("Igor Pavlov"));
        assert_eq!(blocks[0].text("Comments"), None);
        let size = blocks[0].get("EstimatedSize").expect("size");
        assert_eq!(size.kind, "REG_DWORD");
        assert_eq!(parse_reg_number(&size.data), Some(0x1496));
        assert_eq!(
            blocks[1].text("InstallLocation").as_deref(),
            Some("C:\\Program Files\\VideoLAN\\VLC")
        );
    }

    #[test]
    fn parse_reg_value_line_keeps_spaces_in_names() {
        let v = parse_reg_value_line("    Menu Show Delay    REG_SZ    400").expect("value");
        assert_eq!(v.name, "Menu Show Delay");
        assert_eq!(v.kind, "REG_SZ");
        assert_eq!(v.data, "400");
    }

    #[test]
    fn json_rows_normalizes_single_object() {
        let one = serde_json::json!({"Name": "a"});
        assert_eq!(json_rows(one).len(), 1);
        let many = serde_json::json!([{"Name": "a"}, {"Name": "b"}]);
        assert_eq!(json_rows(many).len(), 2);
        assert!(json_rows(serde_json::Value::Null).is_empty());
    }
}
