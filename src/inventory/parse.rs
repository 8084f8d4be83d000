use serde_json::Value;

use crate::inventory::RawRecord;
use crate::platform::windows::{parse_reg_number, parse_reg_query};

/// Entries hidden from "Apps & features" (system components, update
/// children) are dropped.
pub fn parse_registry_uninstall(stdout: &str) -> Vec<RawRecord> {
    parse_reg_query(stdout)
        .into_iter()
        .filter_map(|block| {
            let display_name = block.text("DisplayName")?;
            let hidden = block
                .get("SystemComponent")
                .and_then(|v| parse_reg_number(&v.data))
                == Some(1);
            if hidden || block.text("ParentKeyName").is_some() {
                return None;
            }
            let key_name = block
                .key
                .rsplit('\\')
                .next()
                .map(str::to_string)
                .filter(|s| !s.is_empty());
            Some(RawRecord::Registry {
                display_name,
                display_version: block.text("DisplayVersion"),
                install_location: block.text("InstallLocation"),
                publisher: block.text("Publisher"),
                key_name,
            })
        })
        .collect()
}

/// `winget list` prints a fixed-width table whose column offsets come from
/// the header line. Progress spinners precede the header on the same line,
/// separated by carriage returns.
pub fn parse_winget_list(stdout: &str) -> Vec<RawRecord> {
    let lines: Vec<&str> = stdout
        .lines()
        .map(|l| l.rsplit('\r').next().unwrap_or(l))
        .collect();

    let Some(header_idx) = lines.iter().position(|l| is_winget_header(l)) else {
        return Vec::new();
    };
    let header: Vec<char> = lines[header_idx].chars().collect();
    let Some(id_col) = column_start(&header, "Id") else {
        return Vec::new();
    };
    let Some(version_col) = column_start(&header, "Version") else {
        return Vec::new();
    };
    let version_end = column_start(&header, "Available")
        .or_else(|| column_start(&header, "Source"));

    let mut out = Vec::new();
    for line in &lines[header_idx + 1..] {
        let trimmed = line.trim();
        if trimmed.is_empty() || trimmed.chars().all(|c| c == '-') {
            continue;
        }
        let chars: Vec<char> = line.chars().collect();
        if chars.len() <= id_col {
            continue;
        }
        let name = slice(&chars, 0, id_col);
        let id = slice(&chars, id_col, version_col);
        let version = match version_end {
            Some(end) => slice(&chars, version_col, end),
            None => slice(&chars, version_col, chars.len()),
        };
        if name.is_empty() || id.is_empty() {
            continue;
        }
        out.push(RawRecord::Winget {
            name,
            id,
            version: Some(version).filter(|v| !v.is_empty()),
        });
    }
    out
}

fn is_winget_header(line: &str) -> bool {
    let t = line.trim_start();
    t.starts_with("Name") && t.contains(" Id ") && t.contains("Version")
}

fn column_start(header: &[char], label: &str) -> Option<usize> {
    let label: Vec<char> = label.chars().collect();
    (1..header.len()).find(|&i| {
        header[i - 1] == ' '
            && header[i..].starts_with(&label)
            && header
                .get(i + label.len())
                .map(|c| *c == ' ')
                .unwrap_or(true)
    })
}

fn slice(chars: &[char], start: usize, end: usize) -> String {
    let end = end.min(chars.len());
    if start >= end {
        return String::new();
    }
    chars[start..end].iter().collect::<String>().trim().to_string()
}

/// `choco list --limit-output` prints `name|version` per package.
pub fn parse_choco_list(stdout: &str) -> Vec<RawRecord> {
    stdout
        .lines()
        .map(str::trim)
        .filter_map(|line| {
            let (name, version) = line.split_once('|')?;
            let name = name.trim();
            if name.is_empty() {
                return None;
            }
            Some(RawRecord::Chocolatey {
                name: name.to_string(),
                version: Some(version.trim().to_string()).filter(|v| !v.is_empty()),
            })
        })
        .collect()
}

pub fn parse_appx_rows(rows: &[Value]) -> Vec<RawRecord> {
    rows.iter()
        .filter_map(|row| {
            let field = |key: &str| {
                row.get(key)
                    .and_then(Value::as_str)
                    .map(|s| s.trim().to_string())
                    .filter(|s| !s.is_empty())
            };
            Some(RawRecord::Appx {
                name: field("Name")?,
                package_family_name: field("PackageFamilyName"),
                version: field("Version"),
                install_location: field("InstallLocation"),
                publisher: field("Publisher"),
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_winget_list_uses_header_offsets() {
        let stdout = "\r   - \r   \\ \rName                          Id                          Version        Available Source\n\
-----------------------------------------------------------------------------------------------\n\
7-Zip 23.01 (x64)             7zip.7zip                   23.01                    winget\n\
Microsoft Edge                Microsoft.Edge              118.0.2088.76  119.0.1   winget\n\
Orphan                        \n";
        let records = parse_winget_list(stdout);
        assert_eq!(records.len(), 2);
        assert_eq!(
            records[0],
            RawRecord::Winget {
                name: "7-Zip 23.01 (x64)".to_string(),
                id: "7zip.7zip".to_string(),
                version: Some("23.01".to_string()),
            }
        );
        let RawRecord::Winget { id, version, .. } = &records[1] else {
            panic!("expected winget record");
        };
        assert_eq!(id, "Microsoft.Edge");
        assert_eq!(version.as_deref(), Some("118.0.2088.76"));
    }

    #[test]
    fn parse_winget_list_without_header_is_empty() {
        assert!(parse_winget_list("No installed package found matching input criteria.").is_empty());
    }

    #[test]
    fn parse_choco_list_reads_limit_output() {
        let records = parse_choco_list("7zip|23.1.0\nchocolatey|2.2.2\n\nbroken line\n");
        assert_eq!(records.len(), 2);
        assert_eq!(
            records[0],
            RawRecord::Chocolatey {
                name: "7zip".to_string(),
                version: Some("23.1.0".to_string()),
            }
        );
    }

    #[test]
    fn parse_registry_uninstall_skips_hidden_entries() {
        let stdout = "\
HKEY_LOCAL_MACHINE\\SOFTWARE\\Microsoft\\Windows\\CurrentVersion\\Uninstall\\Git_is1
    DisplayName    REG_SZ    Git
    DisplayVersion    REG_SZ    2.43.0
    Publisher    REG_SZ    The Git Development Community

HKEY_LOCAL_MACHINE\\SOFTWARE\\Microsoft\\Windows\\CurrentVersion\\Uninstall\\{AAAA}
    DisplayName    REG_SZ    Hidden Runtime Piece
    SystemComponent    REG_DWORD    0x1

HKEY_LOCAL_MACHINE\\SOFTWARE\\Microsoft\\Windows\\CurrentVersion\\Uninstall\\KB500
    DisplayName    REG_SZ    Update for Something
    ParentKeyName    REG_SZ    OperatingSystem

HKEY_LOCAL_MACHINE\\SOFTWARE\\Microsoft\\Windows\\CurrentVersion\\Uninstall\\NoName
    Publisher    REG_SZ    Nobody
";
        let records = parse_registry_uninstall(stdout);
        assert_eq!(records.len(), 1);
        let RawRecord::Registry {
            display_name,
            display_version,
            key_name,
            ..
        } = &records[0]
        else {
            panic!("expected registry record");
        };
        assert_eq!(display_name, "Git");
        assert_eq!(display_version.as_deref(), Some("2.43.0"));
        assert_eq!(key_name.as_deref(), Some("Git_is1"));
    }

    #[test]
    fn parse_appx_rows_requires_name() {
        let rows = crate::platform::windows::json_rows(serde_json::json!([
            {"Name": "Microsoft.WindowsTerminal", "PackageFamilyName": "Microsoft.WindowsTerminal_8wekyb3d8bbwe", "Version": "1.18.3181.0"},
            {"PackageFamilyName": "nameless"}
        ]));
        let records = parse_appx_rows(&rows);
        assert_eq!(records.len(), 1);
    }
}
