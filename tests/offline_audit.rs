use std::path::{Path, PathBuf};
use std::process::{Command, Output};
use std::sync::atomic::{AtomicU64, Ordering};

use serde_json::Value;

fn winaudit_cmd(home: &Path) -> Command {
    let mut cmd = Command::new(env!("CARGO_BIN_EXE_winaudit"));
    cmd.env("HOME", home);
    cmd.env("USERPROFILE", home);
    cmd.env("WINAUDIT_DATA_DIR", home.join("data"));
    cmd.env_remove("WINAUDIT_CONFIG");
    cmd.env_remove("WINAUDIT_GENERAL_MODE");
    cmd.env_remove("WINAUDIT_AUDIT_INCLUDE_INSTALLED");
    cmd.env_remove("WINAUDIT_AUDIT_DEFAULT_CATEGORY");
    cmd.env_remove("WINAUDIT_REPORT_HTML");
    cmd.env_remove("WINAUDIT_REPORT_TEXT");
    cmd.env_remove("WINAUDIT_REPORT_JSON");
    cmd
}

fn run(home: &Path, args: &[&str]) -> Output {
    winaudit_cmd(home).args(args).output().expect("run winaudit")
}

fn make_temp_home() -> PathBuf {
    static HOME_SEQ: AtomicU64 = AtomicU64::new(0);
    let seq = HOME_SEQ.fetch_add(1, Ordering::Relaxed);
    let home =
        std::env::temp_dir().join(format!("winaudit-offline-test-{}-{seq}", std::process::id()));
    let _ = std::fs::remove_dir_all(&home);
    std::fs::create_dir_all(&home).expect("create home");
    home
}

fn write(home: &Path, name: &str, contents: &str) -> String {
    let path = home.join(name);
    std::fs::write(&path, contents).expect("write fixture");
    path.to_str().expect("utf-8 path").to_string()
}

const CATALOG: &str = r#"[
    {"name": "7-Zip", "category": "System", "winget_id": "7zip.7zip"},
    {"name": "LibreOffice", "category": "Office", "winget_id": "TheDocumentFoundation.LibreOffice"},
    {"name": "VLC", "category": "Media", "winget_id": "VideoLAN.VLC"}
]"#;

const INVENTORY: &str = r#"[
    {"kind": "registry", "display_name": "7-Zip 23.01 (x64)", "display_version": "23.01"},
    {"kind": "winget", "name": "Microsoft 365 Apps for enterprise", "id": "Microsoft.Office", "version": "16.0"}
]"#;

const SNAPSHOT: &str = r#"{
    "startup_items": [
        {"name": "Spotify", "command": "C:\\Users\\me\\AppData\\Roaming\\Spotify\\Spotify.exe"},
        {"name": "RealtekAudio", "command": "C:\\Program Files\\Realtek\\Audio\\rtk.exe"}
    ],
    "volumes": [
        {"mount_point": "C:\\", "total_bytes": 1000, "available_bytes": 100, "is_system": true, "is_ssd": true}
    ],
    "dir_sizes": {}
}"#;

#[test]
fn apps_json_reconciles_offline_inventory() {
    let home = make_temp_home();
    let catalog = write(&home, "catalog.json", CATALOG);
    let inventory = write(&home, "inventory.json", INVENTORY);

    let out = run(
        &home,
        &[
            "--json",
            "apps",
            "--include-installed",
            "--inventory",
            &inventory,
            "--catalog",
            &catalog,
        ],
    );
    assert_eq!(out.status.code(), Some(0), "stderr: {}", String::from_utf8_lossy(&out.stderr));

    let v: Value = serde_json::from_slice(&out.stdout).expect("json");
    assert_eq!(v["total_apps"], 3);
    assert_eq!(v["installed"][0]["name"], "7-Zip");
    assert_eq!(v["installed"][0]["status"]["version"], "23.01");
    assert_eq!(v["skipped"][0]["name"], "LibreOffice");
    assert_eq!(v["missing"][0]["name"], "VLC");
    assert_eq!(v["missing"][0]["priority"], "Low");

    let summary = &v["summary"];
    assert_eq!(summary["installed_count"], 1);
    assert_eq!(summary["missing_count"], 1);
    assert_eq!(summary["skipped_count"], 1);
    assert_eq!(summary["completion_percentage"], 33.33);

    assert!(
        home.join("data").join("sessions").is_dir(),
        "audit result should be saved under the data dir"
    );
    let _ = std::fs::remove_dir_all(&home);
}

#[test]
fn optimize_json_scores_snapshot() {
    let home = make_temp_home();
    let snapshot = write(&home, "snapshot.json", SNAPSHOT);

    let out = run(&home, &["--json", "optimize", "--snapshot", &snapshot]);
    assert_eq!(out.status.code(), Some(0), "stderr: {}", String::from_utf8_lossy(&out.stderr));

    let v: Value = serde_json::from_slice(&out.stdout).expect("json");
    let mut types: Vec<&str> = v["opportunities"]
        .as_array()
        .expect("opportunities")
        .iter()
        .map(|o| o["type"].as_str().expect("type"))
        .collect();
    types.sort_unstable();
    assert_eq!(types, vec!["low_disk_space", "startup_program"]);

    assert_eq!(v["score"]["overall"], 77);
    assert_eq!(v["score"]["deductions"], 23);
    assert_eq!(v["score"]["category"], "Good");
    assert_eq!(v["scans"].as_array().expect("scans").len(), 5);
    assert!(!v["recommendations"].as_array().expect("recommendations").is_empty());
    let _ = std::fs::remove_dir_all(&home);
}

#[test]
fn report_writes_all_three_formats() {
    let home = make_temp_home();
    let catalog = write(&home, "catalog.json", CATALOG);
    let inventory = write(&home, "inventory.json", INVENTORY);
    let snapshot = write(&home, "snapshot.json", SNAPSHOT);
    let base = home.join("reports").join("audit");

    let out = run(
        &home,
        &[
            "report",
            "--out",
            base.to_str().expect("utf-8 path"),
            "--inventory",
            &inventory,
            "--catalog",
            &catalog,
            "--snapshot",
            &snapshot,
        ],
    );
    assert_eq!(out.status.code(), Some(0), "stderr: {}", String::from_utf8_lossy(&out.stderr));

    let html = std::fs::read_to_string(base.with_extension("html")).expect("html report");
    assert!(html.contains("7-Zip"));
    assert!(html.contains("Spotify"));
    let text = std::fs::read_to_string(base.with_extension("txt")).expect("text report");
    assert!(text.contains("LibreOffice"));

    let json: Value = serde_json::from_str(
        &std::fs::read_to_string(base.with_extension("json")).expect("json report"),
    )
    .expect("json");
    assert_eq!(json["audit"]["summary"]["installed_count"], 1);
    assert_eq!(json["optimization"]["score"]["overall"], 77);
    let _ = std::fs::remove_dir_all(&home);
}

#[test]
fn report_honors_disabled_formats() {
    let home = make_temp_home();
    let snapshot = write(&home, "snapshot.json", SNAPSHOT);
    let base = home.join("only-json");

    let out = winaudit_cmd(&home)
        .env("WINAUDIT_REPORT_HTML", "false")
        .env("WINAUDIT_REPORT_TEXT", "false")
        .args([
            "--json",
            "report",
            "--skip-apps",
            "--out",
            base.to_str().expect("utf-8 path"),
            "--snapshot",
            &snapshot,
        ])
        .output()
        .expect("run winaudit");
    assert_eq!(out.status.code(), Some(0), "stderr: {}", String::from_utf8_lossy(&out.stderr));

    let v: Value = serde_json::from_slice(&out.stdout).expect("json");
    assert_eq!(v["written"].as_array().expect("written").len(), 1);
    assert!(base.with_extension("json").exists());
    assert!(!base.with_extension("html").exists());
    assert!(!base.with_extension("txt").exists());
    let _ = std::fs::remove_dir_all(&home);
}
