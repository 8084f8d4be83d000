use std::path::{Path, PathBuf};
use std::process::{Command, Output};
use std::sync::atomic::{AtomicU64, Ordering};

use serde_json::Value;

const ENV_KEYS: [&str; 13] = [
    "WINAUDIT_CONFIG",
    "WINAUDIT_GENERAL_MODE",
    "WINAUDIT_GENERAL_DRY_RUN",
    "WINAUDIT_UI_COLOR",
    "WINAUDIT_UI_MAX_TABLE_ROWS",
    "WINAUDIT_AUDIT_INCLUDE_INSTALLED",
    "WINAUDIT_AUDIT_DEFAULT_CATEGORY",
    "WINAUDIT_CATALOG_PATH",
    "WINAUDIT_CACHE_MAX_AGE_MINUTES",
    "WINAUDIT_DATA_DIR",
    "WINAUDIT_REPORT_HTML",
    "WINAUDIT_REPORT_TEXT",
    "WINAUDIT_REPORT_JSON",
];

fn winaudit_cmd(home: &Path) -> Command {
    let mut cmd = Command::new(env!("CARGO_BIN_EXE_winaudit"));
    cmd.env("HOME", home);
    cmd.env("USERPROFILE", home);
    for key in ENV_KEYS {
        cmd.env_remove(key);
    }
    cmd
}

fn show_config(cmd: &mut Command) -> Value {
    let out: Output = cmd
        .args(["--json", "config", "--show"])
        .output()
        .expect("run winaudit");
    assert_eq!(out.status.code(), Some(0), "stderr: {}", String::from_utf8_lossy(&out.stderr));
    serde_json::from_slice(&out.stdout).expect("json")
}

fn make_temp_home() -> PathBuf {
    static HOME_SEQ: AtomicU64 = AtomicU64::new(0);
    let seq = HOME_SEQ.fetch_add(1, Ordering::Relaxed);
    let home =
        std::env::temp_dir().join(format!("winaudit-config-test-{}-{seq}", std::process::id()));
    let _ = std::fs::remove_dir_all(&home);
    std::fs::create_dir_all(&home).expect("create home");
    home
}

fn write_default_config(home: &Path, contents: &str) -> PathBuf {
    let dir = home.join(".config").join("winaudit");
    std::fs::create_dir_all(&dir).expect("create config dir");
    let path = dir.join("config.toml");
    std::fs::write(&path, contents).expect("write config");
    path
}

#[test]
fn defaults_without_config_file() {
    let home = make_temp_home();
    let v = show_config(&mut winaudit_cmd(&home));
    assert_eq!(v["general"]["mode"], "full");
    assert_eq!(v["general"]["dry_run"], false);
    assert_eq!(v["cache"]["max_age_minutes"], 15);
    assert_eq!(v["report"]["html"], true);
    assert!(v.get("config_path").is_none_or(Value::is_null));
    let data_dir = v["paths"]["data_dir"].as_str().expect("data_dir");
    assert!(data_dir.ends_with("winaudit"), "data_dir: {data_dir}");
    let _ = std::fs::remove_dir_all(&home);
}

#[test]
fn env_overrides_config_file() {
    let home = make_temp_home();
    let path = write_default_config(
        &home,
        r#"
[general]
mode = "apps"

[ui]
max_table_rows = 10

[audit]
default_category = "browsers"

[cache]
max_age_minutes = 60
"#,
    );

    let v = show_config(winaudit_cmd(&home).env("WINAUDIT_UI_MAX_TABLE_ROWS", "5"));
    assert_eq!(v["general"]["mode"], "apps");
    assert_eq!(v["ui"]["max_table_rows"], 5);
    assert_eq!(v["audit"]["default_category"], "Browsers");
    assert_eq!(v["cache"]["max_age_minutes"], 60);
    assert_eq!(v["config_path"], path.display().to_string());
    let _ = std::fs::remove_dir_all(&home);
}

#[test]
fn explicit_config_wins_over_default_location() {
    let home = make_temp_home();
    write_default_config(&home, "[general]\nmode = \"apps\"\n");
    let explicit = home.join("other.toml");
    std::fs::write(&explicit, "[general]\nmode = \"optimize\"\n").expect("write config");

    let v = show_config(winaudit_cmd(&home).env("WINAUDIT_CONFIG", &explicit));
    assert_eq!(v["general"]["mode"], "optimize");
    let _ = std::fs::remove_dir_all(&home);
}

#[test]
fn unknown_keys_are_rejected() {
    let home = make_temp_home();
    write_default_config(&home, "[general]\nverbose = true\n");
    let out = winaudit_cmd(&home)
        .args(["config", "--show"])
        .output()
        .expect("run winaudit");
    assert_eq!(out.status.code(), Some(2));
    let _ = std::fs::remove_dir_all(&home);
}

#[test]
fn invalid_env_value_is_rejected() {
    let home = make_temp_home();
    let out = winaudit_cmd(&home)
        .env("WINAUDIT_GENERAL_MODE", "everything")
        .args(["config", "--show"])
        .output()
        .expect("run winaudit");
    assert_eq!(out.status.code(), Some(2));
    let _ = std::fs::remove_dir_all(&home);
}
