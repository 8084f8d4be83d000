use std::io::Read;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};
use std::thread::JoinHandle;
use std::time::Duration;

use anyhow::{Context, Result, anyhow};
use wait_timeout::ChildExt;

use crate::core::OsInfo;

pub mod windows;

#[derive(Debug, Clone)]
pub struct CommandOutput {
    pub exit_code: i32,
    pub stdout: String,
    pub stderr: String,
}

impl CommandOutput {
    pub fn success(&self) -> bool {
        self.exit_code == 0
    }
}

/// Runs `cmd` with piped output and kills it once `timeout` elapses.
///
/// Both pipes are drained on reader threads while the child runs, so a
/// process that writes more than the pipe buffer still exits normally.
pub fn run_command(cmd: &str, args: &[&str], timeout: Duration) -> Result<CommandOutput> {
    let mut child = Command::new(cmd)
        .args(args)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()
        .with_context(|| format!("failed to start process: {cmd}"))?;

    let stdout_reader = child.stdout.take().map(drain);
    let stderr_reader = child.stderr.take().map(drain);

    let waited = child
        .wait_timeout(timeout)
        .with_context(|| format!("failed to wait for process: {cmd}"));
    let status = match waited {
        Ok(Some(status)) => status,
        Ok(None) => {
            let _ = child.kill();
            let _ = child.wait();
            // Readers are detached: a grandchild may still hold the pipes.
            return Err(anyhow!("timed out after {timeout:?}: {cmd}"));
        }
        Err(err) => {
            let _ = child.kill();
            let _ = child.wait();
            return Err(err);
        }
    };

    Ok(CommandOutput {
        exit_code: status.code().unwrap_or(-1),
        stdout: join_reader(stdout_reader),
        stderr: join_reader(stderr_reader),
    })
}

fn drain<R: Read + Send + 'static>(mut pipe: R) -> JoinHandle<Vec<u8>> {
    std::thread::spawn(move || {
        let mut buf = Vec::new();
        let _ = pipe.read_to_end(&mut buf);
        buf
    })
}

/// Output is decoded lossily; `reg` and PowerShell may emit the console code
/// page rather than UTF-8.
fn join_reader(reader: Option<JoinHandle<Vec<u8>>>) -> String {
    reader
        .and_then(|handle| handle.join().ok())
        .map(|buf| String::from_utf8_lossy(&buf).into_owned())
        .unwrap_or_default()
}

/// Like [`run_command`] but a non-zero exit status is an error.
pub fn run_command_checked(cmd: &str, args: &[&str], timeout: Duration) -> Result<CommandOutput> {
    let output = run_command(cmd, args, timeout)?;
    if !output.success() {
        let stderr = output.stderr.trim();
        if stderr.is_empty() {
            return Err(anyhow!("{cmd} exited with code {}", output.exit_code));
        }
        return Err(anyhow!(
            "{cmd} exited with code {}: {stderr}",
            output.exit_code
        ));
    }
    Ok(output)
}

pub fn effective_home_dir() -> Result<PathBuf> {
    for var in ["HOME", "USERPROFILE"] {
        if let Some(home) = std::env::var_os(var) {
            if !home.is_empty() {
                return Ok(PathBuf::from(home));
            }
        }
    }
    Err(anyhow!("neither HOME nor USERPROFILE is set"))
}

/// Locates an executable on `PATH`, honoring `PATHEXT` on Windows.
pub fn find_in_path(name: &str) -> Option<PathBuf> {
    let path = std::env::var_os("PATH")?;
    let exts = executable_extensions();
    std::env::split_paths(&path).find_map(|dir| find_in_dir(&dir, name, &exts))
}

fn find_in_dir(dir: &Path, name: &str, exts: &[String]) -> Option<PathBuf> {
    let candidate = dir.join(name);
    if candidate.is_file() {
        return Some(candidate);
    }
    exts.iter()
        .map(|ext| dir.join(format!("{name}{ext}")))
        .find(|p| p.is_file())
}

fn executable_extensions() -> Vec<String> {
    if !cfg!(windows) {
        return Vec::new();
    }
    let raw = std::env::var("PATHEXT").unwrap_or_else(|_| ".COM;.EXE;.BAT;.CMD".to_string());
    raw.split(';')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(|s| s.to_ascii_lowercase())
        .collect()
}

pub fn os_info() -> OsInfo {
    OsInfo {
        name: sysinfo::System::name().unwrap_or_else(|| std::env::consts::OS.to_string()),
        version: sysinfo::System::os_version().unwrap_or_else(|| "unknown".to_string()),
    }
}

pub fn is_windows() -> bool {
    cfg!(windows)
}

pub fn unsupported(what: &str) -> anyhow::Error {
    anyhow!("{what} is only available on Windows")
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU64, Ordering};

    #[test]
    fn find_in_dir_finds_plain_file() {
        static SEQ: AtomicU64 = AtomicU64::new(0);
        let seq = SEQ.fetch_add(1, Ordering::Relaxed);
        let dir = std::env::temp_dir().join(format!(
            "winaudit-path-test-{}-{seq}",
            std::process::id()
        ));
        let _ = std::fs::remove_dir_all(&dir);
        std::fs::create_dir_all(&dir).expect("create dir");
        std::fs::write(dir.join("winget"), b"").expect("write");
        std::fs::write(dir.join("choco.exe"), b"").expect("write");

        assert!(find_in_dir(&dir, "winget", &[]).is_some());
        assert!(find_in_dir(&dir, "choco", &[".exe".to_string()]).is_some());
        assert!(find_in_dir(&dir, "scoop", &[".exe".to_string()]).is_none());

        let _ = std::fs::remove_dir_all(&dir);
    }

    #[cfg(unix)]
    #[test]
    fn run_command_drains_output_larger_than_the_pipe_buffer() {
        let started = std::time::Instant::now();
        let out = run_command(
            "sh",
            &["-c", "head -c 300000 /dev/zero | tr '\\0' a; head -c 300000 /dev/zero >&2"],
            Duration::from_secs(20),
        )
        .expect("large output completes");
        assert!(out.success());
        assert_eq!(out.stdout.len(), 300_000);
        assert!(out.stdout.bytes().all(|b| b == b'a'));
        assert_eq!(out.stderr.len(), 300_000);
        assert!(started.elapsed() < Duration::from_secs(20));
    }

    #[cfg(unix)]
    #[test]
    fn run_command_reports_exit_code_and_timeout() {
        let out = run_command("sh", &["-c", "echo oops >&2; exit 3"], Duration::from_secs(10))
            .expect("run");
        assert_eq!(out.exit_code, 3);
        assert_eq!(out.stderr.trim(), "oops");

        let err = run_command("sleep", &["5"], Duration::from_millis(200)).unwrap_err();
        assert!(err.to_string().contains("timed out"), "{err}");
    }
}
