//! Host process coordination
//!
//! The host editor rewrites storage.json when it exits, so a running
//! instance can silently revert a committed reset. Stopping it first is
//! the only mitigation; the files are owned by the host and cannot be
//! locked from here. A process that refuses to die is a warning, not an
//! abort - the caller decides whether to proceed.

use tracing::{info, warn};

use crate::constants::host;

/// Case-insensitive exact match against the known executable names.
/// Exact equality, not substring: a substring match would catch this
/// tool's own process.
fn is_host_process(name: &str) -> bool {
    let name = name.to_ascii_lowercase();
    host::PROCESS_NAMES.iter().any(|candidate| name == *candidate)
}

/// Terminate every running host process. Returns whether any was found.
#[cfg(target_os = "linux")]
pub fn stop_host_processes() -> bool {
    use std::thread;
    use std::time::Duration;

    use nix::sys::signal::{Signal, kill};
    use nix::unistd::Pid;

    let pids = find_host_pids();
    if pids.is_empty() {
        info!("no running host processes found");
        return false;
    }
    for &pid in &pids {
        info!(pid, "terminating host process");
        if let Err(err) = kill(Pid::from_raw(pid), Signal::SIGTERM) {
            warn!(pid, error = %err, "SIGTERM failed");
        }
    }

    // Grace period, then escalate.
    thread::sleep(Duration::from_millis(500));
    for pid in find_host_pids() {
        warn!(pid, "process survived SIGTERM, sending SIGKILL");
        if let Err(err) = kill(Pid::from_raw(pid), Signal::SIGKILL) {
            warn!(pid, error = %err, "SIGKILL failed");
        }
    }

    let survivors = find_host_pids();
    if !survivors.is_empty() {
        warn!(?survivors, "could not stop every host process; proceeding is at the caller's discretion");
    }
    true
}

#[cfg(target_os = "linux")]
fn find_host_pids() -> Vec<i32> {
    use std::fs;

    let mut pids = Vec::new();
    let Ok(entries) = fs::read_dir("/proc") else {
        return pids;
    };
    for entry in entries.flatten() {
        let name = entry.file_name();
        let Ok(pid) = name.to_string_lossy().parse::<i32>() else {
            continue;
        };
        // comm holds the bare executable name, no arguments.
        let comm = fs::read_to_string(format!("/proc/{pid}/comm")).unwrap_or_default();
        if is_host_process(comm.trim()) {
            pids.push(pid);
        }
    }
    pids
}

/// macOS has no /proc; pgrep/pkill match by exact process name.
#[cfg(target_os = "macos")]
pub fn stop_host_processes() -> bool {
    use std::process::Command;

    let found = Command::new("pgrep")
        .args(["-xi", host::APP_DIR])
        .output()
        .map(|output| output.status.success())
        .unwrap_or(false);
    if !found {
        info!("no running host processes found");
        return false;
    }
    info!("terminating host processes");
    match Command::new("pkill").args(["-xi", host::APP_DIR]).status() {
        Ok(status) if status.success() => {}
        Ok(status) => warn!(%status, "pkill did not stop every host process"),
        Err(err) => warn!(error = %err, "failed to run pkill"),
    }
    true
}

#[cfg(windows)]
pub fn stop_host_processes() -> bool {
    use std::process::Command;

    let found = Command::new("tasklist")
        .args(["/FI", "IMAGENAME eq Cursor.exe", "/NH"])
        .output()
        .map(|output| {
            String::from_utf8_lossy(&output.stdout)
                .to_ascii_lowercase()
                .contains("cursor.exe")
        })
        .unwrap_or(false);
    if !found {
        info!("no running host processes found");
        return false;
    }
    info!("terminating host processes");
    match Command::new("taskkill")
        .args(["/F", "/T", "/IM", "Cursor.exe"])
        .status()
    {
        Ok(status) if status.success() => {}
        Ok(status) => warn!(%status, "taskkill did not stop every host process"),
        Err(err) => warn!(error = %err, "failed to run taskkill"),
    }
    true
}

#[cfg(not(any(target_os = "linux", target_os = "macos", windows)))]
pub fn stop_host_processes() -> bool {
    warn!("process coordination is not supported on this platform");
    false
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_host_process_names_match_case_insensitively() {
        assert!(is_host_process("cursor"));
        assert!(is_host_process("Cursor"));
        assert!(is_host_process("CURSOR.EXE"));
    }

    #[test]
    fn test_unrelated_names_do_not_match() {
        // Substrings must not match, or this tool would kill itself.
        assert!(!is_host_process("cursor-reset"));
        assert!(!is_host_process("precursor"));
        assert!(!is_host_process("code"));
        assert!(!is_host_process(""));
    }
}
