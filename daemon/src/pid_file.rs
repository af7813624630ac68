use std::fs;
use std::io;
use std::path::Path;

/// Write `pid` to `path`, creating parent directories as needed. Overwrites
/// any existing file: only one daemon instance is ever expected to hold the
/// socket at a time, enforced by the bind itself rather than the PID file.
pub fn write(path: &Path, pid: u32) -> io::Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    fs::write(path, pid.to_string())
}

pub fn read(path: &Path) -> io::Result<Option<u32>> {
    match fs::read_to_string(path) {
        Ok(contents) => Ok(contents.trim().parse().ok()),
        Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(None),
        Err(err) => Err(err),
    }
}

pub fn remove(path: &Path) -> io::Result<()> {
    match fs::remove_file(path) {
        Ok(()) => Ok(()),
        Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(()),
        Err(err) => Err(err),
    }
}

/// Whether a process with `pid` currently exists, checked with a
/// zero-signal `kill(2)` (sends no signal, just probes).
#[cfg(unix)]
pub fn is_alive(pid: u32) -> bool {
    // SAFETY: kill with signal 0 sends no signal; it only probes whether the
    // process exists and is visible to this user.
    unsafe { libc::kill(pid as libc::pid_t, 0) == 0 }
}

#[cfg(not(unix))]
pub fn is_alive(_pid: u32) -> bool {
    false
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn write_then_read_round_trips() {
        let dir = TempDir::new().expect("temp dir");
        let path = dir.path().join("daemon.pid");
        write(&path, 4242).expect("write pid");
        assert_eq!(read(&path).expect("read pid"), Some(4242));
    }

    #[test]
    fn read_missing_file_returns_none() {
        let dir = TempDir::new().expect("temp dir");
        let path = dir.path().join("missing.pid");
        assert_eq!(read(&path).expect("read pid"), None);
    }

    #[test]
    fn current_process_is_alive() {
        assert!(is_alive(std::process::id()));
    }

    #[test]
    fn pid_one_million_is_almost_certainly_dead() {
        assert!(!is_alive(1_000_000));
    }
}
