use sha2::Digest;
use sha2::Sha256;
use std::path::Path;
use std::path::PathBuf;

/// Directory that holds per-project socket and PID files: `$XDG_RUNTIME_DIR`
/// when available (cleared on logout/reboot, which is what we want for a
/// socket), falling back to `~/.slb/run` otherwise.
fn runtime_root() -> PathBuf {
    if let Some(dir) = dirs::runtime_dir() {
        return dir.join("slb");
    }
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".slb")
        .join("run")
}

/// Short, filesystem-safe identifier for `project_dir`, stable across runs
/// of the same project and distinct across different projects even if they
/// share a basename.
fn project_slug(project_dir: &Path) -> String {
    let mut hasher = Sha256::new();
    hasher.update(project_dir.to_string_lossy().as_bytes());
    let digest = hasher.finalize();
    hex::encode(&digest[..8])
}

pub fn socket_path(project_dir: &Path) -> PathBuf {
    runtime_root().join(format!("{}.sock", project_slug(project_dir)))
}

pub fn pid_path(project_dir: &Path) -> PathBuf {
    runtime_root().join(format!("{}.pid", project_slug(project_dir)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn same_project_path_yields_same_slug() {
        let path = Path::new("/home/user/project");
        assert_eq!(project_slug(path), project_slug(path));
    }

    #[test]
    fn different_project_paths_yield_different_slugs() {
        assert_ne!(
            project_slug(Path::new("/home/user/project-a")),
            project_slug(Path::new("/home/user/project-b"))
        );
    }
}
