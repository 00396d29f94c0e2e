//! Path expansion helpers for configuration values.
//!
//! Configuration files may point at the history file with `~/...`,
//! `$VAR/...` or plain relative paths. These helpers resolve all of those
//! to absolute paths before any file I/O happens.

use std::env;
use std::path::{Component, Path, PathBuf};

/// Expands `~`, a leading `$VAR` and relative paths into an absolute path.
///
/// The result is canonicalized when the target already exists; otherwise the
/// expanded form is returned as-is (the history file is created on first run).
pub fn absolutize(path: &Path) -> PathBuf {
    let expanded = expand(path);
    match expanded.canonicalize() {
        Ok(real) => real,
        Err(_) => expanded,
    }
}

fn expand(path: &Path) -> PathBuf {
    if path.as_os_str().is_empty() {
        return cwd();
    }

    let mut components = path.components();
    let first = match components.next() {
        Some(Component::Normal(s)) => s.to_string_lossy().into_owned(),
        // Already rooted ("/..."), or "." / ".." which only need the cwd join below.
        Some(Component::RootDir) | Some(Component::Prefix(_)) => {
            return path.to_path_buf();
        }
        _ => return cwd().join(path),
    };

    let rest: PathBuf = components.collect();

    if first == "~" {
        return home_dir().join(rest);
    }
    if let Some(var) = first.strip_prefix('$') {
        if let Ok(value) = env::var(var) {
            return PathBuf::from(value).join(rest);
        }
        // Unset variable: fall through and treat the path as relative.
    }

    cwd().join(path)
}

fn cwd() -> PathBuf {
    env::current_dir().unwrap_or_else(|_| PathBuf::from("/"))
}

fn home_dir() -> PathBuf {
    env::var("HOME").map(PathBuf::from).unwrap_or_else(|_| cwd())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_absolute_path_unchanged() {
        let p = absolutize(Path::new("/var/lib/idlewatch/history.json"));
        assert_eq!(p, PathBuf::from("/var/lib/idlewatch/history.json"));
    }

    #[test]
    fn test_relative_path_joined_to_cwd() {
        let p = absolutize(Path::new("history.json"));
        assert!(p.is_absolute());
        assert!(p.ends_with("history.json"));
    }

    #[test]
    fn test_tilde_expands_to_home() {
        let home = env::var("HOME").expect("HOME not set in test environment");
        let p = absolutize(Path::new("~/state/history.json"));
        assert!(p.starts_with(&home));
        assert!(p.ends_with("state/history.json"));
    }

    #[test]
    fn test_env_var_expansion() {
        env::set_var("IDLEWATCH_TEST_BASE", "/tmp/idlewatch-test-base");
        let p = absolutize(Path::new("$IDLEWATCH_TEST_BASE/history.json"));
        assert_eq!(p, PathBuf::from("/tmp/idlewatch-test-base/history.json"));
    }

    #[test]
    fn test_unset_env_var_falls_back_to_relative() {
        env::remove_var("IDLEWATCH_TEST_UNSET");
        let p = absolutize(Path::new("$IDLEWATCH_TEST_UNSET/history.json"));
        assert!(p.is_absolute());
        assert!(p.ends_with("$IDLEWATCH_TEST_UNSET/history.json"));
    }

    #[test]
    fn test_empty_path_is_cwd() {
        let p = absolutize(Path::new(""));
        assert_eq!(p, env::current_dir().unwrap());
    }

    #[test]
    fn test_existing_path_is_canonicalized() {
        let dir = tempfile::tempdir().expect("Failed to create temp dir");
        let file = dir.path().join("history.json");
        std::fs::write(&file, "{}").expect("Failed to write file");
        let p = absolutize(&file);
        assert_eq!(p, file.canonicalize().unwrap());
    }
}
