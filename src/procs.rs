//! Process enumeration from the /proc filesystem.
//!
//! This is the only OS-specific module: it turns /proc entries into
//! [`ProcessObservation`] values and hides cmdline/stat/io parsing from the
//! core. Processes that vanish mid-scan, kernel threads (empty cmdline) and
//! entries we lack permission for are silently omitted.

use std::fs;
use std::path::Path;

use once_cell::sync::Lazy;
use tracing::debug;

use crate::snapshot::ProcessObservation;

/// Get system clock ticks per second (usually 100, but can vary).
fn get_clk_tck() -> f64 {
    #[cfg(unix)]
    {
        // SAFETY: sysconf is safe to call with _SC_CLK_TCK
        // Returns -1 on error, 0 if undefined - both are handled by the > 0 check
        unsafe {
            let tck = libc::sysconf(libc::_SC_CLK_TCK);
            if tck > 0 {
                return tck as f64;
            }
        }
    }
    // Fallback to common default for error cases or non-Unix platforms
    100.0
}

/// System clock ticks per second (for CPU time calculation).
pub static CLK_TCK: Lazy<f64> = Lazy::new(get_clk_tck);

/// Monotonic nanosecond timestamp (unaffected by wall-clock adjustments).
pub fn monotonic_clock_ns() -> u64 {
    let mut ts = libc::timespec {
        tv_sec: 0,
        tv_nsec: 0,
    };
    // SAFETY: clock_gettime with CLOCK_MONOTONIC and a valid timespec
    // pointer cannot fail on Linux.
    unsafe {
        libc::clock_gettime(libc::CLOCK_MONOTONIC, &mut ts);
    }
    (ts.tv_sec as u64) * 1_000_000_000 + ts.tv_nsec as u64
}

/// Enumerates all live processes visible under /proc.
pub fn enumerate() -> Vec<ProcessObservation> {
    enumerate_root(Path::new("/proc"))
}

/// Enumeration against an arbitrary proc root, so tests can use a fixture
/// directory.
pub fn enumerate_root(root: &Path) -> Vec<ProcessObservation> {
    let mut out = Vec::new();
    let entries = match fs::read_dir(root) {
        Ok(entries) => entries,
        Err(e) => {
            debug!("Failed to read {}: {}", root.display(), e);
            return out;
        }
    };
    for entry in entries.flatten() {
        let p = entry.path();
        let name = match p.file_name().and_then(|s| s.to_str()) {
            Some(v) => v,
            None => continue,
        };
        if !name.chars().all(|c| c.is_ascii_digit()) {
            continue;
        }
        let pid: i32 = match name.parse() {
            Ok(v) => v,
            Err(_) => continue,
        };
        if let Some(obs) = read_observation(pid, &p) {
            out.push(obs);
        }
    }
    out
}

/// Reads one process's argv and counters. `None` means "skip this process":
/// it exited mid-scan, is a kernel thread, or its files are unreadable.
fn read_observation(pid: i32, proc_path: &Path) -> Option<ProcessObservation> {
    let argv = read_cmdline(proc_path)?;
    let (utime, stime) = read_stat_ticks(proc_path)?;
    let (disk_read_bytes, disk_write_bytes) = read_io_bytes(pid, proc_path);

    Some(ProcessObservation {
        pid,
        argv,
        // A freshly exec'd process can legitimately report 0 user ticks;
        // relative-time math treats that as "at least 1".
        cpu_ticks: utime.max(1),
        kernel_ticks: stime,
        disk_read_bytes,
        disk_write_bytes,
    })
}

/// Reads /proc/<pid>/cmdline and splits it at NUL separators.
fn read_cmdline(proc_path: &Path) -> Option<Vec<String>> {
    let content = fs::read(proc_path.join("cmdline")).ok()?;
    let argv: Vec<String> = content
        .split(|&b| b == 0u8)
        .filter(|s| !s.is_empty())
        .map(|s| String::from_utf8_lossy(s).into_owned())
        .collect();
    if argv.is_empty() {
        return None;
    }
    Some(argv)
}

/// Parses utime and stime (clock ticks) from /proc/<pid>/stat.
///
/// Fields are located after the last ')' so a comm containing spaces or
/// parentheses cannot shift them.
fn read_stat_ticks(proc_path: &Path) -> Option<(u64, u64)> {
    let content = fs::read_to_string(proc_path.join("stat")).ok()?;
    let after_comm = &content[content.rfind(')')? + 1..];
    let parts: Vec<&str> = after_comm.split_whitespace().collect();
    // parts[0] is the state field (field 3); utime and stime are fields 14
    // and 15 of the full line.
    if parts.len() <= 12 {
        return None;
    }
    let utime: u64 = parts[11].parse().ok()?;
    let stime: u64 = parts[12].parse().ok()?;
    Some((utime, stime))
}

/// Reads cumulative read_bytes/write_bytes from /proc/<pid>/io.
///
/// The io file needs more privilege than stat/cmdline; when it is not
/// readable the process still counts for CPU accounting, with disk counters
/// pinned at zero.
fn read_io_bytes(pid: i32, proc_path: &Path) -> (u64, u64) {
    let content = match fs::read_to_string(proc_path.join("io")) {
        Ok(content) => content,
        Err(e) => {
            debug!("Failed to read io counters for pid {}: {}", pid, e);
            return (0, 0);
        }
    };
    let mut read_bytes = 0u64;
    let mut write_bytes = 0u64;
    for line in content.lines() {
        if let Some(v) = line.strip_prefix("read_bytes:") {
            read_bytes = v.trim().parse().unwrap_or(0);
        } else if let Some(v) = line.strip_prefix("write_bytes:") {
            write_bytes = v.trim().parse().unwrap_or(0);
        }
    }
    (read_bytes, write_bytes)
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Lays out a fake /proc/<pid> directory.
    fn write_proc_entry(
        root: &Path,
        pid: i32,
        argv: &[&str],
        comm: &str,
        utime: u64,
        stime: u64,
        io: Option<(u64, u64)>,
    ) {
        let dir = root.join(pid.to_string());
        fs::create_dir_all(&dir).expect("Failed to create proc dir");

        let mut cmdline = Vec::new();
        for arg in argv {
            cmdline.extend_from_slice(arg.as_bytes());
            cmdline.push(0);
        }
        fs::write(dir.join("cmdline"), cmdline).expect("Failed to write cmdline");

        let stat = format!(
            "{pid} ({comm}) S 1 {pid} {pid} 0 -1 4194304 100 0 0 0 {utime} {stime} 0 0 20 0 1 0 12345 12345678 1234 18446744073709551615 0 0 0 0 0 0 0 0 0 0 0 0 17 1 0 0 0 0 0"
        );
        fs::write(dir.join("stat"), stat).expect("Failed to write stat");

        if let Some((read, write)) = io {
            let io_text = format!(
                "rchar: 999\nwchar: 999\nsyscr: 1\nsyscw: 1\nread_bytes: {read}\nwrite_bytes: {write}\ncancelled_write_bytes: 0\n"
            );
            fs::write(dir.join("io"), io_text).expect("Failed to write io");
        }
    }

    #[test]
    fn test_enumerate_reads_counters() {
        let dir = tempfile::tempdir().expect("Failed to create temp dir");
        write_proc_entry(
            dir.path(),
            412,
            &["/usr/sbin/smbd", "-D"],
            "smbd",
            1000,
            500,
            Some((4096, 8192)),
        );

        let procs = enumerate_root(dir.path());
        assert_eq!(procs.len(), 1);
        let obs = &procs[0];
        assert_eq!(obs.pid, 412);
        assert_eq!(obs.argv, vec!["/usr/sbin/smbd", "-D"]);
        assert_eq!(obs.cpu_ticks, 1000);
        assert_eq!(obs.kernel_ticks, 500);
        assert_eq!(obs.disk_read_bytes, 4096);
        assert_eq!(obs.disk_write_bytes, 8192);
    }

    #[test]
    fn test_zero_utime_clamped_to_one() {
        let dir = tempfile::tempdir().expect("Failed to create temp dir");
        write_proc_entry(dir.path(), 5, &["/bin/fresh"], "fresh", 0, 0, Some((0, 0)));

        let procs = enumerate_root(dir.path());
        assert_eq!(procs[0].cpu_ticks, 1);
        assert_eq!(procs[0].kernel_ticks, 0);
    }

    #[test]
    fn test_empty_cmdline_skipped() {
        let dir = tempfile::tempdir().expect("Failed to create temp dir");
        // Kernel threads expose an empty cmdline.
        write_proc_entry(dir.path(), 2, &[], "kthreadd", 10, 10, None);

        assert!(enumerate_root(dir.path()).is_empty());
    }

    #[test]
    fn test_missing_io_defaults_to_zero() {
        let dir = tempfile::tempdir().expect("Failed to create temp dir");
        write_proc_entry(dir.path(), 7, &["/bin/app"], "app", 3, 4, None);

        let procs = enumerate_root(dir.path());
        assert_eq!(procs.len(), 1);
        assert_eq!(procs[0].disk_read_bytes, 0);
        assert_eq!(procs[0].disk_write_bytes, 0);
    }

    #[test]
    fn test_comm_with_spaces_and_parens() {
        let dir = tempfile::tempdir().expect("Failed to create temp dir");
        write_proc_entry(
            dir.path(),
            9,
            &["/usr/bin/weird"],
            "weird (name) here",
            77,
            33,
            Some((1, 2)),
        );

        let procs = enumerate_root(dir.path());
        assert_eq!(procs[0].cpu_ticks, 77);
        assert_eq!(procs[0].kernel_ticks, 33);
    }

    #[test]
    fn test_non_numeric_entries_ignored() {
        let dir = tempfile::tempdir().expect("Failed to create temp dir");
        fs::create_dir_all(dir.path().join("sys")).unwrap();
        fs::write(dir.path().join("uptime"), "1 2").unwrap();
        write_proc_entry(dir.path(), 11, &["/bin/app"], "app", 1, 1, None);

        assert_eq!(enumerate_root(dir.path()).len(), 1);
    }

    #[test]
    fn test_truncated_stat_skips_process() {
        let dir = tempfile::tempdir().expect("Failed to create temp dir");
        let proc_dir = dir.path().join("13");
        fs::create_dir_all(&proc_dir).unwrap();
        fs::write(proc_dir.join("cmdline"), b"/bin/app\0").unwrap();
        fs::write(proc_dir.join("stat"), "13 (app) S 1 2").unwrap();

        assert!(enumerate_root(dir.path()).is_empty());
    }

    #[test]
    fn test_monotonic_clock_ascends() {
        let a = monotonic_clock_ns();
        let b = monotonic_clock_ns();
        assert!(b >= a);
        assert!(a > 0);
    }

    #[test]
    fn test_clk_tck_is_positive() {
        assert!(*CLK_TCK > 0.0);
    }
}
