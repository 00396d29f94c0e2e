//! CLI arguments for idlewatch.

use clap::{ArgAction, Parser, ValueEnum};
use std::path::PathBuf;
use tracing::Level;

/// Default configuration file location.
pub const DEFAULT_CONFIG_FILE: &str = "/etc/idlewatch/idlewatch.conf";

/// Log level options for CLI parsing
#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum LogLevel {
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

impl From<LogLevel> for Level {
    fn from(level: LogLevel) -> Self {
        match level {
            LogLevel::Error => Level::ERROR,
            LogLevel::Warn => Level::WARN,
            LogLevel::Info => Level::INFO,
            LogLevel::Debug => Level::DEBUG,
            LogLevel::Trace => Level::TRACE,
        }
    }
}

/// Main CLI arguments structure
#[derive(Parser, Debug)]
#[command(
    name = "idlewatch",
    about = "Idle checker for servers that suspend when nothing interesting runs",
    long_about = "Idle checker for servers that suspend when nothing interesting runs.\n\n\
                  Matches running processes against configured watch rules, samples their\n\
                  CPU and disk I/O counters and diffs them against the snapshot persisted\n\
                  by the previous invocation. Exits 0 when every watched service is idle,\n\
                  1 when activity was found or cannot be ruled out, 100 on configuration\n\
                  errors. Intended to be run from cron or a systemd timer, feeding an\n\
                  autosuspend decision.",
    version = "0.1.0"
)]
pub struct Args {
    /// Configuration file
    #[arg(short = 'c', long, default_value = DEFAULT_CONFIG_FILE)]
    pub config: PathBuf,

    /// Append log output to a file as well
    #[arg(short = 'l', long)]
    pub log_file: Option<PathBuf>,

    /// Log level (overrides -v)
    #[arg(short = 'L', long, value_enum)]
    pub log_level: Option<LogLevel>,

    /// Increase verbosity (-v: info, -vv: debug)
    #[arg(short = 'v', long, action = ArgAction::Count)]
    pub verbose: u8,

    /// Print the parsed effective configuration and exit
    #[arg(long)]
    pub show_config: bool,

    /// Validate the configuration and exit (exit code 100 on error)
    #[arg(long)]
    pub check_config: bool,
}

impl Args {
    /// Resolves the effective log level: explicit `--log-level` wins,
    /// otherwise the verbosity count maps to warn/info/debug.
    pub fn effective_level(&self) -> Level {
        if let Some(level) = self.log_level {
            return level.into();
        }
        match self.verbose {
            0 => Level::WARN,
            1 => Level::INFO,
            _ => Level::DEBUG,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let args = Args::parse_from(["idlewatch"]);
        assert_eq!(args.config, PathBuf::from(DEFAULT_CONFIG_FILE));
        assert!(args.log_file.is_none());
        assert_eq!(args.effective_level(), Level::WARN);
    }

    #[test]
    fn test_verbosity_mapping() {
        let args = Args::parse_from(["idlewatch", "-v"]);
        assert_eq!(args.effective_level(), Level::INFO);
        let args = Args::parse_from(["idlewatch", "-vv"]);
        assert_eq!(args.effective_level(), Level::DEBUG);
        let args = Args::parse_from(["idlewatch", "-vvv"]);
        assert_eq!(args.effective_level(), Level::DEBUG);
    }

    #[test]
    fn test_explicit_level_overrides_verbosity() {
        let args = Args::parse_from(["idlewatch", "-v", "-L", "error"]);
        assert_eq!(args.effective_level(), Level::ERROR);
    }

    #[test]
    fn test_config_and_log_file_options() {
        let args = Args::parse_from([
            "idlewatch",
            "-c",
            "/tmp/test.conf",
            "--log-file",
            "/tmp/test.log",
        ]);
        assert_eq!(args.config, PathBuf::from("/tmp/test.conf"));
        assert_eq!(args.log_file, Some(PathBuf::from("/tmp/test.log")));
    }
}
