//! Watch configuration: which processes to monitor and with which thresholds.
//!
//! The configuration file is a sectioned key=value format. The unnamed
//! section (`[]`, or keys before any header) holds global settings; every
//! named section defines one watch rule:
//!
//! ```text
//! HISTORY = /var/lib/idlewatch/history.json
//! MAX_INTERVAL = 120
//!
//! [smbd]
//! CPU = 5.0          # percent over the sampling interval
//! READ = 4096        # bytes/sec
//! WRITE = 4096
//! ```
//!
//! Loading is fail-fast: the first unknown key, bad number or duplicate
//! section aborts with a line-numbered error and no partial configuration
//! escapes.

use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};

use tracing::warn;

use crate::paths;

/// Default location of the persisted snapshot record.
pub const DEFAULT_HISTORY_FILE: &str = "/var/lib/idlewatch/history.json";
/// Default maximum trustworthy age of the previous snapshot, in seconds.
pub const DEFAULT_MAX_INTERVAL_SECS: u64 = 120;

/// Errors produced while loading a configuration file.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("cannot open configuration file '{path}': {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("({line}): invalid configuration line: {text}")]
    Syntax { line: usize, text: String },

    #[error("({line}): section name '{name}' already used before")]
    DuplicateSection { line: usize, name: String },

    #[error("({line}): invalid configuration key '{key}'")]
    UnknownKey { line: usize, key: String },

    #[error("({line}): value for key '{key}' should be a numeric value")]
    InvalidValue { line: usize, key: String },
}

/// One monitored process definition.
///
/// Byte/sec thresholds of 0 mean "not checked". `name` is matched against
/// `argv[argv_index]`, first verbatim and then by path basename.
#[derive(Debug, Clone, PartialEq)]
pub struct WatchRule {
    pub name: String,
    pub argv_index: usize,
    pub cpu_threshold_pct: f64,
    pub disk_total_threshold: u64,
    pub disk_read_threshold: u64,
    pub disk_write_threshold: u64,
}

impl WatchRule {
    fn new(name: String) -> Self {
        Self {
            name,
            argv_index: 0,
            cpu_threshold_pct: 0.0,
            disk_total_threshold: 0,
            disk_read_threshold: 0,
            disk_write_threshold: 0,
        }
    }
}

/// Fully validated watch configuration, read-only for the lifetime of a run.
#[derive(Debug, Clone)]
pub struct WatchConfig {
    pub rules: Vec<WatchRule>,
    pub history_file: PathBuf,
    pub max_interval_secs: u64,
}

impl Default for WatchConfig {
    fn default() -> Self {
        Self {
            rules: Vec::new(),
            history_file: PathBuf::from(DEFAULT_HISTORY_FILE),
            max_interval_secs: DEFAULT_MAX_INTERVAL_SECS,
        }
    }
}

impl WatchConfig {
    /// Loads and validates a configuration file.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::parse(&content)
    }

    /// Parses configuration text. Split out from [`WatchConfig::load`] so
    /// tests can feed literal strings.
    pub fn parse(content: &str) -> Result<Self, ConfigError> {
        let sections = parse_sections(content)?;
        let mut config = WatchConfig::default();

        for section in &sections {
            if section.name.is_empty() {
                for kv in &section.entries {
                    match kv.key.to_uppercase().as_str() {
                        "HISTORY" => {
                            config.history_file = paths::absolutize(Path::new(&kv.value));
                        }
                        "MAX_INTERVAL" => {
                            config.max_interval_secs = parse_number(kv)?;
                        }
                        _ => {
                            return Err(ConfigError::UnknownKey {
                                line: kv.line,
                                key: kv.key.clone(),
                            })
                        }
                    }
                }
            } else {
                let mut rule = WatchRule::new(section.name.clone());
                for kv in &section.entries {
                    match kv.key.to_uppercase().as_str() {
                        "CPU" => rule.cpu_threshold_pct = parse_number(kv)?,
                        "DISK" => rule.disk_total_threshold = parse_number(kv)?,
                        "READ" => rule.disk_read_threshold = parse_number(kv)?,
                        "WRITE" => rule.disk_write_threshold = parse_number(kv)?,
                        "ARGV" => rule.argv_index = parse_number(kv)?,
                        _ => {
                            return Err(ConfigError::UnknownKey {
                                line: kv.line,
                                key: kv.key.clone(),
                            })
                        }
                    }
                }
                config.rules.push(rule);
            }
        }

        Ok(config)
    }
}

impl fmt::Display for WatchConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "History: {}", self.history_file.display())?;
        writeln!(f, "Max interval: {} s", self.max_interval_secs)?;
        for (i, rule) in self.rules.iter().enumerate() {
            writeln!(f, "Entry: {}", i + 1)?;
            writeln!(f, "\tName: {}", rule.name)?;
            writeln!(f, "\tArgv: {}", rule.argv_index)?;
            writeln!(f, "\tCPU: {}", rule.cpu_threshold_pct)?;
            writeln!(f, "\tDisk Total: {}", rule.disk_total_threshold)?;
            writeln!(f, "\tDisk Read: {}", rule.disk_read_threshold)?;
            writeln!(f, "\tDisk Write: {}", rule.disk_write_threshold)?;
        }
        Ok(())
    }
}

fn parse_number<T: std::str::FromStr>(kv: &KeyVal) -> Result<T, ConfigError> {
    kv.value
        .trim()
        .parse()
        .map_err(|_| ConfigError::InvalidValue {
            line: kv.line,
            key: kv.key.clone(),
        })
}

/// One `key=value` pair with its source line for error reporting.
#[derive(Debug, Clone)]
struct KeyVal {
    line: usize,
    key: String,
    value: String,
}

#[derive(Debug)]
struct Section {
    name: String,
    entries: Vec<KeyVal>,
}

/// Line-oriented tokenizer for the sectioned key=value format.
///
/// Sections keep file order so rule indices match declaration order.
fn parse_sections(content: &str) -> Result<Vec<Section>, ConfigError> {
    let mut sections: Vec<Section> = vec![Section {
        name: String::new(),
        entries: Vec::new(),
    }];
    let mut in_global = true;

    for (idx, raw_line) in content.lines().enumerate() {
        let line_no = idx + 1;
        let line = raw_line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }

        if let Some(inner) = line
            .strip_prefix('[')
            .and_then(|rest| rest.strip_suffix(']'))
        {
            let name = inner.trim().to_string();
            if name.is_empty() {
                // "[]" reopens the global section.
                in_global = true;
                continue;
            }
            if sections.iter().any(|s| s.name == name) {
                return Err(ConfigError::DuplicateSection {
                    line: line_no,
                    name,
                });
            }
            sections.push(Section {
                name,
                entries: Vec::new(),
            });
            in_global = false;
        } else if let Some((key, value)) = line.split_once('=') {
            let kv = KeyVal {
                line: line_no,
                key: key.trim().to_string(),
                value: parse_value(value, line_no),
            };
            if in_global {
                sections[0].entries.push(kv);
            } else {
                sections.last_mut().unwrap().entries.push(kv);
            }
        } else {
            return Err(ConfigError::Syntax {
                line: line_no,
                text: line.to_string(),
            });
        }
    }

    Ok(sections)
}

/// Decodes the value side of a `key=value` line.
///
/// Values are either quoted strings (single or double, with backslash
/// escapes) or bare tokens truncated at a `#` comment. Quoting problems are
/// tolerated with a warning instead of failing the load.
fn parse_value(raw: &str, line: usize) -> String {
    let val = raw.trim_start();

    let mut chars = val.chars();
    let quote = match chars.next() {
        Some(c @ ('"' | '\'')) => c,
        _ => {
            // Bare token: cut at comment, strip trailing whitespace.
            let end = val.find('#').unwrap_or(val.len());
            return val[..end].trim_end().to_string();
        }
    };

    let mut result = String::new();
    let mut closed = false;
    while let Some(c) = chars.next() {
        if c == quote {
            closed = true;
            break;
        }
        if c == '\\' {
            match chars.next() {
                Some(escaped) => result.push(escaped),
                None => {
                    warn!("({}) invalid escape '\\' at end of line, ignored", line);
                    return result;
                }
            }
            continue;
        }
        result.push(c);
    }

    if !closed {
        warn!(
            "({}) missing closing string delimiter '{}', accepting value as is",
            line, quote
        );
        return result.trim_end().to_string();
    }

    let tail = chars.as_str().trim();
    if !tail.is_empty() && !tail.starts_with('#') {
        warn!("({}) tail text '{}' was ignored", line, tail);
    }
    result
}
