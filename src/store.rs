//! Persistence of snapshots across invocations.
//!
//! The history record is a single JSON object, schema version 2:
//!
//! ```json
//! {
//!   "__schema_version__": 2,
//!   "__SysClock__": 8273645192837,
//!   "__pid_list__": [412, 977],
//!   "412": { "pid": 412, "CmdLine": ["/usr/sbin/smbd", "-D"],
//!            "CpuTime": 1042, "SysTime": 380,
//!            "DiskReadBytes": 123904, "DiskWriteBytes": 88821 },
//!   "977": { ... }
//! }
//! ```
//!
//! `__pid_list__` duplicates the stringified per-pid keys as an explicit,
//! order-preserving index, since JSON object key order is not guaranteed.
//! A missing file means "first run"; anything malformed (including a torn
//! file from a concurrent writer) is a format error the caller treats the
//! same way.

use std::fs;
use std::io;
use std::path::Path;

use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};

use crate::config::WatchConfig;
use crate::matcher;
use crate::snapshot::{ProcessObservation, Snapshot};

/// Schema version this build reads and writes.
const SCHEMA_VERSION: u64 = 2;

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("cannot read history file: {0}")]
    Io(#[from] io::Error),

    #[error("history record is not valid JSON: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("history record malformed: {0}")]
    Format(String),
}

/// Wire form of one process entry.
#[derive(Debug, Serialize, Deserialize)]
struct PidRecord {
    pid: i32,
    #[serde(rename = "CmdLine")]
    cmd_line: Vec<String>,
    #[serde(rename = "CpuTime")]
    cpu_time: u64,
    #[serde(rename = "SysTime")]
    sys_time: u64,
    #[serde(rename = "DiskReadBytes")]
    disk_read_bytes: u64,
    #[serde(rename = "DiskWriteBytes")]
    disk_write_bytes: u64,
}

impl From<&ProcessObservation> for PidRecord {
    fn from(obs: &ProcessObservation) -> Self {
        Self {
            pid: obs.pid,
            cmd_line: obs.argv.clone(),
            cpu_time: obs.cpu_ticks,
            sys_time: obs.kernel_ticks,
            disk_read_bytes: obs.disk_read_bytes,
            disk_write_bytes: obs.disk_write_bytes,
        }
    }
}

impl From<PidRecord> for ProcessObservation {
    fn from(rec: PidRecord) -> Self {
        Self {
            pid: rec.pid,
            argv: rec.cmd_line,
            cpu_ticks: rec.cpu_time,
            kernel_ticks: rec.sys_time,
            disk_read_bytes: rec.disk_read_bytes,
            disk_write_bytes: rec.disk_write_bytes,
        }
    }
}

/// Writes `snapshot` to `path`, overwriting any previous record.
///
/// The caller treats failure as non-fatal: the record is only needed by the
/// NEXT invocation, and this run's verdict does not depend on it.
pub fn save(snapshot: &Snapshot, path: &Path) -> Result<(), io::Error> {
    let mut root = Map::new();
    root.insert("__schema_version__".into(), json!(SCHEMA_VERSION));
    root.insert("__SysClock__".into(), json!(snapshot.clock));

    let mut pid_list = Vec::with_capacity(snapshot.observations.len());
    for (pid, obs) in &snapshot.observations {
        pid_list.push(json!(pid));
        root.insert(
            pid.to_string(),
            serde_json::to_value(PidRecord::from(obs)).expect("pid record serialization"),
        );
    }
    root.insert("__pid_list__".into(), Value::Array(pid_list));

    let text = serde_json::to_string_pretty(&Value::Object(root))?;
    fs::write(path, text)
}

/// Loads the previous snapshot from `config.history_file`.
///
/// Returns `Ok(None)` when no history exists yet (first run). Malformed
/// records surface as errors the caller downgrades to "no trustworthy
/// history". Decoded entries are re-matched against the CURRENT rules; the
/// rule that matched when the record was written is not trusted, and
/// entries no rule matches anymore are dropped.
pub fn load(config: &WatchConfig) -> Result<Option<Snapshot>, StoreError> {
    let content = match fs::read_to_string(&config.history_file) {
        Ok(text) => text,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(None),
        Err(e) => return Err(e.into()),
    };

    let root: Value = serde_json::from_str(&content)?;
    let root = root
        .as_object()
        .ok_or_else(|| StoreError::Format("root element should be an object".into()))?;

    let version = root
        .get("__schema_version__")
        .ok_or_else(|| StoreError::Format("no schema version".into()))?
        .as_u64()
        .ok_or_else(|| StoreError::Format("schema version is not a number".into()))?;
    if version != SCHEMA_VERSION {
        return Err(StoreError::Format(format!(
            "schema version {} cannot be handled",
            version
        )));
    }

    let clock = root
        .get("__SysClock__")
        .ok_or_else(|| StoreError::Format("'__SysClock__' member not found".into()))?
        .as_u64()
        .ok_or_else(|| StoreError::Format("'__SysClock__' is not a number".into()))?;

    let pid_list = root
        .get("__pid_list__")
        .ok_or_else(|| StoreError::Format("'__pid_list__' member not found".into()))?
        .as_array()
        .ok_or_else(|| StoreError::Format("'__pid_list__' is not an array".into()))?;

    let mut snapshot = Snapshot {
        clock,
        ..Default::default()
    };

    for entry in pid_list {
        let pid = entry
            .as_i64()
            .ok_or_else(|| StoreError::Format("'__pid_list__' entry is not a number".into()))?;
        let key = pid.to_string();
        let obj = root
            .get(&key)
            .ok_or_else(|| StoreError::Format(format!("'{}' object not found", key)))?;

        let record: PidRecord = serde_json::from_value(obj.clone())
            .map_err(|e| StoreError::Format(format!("object '{}': {}", key, e)))?;
        let obs = ProcessObservation::from(record);

        if let Some(rule_idx) = matcher::match_rules(&config.rules, &obs.argv) {
            snapshot.pid_to_rule.insert(obs.pid, rule_idx);
            snapshot.observations.insert(obs.pid, obs);
        }
    }

    Ok(Some(snapshot))
}
