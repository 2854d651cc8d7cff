//! Text and JSON views of decoded records.

use chrono::{DateTime, Utc};
use serde::Serialize;
use vigil_shared::ops::{FileOperation, RegistryOperation};
use vigil_shared::wire::{PoolClass, Record, WireStats, WireTime, filetime_to_unix};

/// Owned, printable copy of one record.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RecordView {
    /// UTC capture time, RFC 3339. `None` when the tick count is out of range.
    pub time: Option<DateTime<Utc>>,
    pub counter: u64,
    pub pool: &'static str,
    pub pid: u32,
    pub ppid: u32,
    pub session_id: u32,
    pub image: String,
    pub elevated: bool,
    pub integrity_level: u32,
    pub privilege_count: u32,
    #[serde(flatten)]
    pub detail: Detail,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Detail {
    File {
        operation: String,
        options: u32,
        path: String,
        name: String,
        truncated: bool,
    },
    Process {
        created: bool,
    },
    Registry {
        operation: String,
        key: String,
        value: String,
    },
}

fn utc(time: &WireTime) -> Option<DateTime<Utc>> {
    let (secs, nanos) = filetime_to_unix(time.system_time);
    DateTime::from_timestamp(secs, nanos)
}

fn file_operation(major: u32) -> String {
    u8::try_from(major)
        .ok()
        .and_then(FileOperation::from_major)
        .map_or_else(|| format!("irp_mj_{major:#04x}"), |op| op.as_str().to_owned())
}

fn registry_operation(class: u32) -> String {
    RegistryOperation::from_notify_class(class)
        .map_or_else(|| format!("notify_class_{class}"), |op| op.as_str().to_owned())
}

impl From<&Record> for RecordView {
    fn from(record: &Record) -> Self {
        let header = record.header();
        let process = record.process();
        let detail = match record {
            Record::File(e) => Detail::File {
                operation: file_operation(e.major_function),
                options: e.options,
                path: e.path.to_string_lossy(),
                name: e.name.to_string_lossy(),
                truncated: e.path.is_truncated(),
            },
            Record::Process(e) => Detail::Process { created: e.created != 0 },
            Record::Registry(e) => Detail::Registry {
                operation: registry_operation(e.operation),
                key: e.key.to_string_lossy(),
                value: e.value.to_string_lossy(),
            },
        };

        RecordView {
            time: utc(record.time()),
            counter: record.time().counter,
            pool: match PoolClass::from_raw(header.pool) {
                Some(PoolClass::NonPaged) => "non_paged",
                Some(PoolClass::Paged) => "paged",
                None => "unknown",
            },
            pid: process.pid,
            ppid: process.ppid,
            session_id: process.session_id,
            image: process.image.to_string_lossy(),
            elevated: process.token.elevated != 0,
            integrity_level: process.token.integrity_level,
            privilege_count: process.token.privilege_count,
            detail,
        }
    }
}

impl RecordView {
    /// One line per record: tag, time, process, then the kind-specific part.
    pub fn line(&self) -> String {
        let time = self
            .time
            .map_or_else(|| "-".to_owned(), |t| t.to_rfc3339_opts(chrono::SecondsFormat::Micros, true));
        let head = format!("{time} {:>6} <- {:<6}", self.pid, self.ppid);
        match &self.detail {
            Detail::File { operation, path, truncated, .. } => {
                let cut = if *truncated { " [truncated]" } else { "" };
                format!("FILE {head} {operation:<16} {path}{cut}")
            }
            Detail::Process { created } => {
                let what = if *created { "start" } else { "exit" };
                let elevated = if self.elevated { " elevated" } else { "" };
                format!(
                    "PROC {head} {what:<16} {} (il={:#x}{elevated})",
                    self.image, self.integrity_level
                )
            }
            Detail::Registry { operation, key, value } if value.is_empty() => {
                format!("REG  {head} {operation:<16} {key}")
            }
            Detail::Registry { operation, key, value } => {
                format!("REG  {head} {operation:<16} {key} : {value}")
            }
        }
    }

    pub fn json(&self) -> serde_json::Result<String> {
        serde_json::to_string(self)
    }
}

/// Multi-line summary of the driver's counters.
pub fn stats_lines(stats: &WireStats) -> Vec<String> {
    let mut lines = vec![format!("tracked processes: {}", stats.tracked_processes)];
    for (name, queue) in [
        ("file_system", &stats.file_system),
        ("process", &stats.process),
        ("registry", &stats.registry),
    ] {
        lines.push(format!(
            "{name:<12} queued {}/{} captured {} skipped {} failed {} evicted {}",
            queue.queued, queue.capacity, queue.captured, queue.skipped, queue.failed, queue.evicted
        ));
    }
    lines
}
