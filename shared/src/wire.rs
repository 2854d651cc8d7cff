//! Fixed-layout records exported across the kernel/user boundary.
//!
//! Every record starts with a [`WireHeader`]. The driver writes records field by field into the
//! caller's buffer (zero-filled first, so padding never carries kernel bytes); user mode reads
//! them back with [`Record::decode`]. Nothing here holds a pointer.

use core::fmt::{self, Write as _};

use serde::Deserialize;
use thiserror::Error;
use zerocopy_derive::{FromBytes, Immutable, IntoBytes, KnownLayout};

use crate::constants::{MAX_PATH, MAX_PRIVILEGES};

/*──────────────────────────── kinds & pools ─────────────────────────────*/

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u32)]
pub enum EventKind {
    FileSystem = 1,
    Process = 2,
    Registry = 3,
}

impl EventKind {
    pub const ALL: [EventKind; 3] = [EventKind::FileSystem, EventKind::Process, EventKind::Registry];

    pub const fn from_raw(raw: u32) -> Option<Self> {
        match raw {
            1 => Some(EventKind::FileSystem),
            2 => Some(EventKind::Process),
            3 => Some(EventKind::Registry),
            _ => None,
        }
    }

    /// Size of the record this kind exports.
    pub const fn record_size(self) -> usize {
        match self {
            EventKind::FileSystem => size_of::<WireFileEvent>(),
            EventKind::Process => size_of::<WireProcessEvent>(),
            EventKind::Registry => size_of::<WireRegistryEvent>(),
        }
    }

    pub const fn as_str(self) -> &'static str {
        match self {
            EventKind::FileSystem => "file_system",
            EventKind::Process => "process",
            EventKind::Registry => "registry",
        }
    }
}

/// Kernel pool an event was allocated from.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
#[repr(u32)]
pub enum PoolClass {
    #[default]
    NonPaged = 0,
    Paged = 1,
}

impl PoolClass {
    pub const fn from_raw(raw: u32) -> Option<Self> {
        match raw {
            0 => Some(PoolClass::NonPaged),
            1 => Some(PoolClass::Paged),
            _ => None,
        }
    }
}

/*──────────────────────────── wide names ────────────────────────────────*/

/// A UTF-16 name of at most [`MAX_PATH`] units, as stored in events and on the wire.
#[repr(C)]
#[derive(Clone, Copy, FromBytes, IntoBytes, Immutable, KnownLayout)]
pub struct WideName {
    pub len: u16,
    /// Non-zero when the source name was longer than `buf`.
    pub truncated: u16,
    pub buf: [u16; MAX_PATH],
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("name of {len} UTF-16 units does not fit MAX_PATH")]
pub struct NameTooLong {
    pub len: usize,
}

impl WideName {
    pub const EMPTY: WideName = WideName { len: 0, truncated: 0, buf: [0; MAX_PATH] };

    /// Keep the first [`MAX_PATH`] units and flag the rest as cut.
    pub fn truncating(units: &[u16]) -> Self {
        let take = units.len().min(MAX_PATH);
        let mut name = Self::EMPTY;
        name.buf[..take].copy_from_slice(&units[..take]);
        name.len = take as u16;
        name.truncated = u16::from(units.len() > MAX_PATH);
        name
    }

    /// Refuse names that do not fit.
    pub fn exact(units: &[u16]) -> Result<Self, NameTooLong> {
        if units.len() > MAX_PATH {
            return Err(NameTooLong { len: units.len() });
        }
        Ok(Self::truncating(units))
    }

    pub fn from_str_truncating(s: &str) -> Self {
        let mut name = Self::EMPTY;
        let mut units = s.encode_utf16();
        for (slot, unit) in name.buf.iter_mut().zip(&mut units) {
            *slot = unit;
            name.len += 1;
        }
        name.truncated = u16::from(units.next().is_some());
        name
    }

    pub fn as_units(&self) -> &[u16] {
        &self.buf[..usize::from(self.len).min(MAX_PATH)]
    }

    pub fn len(&self) -> usize {
        self.as_units().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn is_truncated(&self) -> bool {
        self.truncated != 0
    }

    pub fn chars(&self) -> impl Iterator<Item = char> + '_ {
        char::decode_utf16(self.as_units().iter().copied())
            .map(|c| c.unwrap_or(char::REPLACEMENT_CHARACTER))
    }

    #[cfg(not(feature = "kernel"))]
    pub fn to_string_lossy(&self) -> String {
        self.chars().collect()
    }
}

impl Default for WideName {
    fn default() -> Self {
        Self::EMPTY
    }
}

impl PartialEq for WideName {
    fn eq(&self, other: &Self) -> bool {
        self.as_units() == other.as_units() && self.is_truncated() == other.is_truncated()
    }
}

impl Eq for WideName {}

impl fmt::Display for WideName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.chars().try_for_each(|c| f.write_char(c))
    }
}

impl fmt::Debug for WideName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_char('"')?;
        fmt::Display::fmt(self, f)?;
        f.write_char('"')?;
        if self.is_truncated() {
            f.write_str(" (truncated)")?;
        }
        Ok(())
    }
}

/*──────────────────────────── common blocks ─────────────────────────────*/

#[repr(C)]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, FromBytes, IntoBytes, Immutable, KnownLayout)]
pub struct WireHeader {
    /// [`EventKind`] as `u32`.
    pub kind: u32,
    /// Size of the whole record including this header.
    pub size: u32,
    /// [`PoolClass`] as `u32`.
    pub pool: u32,
    pub reserved: u32,
}

/// Capture time. Both wall-clock fields count 100 ns ticks since 1601-01-01.
#[repr(C)]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, FromBytes, IntoBytes, Immutable, KnownLayout)]
pub struct WireTime {
    pub system_time: i64,
    pub local_time: i64,
    /// Processor timestamp counter; orders events captured within one tick.
    pub counter: u64,
}

impl WireTime {
    pub const fn unix(&self) -> (i64, u32) {
        filetime_to_unix(self.system_time)
    }
}

#[repr(C)]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, FromBytes, IntoBytes, Immutable, KnownLayout)]
pub struct WirePrivilege {
    pub luid: u64,
    pub attributes: u32,
    pub reserved: u32,
}

/// Mirror of `TOKEN_STATISTICS` with LUIDs flattened to `u64`.
#[repr(C)]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, FromBytes, IntoBytes, Immutable, KnownLayout)]
pub struct WireTokenStatistics {
    pub token_id: u64,
    pub authentication_id: u64,
    pub modified_id: u64,
    pub token_type: u32,
    pub impersonation_level: u32,
    pub group_count: u32,
    pub privilege_count: u32,
}

#[repr(C)]
#[derive(Debug, Clone, Copy, FromBytes, Immutable, KnownLayout)]
pub struct WireToken {
    pub elevated: u32,
    /// Integrity level RID (`SECURITY_MANDATORY_*_RID`).
    pub integrity_level: u32,
    /// Privileges the token holds; only the first [`MAX_PRIVILEGES`] are in `privileges`.
    pub privilege_count: u32,
    pub reserved: u32,
    pub statistics: WireTokenStatistics,
    pub privileges: [WirePrivilege; MAX_PRIVILEGES],
}

impl WireToken {
    pub fn privileges(&self) -> &[WirePrivilege] {
        let held = (self.privilege_count as usize).min(MAX_PRIVILEGES);
        &self.privileges[..held]
    }
}

#[repr(C)]
#[derive(Debug, Clone, Copy, FromBytes, Immutable, KnownLayout)]
pub struct WireProcess {
    pub pid: u32,
    pub ppid: u32,
    pub session_id: u32,
    pub reserved: u32,
    pub image: WideName,
    pub reserved2: u32,
    pub token: WireToken,
}

/*──────────────────────────── event records ─────────────────────────────*/

#[repr(C)]
#[derive(Debug, Clone, Copy, FromBytes, Immutable, KnownLayout)]
pub struct WireFileEvent {
    pub header: WireHeader,
    pub time: WireTime,
    pub process: WireProcess,
    /// IRP major function.
    pub major_function: u32,
    /// Operation-specific option code supplied by the hook.
    pub options: u32,
    pub path: WideName,
    /// Final path component.
    pub name: WideName,
}

#[repr(C)]
#[derive(Debug, Clone, Copy, FromBytes, Immutable, KnownLayout)]
pub struct WireProcessEvent {
    pub header: WireHeader,
    pub time: WireTime,
    pub process: WireProcess,
    /// 1 for creation, 0 for exit.
    pub created: u32,
    pub reserved: u32,
}

#[repr(C)]
#[derive(Debug, Clone, Copy, FromBytes, Immutable, KnownLayout)]
pub struct WireRegistryEvent {
    pub header: WireHeader,
    pub time: WireTime,
    pub process: WireProcess,
    /// `REG_NOTIFY_CLASS` value.
    pub operation: u32,
    pub reserved: u32,
    pub key: WideName,
    pub value: WideName,
}

/*──────────────────────────── statistics ────────────────────────────────*/

#[repr(C)]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, FromBytes, IntoBytes, Immutable, KnownLayout)]
pub struct WireQueueStats {
    pub queued: u64,
    pub capacity: u64,
    pub captured: u64,
    pub skipped: u64,
    pub failed: u64,
    pub evicted: u64,
}

#[repr(C)]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, FromBytes, IntoBytes, Immutable, KnownLayout)]
pub struct WireStats {
    pub file_system: WireQueueStats,
    pub process: WireQueueStats,
    pub registry: WireQueueStats,
    pub tracked_processes: u64,
    pub reserved: u64,
}

/*──────────────────────────── decoding ──────────────────────────────────*/

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum DecodeError {
    #[error("need {needed} bytes, have {available}")]
    Truncated { needed: usize, available: usize },

    #[error("unknown record kind {0}")]
    UnknownKind(u32),

    #[error("{kind:?} record declares {declared} bytes, expected {expected}")]
    SizeMismatch { kind: EventKind, declared: u32, expected: usize },
}

/// One exported record, copied out of the byte stream.
#[derive(Debug, Clone, Copy)]
pub enum Record {
    File(WireFileEvent),
    Process(WireProcessEvent),
    Registry(WireRegistryEvent),
}

impl Record {
    /// Decode the record at the start of `bytes` and report how many bytes it used.
    pub fn decode(bytes: &[u8]) -> Result<(Record, usize), DecodeError> {
        let header: WireHeader = read(bytes)?;
        let kind = EventKind::from_raw(header.kind).ok_or(DecodeError::UnknownKind(header.kind))?;
        let expected = kind.record_size();
        if header.size as usize != expected {
            return Err(DecodeError::SizeMismatch { kind, declared: header.size, expected });
        }

        let record = match kind {
            EventKind::FileSystem => Record::File(read(bytes)?),
            EventKind::Process => Record::Process(read(bytes)?),
            EventKind::Registry => Record::Registry(read(bytes)?),
        };
        Ok((record, expected))
    }

    pub fn kind(&self) -> EventKind {
        match self {
            Record::File(_) => EventKind::FileSystem,
            Record::Process(_) => EventKind::Process,
            Record::Registry(_) => EventKind::Registry,
        }
    }

    pub fn header(&self) -> &WireHeader {
        match self {
            Record::File(e) => &e.header,
            Record::Process(e) => &e.header,
            Record::Registry(e) => &e.header,
        }
    }

    pub fn time(&self) -> &WireTime {
        match self {
            Record::File(e) => &e.time,
            Record::Process(e) => &e.time,
            Record::Registry(e) => &e.time,
        }
    }

    pub fn process(&self) -> &WireProcess {
        match self {
            Record::File(e) => &e.process,
            Record::Process(e) => &e.process,
            Record::Registry(e) => &e.process,
        }
    }
}

fn read<T: zerocopy::FromBytes>(bytes: &[u8]) -> Result<T, DecodeError> {
    T::read_from_prefix(bytes)
        .map(|(value, _)| value)
        .map_err(|_| DecodeError::Truncated { needed: size_of::<T>(), available: bytes.len() })
}

/*──────────────────────────── time helpers ──────────────────────────────*/

/// Seconds between 1601-01-01 and 1970-01-01.
pub const WINDOWS_TO_UNIX_SECS: i64 = 11_644_473_600;
pub const TICKS_PER_SECOND: i64 = 10_000_000;

/// 100 ns ticks since 1601 → (Unix seconds, nanoseconds).
pub const fn filetime_to_unix(ticks: i64) -> (i64, u32) {
    let secs = ticks.div_euclid(TICKS_PER_SECOND) - WINDOWS_TO_UNIX_SECS;
    let nanos = (ticks.rem_euclid(TICKS_PER_SECOND) * 100) as u32;
    (secs, nanos)
}

pub const fn unix_to_filetime(secs: i64, nanos: u32) -> i64 {
    (secs + WINDOWS_TO_UNIX_SECS) * TICKS_PER_SECOND + (nanos / 100) as i64
}

#[cfg(test)]
mod tests {
    use super::*;

    fn units(s: &str) -> Vec<u16> {
        s.encode_utf16().collect()
    }

    #[test]
    fn truncating_keeps_the_prefix_and_flags_it() {
        let long = "x".repeat(MAX_PATH + 40);
        let name = WideName::truncating(&units(&long));
        assert_eq!(name.len(), MAX_PATH);
        assert!(name.is_truncated());
        assert_eq!(name.to_string_lossy(), "x".repeat(MAX_PATH));
    }

    #[test]
    fn exact_rejects_oversized_names() {
        let long = units(&"y".repeat(MAX_PATH + 1));
        assert_eq!(WideName::exact(&long), Err(NameTooLong { len: MAX_PATH + 1 }));

        let fits = units(&"y".repeat(MAX_PATH));
        let name = WideName::exact(&fits).unwrap();
        assert!(!name.is_truncated());
        assert_eq!(name.as_units(), &fits[..]);
    }

    #[test]
    fn str_and_units_constructors_agree() {
        let a = WideName::from_str_truncating(r"C:\a\b.txt");
        let b = WideName::truncating(&units(r"C:\a\b.txt"));
        assert_eq!(a, b);
        assert_eq!(a.to_string(), r"C:\a\b.txt");
        assert_eq!(format!("{a:?}"), r#""C:\a\b.txt""#);
    }

    #[test]
    fn decode_rejects_short_and_unknown_input() {
        assert_eq!(
            Record::decode(&[0u8; 8]).unwrap_err(),
            DecodeError::Truncated { needed: size_of::<WireHeader>(), available: 8 }
        );

        let mut bytes = vec![0u8; size_of::<WireHeader>()];
        bytes[0] = 9;
        assert_eq!(Record::decode(&bytes).unwrap_err(), DecodeError::UnknownKind(9));
    }

    #[test]
    fn decode_checks_declared_size() {
        let mut bytes = vec![0u8; EventKind::Process.record_size()];
        bytes[..4].copy_from_slice(&2u32.to_le_bytes());
        bytes[4..8].copy_from_slice(&7u32.to_le_bytes());
        assert!(matches!(
            Record::decode(&bytes),
            Err(DecodeError::SizeMismatch { kind: EventKind::Process, declared: 7, .. })
        ));

        let size = EventKind::Process.record_size() as u32;
        bytes[4..8].copy_from_slice(&size.to_le_bytes());
        bytes.extend_from_slice(&[0xAA; 16]);
        let (record, used) = Record::decode(&bytes).unwrap();
        assert_eq!(used, size as usize);
        assert_eq!(record.kind(), EventKind::Process);
        assert!(record.process().image.is_empty());
    }

    #[test]
    fn filetime_conversion_round_trips() {
        // 2024-01-01T00:00:00Z
        let ticks = unix_to_filetime(1_704_067_200, 500);
        assert_eq!(filetime_to_unix(ticks), (1_704_067_200, 500));
        assert_eq!(filetime_to_unix(WINDOWS_TO_UNIX_SECS * TICKS_PER_SECOND), (0, 0));
    }
}
