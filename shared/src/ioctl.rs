//! Control codes understood by `\Device\VigilSensor`.
//!
//! Every code uses `METHOD_BUFFERED`: the I/O manager probes and copies the caller's buffer,
//! so the driver only ever writes into kernel memory it was handed.

use crate::wire::EventKind;

/// Custom device type in the user-defined range (0x8000-0xFFFF).
pub const VIGIL_DEVICE_TYPE: u32 = 0x8000;

pub const METHOD_BUFFERED: u32 = 0;
pub const FILE_ANY_ACCESS: u32 = 0;
pub const FILE_READ_DATA: u32 = 1;
pub const FILE_WRITE_DATA: u32 = 2;

/// `CTL_CODE` from `devioctl.h`.
pub const fn ctl_code(device_type: u32, function: u32, method: u32, access: u32) -> u32 {
    (device_type << 16) | (access << 14) | (function << 2) | method
}

/// Pop the oldest file-system event. Output: one `WireFileEvent`.
pub const IOCTL_GET_FS_EVENT: u32 =
    ctl_code(VIGIL_DEVICE_TYPE, 0x800, METHOD_BUFFERED, FILE_READ_DATA);
/// Pop the oldest process event. Output: one `WireProcessEvent`.
pub const IOCTL_GET_PROC_EVENT: u32 =
    ctl_code(VIGIL_DEVICE_TYPE, 0x801, METHOD_BUFFERED, FILE_READ_DATA);
/// Pop the oldest registry event. Output: one `WireRegistryEvent`.
pub const IOCTL_GET_REG_EVENT: u32 =
    ctl_code(VIGIL_DEVICE_TYPE, 0x802, METHOD_BUFFERED, FILE_READ_DATA);
/// Output: one `WireStats`.
pub const IOCTL_GET_STATS: u32 =
    ctl_code(VIGIL_DEVICE_TYPE, 0x803, METHOD_BUFFERED, FILE_READ_DATA);
/// Input: little-endian `u32` pid to start tracking (with its future descendants).
pub const IOCTL_WATCH_PROCESS: u32 =
    ctl_code(VIGIL_DEVICE_TYPE, 0x810, METHOD_BUFFERED, FILE_WRITE_DATA);
/// Input: little-endian `u32` pid to stop tracking.
pub const IOCTL_UNWATCH_PROCESS: u32 =
    ctl_code(VIGIL_DEVICE_TYPE, 0x811, METHOD_BUFFERED, FILE_WRITE_DATA);

impl EventKind {
    /// Request code that drains this kind's queue.
    pub const fn request_code(self) -> u32 {
        match self {
            EventKind::FileSystem => IOCTL_GET_FS_EVENT,
            EventKind::Process => IOCTL_GET_PROC_EVENT,
            EventKind::Registry => IOCTL_GET_REG_EVENT,
        }
    }

    /// Inverse of [`EventKind::request_code`]; `None` for every other code.
    pub const fn from_request(code: u32) -> Option<Self> {
        match code {
            IOCTL_GET_FS_EVENT => Some(EventKind::FileSystem),
            IOCTL_GET_PROC_EVENT => Some(EventKind::Process),
            IOCTL_GET_REG_EVENT => Some(EventKind::Registry),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ctl_code_matches_devioctl_layout() {
        // CTL_CODE(0x8000, 0x800, METHOD_BUFFERED, FILE_READ_DATA)
        assert_eq!(IOCTL_GET_FS_EVENT, 0x8000_6000);
        assert_eq!(ctl_code(0x22, 0x1, METHOD_BUFFERED, FILE_ANY_ACCESS), 0x0022_0004);
    }

    #[test]
    fn every_kind_has_its_own_request() {
        for kind in EventKind::ALL {
            assert_eq!(EventKind::from_request(kind.request_code()), Some(kind));
        }
        assert_eq!(EventKind::from_request(IOCTL_GET_STATS), None);
        assert_eq!(EventKind::from_request(IOCTL_WATCH_PROCESS), None);
    }
}
