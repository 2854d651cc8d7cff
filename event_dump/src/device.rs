//! Control-device client.

use std::ffi::OsStr;
use std::os::windows::ffi::OsStrExt;
use std::{io, mem, ptr};

use vigil_shared::constants::USER_DEVICE_PATH;
use vigil_shared::ioctl::{IOCTL_GET_STATS, IOCTL_UNWATCH_PROCESS, IOCTL_WATCH_PROCESS};
use vigil_shared::wire::{EventKind, Record, WireStats};
use windows_sys::Win32::Foundation::{
    CloseHandle, ERROR_NO_MORE_ITEMS, GENERIC_READ, GENERIC_WRITE, HANDLE, INVALID_HANDLE_VALUE,
};
use windows_sys::Win32::Storage::FileSystem::{CreateFileW, FILE_ATTRIBUTE_NORMAL, OPEN_EXISTING};
use windows_sys::Win32::System::IO::DeviceIoControl;

/// Largest record the driver exports.
const RECORD_BUFFER: usize = 4096;

/// Open handle to `\\.\VigilSensor`.
pub struct Device {
    handle: HANDLE,
}

impl Device {
    pub fn open() -> io::Result<Self> {
        let path: Vec<u16> = OsStr::new(USER_DEVICE_PATH).encode_wide().chain(Some(0)).collect();
        let handle = unsafe {
            CreateFileW(
                path.as_ptr(),
                GENERIC_READ | GENERIC_WRITE,
                0,
                ptr::null(),
                OPEN_EXISTING,
                FILE_ATTRIBUTE_NORMAL,
                ptr::null_mut(),
            )
        };
        if handle == INVALID_HANDLE_VALUE {
            return Err(io::Error::last_os_error());
        }
        log::debug!("opened {USER_DEVICE_PATH}");
        Ok(Self { handle })
    }

    /// Send `code` and return how many output bytes the driver wrote. `Ok(None)` means the driver
    /// had nothing to return.
    fn control(&self, code: u32, input: &[u8], output: &mut [u8]) -> io::Result<Option<usize>> {
        let mut returned = 0u32;
        let ok = unsafe {
            DeviceIoControl(
                self.handle,
                code,
                input.as_ptr().cast(),
                input.len() as u32,
                output.as_mut_ptr().cast(),
                output.len() as u32,
                &mut returned,
                ptr::null_mut(),
            )
        };
        if ok == 0 {
            let err = io::Error::last_os_error();
            if err.raw_os_error() == Some(ERROR_NO_MORE_ITEMS as i32) {
                return Ok(None);
            }
            return Err(err);
        }
        Ok((returned > 0).then_some(returned as usize))
    }

    /// Pop the oldest event of `kind`.
    pub fn next_event(&self, kind: EventKind) -> io::Result<Option<Record>> {
        let mut buffer = [0u8; RECORD_BUFFER];
        let Some(len) = self.control(kind.request_code(), &[], &mut buffer)? else {
            return Ok(None);
        };
        let (record, _) = Record::decode(&buffer[..len])
            .map_err(|err| io::Error::new(io::ErrorKind::InvalidData, err))?;
        Ok(Some(record))
    }

    pub fn stats(&self) -> io::Result<WireStats> {
        let mut buffer = [0u8; mem::size_of::<WireStats>()];
        self.control(IOCTL_GET_STATS, &[], &mut buffer)?;
        let (stats, _) = <WireStats as zerocopy::FromBytes>::read_from_prefix(&buffer)
            .map_err(|_| io::Error::new(io::ErrorKind::InvalidData, "short stats block"))?;
        Ok(stats)
    }

    pub fn watch(&self, pid: u32) -> io::Result<()> {
        self.control(IOCTL_WATCH_PROCESS, &pid.to_le_bytes(), &mut [])?;
        Ok(())
    }

    pub fn unwatch(&self, pid: u32) -> io::Result<()> {
        self.control(IOCTL_UNWATCH_PROCESS, &pid.to_le_bytes(), &mut [])?;
        Ok(())
    }
}

impl Drop for Device {
    fn drop(&mut self) {
        unsafe {
            CloseHandle(self.handle);
        }
    }
}
