//! Sensor platform traits over live kernel objects.

use alloc::vec::Vec;
use core::ffi::c_void;
use core::{ptr, slice};

use vigil_sensor::error::PlatformError;
use vigil_sensor::platform::{ProcessSource, TokenSource};
use vigil_sensor::process::{Privilege, TokenStatistics};
use vigil_sensor::{Clock, EventTime, Pid};
use vigil_shared::wire::WideName;
use wdk_sys::{
    HANDLE, LARGE_INTEGER, PEPROCESS, PUNICODE_STRING, STATUS_INSUFFICIENT_RESOURCES, STATUS_NO_TOKEN,
    ntddk::{ExFreePoolWithTag, ExSystemTimeToLocalTime, KeQuerySystemTimePrecise, ObfDereferenceObject},
};

use crate::consts::{
    TOKEN_ELEVATION_CLASS, TOKEN_INTEGRITY_LEVEL_CLASS, TOKEN_PRIVILEGES_CLASS, TOKEN_STATISTICS_CLASS,
};
use crate::ffi::{
    PACCESS_TOKEN, PsDereferencePrimaryToken, PsGetProcessInheritedFromUniqueProcessId, PsGetProcessSessionId,
    PsLookupProcessByProcessId, PsReferencePrimaryToken, RtlSubAuthorityCountSid, RtlSubAuthoritySid,
    SeLocateProcessImageName, SeQueryInformationToken, TOKEN_ELEVATION, TOKEN_MANDATORY_LABEL, TOKEN_PRIVILEGES,
    TOKEN_STATISTICS,
};
use crate::helpers::{nt_success, unicode_units};

pub fn handle_to_pid(handle: HANDLE) -> Pid {
    handle as usize as Pid
}

fn pid_to_handle(pid: Pid) -> HANDLE {
    pid as usize as HANDLE
}

/*────────────────── processes ─────────────────*/

/// A process object, either lent to us by a notify routine or referenced by pid.
pub struct KernelProcess {
    process: PEPROCESS,
    pid: Pid,
    ppid: Pid,
    referenced: bool,
}

impl KernelProcess {
    /// Wrap a process the system handed to a callback. No reference is taken.
    ///
    /// # Safety
    /// `process` must stay valid for the lifetime of the returned value.
    pub unsafe fn borrowed(process: PEPROCESS, pid: Pid, ppid: Pid) -> Self {
        Self { process, pid, ppid, referenced: false }
    }

    /// Like [`KernelProcess::borrowed`], reading the parent from the process object.
    ///
    /// # Safety
    /// Same as [`KernelProcess::borrowed`].
    pub unsafe fn borrowed_with_parent(process: PEPROCESS, pid: Pid) -> Self {
        let ppid = handle_to_pid(unsafe { PsGetProcessInheritedFromUniqueProcessId(process) });
        unsafe { Self::borrowed(process, pid, ppid) }
    }

    /// Reference the process `pid`. The reference is dropped with the value.
    pub fn lookup(pid: Pid) -> Result<Self, PlatformError> {
        let mut process: PEPROCESS = ptr::null_mut();
        let status = unsafe { PsLookupProcessByProcessId(pid_to_handle(pid), &mut process) };
        if !nt_success(status) || process.is_null() {
            return Err(PlatformError::ProcessGone { pid });
        }
        let ppid = handle_to_pid(unsafe { PsGetProcessInheritedFromUniqueProcessId(process) });
        Ok(Self { process, pid, ppid, referenced: true })
    }
}

impl Drop for KernelProcess {
    fn drop(&mut self) {
        if self.referenced {
            unsafe { ObfDereferenceObject(self.process.cast()) };
        }
    }
}

impl ProcessSource for KernelProcess {
    fn pid(&self) -> Pid {
        self.pid
    }

    fn parent_pid(&self) -> Pid {
        self.ppid
    }

    fn session_id(&self) -> Result<u32, PlatformError> {
        Ok(unsafe { PsGetProcessSessionId(self.process) })
    }

    fn image_name(&self) -> Result<WideName, PlatformError> {
        let mut image: PUNICODE_STRING = ptr::null_mut();
        let status = unsafe { SeLocateProcessImageName(self.process, &mut image) };
        if !nt_success(status) {
            return Err(PlatformError::Query { what: "image name", status });
        }
        // SAFETY: the routine allocated `image` for us; it is freed right after the copy.
        let name = WideName::truncating(unsafe { unicode_units(image) });
        unsafe { ExFreePoolWithTag(image.cast(), 0) };
        Ok(name)
    }

    fn with_primary_token(
        &self,
        f: &mut dyn FnMut(&dyn TokenSource) -> Result<(), PlatformError>,
    ) -> Result<(), PlatformError> {
        let token = unsafe { PsReferencePrimaryToken(self.process) };
        if token.is_null() {
            return Err(PlatformError::Query { what: "primary token", status: STATUS_NO_TOKEN });
        }
        let result = f(&KernelToken { token });
        unsafe { PsDereferencePrimaryToken(token) };
        result
    }
}

/*────────────────── tokens ─────────────────*/

struct KernelToken {
    token: PACCESS_TOKEN,
}

/// Buffer `SeQueryInformationToken` allocated; freed on drop.
struct TokenInformation(*mut c_void);

impl TokenInformation {
    fn query(token: PACCESS_TOKEN, class: u32, what: &'static str) -> Result<Self, PlatformError> {
        let mut info: *mut c_void = ptr::null_mut();
        let status = unsafe { SeQueryInformationToken(token, class, &mut info) };
        if !nt_success(status) || info.is_null() {
            return Err(PlatformError::Query { what, status });
        }
        Ok(Self(info))
    }

    /// # Safety
    /// `T` must be the structure the queried class returns.
    unsafe fn get<T>(&self) -> &T {
        unsafe { &*self.0.cast::<T>() }
    }
}

impl Drop for TokenInformation {
    fn drop(&mut self) {
        unsafe { ExFreePoolWithTag(self.0, 0) };
    }
}

impl TokenSource for KernelToken {
    fn privileges(&self, out: &mut Vec<Privilege>) -> Result<(), PlatformError> {
        let info = TokenInformation::query(self.token, TOKEN_PRIVILEGES_CLASS, "token privileges")?;
        let privileges = unsafe { info.get::<TOKEN_PRIVILEGES>() };
        let count = privileges.PrivilegeCount as usize;
        // SAFETY: the kernel sized the buffer for `PrivilegeCount` entries.
        let entries = unsafe { slice::from_raw_parts(privileges.Privileges.as_ptr(), count) };

        out.try_reserve_exact(count).map_err(|_| PlatformError::Query {
            what: "token privileges",
            status: STATUS_INSUFFICIENT_RESOURCES,
        })?;
        for entry in entries {
            let luid = entry.Luid;
            out.push(Privilege { luid: luid.as_u64(), attributes: entry.Attributes });
        }
        Ok(())
    }

    fn statistics(&self) -> Result<TokenStatistics, PlatformError> {
        let info = TokenInformation::query(self.token, TOKEN_STATISTICS_CLASS, "token statistics")?;
        let stats = unsafe { info.get::<TOKEN_STATISTICS>() };
        Ok(TokenStatistics {
            token_id: stats.TokenId.as_u64(),
            authentication_id: stats.AuthenticationId.as_u64(),
            modified_id: stats.ModifiedId.as_u64(),
            token_type: stats.TokenType,
            impersonation_level: stats.ImpersonationLevel,
            group_count: stats.GroupCount,
            privilege_count: stats.PrivilegeCount,
        })
    }

    fn is_elevated(&self) -> Result<bool, PlatformError> {
        let info = TokenInformation::query(self.token, TOKEN_ELEVATION_CLASS, "token elevation")?;
        Ok(unsafe { info.get::<TOKEN_ELEVATION>() }.TokenIsElevated != 0)
    }

    fn integrity_level(&self) -> Result<u32, PlatformError> {
        let info = TokenInformation::query(self.token, TOKEN_INTEGRITY_LEVEL_CLASS, "token integrity level")?;
        let sid = unsafe { info.get::<TOKEN_MANDATORY_LABEL>() }.Label.Sid;
        // The RID is the last sub-authority of the label SID.
        let count = unsafe { *RtlSubAuthorityCountSid(sid) };
        if count == 0 {
            return Ok(0);
        }
        Ok(unsafe { *RtlSubAuthoritySid(sid, u32::from(count) - 1) })
    }
}

/*────────────────── time ─────────────────*/

/// System and local time from the precise system clock, plus the timestamp counter.
pub struct KernelClock;

fn read_counter() -> u64 {
    #[cfg(target_arch = "x86_64")]
    {
        unsafe { core::arch::x86_64::_rdtsc() }
    }
    #[cfg(not(target_arch = "x86_64"))]
    {
        unsafe { wdk_sys::ntddk::KeQueryPerformanceCounter(ptr::null_mut()).QuadPart as u64 }
    }
}

impl Clock for KernelClock {
    fn now(&self) -> EventTime {
        let mut system = LARGE_INTEGER { QuadPart: 0 };
        let mut local = LARGE_INTEGER { QuadPart: 0 };
        unsafe {
            KeQuerySystemTimePrecise(&mut system);
            ExSystemTimeToLocalTime(&mut system, &mut local);
        }
        // SAFETY: union field access.
        let (system_time, local_time) = unsafe { (system.QuadPart, local.QuadPart) };
        EventTime { system_time, local_time, counter: read_counter() }
    }
}
