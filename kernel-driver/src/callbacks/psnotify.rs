//! Process start/exit notify → `Sensor::on_process_notify`.
//!
//! Starts carry the parent in `PS_CREATE_NOTIFY_INFO`; exits (`info_ptr == NULL`) read it from
//! the process object.

use wdk_sys::{
    HANDLE, NTSTATUS, PEPROCESS, PS_CREATE_NOTIFY_INFO, STATUS_SUCCESS,
    ntddk::PsSetCreateProcessNotifyRoutineEx,
};

use crate::platform::{KernelProcess, handle_to_pid};

/*────────────────── registration ─────────────────*/

/// Install the callback.
pub fn register() -> Result<(), NTSTATUS> {
    // SAFETY: parameters match WDK prototype, `Remove = 0` (FALSE).
    let st = unsafe { PsSetCreateProcessNotifyRoutineEx(Some(process_notify), 0u8) };
    if st == STATUS_SUCCESS { Ok(()) } else { Err(st) }
}

/// Remove the callback (mirror of [`register`]).
///
/// # Safety
/// Call once during driver unload, after a successful [`register`].
pub unsafe fn unregister() -> Result<(), NTSTATUS> {
    // SAFETY: same call, `Remove = 1` (TRUE).
    let st = unsafe { PsSetCreateProcessNotifyRoutineEx(Some(process_notify), 1u8) };
    if st == STATUS_SUCCESS { Ok(()) } else { Err(st) }
}

/*────────────────── callback ─────────────────*/

unsafe extern "C" fn process_notify(process: PEPROCESS, process_id: HANDLE, info_ptr: *mut PS_CREATE_NOTIFY_INFO) {
    let Some(sensor) = crate::sensor() else {
        return;
    };
    let pid = handle_to_pid(process_id);

    // SAFETY: the kernel keeps `process` (and `info_ptr`, when set) alive for the call.
    let (source, created) = if info_ptr.is_null() {
        (unsafe { KernelProcess::borrowed_with_parent(process, pid) }, false)
    } else {
        let ppid = handle_to_pid(unsafe { (*info_ptr).ParentProcessId });
        (unsafe { KernelProcess::borrowed(process, pid, ppid) }, true)
    };

    let recorded = sensor.on_process_notify(&source, created);
    log::trace!("process {pid} {}: {recorded:?}", if created { "start" } else { "exit" });
}
