//! File-system minifilter: pre-operation callbacks feeding `Sensor::on_file_operation`.
//!
//! Every operation the sensor can be configured for is registered here; the sensor's own
//! operation set decides which ones are recorded. The filter's unload callback tears the whole
//! driver down, since the filter manager owns the driver's unload once the filter is registered.

mod names;

use core::ffi::c_void;
use core::mem::size_of;
use core::ptr;
use core::sync::atomic::{AtomicPtr, Ordering};

use vigil_sensor::FileOperationContext;
use vigil_shared::ops::FileOperation;
use wdk_sys::{NTSTATUS, PDRIVER_OBJECT, STATUS_SUCCESS, ntddk::PsGetProcessId};

use crate::consts::{
    FLT_PREOP_SUCCESS_NO_CALLBACK, FLT_REGISTRATION_VERSION, FLTFL_FILTER_UNLOAD_MANDATORY, FLTFL_REGISTRATION_SUPPORT_DAX_VOLUME,
    FLTFL_REGISTRATION_SUPPORT_NPFS_MSFS, IRP_MJ_OPERATION_END, IRP_PAGING_IO, STATUS_FLT_DO_NOT_DETACH,
};
use crate::ffi::{
    FLT_IO_PARAMETER_BLOCK, FLT_OPERATION_REGISTRATION, FLT_REGISTRATION, FltGetRequestorProcess,
    FltRegisterFilter, FltStartFiltering, FltUnregisterFilter, PFLT_CALLBACK_DATA, PFLT_FILTER,
};
use crate::helpers::nt_success;
use crate::platform::handle_to_pid;

use names::FltNames;

static FILTER: AtomicPtr<c_void> = AtomicPtr::new(ptr::null_mut());

/*────────────────── registration tables ─────────────────*/

/// Registration tables hold raw pointers but are never written after load.
#[repr(transparent)]
struct Table<T>(T);

unsafe impl<T> Sync for Table<T> {}

const fn operation(major: FileOperation) -> FLT_OPERATION_REGISTRATION {
    FLT_OPERATION_REGISTRATION {
        MajorFunction: major.major_function(),
        Flags: 0,
        PreOperation: Some(pre_operation),
        PostOperation: ptr::null(),
        Reserved1: ptr::null_mut(),
    }
}

static OPERATIONS: Table<[FLT_OPERATION_REGISTRATION; 7]> = Table([
    operation(FileOperation::Create),
    operation(FileOperation::Close),
    operation(FileOperation::Read),
    operation(FileOperation::Write),
    operation(FileOperation::SetInformation),
    operation(FileOperation::Cleanup),
    FLT_OPERATION_REGISTRATION {
        MajorFunction: IRP_MJ_OPERATION_END,
        Flags: 0,
        PreOperation: None,
        PostOperation: ptr::null(),
        Reserved1: ptr::null_mut(),
    },
]);

static REGISTRATION: Table<FLT_REGISTRATION> = Table(FLT_REGISTRATION {
    Size: size_of::<FLT_REGISTRATION>() as u16,
    Version: FLT_REGISTRATION_VERSION,
    Flags: FLTFL_REGISTRATION_SUPPORT_NPFS_MSFS | FLTFL_REGISTRATION_SUPPORT_DAX_VOLUME,
    ContextRegistration: ptr::null(),
    OperationRegistration: OPERATIONS.0.as_ptr(),
    FilterUnloadCallback: Some(filter_unload),
    InstanceSetupCallback: ptr::null(),
    InstanceQueryTeardownCallback: ptr::null(),
    InstanceTeardownStartCallback: ptr::null(),
    InstanceTeardownCompleteCallback: ptr::null(),
    GenerateFileNameCallback: ptr::null(),
    NormalizeNameComponentCallback: ptr::null(),
    NormalizeContextCleanupCallback: ptr::null(),
    TransactionNotificationCallback: ptr::null(),
    NormalizeNameComponentExCallback: ptr::null(),
    SectionNotificationCallback: ptr::null(),
});

/*────────────────── registration ─────────────────*/

/// Register with the filter manager and start filtering.
pub fn register(driver: PDRIVER_OBJECT) -> Result<(), NTSTATUS> {
    let mut filter: PFLT_FILTER = ptr::null_mut();
    let st = unsafe { FltRegisterFilter(driver, &REGISTRATION.0, &mut filter) };
    if !nt_success(st) {
        return Err(st);
    }
    FILTER.store(filter, Ordering::Release);

    let st = unsafe { FltStartFiltering(filter) };
    if !nt_success(st) {
        unsafe { unregister() };
        return Err(st);
    }
    Ok(())
}

/// Unregister the filter; waits for pre-operation callbacks still running.
///
/// # Safety
/// Call during unload only.
pub unsafe fn unregister() {
    let filter = FILTER.swap(ptr::null_mut(), Ordering::AcqRel);
    if !filter.is_null() {
        unsafe { FltUnregisterFilter(filter) };
    }
}

unsafe extern "C" fn filter_unload(flags: u32) -> NTSTATUS {
    if flags & FLTFL_FILTER_UNLOAD_MANDATORY == 0 && crate::device::has_open_handles() {
        log::warn!("unload refused: control device still open");
        return STATUS_FLT_DO_NOT_DETACH;
    }
    unsafe { crate::unload() };
    STATUS_SUCCESS
}

/*────────────────── callback ─────────────────*/

/// Operation-specific option word: create options, transfer length or information class.
fn operation_options(iopb: &FLT_IO_PARAMETER_BLOCK) -> u32 {
    match FileOperation::from_major(iopb.MajorFunction) {
        Some(FileOperation::Create) => iopb.parameter_u32(8),
        Some(FileOperation::Read | FileOperation::Write) => iopb.parameter_u32(0),
        Some(FileOperation::SetInformation) => iopb.parameter_u32(4),
        _ => 0,
    }
}

unsafe extern "C" fn pre_operation(
    data: PFLT_CALLBACK_DATA,
    _objects: *const c_void,
    _completion_context: *mut *mut c_void,
) -> i32 {
    let Some(sensor) = crate::sensor() else {
        return FLT_PREOP_SUCCESS_NO_CALLBACK;
    };
    // SAFETY: the filter manager passes valid callback data for the duration of the call.
    let iopb = unsafe { &*(*data).Iopb };
    if iopb.IrpFlags & IRP_PAGING_IO != 0 {
        return FLT_PREOP_SUCCESS_NO_CALLBACK;
    }
    let process = unsafe { FltGetRequestorProcess(data) };
    if process.is_null() {
        return FLT_PREOP_SUCCESS_NO_CALLBACK;
    }

    let names = FltNames::new(data);
    let recorded = sensor.on_file_operation(FileOperationContext {
        requestor: handle_to_pid(unsafe { PsGetProcessId(process) }),
        major_function: iopb.MajorFunction,
        options: operation_options(iopb),
        names: &names,
    });
    log::trace!("file irp_mj {:#04x}: {recorded:?}", iopb.MajorFunction);

    FLT_PREOP_SUCCESS_NO_CALLBACK
}
