//! Vigil control device: IRP dispatcher and helpers.
//!
//!  * `\Device\VigilSensor` and its `\DosDevices` link are created in [`create_device`].
//!  * CREATE/CLOSE always succeed and count open handles; DEVICE_CONTROL serves the codes in `vigil_shared::ioctl`.

#![allow(non_upper_case_globals)]

use core::sync::atomic::{AtomicU32, Ordering};
use core::{ptr, slice};

use vigil_sensor::{ExportError, Exported, Sensor, SensorError};
use vigil_shared::constants::{DEVICE_NAME, SYMLINK_NAME};
use vigil_shared::ioctl::{IOCTL_GET_STATS, IOCTL_UNWATCH_PROCESS, IOCTL_WATCH_PROCESS, VIGIL_DEVICE_TYPE};
use vigil_shared::wire::EventKind;
use wdk_sys::{
    // I/O major codes
    IRP_MJ_CLOSE, IRP_MJ_CREATE, IRP_MJ_DEVICE_CONTROL,
    // object types
    DRIVER_OBJECT, FILE_DEVICE_SECURE_OPEN, IRP, PDEVICE_OBJECT, PIO_STACK_LOCATION, PIRP,
    // NT status
    NTSTATUS, STATUS_BUFFER_TOO_SMALL, STATUS_DEVICE_NOT_READY, STATUS_INVALID_CID, STATUS_INVALID_DEVICE_REQUEST,
    STATUS_INVALID_PARAMETER, STATUS_INVALID_USER_BUFFER, STATUS_NO_MORE_ENTRIES, STATUS_NOT_FOUND,
    STATUS_OBJECT_NAME_COLLISION, STATUS_SUCCESS, STATUS_UNSUCCESSFUL,
    // KM API
    ntddk::{IoCreateDevice, IoCreateSymbolicLink, IoDeleteDevice, IoDeleteSymbolicLink, IofCompleteRequest},
};

use crate::consts::IO_NO_INCREMENT;
use crate::helpers::{make_unicode, nt_success};
use crate::platform::KernelProcess;

/*──────────────────────────── IRP helpers ───────────────────────────────*/

/// Finish an IRP with `information` bytes transferred and return the given status.
///
/// # Safety
///   * `irp` must point to a valid IRP.
///   * Caller must guarantee IRQL == `DISPATCH_LEVEL` or lower.
pub unsafe fn complete(irp: PIRP, status: NTSTATUS, information: usize) -> NTSTATUS {
    unsafe {
        // union field produced by bindgen
        (*irp).IoStatus.__bindgen_anon_1.Status = status as _;
        (*irp).IoStatus.Information = information as _;
        // second param is CCHAR (i8)
        IofCompleteRequest(irp, IO_NO_INCREMENT);
    }
    status
}

/// Safe wrapper that validates `CurrentLocation`.
///
/// Returns a **pointer to** the current `IO_STACK_LOCATION`.
///
/// # Safety
/// Caller guarantees `irp` is valid.
pub unsafe fn io_get_current_irp_stack_location(irp: *mut IRP) -> Result<PIO_STACK_LOCATION, NTSTATUS> {
    unsafe {
        if (*irp).CurrentLocation > (*irp).StackCount + 1 {
            return Err(STATUS_INVALID_PARAMETER);
        }
        Ok((*irp).Tail.Overlay.__bindgen_anon_2.__bindgen_anon_1.CurrentStackLocation)
    }
}

/*──────────────────────────── control codes ─────────────────────────────*/

fn export_status(err: ExportError) -> NTSTATUS {
    match err {
        ExportError::BufferTooSmall { .. } => STATUS_BUFFER_TOO_SMALL,
        ExportError::Fault { .. } => STATUS_INVALID_USER_BUFFER,
    }
}

fn sensor_status(err: SensorError) -> NTSTATUS {
    match err {
        SensorError::AlreadyTracked(_) => STATUS_OBJECT_NAME_COLLISION,
        SensorError::NotTracked(_) => STATUS_NOT_FOUND,
        _ => STATUS_UNSUCCESSFUL,
    }
}

fn read_pid(input: &[u8]) -> Result<u32, NTSTATUS> {
    let bytes: [u8; 4] = input
        .get(..4)
        .and_then(|b| b.try_into().ok())
        .ok_or(STATUS_INVALID_PARAMETER)?;
    Ok(u32::from_le_bytes(bytes))
}

/// Serve one control code against the system buffer. Returns the bytes written back.
///
/// `METHOD_BUFFERED` hands in and out through the same buffer, so the input is consumed before
/// anything is written.
fn control(sensor: &Sensor, code: u32, buffer: &mut [u8], input_len: usize, output_len: usize) -> Result<usize, NTSTATUS> {
    let output = buffer.get_mut(..output_len).ok_or(STATUS_INVALID_USER_BUFFER)?;

    if let Some(kind) = EventKind::from_request(code) {
        let mut dst = vigil_sensor::export::SliceBuffer::new(output);
        return match sensor.export_next(kind, &mut dst).map_err(export_status)? {
            Exported::Copied(bytes) => Ok(bytes),
            Exported::Empty => Err(STATUS_NO_MORE_ENTRIES),
        };
    }

    match code {
        IOCTL_GET_STATS => {
            let mut dst = vigil_sensor::export::SliceBuffer::new(output);
            sensor.export_stats(&mut dst).map_err(export_status)
        }
        IOCTL_WATCH_PROCESS => {
            let pid = read_pid(buffer.get(..input_len).unwrap_or_default())?;
            let process = KernelProcess::lookup(pid).map_err(|err| {
                log::warn!("watch {pid}: {err}");
                STATUS_INVALID_CID
            })?;
            sensor.watch(&process).map_err(sensor_status)?;
            Ok(0)
        }
        IOCTL_UNWATCH_PROCESS => {
            let pid = read_pid(buffer.get(..input_len).unwrap_or_default())?;
            sensor.unwatch(pid).map_err(sensor_status)?;
            Ok(0)
        }
        _ => Err(STATUS_INVALID_DEVICE_REQUEST),
    }
}

/*──────────────────────────── dispatch table ────────────────────────────*/

/// Handles user mode holds on the control device.
static OPEN_HANDLES: AtomicU32 = AtomicU32::new(0);

/// Whether a client still holds the control device open.
pub fn has_open_handles() -> bool {
    OPEN_HANDLES.load(Ordering::Acquire) != 0
}

unsafe extern "C" fn dispatch_create(_dev: PDEVICE_OBJECT, irp: PIRP) -> NTSTATUS {
    OPEN_HANDLES.fetch_add(1, Ordering::AcqRel);
    unsafe { complete(irp, STATUS_SUCCESS, 0) }
}

unsafe extern "C" fn dispatch_close(_dev: PDEVICE_OBJECT, irp: PIRP) -> NTSTATUS {
    OPEN_HANDLES.fetch_sub(1, Ordering::AcqRel);
    unsafe { complete(irp, STATUS_SUCCESS, 0) }
}

unsafe extern "C" fn dispatch_control(_dev: PDEVICE_OBJECT, irp: PIRP) -> NTSTATUS {
    let Some(sensor) = crate::sensor() else {
        return unsafe { complete(irp, STATUS_DEVICE_NOT_READY, 0) };
    };
    let stack = match unsafe { io_get_current_irp_stack_location(irp) } {
        Ok(stack) => stack,
        Err(st) => return unsafe { complete(irp, st, 0) },
    };

    // SAFETY: this is a DEVICE_CONTROL stack location; the union arm matches.
    let params = unsafe { &(*stack).Parameters.DeviceIoControl };
    let code = params.IoControlCode;
    let input_len = params.InputBufferLength as usize;
    let output_len = params.OutputBufferLength as usize;

    // SAFETY: for METHOD_BUFFERED the system buffer spans max(input, output) bytes.
    let system = unsafe { (*irp).AssociatedIrp.SystemBuffer.cast::<u8>() };
    let buffer: &mut [u8] = if system.is_null() {
        &mut []
    } else {
        unsafe { slice::from_raw_parts_mut(system, input_len.max(output_len)) }
    };

    match control(sensor, code, buffer, input_len, output_len) {
        Ok(written) => unsafe { complete(irp, STATUS_SUCCESS, written) },
        Err(st) => {
            if st != STATUS_NO_MORE_ENTRIES {
                log::debug!("ioctl {code:#010x} failed: {st:#010x}");
            }
            unsafe { complete(irp, st, 0) }
        }
    }
}

/// Install major-function pointers.
///
/// # Safety
/// Must be called exactly once, with the `driver_object` passed to `DriverEntry`.
unsafe fn init_dispatch(driver_object: *mut DRIVER_OBJECT) {
    let drv = unsafe { &mut *driver_object };
    drv.MajorFunction[IRP_MJ_CREATE as usize] = Some(dispatch_create);
    drv.MajorFunction[IRP_MJ_CLOSE as usize] = Some(dispatch_close);
    drv.MajorFunction[IRP_MJ_DEVICE_CONTROL as usize] = Some(dispatch_control);
}

/*──────────────────────────── lifetime ──────────────────────────────────*/

/// Create the control device and its symbolic link, then install the dispatch table.
///
/// # Safety
/// Called once from `DriverEntry` with its driver object.
pub unsafe fn create_device(driver: *mut DRIVER_OBJECT) -> Result<PDEVICE_OBJECT, NTSTATUS> {
    let mut dev_name = make_unicode(DEVICE_NAME);
    let mut dev_obj: PDEVICE_OBJECT = ptr::null_mut();
    let st = unsafe {
        IoCreateDevice(
            driver,
            0,
            dev_name.as_mut_ptr(),
            VIGIL_DEVICE_TYPE,
            FILE_DEVICE_SECURE_OPEN,
            0,
            &mut dev_obj,
        )
    };
    if !nt_success(st) {
        return Err(st);
    }

    let mut sym_name = make_unicode(SYMLINK_NAME);
    let st = unsafe { IoCreateSymbolicLink(sym_name.as_mut_ptr(), dev_name.as_mut_ptr()) };
    if !nt_success(st) {
        unsafe { IoDeleteDevice(dev_obj) };
        return Err(st);
    }

    unsafe { init_dispatch(driver) };
    Ok(dev_obj)
}

/// Remove the symbolic link and delete the device.
///
/// # Safety
/// `dev` must have come from [`create_device`].
pub unsafe fn delete_device(dev: PDEVICE_OBJECT) {
    let mut sym_name = make_unicode(SYMLINK_NAME);
    unsafe {
        IoDeleteSymbolicLink(sym_name.as_mut_ptr());
        IoDeleteDevice(dev);
    }
}
