//! Registry callback → `Sensor::on_registry_operation`.
//!
//! Registry callbacks run in the context of the thread making the call, so the requestor is the
//! current process. Key names come either from the operation's `CompleteName` (create and open)
//! or from the key object through the configuration manager.

use core::ffi::c_void;
use core::ptr;
use core::sync::atomic::{AtomicI64, Ordering};

use vigil_sensor::RegistryOperationContext;
use vigil_shared::ops::RegistryOperation;
use wdk_sys::{
    LARGE_INTEGER, NTSTATUS, PDRIVER_OBJECT, PUNICODE_STRING, STATUS_SUCCESS,
    ntddk::{CmRegisterCallbackEx, CmUnRegisterCallback, PsGetCurrentProcessId},
};

use crate::consts::REGISTRY_ALTITUDE;
use crate::ffi::{
    CmCallbackGetKeyObjectIDEx, CmCallbackReleaseKeyObjectIDEx, REG_CREATE_KEY_INFORMATION,
    REG_KEY_OBJECT_INFORMATION,
};
use crate::helpers::{make_unicode, nt_success, unicode_units};
use crate::platform::handle_to_pid;

/// Cookie `CmRegisterCallbackEx` handed back; needed to unregister and to query key names.
static COOKIE: AtomicI64 = AtomicI64::new(0);

/*────────────────── registration ─────────────────*/

pub fn register(driver: PDRIVER_OBJECT) -> Result<(), NTSTATUS> {
    let altitude = make_unicode(REGISTRY_ALTITUDE);
    let mut cookie = LARGE_INTEGER { QuadPart: 0 };
    let st = unsafe {
        CmRegisterCallbackEx(
            Some(registry_notify),
            altitude.as_ptr(),
            driver.cast(),
            ptr::null_mut(),
            &mut cookie,
            ptr::null_mut(),
        )
    };
    if !nt_success(st) {
        return Err(st);
    }
    COOKIE.store(unsafe { cookie.QuadPart }, Ordering::Release);
    Ok(())
}

/// # Safety
/// Call once during driver unload, after a successful [`register`].
pub unsafe fn unregister() -> Result<(), NTSTATUS> {
    let cookie = LARGE_INTEGER { QuadPart: COOKIE.load(Ordering::Acquire) };
    let st = unsafe { CmUnRegisterCallback(cookie) };
    if st == STATUS_SUCCESS { Ok(()) } else { Err(st) }
}

/*────────────────── key names ─────────────────*/

/// Full key path the configuration manager resolved for a key object; released on drop.
struct KeyObjectName(PUNICODE_STRING);

impl KeyObjectName {
    fn query(object: *mut c_void) -> Option<Self> {
        if object.is_null() {
            return None;
        }
        let cookie = LARGE_INTEGER { QuadPart: COOKIE.load(Ordering::Acquire) };
        let mut name: PUNICODE_STRING = ptr::null_mut();
        let st = unsafe { CmCallbackGetKeyObjectIDEx(&cookie, object, ptr::null_mut(), &mut name, 0) };
        (nt_success(st) && !name.is_null()).then_some(Self(name))
    }

    fn units(&self) -> &[u16] {
        unsafe { unicode_units(self.0) }
    }
}

impl Drop for KeyObjectName {
    fn drop(&mut self) {
        unsafe { CmCallbackReleaseKeyObjectIDEx(self.0) };
    }
}

/// Operations whose information block starts with the key's `CompleteName`.
fn names_key_directly(operation: RegistryOperation) -> bool {
    use RegistryOperation::*;
    matches!(
        operation,
        PreCreateKey | PreOpenKey | PostCreateKey | PostOpenKey | PreCreateKeyEx | PreOpenKeyEx
    )
}

/// Operations whose information block carries a value (or new key) name after the object.
fn carries_second_name(operation: RegistryOperation) -> bool {
    use RegistryOperation::*;
    matches!(operation, PreSetValueKey | PreDeleteValueKey | PreQueryValueKey | PreRenameKey)
}

/*────────────────── callback ─────────────────*/

unsafe extern "C" fn registry_notify(_context: *mut c_void, argument1: *mut c_void, argument2: *mut c_void) -> NTSTATUS {
    let Some(sensor) = crate::sensor() else {
        return STATUS_SUCCESS;
    };
    let class = argument1 as usize as u32;
    let Some(operation) = RegistryOperation::from_notify_class(class) else {
        return STATUS_SUCCESS;
    };
    if argument2.is_null() || !sensor.records_registry(operation) {
        return STATUS_SUCCESS;
    }
    let requestor = handle_to_pid(unsafe { PsGetCurrentProcessId() });

    let recorded = if names_key_directly(operation) {
        // SAFETY: the class says `argument2` is a create/open information block.
        let info = unsafe { &*argument2.cast::<REG_CREATE_KEY_INFORMATION>() };
        sensor.on_registry_operation(RegistryOperationContext {
            requestor,
            operation,
            key: Some(unsafe { unicode_units(info.CompleteName) }),
            value: None,
        })
    } else {
        // SAFETY: every other class starts with the key object.
        let info = unsafe { &*argument2.cast::<REG_KEY_OBJECT_INFORMATION>() };
        let key = KeyObjectName::query(info.Object);
        let value = carries_second_name(operation).then(|| unsafe { unicode_units(info.Name) });
        sensor.on_registry_operation(RegistryOperationContext {
            requestor,
            operation,
            key: key.as_ref().map(KeyObjectName::units),
            value,
        })
    };
    log::trace!("registry {} by {requestor}: {recorded:?}", operation.as_str());

    // Observe only; never block the operation.
    STATUS_SUCCESS
}
