//! Vigil sensor driver.
//!
//! `DriverEntry` builds the [`Sensor`] and publishes it through [`SENSOR`], then hooks process
//! notifications, registry callbacks and the file-system minifilter, and finally creates the
//! control device user mode drains events from. Unload runs the same steps backwards; every
//! hook is removed (and in-flight callbacks drained) before the sensor is dropped.

#![no_std]

extern crate alloc;
#[cfg(not(test))]
extern crate wdk_panic;

use alloc::boxed::Box;
use core::{
    ptr,
    ptr::NonNull,
    sync::atomic::{AtomicPtr, AtomicU32, Ordering},
};
use vigil_sensor::{Sensor, SensorConfig};
use wdk_alloc::WdkAllocator;
use wdk_sys::{DEVICE_OBJECT, DRIVER_OBJECT, NTSTATUS, PCUNICODE_STRING, STATUS_INSUFFICIENT_RESOURCES, STATUS_SUCCESS};

mod callbacks;
mod consts;
mod device;
mod ffi;
mod helpers;
mod logger;
mod minifilter;
mod platform;

use callbacks::{cmnotify, psnotify};
use platform::KernelClock;

/*------------ globals & allocator -------------*/

static SENSOR: AtomicPtr<Sensor> = AtomicPtr::new(ptr::null_mut());
static DEVICE: AtomicPtr<DEVICE_OBJECT> = AtomicPtr::new(ptr::null_mut());

/// Which hooks are currently installed.
static HOOKS: AtomicU32 = AtomicU32::new(0);
const HOOK_PROCESS: u32 = 1 << 0;
const HOOK_REGISTRY: u32 = 1 << 1;

#[cfg(not(test))]
#[global_allocator]
static GLOBAL: WdkAllocator = WdkAllocator;

/// The published sensor, or `None` before load finished and after unload began.
pub(crate) fn sensor() -> Option<&'static Sensor> {
    // SAFETY: the pointer is only freed in `unload`, after every hook that could call us here
    // has been removed.
    unsafe { SENSOR.load(Ordering::Acquire).as_ref() }
}

/*------------ DriverEntry -------------------------------*/

#[allow(non_snake_case)]
#[unsafe(export_name = "DriverEntry")]
pub extern "system" fn driver_entry(driver: *mut DRIVER_OBJECT, _registry_path: PCUNICODE_STRING) -> NTSTATUS {
    let config = SensorConfig::default();
    // A second logger only happens on reload of the same image; keep the one installed.
    let _ = logger::init(config.logging.level);
    log::info!("vigil driver loading");

    /* 1 ▸ sensor */
    let sensor = match Sensor::new(&config, Box::new(KernelClock)) {
        Ok(sensor) => sensor,
        Err(err) => {
            log::error!("sensor init failed: {err}");
            return STATUS_INSUFFICIENT_RESOURCES;
        }
    };
    SENSOR.store(Box::into_raw(Box::new(sensor)), Ordering::Release);

    /* 2 ▸ hooks */
    if let Err(st) = psnotify::register() {
        log::error!("process notify registration failed: {st:#010x}");
        unsafe { unload() };
        return st;
    }
    HOOKS.fetch_or(HOOK_PROCESS, Ordering::AcqRel);

    if let Err(st) = cmnotify::register(driver) {
        log::error!("registry callback registration failed: {st:#010x}");
        unsafe { unload() };
        return st;
    }
    HOOKS.fetch_or(HOOK_REGISTRY, Ordering::AcqRel);

    if let Err(st) = minifilter::register(driver) {
        log::error!("minifilter registration failed: {st:#010x}");
        unsafe { unload() };
        return st;
    }

    /* 3 ▸ device object + symlink */
    match unsafe { device::create_device(driver) } {
        Ok(dev) => DEVICE.store(dev, Ordering::Release),
        Err(st) => {
            log::error!("control device creation failed: {st:#010x}");
            unsafe { unload() };
            return st;
        }
    }

    log::info!("vigil driver loaded");
    STATUS_SUCCESS
}

/*------------ unload ------------------------------------*/

/// Tear down whatever `DriverEntry` installed, newest first. Runs from the minifilter's unload
/// callback, or from `DriverEntry` when a step fails.
///
/// # Safety
/// Call at most once per successful step of `DriverEntry`, at PASSIVE_LEVEL.
pub(crate) unsafe fn unload() {
    log::info!("vigil driver unloading");

    unsafe {
        // 1 ▸ control device
        if let Some(dev) = NonNull::new(DEVICE.swap(ptr::null_mut(), Ordering::AcqRel)) {
            device::delete_device(dev.as_ptr());
        }

        // 2 ▸ hooks; each removal waits for callbacks still running
        minifilter::unregister();
        let hooks = HOOKS.swap(0, Ordering::AcqRel);
        if hooks & HOOK_REGISTRY != 0 {
            if let Err(st) = cmnotify::unregister() {
                log::error!("registry callback removal failed: {st:#010x}");
            }
        }
        if hooks & HOOK_PROCESS != 0 {
            if let Err(st) = psnotify::unregister() {
                log::error!("process notify removal failed: {st:#010x}");
            }
        }

        // 3 ▸ drop sensor
        if let Some(raw) = NonNull::new(SENSOR.swap(ptr::null_mut(), Ordering::AcqRel)) {
            drop(Box::from_raw(raw.as_ptr()));
        }
    }

    log::info!("vigil driver unloaded");
}
