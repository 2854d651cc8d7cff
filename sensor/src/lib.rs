//! Capture and export pipeline of the Vigil sensor.
//!
//! Kernel callbacks hand their context to [`Sensor`], which resolves the causing process through
//! the [`ProcessRegistry`] and pushes the captured event onto the bounded queue of its kind. The
//! control device later pops events oldest first and copies them into the caller's buffer.
//!
//! The crate builds for the host (`std`, the default) and for the driver (`kernel`: `no_std` +
//! `alloc`). Everything the operating system supplies comes in through [`platform`].

#![cfg_attr(feature = "kernel", no_std)]

extern crate alloc;

pub mod config;
pub mod error;
pub mod events;
pub mod export;
pub mod filter;
pub mod platform;
pub mod process;
pub mod queue;
pub mod sensor;
pub mod time;

pub use config::{ConfigError, SensorConfig, TrackingPolicy};
#[cfg(feature = "std")]
pub use config::LoadError;
pub use error::{CaptureError, ExportError, PlatformError, SensorError};
pub use events::{
    CapturableEvent, Captured, FileOperationContext, FileSystemEvent, ProcessLifecycleEvent, ProcessNotification,
    RegistryEvent, RegistryOperationContext,
};
pub use filter::{Exported, Filter, Recorded};
pub use process::{ProcessRecord, ProcessRef, ProcessRegistry, TokenSnapshot};
pub use queue::EventQueue;
pub use sensor::Sensor;
pub use time::{Clock, EventTime};
pub use vigil_shared::wire::{EventKind, PoolClass};

/// Process identifier as the kernel hands it out.
pub type Pid = u32;
