//! System callbacks for process and registry activity.
//!
//! Both routines are registered in `DriverEntry` after the sensor is published and removed in
//! unload before it is dropped. The removal calls wait for callbacks already running, so a
//! callback never sees the sensor freed under it.

pub mod cmnotify;
pub mod psnotify;
