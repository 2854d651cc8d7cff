#![cfg_attr(feature = "kernel", no_std)]

pub mod constants;
pub mod ioctl;
pub mod ops;
pub mod wire;
