//! Names and limits both sides of the device agree on.

/// UTF-16 code units held by every exported name field.
pub const MAX_PATH: usize = 260;

/// Privileges carried per token on the wire; the rest are counted but not copied.
pub const MAX_PRIVILEGES: usize = 36;

pub const DEVICE_NAME: &str = r"\Device\VigilSensor";
pub const SYMLINK_NAME: &str = r"\DosDevices\VigilSensor";
pub const USER_DEVICE_PATH: &str = r"\\.\VigilSensor";

/// Events each filter keeps before dropping the oldest.
pub const DEFAULT_QUEUE_CAPACITY: usize = 1024;
