//! Assorted WDK constants missing in `wdk-sys`.

/* Used by IRP completion when `IO_NO_INCREMENT` is absent in wdk-sys */
pub const IO_NO_INCREMENT: i8 = 0;

/*────────── token information classes ─────────*/

pub const TOKEN_PRIVILEGES_CLASS: u32 = 3;
pub const TOKEN_STATISTICS_CLASS: u32 = 10;
pub const TOKEN_ELEVATION_CLASS: u32 = 20;
pub const TOKEN_INTEGRITY_LEVEL_CLASS: u32 = 25;

/*────────── filter manager ─────────*/

pub const FLT_REGISTRATION_VERSION: u16 = 0x0203;
pub const FLTFL_REGISTRATION_SUPPORT_NPFS_MSFS: u32 = 0x0000_0002;
pub const FLTFL_REGISTRATION_SUPPORT_DAX_VOLUME: u32 = 0x0000_0004;
pub const IRP_MJ_OPERATION_END: u8 = 0x80;

pub const FLT_PREOP_SUCCESS_NO_CALLBACK: i32 = 1;
pub const FLTFL_FILTER_UNLOAD_MANDATORY: u32 = 0x0000_0001;
pub const STATUS_FLT_DO_NOT_DETACH: i32 = 0xC01C_0010_u32 as i32;

pub const FLT_FILE_NAME_NORMALIZED: u32 = 0x0000_0001;
pub const FLT_FILE_NAME_OPENED: u32 = 0x0000_0002;
pub const FLT_FILE_NAME_QUERY_DEFAULT: u32 = 0x0000_0100;

/// Registry callback altitude, in the activity-monitor range the minifilter also uses.
pub const REGISTRY_ALTITUDE: &str = "370030";

/// `IRP_PAGING_IO`: paging requests run where name queries are not allowed.
pub const IRP_PAGING_IO: u32 = 0x0000_0002;
