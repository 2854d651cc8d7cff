//! Kernel routines and structures `wdk-sys` does not generate bindings for.
//!
//! Filter-manager types carry only the fields this driver reads; everything after the last used
//! field is left out, so they must only ever be handled through pointers the system gave us.

#![allow(non_snake_case, non_camel_case_types)]

use core::ffi::c_void;

use wdk_sys::{
    HANDLE, LARGE_INTEGER, NTSTATUS, PDRIVER_OBJECT, PEPROCESS, PUNICODE_STRING, UNICODE_STRING,
};

pub type PACCESS_TOKEN = *mut c_void;
pub type PSID = *mut c_void;
pub type PFLT_FILTER = *mut c_void;
pub type PFLT_INSTANCE = *mut c_void;

/*────────────────── tokens ─────────────────*/

#[repr(C)]
#[derive(Clone, Copy)]
pub struct LUID {
    pub LowPart: u32,
    pub HighPart: i32,
}

impl LUID {
    pub fn as_u64(self) -> u64 {
        (u64::from(self.HighPart as u32) << 32) | u64::from(self.LowPart)
    }
}

#[repr(C, packed(4))]
#[derive(Clone, Copy)]
pub struct LUID_AND_ATTRIBUTES {
    pub Luid: LUID,
    pub Attributes: u32,
}

#[repr(C)]
pub struct TOKEN_PRIVILEGES {
    pub PrivilegeCount: u32,
    pub Privileges: [LUID_AND_ATTRIBUTES; 1],
}

#[repr(C)]
pub struct TOKEN_STATISTICS {
    pub TokenId: LUID,
    pub AuthenticationId: LUID,
    pub ExpirationTime: LARGE_INTEGER,
    pub TokenType: u32,
    pub ImpersonationLevel: u32,
    pub DynamicCharged: u32,
    pub DynamicAvailable: u32,
    pub GroupCount: u32,
    pub PrivilegeCount: u32,
    pub ModifiedId: LUID,
}

#[repr(C)]
pub struct TOKEN_ELEVATION {
    pub TokenIsElevated: u32,
}

#[repr(C)]
pub struct SID_AND_ATTRIBUTES {
    pub Sid: PSID,
    pub Attributes: u32,
}

#[repr(C)]
pub struct TOKEN_MANDATORY_LABEL {
    pub Label: SID_AND_ATTRIBUTES,
}

/*────────────────── filter manager ─────────────────*/

#[repr(C)]
pub struct FLT_IO_PARAMETER_BLOCK {
    pub IrpFlags: u32,
    pub MajorFunction: u8,
    pub MinorFunction: u8,
    pub OperationFlags: u8,
    pub Reserved: u8,
    pub TargetFileObject: *mut c_void,
    pub TargetInstance: PFLT_INSTANCE,
    /// `FLT_PARAMETERS` union; read through [`FLT_IO_PARAMETER_BLOCK::parameter_u32`].
    pub Parameters: [u64; 5],
}

impl FLT_IO_PARAMETER_BLOCK {
    /// The 4-byte aligned `u32` at byte `offset` of the parameter union (little endian).
    pub fn parameter_u32(&self, offset: usize) -> u32 {
        let word = self.Parameters[offset / 8];
        (word >> ((offset % 8) * 8)) as u32
    }
}

#[repr(C)]
pub struct FLT_CALLBACK_DATA {
    pub Flags: u32,
    pub Thread: *mut c_void,
    pub Iopb: *mut FLT_IO_PARAMETER_BLOCK,
}

pub type PFLT_CALLBACK_DATA = *mut FLT_CALLBACK_DATA;

#[repr(C)]
pub struct FLT_FILE_NAME_INFORMATION {
    pub Size: u16,
    pub NamesParsed: u16,
    pub Format: u32,
    pub Name: UNICODE_STRING,
    pub Volume: UNICODE_STRING,
    pub Share: UNICODE_STRING,
    pub Extension: UNICODE_STRING,
    pub Stream: UNICODE_STRING,
    pub FinalComponent: UNICODE_STRING,
    pub ParentDir: UNICODE_STRING,
}

pub type PFLT_FILE_NAME_INFORMATION = *mut FLT_FILE_NAME_INFORMATION;

pub type PFLT_PRE_OPERATION_CALLBACK = unsafe extern "C" fn(
    data: PFLT_CALLBACK_DATA,
    objects: *const c_void,
    completion_context: *mut *mut c_void,
) -> i32;

pub type PFLT_FILTER_UNLOAD_CALLBACK = unsafe extern "C" fn(flags: u32) -> NTSTATUS;

#[repr(C)]
pub struct FLT_OPERATION_REGISTRATION {
    pub MajorFunction: u8,
    pub Flags: u32,
    pub PreOperation: Option<PFLT_PRE_OPERATION_CALLBACK>,
    pub PostOperation: *const c_void,
    pub Reserved1: *mut c_void,
}

#[repr(C)]
pub struct FLT_REGISTRATION {
    pub Size: u16,
    pub Version: u16,
    pub Flags: u32,
    pub ContextRegistration: *const c_void,
    pub OperationRegistration: *const FLT_OPERATION_REGISTRATION,
    pub FilterUnloadCallback: Option<PFLT_FILTER_UNLOAD_CALLBACK>,
    pub InstanceSetupCallback: *const c_void,
    pub InstanceQueryTeardownCallback: *const c_void,
    pub InstanceTeardownStartCallback: *const c_void,
    pub InstanceTeardownCompleteCallback: *const c_void,
    pub GenerateFileNameCallback: *const c_void,
    pub NormalizeNameComponentCallback: *const c_void,
    pub NormalizeContextCleanupCallback: *const c_void,
    pub TransactionNotificationCallback: *const c_void,
    pub NormalizeNameComponentExCallback: *const c_void,
    pub SectionNotificationCallback: *const c_void,
}

/*────────────────── registry callbacks ─────────────────*/

/// `REG_CREATE_KEY_INFORMATION` and `REG_OPEN_KEY_INFORMATION` share this prefix.
#[repr(C)]
pub struct REG_CREATE_KEY_INFORMATION {
    pub CompleteName: PUNICODE_STRING,
    pub RootObject: *mut c_void,
}

/// Prefix shared by the delete, set-value, delete-value and rename key structures.
#[repr(C)]
pub struct REG_KEY_OBJECT_INFORMATION {
    pub Object: *mut c_void,
    /// `ValueName` for value operations, `NewName` for renames, unused for key deletion.
    pub Name: PUNICODE_STRING,
}

/*────────────────── routines ─────────────────*/

#[link(name = "ntoskrnl")]
unsafe extern "system" {
    pub fn PsLookupProcessByProcessId(process_id: HANDLE, process: *mut PEPROCESS) -> NTSTATUS;
    pub fn PsGetProcessInheritedFromUniqueProcessId(process: PEPROCESS) -> HANDLE;
    pub fn PsGetProcessSessionId(process: PEPROCESS) -> u32;
    pub fn PsReferencePrimaryToken(process: PEPROCESS) -> PACCESS_TOKEN;
    pub fn PsDereferencePrimaryToken(token: PACCESS_TOKEN);
    pub fn SeQueryInformationToken(token: PACCESS_TOKEN, class: u32, information: *mut *mut c_void) -> NTSTATUS;
    pub fn SeLocateProcessImageName(process: PEPROCESS, image: *mut PUNICODE_STRING) -> NTSTATUS;
    pub fn RtlSubAuthorityCountSid(sid: PSID) -> *mut u8;
    pub fn RtlSubAuthoritySid(sid: PSID, index: u32) -> *mut u32;
    pub fn CmCallbackGetKeyObjectIDEx(
        cookie: *const LARGE_INTEGER,
        object: *mut c_void,
        object_id: *mut usize,
        object_name: *mut PUNICODE_STRING,
        flags: u32,
    ) -> NTSTATUS;
    pub fn CmCallbackReleaseKeyObjectIDEx(object_name: PUNICODE_STRING);
}

#[link(name = "fltmgr")]
unsafe extern "system" {
    pub fn FltRegisterFilter(
        driver: PDRIVER_OBJECT,
        registration: *const FLT_REGISTRATION,
        filter: *mut PFLT_FILTER,
    ) -> NTSTATUS;
    pub fn FltStartFiltering(filter: PFLT_FILTER) -> NTSTATUS;
    pub fn FltUnregisterFilter(filter: PFLT_FILTER);
    pub fn FltGetRequestorProcess(data: PFLT_CALLBACK_DATA) -> PEPROCESS;
    pub fn FltGetFileNameInformation(
        data: PFLT_CALLBACK_DATA,
        options: u32,
        information: *mut PFLT_FILE_NAME_INFORMATION,
    ) -> NTSTATUS;
    pub fn FltParseFileNameInformation(information: PFLT_FILE_NAME_INFORMATION) -> NTSTATUS;
    pub fn FltReleaseFileNameInformation(information: PFLT_FILE_NAME_INFORMATION);
}
