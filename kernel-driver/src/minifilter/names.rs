//! File names from the filter manager.

use vigil_sensor::error::PlatformError;
use vigil_sensor::platform::{FileName, NameForm, NameResolver};

use crate::consts::{FLT_FILE_NAME_NORMALIZED, FLT_FILE_NAME_OPENED, FLT_FILE_NAME_QUERY_DEFAULT};
use crate::ffi::{
    FltGetFileNameInformation, FltParseFileNameInformation, FltReleaseFileNameInformation, PFLT_CALLBACK_DATA,
    PFLT_FILE_NAME_INFORMATION,
};
use crate::helpers::{nt_success, unicode_units};

/// Resolves names for the operation described by one callback data block.
pub struct FltNames {
    data: PFLT_CALLBACK_DATA,
}

impl FltNames {
    pub fn new(data: PFLT_CALLBACK_DATA) -> Self {
        Self { data }
    }
}

/// Referenced name information; released on drop.
struct NameInformation(PFLT_FILE_NAME_INFORMATION);

impl Drop for NameInformation {
    fn drop(&mut self) {
        unsafe { FltReleaseFileNameInformation(self.0) };
    }
}

impl NameResolver for FltNames {
    fn with_name(&self, form: NameForm, visit: &mut dyn FnMut(FileName<'_>)) -> Result<(), PlatformError> {
        let format = match form {
            NameForm::Normalized => FLT_FILE_NAME_NORMALIZED,
            NameForm::Opened => FLT_FILE_NAME_OPENED,
        };
        let mut info: PFLT_FILE_NAME_INFORMATION = core::ptr::null_mut();
        let status = unsafe { FltGetFileNameInformation(self.data, format | FLT_FILE_NAME_QUERY_DEFAULT, &mut info) };
        if !nt_success(status) {
            return Err(PlatformError::NameUnavailable { status });
        }
        let info = NameInformation(info);

        let status = unsafe { FltParseFileNameInformation(info.0) };
        if !nt_success(status) {
            return Err(PlatformError::NameUnavailable { status });
        }
        // SAFETY: the name information stays referenced until `info` drops after the visit.
        let (path, final_component) = unsafe { (unicode_units(&(*info.0).Name), unicode_units(&(*info.0).FinalComponent)) };
        visit(FileName { path, final_component });
        Ok(())
    }
}
