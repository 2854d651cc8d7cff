use alloc::vec::Vec;
use core::slice;

use wdk_sys::{NTSTATUS, UNICODE_STRING};

/// A `UNICODE_STRING` together with the UTF-16 buffer it points into.
///
/// The buffer lives as long as this value, so `as_ptr` stays valid for calls made while it is
/// in scope.
pub struct OwnedUnicode {
    _wide: Vec<u16>,
    string: UNICODE_STRING,
}

impl OwnedUnicode {
    pub fn as_ptr(&self) -> *const UNICODE_STRING {
        &self.string
    }

    pub fn as_mut_ptr(&mut self) -> *mut UNICODE_STRING {
        &mut self.string
    }
}

/// Converts a Rust string slice into a `UNICODE_STRING` that owns its buffer.
pub fn make_unicode(s: &str) -> OwnedUnicode {
    let mut wide: Vec<u16> = s.encode_utf16().collect();
    let bytes = (wide.len() * 2) as u16;
    let string = UNICODE_STRING {
        Length: bytes,
        MaximumLength: bytes,
        Buffer: wide.as_mut_ptr(),
    };
    OwnedUnicode { _wide: wide, string }
}

/// UTF-16 code units of a kernel `UNICODE_STRING`; empty for a null pointer.
///
/// # Safety
/// `uni` must be null or point to an initialised string that outlives `'a`.
pub unsafe fn unicode_units<'a>(uni: *const UNICODE_STRING) -> &'a [u16] {
    if uni.is_null() {
        return &[];
    }
    let u = unsafe { &*uni };
    if u.Buffer.is_null() || u.Length == 0 {
        return &[];
    }
    // SAFETY: buffer points to `Length / 2` UTF-16 code units.
    unsafe { slice::from_raw_parts(u.Buffer, usize::from(u.Length / 2)) }
}

/// `NT_SUCCESS`.
#[inline]
pub fn nt_success(status: NTSTATUS) -> bool {
    status >= 0
}
