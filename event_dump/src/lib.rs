//! Decoding and printing of records exported by the Vigil sensor.
//!
//! Records come either from a capture file (exported records written back to back) or, on
//! Windows, straight from the control device.

#[cfg(windows)]
pub mod device;
pub mod render;

use vigil_shared::wire::{DecodeError, Record};

/// Iterator over the records in a capture. Stops after the first decode error.
pub struct Records<'a> {
    bytes: &'a [u8],
    offset: usize,
    failed: bool,
}

/// Walk the records stored back to back in `bytes`.
pub fn records(bytes: &[u8]) -> Records<'_> {
    Records { bytes, offset: 0, failed: false }
}

impl Records<'_> {
    /// Byte offset of the next record.
    pub fn offset(&self) -> usize {
        self.offset
    }
}

impl Iterator for Records<'_> {
    type Item = Result<Record, DecodeError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.failed || self.offset >= self.bytes.len() {
            return None;
        }
        match Record::decode(&self.bytes[self.offset..]) {
            Ok((record, used)) => {
                self.offset += used;
                Some(Ok(record))
            }
            Err(err) => {
                self.failed = true;
                Some(Err(err))
            }
        }
    }
}
