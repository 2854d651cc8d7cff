//! Copying records into the consumer's buffer.
//!
//! Records are written field by field at their `#[repr(C)]` offsets. Each write goes through
//! [`UserBuffer::write_at`], which refuses ranges it cannot write, so a bad buffer stops the copy
//! with [`ExportError::Fault`] instead of spilling into unrelated memory. The record's range is
//! zeroed before any field lands, so bytes the record does not set read back as zero.

use zerocopy::{Immutable, IntoBytes};

use vigil_shared::wire::{EventKind, PoolClass, WireHeader};

use crate::error::ExportError;

/// Destination owned by the requesting caller.
pub trait UserBuffer {
    fn capacity(&self) -> usize;

    /// Copy `bytes` to `offset`. Nothing is written when the range is not writable.
    fn write_at(&mut self, offset: usize, bytes: &[u8]) -> Result<(), ExportError>;
}

/// A buffer the caller already handed over as a byte slice: the driver's `METHOD_BUFFERED`
/// system buffer, or a plain `Vec` on the host.
pub struct SliceBuffer<'a> {
    bytes: &'a mut [u8],
}

impl<'a> SliceBuffer<'a> {
    pub fn new(bytes: &'a mut [u8]) -> Self {
        Self { bytes }
    }
}

impl UserBuffer for SliceBuffer<'_> {
    fn capacity(&self) -> usize {
        self.bytes.len()
    }

    fn write_at(&mut self, offset: usize, bytes: &[u8]) -> Result<(), ExportError> {
        let end = offset
            .checked_add(bytes.len())
            .filter(|&end| end <= self.bytes.len())
            .ok_or(ExportError::Fault { offset })?;
        self.bytes[offset..end].copy_from_slice(bytes);
        Ok(())
    }
}

/// Writes fields relative to `base` inside a claimed record.
pub struct FieldWriter<'a, B: ?Sized> {
    dst: &'a mut B,
    base: usize,
}

impl<'a, B: UserBuffer + ?Sized> FieldWriter<'a, B> {
    /// Claim the first `size` bytes of `dst` and zero them.
    pub fn zeroed(dst: &'a mut B, size: usize) -> Result<Self, ExportError> {
        const ZEROS: [u8; 256] = [0; 256];

        let available = dst.capacity();
        if available < size {
            return Err(ExportError::BufferTooSmall { required: size, available });
        }
        let mut offset = 0;
        while offset < size {
            let chunk = (size - offset).min(ZEROS.len());
            dst.write_at(offset, &ZEROS[..chunk])?;
            offset += chunk;
        }
        Ok(Self { dst, base: 0 })
    }

    /// Claim an event record of `kind` and write its header.
    pub fn record(dst: &'a mut B, kind: EventKind, pool: PoolClass) -> Result<Self, ExportError> {
        let size = kind.record_size();
        let mut w = Self::zeroed(dst, size)?;
        let header = WireHeader {
            kind: kind as u32,
            size: size as u32,
            pool: pool as u32,
            reserved: 0,
        };
        w.put(0, &header)?;
        Ok(w)
    }

    pub fn put<T: IntoBytes + Immutable + ?Sized>(
        &mut self,
        offset: usize,
        value: &T,
    ) -> Result<(), ExportError> {
        self.dst.write_at(self.base + offset, value.as_bytes())
    }

    /// Writer for a sub-block starting at `offset`.
    pub fn nested(&mut self, offset: usize) -> FieldWriter<'_, B> {
        FieldWriter {
            dst: &mut *self.dst,
            base: self.base + offset,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn slice_buffer_refuses_out_of_range_writes() {
        let mut bytes = [0xFFu8; 8];
        let mut buf = SliceBuffer::new(&mut bytes);
        assert_eq!(buf.write_at(6, &[1, 2, 3]), Err(ExportError::Fault { offset: 6 }));
        assert_eq!(buf.write_at(usize::MAX, &[1]), Err(ExportError::Fault { offset: usize::MAX }));
        buf.write_at(5, &[1, 2, 3]).unwrap();
        assert_eq!(bytes, [0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 1, 2, 3]);
    }

    #[test]
    fn record_zeroes_its_range_and_writes_the_header() {
        let size = EventKind::Process.record_size();
        let mut bytes = vec![0xAAu8; size + 4];
        let mut buf = SliceBuffer::new(&mut bytes);
        FieldWriter::record(&mut buf, EventKind::Process, PoolClass::Paged).unwrap();

        assert_eq!(&bytes[..4], &2u32.to_ne_bytes());
        assert_eq!(&bytes[4..8], &(size as u32).to_ne_bytes());
        assert_eq!(&bytes[8..12], &1u32.to_ne_bytes());
        assert!(bytes[16..size].iter().all(|&b| b == 0));
        assert_eq!(&bytes[size..], &[0xAA; 4]);
    }

    #[test]
    fn nested_writers_offset_from_their_parent() {
        let mut bytes = [0u8; 16];
        let mut buf = SliceBuffer::new(&mut bytes);
        let mut w = FieldWriter::zeroed(&mut buf, 16).unwrap();
        w.nested(8).nested(4).put(0, &0xDEADBEEFu32).unwrap();
        assert_eq!(&bytes[12..], &0xDEADBEEFu32.to_ne_bytes());
    }

    #[test]
    fn short_buffer_is_reported_before_any_write() {
        let mut bytes = [7u8; 10];
        let mut buf = SliceBuffer::new(&mut bytes);
        assert!(matches!(
            FieldWriter::zeroed(&mut buf, 11),
            Err(ExportError::BufferTooSmall { required: 11, available: 10 })
        ));
        assert_eq!(bytes, [7; 10]);
    }
}
