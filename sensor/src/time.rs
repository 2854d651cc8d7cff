//! Capture timestamps.

use core::mem::offset_of;

use vigil_shared::wire::WireTime;

use crate::error::ExportError;
use crate::export::{FieldWriter, UserBuffer};

/// When an event was captured. Wall-clock fields count 100 ns ticks since 1601-01-01.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct EventTime {
    pub system_time: i64,
    pub local_time: i64,
    /// Processor timestamp counter at capture.
    pub counter: u64,
}

impl EventTime {
    pub(crate) fn export<B: UserBuffer + ?Sized>(
        &self,
        w: &mut FieldWriter<'_, B>,
    ) -> Result<(), ExportError> {
        w.put(offset_of!(WireTime, system_time), &self.system_time)?;
        w.put(offset_of!(WireTime, local_time), &self.local_time)?;
        w.put(offset_of!(WireTime, counter), &self.counter)
    }
}

/// Source of capture timestamps. Must be callable from any callback context.
pub trait Clock: Send + Sync {
    fn now(&self) -> EventTime;
}

/// Host clock: UTC for both wall-clock fields and a process-wide sequence as the counter.
#[cfg(feature = "std")]
#[derive(Debug, Default)]
pub struct SystemClock {
    sequence: core::sync::atomic::AtomicU64,
}

#[cfg(feature = "std")]
impl Clock for SystemClock {
    fn now(&self) -> EventTime {
        use std::time::{SystemTime, UNIX_EPOCH};

        let since_epoch = SystemTime::now().duration_since(UNIX_EPOCH).unwrap_or_default();
        let ticks = vigil_shared::wire::unix_to_filetime(
            since_epoch.as_secs() as i64,
            since_epoch.subsec_nanos(),
        );
        EventTime {
            system_time: ticks,
            local_time: ticks,
            counter: self.sequence.fetch_add(1, core::sync::atomic::Ordering::Relaxed),
        }
    }
}

#[cfg(all(test, feature = "std"))]
mod tests {
    use super::*;

    #[test]
    fn system_clock_moves_forward() {
        let clock = SystemClock::default();
        let first = clock.now();
        let second = clock.now();
        assert!(second.system_time >= first.system_time);
        assert_eq!(second.counter, first.counter + 1);

        let (secs, _) = vigil_shared::wire::filetime_to_unix(first.system_time);
        assert!(secs > 1_600_000_000);
    }
}
