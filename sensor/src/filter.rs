//! One queue per event kind, plus the counters the stats request reports.

use alloc::boxed::Box;
use core::sync::atomic::{AtomicU64, Ordering};

use vigil_shared::wire::{PoolClass, WireQueueStats};

use crate::error::{ExportError, InsertError, QueueError};
use crate::events::{self, CapturableEvent, CaptureEnv, Captured};
use crate::export::UserBuffer;
use crate::process::ProcessRegistry;
use crate::queue::EventQueue;
use crate::time::Clock;

/// What [`Filter::record`] did with a callback.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Recorded {
    Queued,
    /// Causing process not tracked.
    Skipped,
    /// Operation class not selected for this filter.
    Filtered,
    /// Capture or insert failed; logged and dropped.
    Failed,
}

/// What [`Filter::export_next`] copied.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Exported {
    Copied(usize),
    Empty,
}

pub struct Filter<E: CapturableEvent> {
    queue: EventQueue<Box<E>>,
    pool: PoolClass,
    captured: AtomicU64,
    skipped: AtomicU64,
    failed: AtomicU64,
}

impl<E: CapturableEvent> Filter<E> {
    pub fn new(capacity: usize, pool: PoolClass) -> Result<Self, QueueError> {
        Ok(Self {
            queue: EventQueue::new(capacity)?,
            pool,
            captured: AtomicU64::new(0),
            skipped: AtomicU64::new(0),
            failed: AtomicU64::new(0),
        })
    }

    /// Capture from `ctx` and queue the result. Failures never reach the caller: the callback
    /// that fed us has nothing useful to do with them.
    pub fn record(&self, registry: &ProcessRegistry, clock: &dyn Clock, ctx: E::Context<'_>) -> Recorded {
        let env = CaptureEnv { registry, clock, pool: self.pool };
        let event = match E::capture(&env, ctx) {
            Ok(Captured::Event(event)) => event,
            Ok(Captured::Skipped) => {
                self.skipped.fetch_add(1, Ordering::Relaxed);
                return Recorded::Skipped;
            }
            Err(err) => {
                self.failed.fetch_add(1, Ordering::Relaxed);
                log::warn!("{} capture failed: {err}", E::KIND.as_str());
                return Recorded::Failed;
            }
        };

        match self.queue.insert(event) {
            Ok(()) => {
                self.captured.fetch_add(1, Ordering::Relaxed);
                Recorded::Queued
            }
            Err(InsertError(event)) => {
                self.failed.fetch_add(1, Ordering::Relaxed);
                log::warn!("{} queue slot allocation failed, event dropped", E::KIND.as_str());
                events::destroy(&mut Some(event));
                Recorded::Failed
            }
        }
    }

    /// Count a failure that happened before capture could start.
    pub(crate) fn fail(&self) -> Recorded {
        self.failed.fetch_add(1, Ordering::Relaxed);
        Recorded::Failed
    }

    /// Pop the oldest event and copy it into `dst`. The event is destroyed whether or not the
    /// copy succeeded.
    pub fn export_next(&self, dst: &mut dyn UserBuffer) -> Result<Exported, ExportError> {
        let mut slot = self.queue.remove_oldest();
        let result = match &slot {
            Some(event) => event.export(dst).map(Exported::Copied),
            None => Ok(Exported::Empty),
        };
        events::destroy(&mut slot);
        if let Err(err) = &result {
            log::debug!("{} export failed: {err}", E::KIND.as_str());
        }
        result
    }

    /// Destroy every queued event; returns how many there were.
    pub fn drain(&self) -> usize {
        self.queue.drain()
    }

    pub fn len(&self) -> usize {
        self.queue.len()
    }

    pub fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }

    pub fn pool(&self) -> PoolClass {
        self.pool
    }

    pub fn stats(&self) -> WireQueueStats {
        WireQueueStats {
            queued: self.queue.len() as u64,
            capacity: self.queue.capacity() as u64,
            captured: self.captured.load(Ordering::Relaxed),
            skipped: self.skipped.load(Ordering::Relaxed),
            failed: self.failed.load(Ordering::Relaxed),
            evicted: self.queue.evicted(),
        }
    }
}
