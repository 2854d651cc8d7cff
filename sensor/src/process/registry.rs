use alloc::collections::BTreeMap;
use alloc::collections::btree_map::Entry;
use core::mem;

use spin::Mutex;
use thiserror::Error;

use crate::Pid;
use crate::process::{ProcessRecord, ProcessRef};

/// `track` found the pid already present. The rejected record comes back so the caller can
/// dispose of it.
#[derive(Debug, Error)]
#[error("process {} is already tracked", .0.pid())]
pub struct AlreadyTracked(pub ProcessRecord);

/// Tracked processes by pid.
///
/// Lookups hold the lock only long enough to find the entry (and clone the reference for
/// [`lookup`](Self::lookup)); callers never hold it while touching a queue.
pub struct ProcessRegistry {
    records: Mutex<BTreeMap<Pid, ProcessRef>>,
}

impl ProcessRegistry {
    pub const fn new() -> Self {
        Self { records: Mutex::new(BTreeMap::new()) }
    }

    /// Start tracking `record`. The registry's hold is the record's first reference.
    pub fn track(&self, record: ProcessRecord) -> Result<(), AlreadyTracked> {
        let mut records = self.records.lock();
        match records.entry(record.pid()) {
            Entry::Occupied(_) => Err(AlreadyTracked(record)),
            Entry::Vacant(slot) => {
                slot.insert(ProcessRef::new(record));
                Ok(())
            }
        }
    }

    /// Owning lookup: the returned reference keeps the record alive past this callback.
    pub fn lookup(&self, pid: Pid) -> Option<ProcessRef> {
        self.records.lock().get(&pid).cloned()
    }

    /// Borrowing lookup: `f` sees the record under the registry lock and the reference count
    /// does not move. `f` must not call back into the registry.
    pub fn with_borrowed<R>(&self, pid: Pid, f: impl FnOnce(&ProcessRecord) -> R) -> Option<R> {
        let records = self.records.lock();
        records.get(&pid).map(|record| f(record))
    }

    pub fn is_tracked(&self, pid: Pid) -> bool {
        self.records.lock().contains_key(&pid)
    }

    /// Retire `pid`: mark it, unlink it, then drop the registry's reference outside the lock.
    /// Returns `false` when the pid was not tracked.
    pub fn untrack(&self, pid: Pid) -> bool {
        let removed = {
            let mut records = self.records.lock();
            let removed = records.remove(&pid);
            if let Some(record) = &removed {
                record.retire();
            }
            removed
        };
        match removed {
            Some(record) => {
                log::trace!("process {pid} retired, {} references left", ProcessRef::ref_count(&record) - 1);
                drop(record);
                true
            }
            None => false,
        }
    }

    /// Retire every record; returns how many there were.
    pub fn clear(&self) -> usize {
        let records = mem::take(&mut *self.records.lock());
        for record in records.values() {
            record.retire();
        }
        records.len()
    }

    pub fn len(&self) -> usize {
        self.records.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.lock().is_empty()
    }
}

impl Default for ProcessRegistry {
    fn default() -> Self {
        Self::new()
    }
}
