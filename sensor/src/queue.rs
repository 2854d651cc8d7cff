//! Bounded event queue with drop-oldest eviction.

use alloc::collections::VecDeque;
use core::sync::atomic::{AtomicU64, Ordering};

use spin::Mutex;

use crate::error::{InsertError, QueueError};

/// Smallest step the slot buffer grows by.
const MIN_GROWTH: usize = 16;

/// Fixed-capacity FIFO shared by producers in callback context and the single export consumer.
///
/// Payloads enter at the head and leave from the tail. A full queue drops its tail payload
/// (running its destructor under the lock) before the new one goes in, so a slow consumer sees
/// gaps but never reordering or duplicates.
///
/// Slot storage grows on demand up to `capacity` with fallible reservation; a failed reservation
/// hands the payload back instead of consuming it.
pub struct EventQueue<T> {
    slots: Mutex<VecDeque<T>>,
    capacity: usize,
    evicted: AtomicU64,
}

impl<T> EventQueue<T> {
    pub fn new(capacity: usize) -> Result<Self, QueueError> {
        if capacity == 0 {
            return Err(QueueError::ZeroCapacity);
        }
        Ok(Self {
            slots: Mutex::new(VecDeque::new()),
            capacity,
            evicted: AtomicU64::new(0),
        })
    }

    /// Push `item` as the newest entry, evicting the oldest one when full.
    ///
    /// Amortized O(1). While the queue is still below `capacity`, an insert that finds the slot
    /// buffer full grows it under the lock, moving at most `capacity` entries. Once the buffer
    /// reaches `capacity` it never grows again.
    pub fn insert(&self, item: T) -> Result<(), InsertError<T>> {
        let mut slots = self.slots.lock();
        if slots.len() == self.capacity {
            drop(slots.pop_back());
            self.evicted.fetch_add(1, Ordering::Relaxed);
            log::trace!("queue full ({}), oldest event dropped", self.capacity);
        } else if slots.len() == slots.capacity() {
            let grow = slots.len().max(MIN_GROWTH).min(self.capacity - slots.len());
            if slots.try_reserve_exact(grow).is_err() {
                return Err(InsertError(item));
            }
        }
        slots.push_front(item);
        Ok(())
    }

    /// Take the oldest entry, if any.
    pub fn remove_oldest(&self) -> Option<T> {
        self.slots.lock().pop_back()
    }

    /// Drop every queued entry, oldest first, and report how many there were.
    pub fn drain(&self) -> usize {
        let mut drained = 0;
        while let Some(item) = self.remove_oldest() {
            drop(item);
            drained += 1;
        }
        drained
    }

    pub fn len(&self) -> usize {
        self.slots.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.lock().is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Entries dropped by eviction since creation.
    pub fn evicted(&self) -> u64 {
        self.evicted.load(Ordering::Relaxed)
    }
}

impl<T> Drop for EventQueue<T> {
    fn drop(&mut self) {
        let drained = self.drain();
        if drained > 0 {
            log::debug!("queue destroyed with {drained} unexported events");
        }
    }
}
