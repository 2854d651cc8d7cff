use alloc::sync::{Arc, Weak};
use core::mem::offset_of;
use core::ops::Deref;
use core::sync::atomic::{AtomicBool, Ordering};

use spin::Mutex;
use vigil_shared::wire::{PoolClass, WideName, WireProcess};

use crate::Pid;
use crate::error::{CaptureError, ExportError, PlatformError};
use crate::export::{FieldWriter, UserBuffer};
use crate::platform::ProcessSource;
use crate::process::TokenSnapshot;

/// Identity and security context of one monitored process.
///
/// Lives behind a [`ProcessRef`]: the registry holds one while the process is tracked, and every
/// queued event that names the process holds another. The record is freed when the last one
/// goes, which can be well after the process exited.
#[derive(Debug)]
pub struct ProcessRecord {
    pid: Pid,
    ppid: Pid,
    session_id: u32,
    image: WideName,
    token: Mutex<TokenSnapshot>,
    retired: AtomicBool,
    pool: PoolClass,
}

impl ProcessRecord {
    /// Snapshot `source`. The record is not tracked until handed to the registry.
    pub fn create(pool: PoolClass, source: &dyn ProcessSource) -> Result<Self, PlatformError> {
        Ok(Self {
            pid: source.pid(),
            ppid: source.parent_pid(),
            session_id: source.session_id()?,
            image: source.image_name()?,
            token: Mutex::new(TokenSnapshot::capture(source)?),
            retired: AtomicBool::new(false),
            pool,
        })
    }

    pub fn pid(&self) -> Pid {
        self.pid
    }

    pub fn parent_pid(&self) -> Pid {
        self.ppid
    }

    pub fn session_id(&self) -> u32 {
        self.session_id
    }

    pub fn image(&self) -> &WideName {
        &self.image
    }

    pub fn pool(&self) -> PoolClass {
        self.pool
    }

    /// Removed from the registry; only outstanding events keep it alive.
    pub fn is_retired(&self) -> bool {
        self.retired.load(Ordering::Acquire)
    }

    /// Copy of the current token state.
    pub fn token(&self) -> TokenSnapshot {
        self.token.lock().clone()
    }

    /// Re-read the token from the live process. Refused once the record is retired.
    ///
    /// The retired check and the write happen under the token lock, which [`retire`](Self::retire)
    /// also takes, so a record is never written after it was retired. `source` must not call
    /// back into the registry.
    pub fn refresh_token(&self, source: &dyn ProcessSource) -> Result<(), CaptureError> {
        let mut token = self.token.lock();
        if self.is_retired() {
            drop(token);
            log::warn!("refusing token refresh for retired process {}", self.pid);
            return Err(CaptureError::Retired(self.pid));
        }
        token.refresh(source)?;
        Ok(())
    }

    /// Waits out a refresh already holding the token lock.
    pub(crate) fn retire(&self) {
        let _token = self.token.lock();
        self.retired.store(true, Ordering::Release);
    }

    pub(crate) fn export<B: UserBuffer + ?Sized>(
        &self,
        w: &mut FieldWriter<'_, B>,
    ) -> Result<(), ExportError> {
        w.put(offset_of!(WireProcess, pid), &self.pid)?;
        w.put(offset_of!(WireProcess, ppid), &self.ppid)?;
        w.put(offset_of!(WireProcess, session_id), &self.session_id)?;
        w.put(offset_of!(WireProcess, image), &self.image)?;

        let token = self.token.lock();
        token.export(&mut w.nested(offset_of!(WireProcess, token)))
    }
}

impl Drop for ProcessRecord {
    fn drop(&mut self) {
        log::trace!("process {} record freed", self.pid);
    }
}

/// Owning reference to a [`ProcessRecord`]; the record stays alive while any exists.
///
/// Functions that would clash with record methods are associated functions, as on `Arc`.
#[derive(Debug, Clone)]
pub struct ProcessRef(Arc<ProcessRecord>);

impl ProcessRef {
    pub(crate) fn new(record: ProcessRecord) -> Self {
        Self(Arc::new(record))
    }

    /// Live references, the registry's included.
    pub fn ref_count(this: &Self) -> usize {
        Arc::strong_count(&this.0)
    }

    pub fn ptr_eq(a: &Self, b: &Self) -> bool {
        Arc::ptr_eq(&a.0, &b.0)
    }

    /// Non-owning handle that reports whether the record has been freed.
    pub fn downgrade(this: &Self) -> Weak<ProcessRecord> {
        Arc::downgrade(&this.0)
    }

    pub fn as_ptr(this: &Self) -> *const ProcessRecord {
        Arc::as_ptr(&this.0)
    }
}

impl Deref for ProcessRef {
    type Target = ProcessRecord;

    fn deref(&self) -> &ProcessRecord {
        &self.0
    }
}
