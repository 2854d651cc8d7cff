use alloc::boxed::Box;
use core::mem::offset_of;

use vigil_shared::wire::{EventKind, PoolClass, WireProcessEvent};

use crate::error::{CaptureError, ExportError};
use crate::events::{CapturableEvent, CaptureEnv, Captured};
use crate::export::{FieldWriter, UserBuffer};
use crate::platform::ProcessSource;
use crate::process::ProcessRef;
use crate::time::EventTime;

/// A start or exit notification for `process`.
pub struct ProcessNotification<'a> {
    pub process: &'a dyn ProcessSource,
    pub created: bool,
}

/// Start or exit of a tracked process.
#[derive(Debug)]
pub struct ProcessLifecycleEvent {
    process: ProcessRef,
    time: EventTime,
    created: bool,
    pool: PoolClass,
}

impl ProcessLifecycleEvent {
    pub fn created(&self) -> bool {
        self.created
    }
}

impl CapturableEvent for ProcessLifecycleEvent {
    const KIND: EventKind = EventKind::Process;

    type Context<'a> = ProcessNotification<'a>;

    /// On exit the token is re-read first, so the event carries the state the process died with.
    /// The record must still be tracked at that point.
    fn capture(env: &CaptureEnv<'_>, ctx: ProcessNotification<'_>) -> Result<Captured<Self>, CaptureError> {
        let Some(process) = env.registry.lookup(ctx.process.pid()) else {
            return Ok(Captured::Skipped);
        };
        if !ctx.created {
            process.refresh_token(ctx.process)?;
        }

        Ok(Captured::Event(Box::new(Self {
            process,
            time: env.clock.now(),
            created: ctx.created,
            pool: env.pool,
        })))
    }

    fn export(&self, dst: &mut dyn UserBuffer) -> Result<usize, ExportError> {
        let mut w = FieldWriter::record(dst, Self::KIND, self.pool)?;
        self.time.export(&mut w.nested(offset_of!(WireProcessEvent, time)))?;
        self.process.export(&mut w.nested(offset_of!(WireProcessEvent, process)))?;
        w.put(offset_of!(WireProcessEvent, created), &u32::from(self.created))?;
        Ok(Self::KIND.record_size())
    }

    fn process(&self) -> &ProcessRef {
        &self.process
    }

    fn time(&self) -> &EventTime {
        &self.time
    }

    fn pool(&self) -> PoolClass {
        self.pool
    }
}
