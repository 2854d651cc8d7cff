use alloc::boxed::Box;
use core::mem::offset_of;

use vigil_shared::ops::RegistryOperation;
use vigil_shared::wire::{EventKind, PoolClass, WideName, WireRegistryEvent};

use crate::Pid;
use crate::error::{CaptureError, ExportError};
use crate::events::{CapturableEvent, CaptureEnv, Captured};
use crate::export::{FieldWriter, UserBuffer};
use crate::process::ProcessRef;
use crate::time::EventTime;

/// One registry callback invocation. Names are absent when the operation carries none.
pub struct RegistryOperationContext<'a> {
    pub requestor: Pid,
    pub operation: RegistryOperation,
    pub key: Option<&'a [u16]>,
    pub value: Option<&'a [u16]>,
}

/// A registry operation by a tracked process. Key and value names longer than the wire bound
/// are truncated and flagged.
#[derive(Debug)]
pub struct RegistryEvent {
    process: ProcessRef,
    time: EventTime,
    operation: RegistryOperation,
    key: WideName,
    value: WideName,
    pool: PoolClass,
}

impl RegistryEvent {
    pub fn operation(&self) -> RegistryOperation {
        self.operation
    }

    pub fn key(&self) -> &WideName {
        &self.key
    }

    pub fn value(&self) -> &WideName {
        &self.value
    }
}

impl CapturableEvent for RegistryEvent {
    const KIND: EventKind = EventKind::Registry;

    type Context<'a> = RegistryOperationContext<'a>;

    fn capture(env: &CaptureEnv<'_>, ctx: RegistryOperationContext<'_>) -> Result<Captured<Self>, CaptureError> {
        let Some(process) = env.registry.lookup(ctx.requestor) else {
            return Ok(Captured::Skipped);
        };

        Ok(Captured::Event(Box::new(Self {
            process,
            time: env.clock.now(),
            operation: ctx.operation,
            key: ctx.key.map(WideName::truncating).unwrap_or_default(),
            value: ctx.value.map(WideName::truncating).unwrap_or_default(),
            pool: env.pool,
        })))
    }

    fn export(&self, dst: &mut dyn UserBuffer) -> Result<usize, ExportError> {
        let mut w = FieldWriter::record(dst, Self::KIND, self.pool)?;
        self.time.export(&mut w.nested(offset_of!(WireRegistryEvent, time)))?;
        self.process.export(&mut w.nested(offset_of!(WireRegistryEvent, process)))?;
        w.put(offset_of!(WireRegistryEvent, operation), &self.operation.notify_class())?;
        w.put(offset_of!(WireRegistryEvent, key), &self.key)?;
        w.put(offset_of!(WireRegistryEvent, value), &self.value)?;
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
