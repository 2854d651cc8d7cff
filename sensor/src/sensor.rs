//! The sensor object: every filter, the process registry and the clock, built once at load
//! and torn down at unload.

use alloc::boxed::Box;
use core::mem::size_of;

use vigil_shared::ops::{OperationSet, RegistryOperation};
use vigil_shared::wire::{EventKind, WireStats};

use crate::Pid;
use crate::config::{SensorConfig, TrackingPolicy};
use crate::error::{CaptureError, ExportError, QueueError, SensorError};
use crate::events::{
    FileOperationContext, FileSystemEvent, ProcessLifecycleEvent, ProcessNotification, RegistryEvent,
    RegistryOperationContext,
};
use crate::export::{FieldWriter, UserBuffer};
use crate::filter::{Exported, Filter, Recorded};
use crate::platform::ProcessSource;
use crate::process::{AlreadyTracked, ProcessRecord, ProcessRegistry};
use crate::time::Clock;

/// Entry points for the driver's callbacks and control device.
///
/// Field order is drop order: the filters go first, so every queued event has released its
/// process reference before the registry is dropped.
pub struct Sensor {
    file_system: Filter<FileSystemEvent>,
    process: Filter<ProcessLifecycleEvent>,
    registry: Filter<RegistryEvent>,
    file_operations: OperationSet,
    registry_operations: OperationSet,
    tracking: TrackingPolicy,
    processes: ProcessRegistry,
    clock: Box<dyn Clock>,
}

fn queue_error(filter: &'static str) -> impl FnOnce(QueueError) -> SensorError {
    move |source| SensorError::Queue { filter, source }
}

impl Sensor {
    pub fn new(config: &SensorConfig, clock: Box<dyn Clock>) -> Result<Self, SensorError> {
        config.validate()?;
        let sensor = Self {
            file_system: Filter::new(config.file_system.capacity, config.file_system.pool)
                .map_err(queue_error("file_system"))?,
            process: Filter::new(config.process.capacity, config.process.pool)
                .map_err(queue_error("process"))?,
            registry: Filter::new(config.registry.capacity, config.registry.pool)
                .map_err(queue_error("registry"))?,
            file_operations: config.file_system.operation_set(),
            registry_operations: config.registry.operation_set(),
            tracking: config.process.tracking,
            processes: ProcessRegistry::new(),
            clock,
        };
        log::info!(
            "sensor ready: queues {}/{}/{}, tracking {:?}",
            config.file_system.capacity,
            config.process.capacity,
            config.registry.capacity,
            sensor.tracking,
        );
        Ok(sensor)
    }

    pub fn processes(&self) -> &ProcessRegistry {
        &self.processes
    }

    pub fn tracking(&self) -> TrackingPolicy {
        self.tracking
    }

    /// Track `process` as a root; its descendants are tracked as they start.
    pub fn watch(&self, process: &dyn ProcessSource) -> Result<(), SensorError> {
        let record = ProcessRecord::create(self.process.pool(), process).map_err(CaptureError::from)?;
        self.processes
            .track(record)
            .map_err(|AlreadyTracked(record)| SensorError::AlreadyTracked(record.pid()))?;
        log::info!("watching process {}", process.pid());
        Ok(())
    }

    /// Stop tracking `pid`. Events already queued for it stay valid.
    pub fn unwatch(&self, pid: Pid) -> Result<(), SensorError> {
        if !self.processes.untrack(pid) {
            return Err(SensorError::NotTracked(pid));
        }
        log::info!("stopped watching process {pid}");
        Ok(())
    }

    /// Process start or exit from the lifecycle notifier.
    pub fn on_process_notify(&self, process: &dyn ProcessSource, created: bool) -> Recorded {
        let ctx = ProcessNotification { process, created };
        if !created {
            // The exit event refreshes the token, which a retired record refuses.
            let recorded = self.process.record(&self.processes, &*self.clock, ctx);
            self.processes.untrack(process.pid());
            return recorded;
        }

        if self.inherits_tracking(process.parent_pid()) {
            let record = match ProcessRecord::create(self.process.pool(), process) {
                Ok(record) => record,
                Err(err) => {
                    log::warn!("process {} not tracked: {err}", process.pid());
                    return self.process.fail();
                }
            };
            if let Err(AlreadyTracked(stale)) = self.processes.track(record) {
                log::error!("process {} started while already tracked", stale.pid());
            }
        }
        self.process.record(&self.processes, &*self.clock, ctx)
    }

    fn inherits_tracking(&self, parent: Pid) -> bool {
        match self.tracking {
            TrackingPolicy::All => true,
            TrackingPolicy::Descendants => {
                self.processes.with_borrowed(parent, |record| !record.is_retired()).unwrap_or(false)
            }
        }
    }

    pub fn on_file_operation(&self, ctx: FileOperationContext<'_>) -> Recorded {
        if !self.file_operations.contains(u32::from(ctx.major_function)) {
            return Recorded::Filtered;
        }
        self.file_system.record(&self.processes, &*self.clock, ctx)
    }

    /// Whether registry operations of this class are recorded at all, so the hook can skip the
    /// key name lookup for the rest.
    pub fn records_registry(&self, operation: RegistryOperation) -> bool {
        self.registry_operations.contains(operation.notify_class())
    }

    pub fn on_registry_operation(&self, ctx: RegistryOperationContext<'_>) -> Recorded {
        if !self.records_registry(ctx.operation) {
            return Recorded::Filtered;
        }
        self.registry.record(&self.processes, &*self.clock, ctx)
    }

    /// Copy the oldest event of `kind` into `dst`.
    pub fn export_next(&self, kind: EventKind, dst: &mut dyn UserBuffer) -> Result<Exported, ExportError> {
        match kind {
            EventKind::FileSystem => self.file_system.export_next(dst),
            EventKind::Process => self.process.export_next(dst),
            EventKind::Registry => self.registry.export_next(dst),
        }
    }

    pub fn stats(&self) -> WireStats {
        WireStats {
            file_system: self.file_system.stats(),
            process: self.process.stats(),
            registry: self.registry.stats(),
            tracked_processes: self.processes.len() as u64,
            reserved: 0,
        }
    }

    pub fn export_stats(&self, dst: &mut dyn UserBuffer) -> Result<usize, ExportError> {
        let size = size_of::<WireStats>();
        FieldWriter::zeroed(dst, size)?.put(0, &self.stats())?;
        Ok(size)
    }
}

impl Drop for Sensor {
    fn drop(&mut self) {
        let drained = self.file_system.drain() + self.process.drain() + self.registry.drain();
        let retired = self.processes.clear();
        log::info!("sensor torn down: {drained} queued events dropped, {retired} processes retired");
    }
}
