use alloc::boxed::Box;
use core::mem::offset_of;

use vigil_shared::wire::{EventKind, PoolClass, WideName, WireFileEvent};

use crate::Pid;
use crate::error::{CaptureError, ExportError, PlatformError};
use crate::events::{CapturableEvent, CaptureEnv, Captured};
use crate::export::{FieldWriter, UserBuffer};
use crate::platform::{FileName, NameForm, NameResolver};
use crate::process::ProcessRef;
use crate::time::EventTime;

/// `STATUS_NOT_FOUND`, reported when a resolver returns without showing a name.
const STATUS_NOT_FOUND: i32 = 0xC000_0225_u32 as i32;

/// One intercepted file-system operation, as the minifilter saw it.
pub struct FileOperationContext<'a> {
    pub requestor: Pid,
    /// `IRP_MJ_*` number.
    pub major_function: u8,
    /// Operation-specific option bits, passed through untouched.
    pub options: u32,
    pub names: &'a dyn NameResolver,
}

/// Path and final component of the target file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileNames {
    pub path: WideName,
    pub name: WideName,
    /// Which name form the resolver produced.
    pub form: NameForm,
}

impl FileNames {
    /// Resolve the normalized name, falling back to the opened name when normalization fails.
    ///
    /// A long path is kept truncated. A final component that does not fit is an error in either
    /// form and does not trigger the fallback.
    pub fn resolve(names: &dyn NameResolver) -> Result<Self, CaptureError> {
        match Self::resolve_as(names, NameForm::Normalized) {
            Err(CaptureError::Platform(err)) => {
                log::debug!("normalized name unavailable ({err}), using opened name");
                Self::resolve_as(names, NameForm::Opened)
            }
            resolved => resolved,
        }
    }

    fn resolve_as(names: &dyn NameResolver, form: NameForm) -> Result<Self, CaptureError> {
        let mut resolved = None;
        names.with_name(form, &mut |name: FileName<'_>| {
            resolved = Some(Self::copy(name, form));
        })?;
        let resolved = resolved.ok_or(PlatformError::NameUnavailable { status: STATUS_NOT_FOUND })?;
        Ok(resolved?)
    }

    fn copy(name: FileName<'_>, form: NameForm) -> Result<Self, vigil_shared::wire::NameTooLong> {
        Ok(Self {
            name: WideName::exact(name.final_component)?,
            path: WideName::truncating(name.path),
            form,
        })
    }
}

/// A file-system operation by a tracked process.
#[derive(Debug)]
pub struct FileSystemEvent {
    process: ProcessRef,
    time: EventTime,
    major_function: u8,
    options: u32,
    names: FileNames,
    pool: PoolClass,
}

impl FileSystemEvent {
    pub fn major_function(&self) -> u8 {
        self.major_function
    }

    pub fn options(&self) -> u32 {
        self.options
    }

    pub fn names(&self) -> &FileNames {
        &self.names
    }
}

impl CapturableEvent for FileSystemEvent {
    const KIND: EventKind = EventKind::FileSystem;

    type Context<'a> = FileOperationContext<'a>;

    fn capture(env: &CaptureEnv<'_>, ctx: FileOperationContext<'_>) -> Result<Captured<Self>, CaptureError> {
        let Some(process) = env.registry.lookup(ctx.requestor) else {
            return Ok(Captured::Skipped);
        };
        let time = env.clock.now();
        let names = FileNames::resolve(ctx.names)?;

        Ok(Captured::Event(Box::new(Self {
            process,
            time,
            major_function: ctx.major_function,
            options: ctx.options,
            names,
            pool: env.pool,
        })))
    }

    fn export(&self, dst: &mut dyn UserBuffer) -> Result<usize, ExportError> {
        let mut w = FieldWriter::record(dst, Self::KIND, self.pool)?;
        self.time.export(&mut w.nested(offset_of!(WireFileEvent, time)))?;
        self.process.export(&mut w.nested(offset_of!(WireFileEvent, process)))?;
        w.put(offset_of!(WireFileEvent, major_function), &u32::from(self.major_function))?;
        w.put(offset_of!(WireFileEvent, options), &self.options)?;
        w.put(offset_of!(WireFileEvent, path), &self.names.path)?;
        w.put(offset_of!(WireFileEvent, name), &self.names.name)?;
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
