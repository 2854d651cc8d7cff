//! The three event kinds and the contract they share.
//!
//! Every kind is captured from one callback invocation, exported into a caller buffer and then
//! destroyed. An event owns a [`ProcessRef`] to the process that caused it, so the record outlives
//! an exit notification for as long as the event sits in its queue.

mod file;
mod lifecycle;
mod registry;

use alloc::boxed::Box;

use vigil_shared::wire::{EventKind, PoolClass};

use crate::error::{CaptureError, ExportError};
use crate::export::UserBuffer;
use crate::process::{ProcessRef, ProcessRegistry};
use crate::time::{Clock, EventTime};

pub use file::{FileNames, FileOperationContext, FileSystemEvent};
pub use lifecycle::{ProcessLifecycleEvent, ProcessNotification};
pub use registry::{RegistryEvent, RegistryOperationContext};

/// Outcome of a capture that did not fail.
#[derive(Debug)]
pub enum Captured<E> {
    Event(Box<E>),
    /// The causing process is not tracked. Not an error.
    Skipped,
}

impl<E> Captured<E> {
    pub fn into_event(self) -> Option<Box<E>> {
        match self {
            Captured::Event(event) => Some(event),
            Captured::Skipped => None,
        }
    }

    pub fn is_skipped(&self) -> bool {
        matches!(self, Captured::Skipped)
    }
}

/// What every capture needs besides its callback context.
#[derive(Clone, Copy)]
pub struct CaptureEnv<'a> {
    pub registry: &'a ProcessRegistry,
    pub clock: &'a dyn Clock,
    pub pool: PoolClass,
}

/// Capture, export and destroy, implemented by each event kind.
///
/// Destruction is `Drop`: the event's [`ProcessRef`] is released as its fields drop, before the
/// box holding the event is freed.
pub trait CapturableEvent: Sized + Send + 'static {
    const KIND: EventKind;

    /// Borrowed view of the callback invocation the event is built from.
    type Context<'a>;

    /// Build an event, or report the process as untracked. A failure leaves nothing behind:
    /// partial allocations and the acquired process reference are released on return.
    fn capture(env: &CaptureEnv<'_>, ctx: Self::Context<'_>) -> Result<Captured<Self>, CaptureError>;

    /// Copy the event into `dst` as its wire record and return the byte count.
    fn export(&self, dst: &mut dyn UserBuffer) -> Result<usize, ExportError>;

    fn process(&self) -> &ProcessRef;

    fn time(&self) -> &EventTime;

    fn pool(&self) -> PoolClass;
}

/// Destroy the event in `slot`, if there is one. A second call on the same slot does nothing.
pub fn destroy<E: CapturableEvent>(slot: &mut Option<Box<E>>) {
    if let Some(event) = slot.take() {
        log::trace!("{} event of process {} destroyed", E::KIND.as_str(), event.process().pid());
        drop(event);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::export::SliceBuffer;
    use crate::platform::ProcessSource;
    use crate::process::ProcessRecord;
    use alloc::sync::Arc;
    use vigil_shared::wire::WideName;

    struct Still;

    impl Clock for Still {
        fn now(&self) -> EventTime {
            EventTime { system_time: 1, local_time: 2, counter: 3 }
        }
    }

    struct Quiet;

    impl crate::platform::TokenSource for Quiet {
        fn privileges(&self, _: &mut Vec<crate::process::Privilege>) -> Result<(), crate::PlatformError> {
            Ok(())
        }
        fn statistics(&self) -> Result<crate::process::TokenStatistics, crate::PlatformError> {
            Ok(Default::default())
        }
        fn is_elevated(&self) -> Result<bool, crate::PlatformError> {
            Ok(true)
        }
        fn integrity_level(&self) -> Result<u32, crate::PlatformError> {
            Ok(0x3000)
        }
    }

    impl ProcessSource for Quiet {
        fn pid(&self) -> crate::Pid {
            42
        }
        fn parent_pid(&self) -> crate::Pid {
            4
        }
        fn session_id(&self) -> Result<u32, crate::PlatformError> {
            Ok(0)
        }
        fn image_name(&self) -> Result<WideName, crate::PlatformError> {
            Ok(WideName::from_str_truncating("quiet.exe"))
        }
        fn with_primary_token(
            &self,
            f: &mut dyn FnMut(&dyn crate::platform::TokenSource) -> Result<(), crate::PlatformError>,
        ) -> Result<(), crate::PlatformError> {
            f(self)
        }
    }

    #[test]
    fn destroy_releases_the_process_once() {
        let registry = ProcessRegistry::new();
        registry.track(ProcessRecord::create(PoolClass::NonPaged, &Quiet).unwrap()).unwrap();
        let env = CaptureEnv { registry: &registry, clock: &Still, pool: PoolClass::Paged };

        let ctx = ProcessNotification { process: &Quiet, created: true };
        let event = ProcessLifecycleEvent::capture(&env, ctx).unwrap().into_event().unwrap();
        assert_eq!(event.pool(), PoolClass::Paged);
        assert_eq!(event.time().counter, 3);

        let weak = ProcessRef::downgrade(event.process());
        assert_eq!(Arc::strong_count(&weak.upgrade().unwrap()) - 1, 2);

        let mut slot = Some(event);
        destroy(&mut slot);
        assert!(slot.is_none());
        destroy(&mut slot);

        assert!(registry.untrack(42));
        assert!(weak.upgrade().is_none());
    }

    #[test]
    fn export_writes_exactly_one_record() {
        let registry = ProcessRegistry::new();
        registry.track(ProcessRecord::create(PoolClass::NonPaged, &Quiet).unwrap()).unwrap();
        let env = CaptureEnv { registry: &registry, clock: &Still, pool: PoolClass::NonPaged };
        let event = ProcessLifecycleEvent::capture(&env, ProcessNotification { process: &Quiet, created: true })
            .unwrap()
            .into_event()
            .unwrap();

        let mut bytes = vec![0xEEu8; EventKind::Process.record_size() + 8];
        let written = event.export(&mut SliceBuffer::new(&mut bytes)).unwrap();
        assert_eq!(written, EventKind::Process.record_size());
        assert_eq!(&bytes[written..], &[0xEE; 8]);
    }
}
