use thiserror::Error;
use vigil_shared::wire::NameTooLong;

use crate::Pid;
use crate::config::ConfigError;

/// A query the operating system refused. `status` is the raw NTSTATUS.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum PlatformError {
    #[error("process {pid} is gone")]
    ProcessGone { pid: Pid },

    #[error("{what} query failed with status {status:#010x}")]
    Query { what: &'static str, status: i32 },

    #[error("file name unavailable (status {status:#010x})")]
    NameUnavailable { status: i32 },
}

/// Why a callback produced no event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum CaptureError {
    #[error(transparent)]
    Platform(#[from] PlatformError),

    #[error("final path component rejected: {0}")]
    NameTooLong(#[from] NameTooLong),

    #[error("process {0} is retired; its token can no longer change")]
    Retired(Pid),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum ExportError {
    #[error("buffer holds {available} bytes, record needs {required}")]
    BufferTooSmall { required: usize, available: usize },

    #[error("copy into the caller's buffer faulted at offset {offset}")]
    Fault { offset: usize },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum QueueError {
    #[error("queue capacity must be non-zero")]
    ZeroCapacity,
}

/// The queue could not make room for a payload; it is handed back untouched.
#[derive(Debug, Error)]
#[error("no queue slot could be allocated")]
pub struct InsertError<T>(pub T);

#[derive(Debug, Error)]
pub enum SensorError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("{filter} queue: {source}")]
    Queue {
        filter: &'static str,
        #[source]
        source: QueueError,
    },

    #[error("process {0} is already tracked")]
    AlreadyTracked(Pid),

    #[error("process {0} is not tracked")]
    NotTracked(Pid),

    #[error(transparent)]
    Capture(#[from] CaptureError),
}
