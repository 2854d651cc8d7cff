//! `log` backend that forwards records to the kernel debugger.

use log::{LevelFilter, Log, Metadata, Record, SetLoggerError};
use wdk::println;

struct DebuggerLogger;

static LOGGER: DebuggerLogger = DebuggerLogger;

impl Log for DebuggerLogger {
    fn enabled(&self, metadata: &Metadata<'_>) -> bool {
        metadata.level() <= log::max_level()
    }

    fn log(&self, record: &Record<'_>) {
        if self.enabled(record.metadata()) {
            println!("[vigil][{:5}][{}] {}", record.level(), record.target(), record.args());
        }
    }

    fn flush(&self) {}
}

/// Install the logger. Fails if a logger is already set, which only happens on a second load
/// of the same image.
pub fn init(level: LevelFilter) -> Result<(), SetLoggerError> {
    log::set_logger(&LOGGER)?;
    log::set_max_level(level);
    Ok(())
}
