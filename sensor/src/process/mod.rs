//! Identity and security context of monitored processes.

mod record;
mod registry;
mod token;

pub use record::{ProcessRecord, ProcessRef};
pub use registry::{AlreadyTracked, ProcessRegistry};
pub use token::{Privilege, TokenSnapshot, TokenStatistics};
