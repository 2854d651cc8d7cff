//! What the sensor needs from the operating system.
//!
//! The driver implements these over `PEPROCESS`, primary tokens and filter-manager name
//! information. Tests implement them over plain data.

use alloc::vec::Vec;

use vigil_shared::wire::WideName;

use crate::Pid;
use crate::error::PlatformError;
use crate::process::{Privilege, TokenStatistics};

/// A live process the notifier told us about.
pub trait ProcessSource {
    fn pid(&self) -> Pid;
    fn parent_pid(&self) -> Pid;
    fn session_id(&self) -> Result<u32, PlatformError>;
    /// Full image path; longer paths come back truncated and flagged.
    fn image_name(&self) -> Result<WideName, PlatformError>;
    /// Reference the primary token, run `f` against it, then release it.
    fn with_primary_token(
        &self,
        f: &mut dyn FnMut(&dyn TokenSource) -> Result<(), PlatformError>,
    ) -> Result<(), PlatformError>;
}

/// Queries against one referenced primary token.
pub trait TokenSource {
    /// Append every privilege the token holds to `out`.
    fn privileges(&self, out: &mut Vec<Privilege>) -> Result<(), PlatformError>;
    fn statistics(&self) -> Result<TokenStatistics, PlatformError>;
    fn is_elevated(&self) -> Result<bool, PlatformError>;
    /// Mandatory integrity level RID.
    fn integrity_level(&self) -> Result<u32, PlatformError>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NameForm {
    /// Fully normalized path (long names, resolved links).
    Normalized,
    /// The name the caller opened the file with.
    Opened,
}

/// A file name the platform holds only for the duration of a [`NameResolver`] visit.
#[derive(Debug, Clone, Copy)]
pub struct FileName<'a> {
    pub path: &'a [u16],
    pub final_component: &'a [u16],
}

/// Name lookup for the file an intercepted operation targets.
pub trait NameResolver {
    /// Resolve the name in `form` and show it to `visit` while it is still held.
    fn with_name(
        &self,
        form: NameForm,
        visit: &mut dyn FnMut(FileName<'_>),
    ) -> Result<(), PlatformError>;
}
