use alloc::vec::Vec;
use core::mem::offset_of;

use vigil_shared::constants::MAX_PRIVILEGES;
use vigil_shared::wire::{WirePrivilege, WireToken, WireTokenStatistics};

use crate::error::{ExportError, PlatformError};
use crate::export::{FieldWriter, UserBuffer};
use crate::platform::{ProcessSource, TokenSource};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Privilege {
    pub luid: u64,
    /// `SE_PRIVILEGE_*` flags.
    pub attributes: u32,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TokenStatistics {
    pub token_id: u64,
    pub authentication_id: u64,
    pub modified_id: u64,
    pub token_type: u32,
    pub impersonation_level: u32,
    pub group_count: u32,
    pub privilege_count: u32,
}

impl TokenStatistics {
    fn to_wire(self) -> WireTokenStatistics {
        WireTokenStatistics {
            token_id: self.token_id,
            authentication_id: self.authentication_id,
            modified_id: self.modified_id,
            token_type: self.token_type,
            impersonation_level: self.impersonation_level,
            group_count: self.group_count,
            privilege_count: self.privilege_count,
        }
    }
}

/// Point-in-time copy of a primary token's privileges, statistics, elevation and integrity.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TokenSnapshot {
    privileges: Vec<Privilege>,
    statistics: TokenStatistics,
    elevated: bool,
    integrity_level: u32,
}

impl TokenSnapshot {
    pub fn capture(source: &dyn ProcessSource) -> Result<Self, PlatformError> {
        let mut snapshot = Self::default();
        snapshot.populate(source)?;
        Ok(snapshot)
    }

    /// Re-query in place. The previous privilege buffer is freed before the new query
    /// allocates; if the query fails the snapshot is left empty, never half old and half new.
    pub fn refresh(&mut self, source: &dyn ProcessSource) -> Result<(), PlatformError> {
        self.release();
        if let Err(err) = self.populate(source) {
            self.release();
            return Err(err);
        }
        Ok(())
    }

    pub fn privileges(&self) -> &[Privilege] {
        &self.privileges
    }

    pub fn statistics(&self) -> &TokenStatistics {
        &self.statistics
    }

    pub fn is_elevated(&self) -> bool {
        self.elevated
    }

    pub fn integrity_level(&self) -> u32 {
        self.integrity_level
    }

    fn release(&mut self) {
        *self = Self::default();
    }

    fn populate(&mut self, source: &dyn ProcessSource) -> Result<(), PlatformError> {
        source.with_primary_token(&mut |token: &dyn TokenSource| -> Result<(), PlatformError> {
            token.privileges(&mut self.privileges)?;
            self.statistics = token.statistics()?;
            self.elevated = token.is_elevated()?;
            self.integrity_level = token.integrity_level()?;
            Ok(())
        })
    }

    pub(crate) fn export<B: UserBuffer + ?Sized>(
        &self,
        w: &mut FieldWriter<'_, B>,
    ) -> Result<(), ExportError> {
        w.put(offset_of!(WireToken, elevated), &u32::from(self.elevated))?;
        w.put(offset_of!(WireToken, integrity_level), &self.integrity_level)?;
        w.put(offset_of!(WireToken, privilege_count), &(self.privileges.len() as u32))?;
        w.put(offset_of!(WireToken, statistics), &self.statistics.to_wire())?;

        let first = offset_of!(WireToken, privileges);
        for (i, privilege) in self.privileges.iter().take(MAX_PRIVILEGES).enumerate() {
            let wire = WirePrivilege {
                luid: privilege.luid,
                attributes: privilege.attributes,
                reserved: 0,
            };
            w.put(first + i * size_of::<WirePrivilege>(), &wire)?;
        }
        Ok(())
    }
}
