//! Host stand-ins for the kernel objects the sensor reads from.
#![allow(dead_code)]

use std::cell::{Cell, RefCell};

use vigil_sensor::error::{ExportError, PlatformError};
use vigil_sensor::export::UserBuffer;
use vigil_sensor::platform::{FileName, NameForm, NameResolver, ProcessSource, TokenSource};
use vigil_sensor::process::{Privilege, TokenStatistics};
use vigil_sensor::{Clock, EventTime, Pid, Sensor, SensorConfig};
use vigil_shared::wire::WideName;

pub const STATUS_ACCESS_DENIED: i32 = 0xC000_0022_u32 as i32;
pub const STATUS_OBJECT_PATH_NOT_FOUND: i32 = 0xC000_003A_u32 as i32;

pub fn units(s: &str) -> Vec<u16> {
    s.encode_utf16().collect()
}

/// Token state a test can change between notifications.
#[derive(Debug, Clone)]
pub struct FakeToken {
    pub privileges: Vec<Privilege>,
    pub statistics: TokenStatistics,
    pub elevated: bool,
    pub integrity_level: u32,
    /// Fail every query with `STATUS_ACCESS_DENIED`.
    pub deny: bool,
}

impl Default for FakeToken {
    fn default() -> Self {
        Self {
            privileges: vec![
                Privilege { luid: 23, attributes: 3 },
                Privilege { luid: 19, attributes: 0 },
            ],
            statistics: TokenStatistics {
                token_id: 0x1234,
                authentication_id: 0x3E7,
                modified_id: 0x99,
                token_type: 1,
                impersonation_level: 0,
                group_count: 12,
                privilege_count: 2,
            },
            elevated: false,
            integrity_level: 0x2000,
            deny: false,
        }
    }
}

impl FakeToken {
    fn check(&self, what: &'static str) -> Result<(), PlatformError> {
        if self.deny {
            return Err(PlatformError::Query { what, status: STATUS_ACCESS_DENIED });
        }
        Ok(())
    }
}

impl TokenSource for FakeToken {
    fn privileges(&self, out: &mut Vec<Privilege>) -> Result<(), PlatformError> {
        self.check("privileges")?;
        out.extend_from_slice(&self.privileges);
        Ok(())
    }

    fn statistics(&self) -> Result<TokenStatistics, PlatformError> {
        self.check("statistics")?;
        Ok(self.statistics)
    }

    fn is_elevated(&self) -> Result<bool, PlatformError> {
        self.check("elevation")?;
        Ok(self.elevated)
    }

    fn integrity_level(&self) -> Result<u32, PlatformError> {
        self.check("integrity")?;
        Ok(self.integrity_level)
    }
}

pub struct FakeProcess {
    pub pid: Pid,
    pub ppid: Pid,
    pub session_id: u32,
    pub image: String,
    pub token: RefCell<FakeToken>,
    pub token_opens: Cell<usize>,
}

impl FakeProcess {
    pub fn new(pid: Pid, ppid: Pid) -> Self {
        Self {
            pid,
            ppid,
            session_id: 1,
            image: format!(r"C:\Windows\System32\proc{pid}.exe"),
            token: RefCell::new(FakeToken::default()),
            token_opens: Cell::new(0),
        }
    }
}

impl ProcessSource for FakeProcess {
    fn pid(&self) -> Pid {
        self.pid
    }

    fn parent_pid(&self) -> Pid {
        self.ppid
    }

    fn session_id(&self) -> Result<u32, PlatformError> {
        Ok(self.session_id)
    }

    fn image_name(&self) -> Result<WideName, PlatformError> {
        Ok(WideName::from_str_truncating(&self.image))
    }

    fn with_primary_token(
        &self,
        f: &mut dyn FnMut(&dyn TokenSource) -> Result<(), PlatformError>,
    ) -> Result<(), PlatformError> {
        self.token_opens.set(self.token_opens.get() + 1);
        let token = self.token.borrow();
        f(&*token)
    }
}

/// Name lookups by form; `Err(status)` makes that form fail.
pub struct FakeNames {
    pub normalized: Result<(Vec<u16>, Vec<u16>), i32>,
    pub opened: Result<(Vec<u16>, Vec<u16>), i32>,
    pub requested: RefCell<Vec<NameForm>>,
}

impl FakeNames {
    pub fn normalized(path: &str, name: &str) -> Self {
        Self {
            normalized: Ok((units(path), units(name))),
            opened: Err(STATUS_OBJECT_PATH_NOT_FOUND),
            requested: RefCell::new(Vec::new()),
        }
    }

    pub fn opened_only(path: &str, name: &str) -> Self {
        Self {
            normalized: Err(STATUS_ACCESS_DENIED),
            opened: Ok((units(path), units(name))),
            requested: RefCell::new(Vec::new()),
        }
    }

    pub fn unresolvable() -> Self {
        Self {
            normalized: Err(STATUS_ACCESS_DENIED),
            opened: Err(STATUS_OBJECT_PATH_NOT_FOUND),
            requested: RefCell::new(Vec::new()),
        }
    }
}

impl NameResolver for FakeNames {
    fn with_name(&self, form: NameForm, visit: &mut dyn FnMut(FileName<'_>)) -> Result<(), PlatformError> {
        self.requested.borrow_mut().push(form);
        let entry = match form {
            NameForm::Normalized => &self.normalized,
            NameForm::Opened => &self.opened,
        };
        match entry {
            Ok((path, name)) => {
                visit(FileName { path, final_component: name });
                Ok(())
            }
            Err(status) => Err(PlatformError::NameUnavailable { status: *status }),
        }
    }
}

pub const FIXED_TIME: EventTime = EventTime {
    system_time: 133_500_000_000_000_000,
    local_time: 133_500_036_000_000_000,
    counter: 0xABCD_EF01,
};

pub struct FixedClock;

impl Clock for FixedClock {
    fn now(&self) -> EventTime {
        FIXED_TIME
    }
}

/// A caller buffer whose pages stop being writable at `limit`.
pub struct FaultingBuffer {
    pub bytes: Vec<u8>,
    pub limit: usize,
}

impl FaultingBuffer {
    pub fn new(capacity: usize, limit: usize) -> Self {
        Self { bytes: vec![0; capacity], limit }
    }
}

impl UserBuffer for FaultingBuffer {
    fn capacity(&self) -> usize {
        self.bytes.len()
    }

    fn write_at(&mut self, offset: usize, bytes: &[u8]) -> Result<(), ExportError> {
        if offset + bytes.len() > self.limit {
            return Err(ExportError::Fault { offset });
        }
        self.bytes[offset..offset + bytes.len()].copy_from_slice(bytes);
        Ok(())
    }
}

pub fn sensor(config: SensorConfig) -> Sensor {
    Sensor::new(&config, Box::new(FixedClock)).unwrap()
}

pub fn sensor_with_capacity(capacity: usize) -> Sensor {
    let mut config = SensorConfig::default();
    config.process.capacity = capacity;
    config.file_system.capacity = capacity;
    config.registry.capacity = capacity;
    sensor(config)
}
