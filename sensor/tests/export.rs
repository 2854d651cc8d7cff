//! # Export Tests
//!
//! Byte-level checks of what reaches the caller's buffer: field values, zeroed gaps, the absence
//! of kernel addresses, and what happens to an event whose copy fails.

mod common;

use std::mem::{offset_of, size_of};

use common::{FIXED_TIME, FaultingBuffer, FakeNames, FakeProcess, sensor_with_capacity};
use vigil_sensor::events::FileOperationContext;
use vigil_sensor::export::SliceBuffer;
use vigil_sensor::{EventKind, ExportError, Exported, PoolClass, ProcessRef, Sensor, SensorConfig};
use vigil_shared::ops::FileOperation;
use vigil_shared::wire::{Record, WireFileEvent, WireStats};
use zerocopy::FromBytes;

const PATH: &str = r"C:\a\b.txt";

fn sensor_with_one_write() -> Sensor {
    let sensor = sensor_with_capacity(4);
    sensor.watch(&FakeProcess::new(100, 4)).unwrap();
    let names = FakeNames::normalized(PATH, "b.txt");
    let ctx = FileOperationContext {
        requestor: 100,
        major_function: FileOperation::Write.major_function(),
        options: 0x0000_0040,
        names: &names,
    };
    sensor.on_file_operation(ctx);
    sensor
}

#[test]
fn file_event_exports_the_captured_values() {
    let sensor = sensor_with_one_write();
    let mut bytes = vec![0xAAu8; 4096];
    let copied = sensor.export_next(EventKind::FileSystem, &mut SliceBuffer::new(&mut bytes)).unwrap();
    assert_eq!(copied, Exported::Copied(size_of::<WireFileEvent>()));

    let (record, used) = Record::decode(&bytes).unwrap();
    assert_eq!(used, size_of::<WireFileEvent>());
    let Record::File(event) = record else { panic!("expected a file record") };

    assert_eq!(event.header.kind, EventKind::FileSystem as u32);
    assert_eq!(event.header.pool, PoolClass::NonPaged as u32);
    assert_eq!(event.time.system_time, FIXED_TIME.system_time);
    assert_eq!(event.time.local_time, FIXED_TIME.local_time);
    assert_eq!(event.time.counter, FIXED_TIME.counter);
    assert_eq!(event.major_function, 4);
    assert_eq!(event.options, 0x40);
    assert_eq!(event.path.to_string_lossy(), PATH);
    assert_eq!(event.name.to_string_lossy(), "b.txt");
    assert!(!event.path.is_truncated());

    let process = &event.process;
    assert_eq!((process.pid, process.ppid, process.session_id), (100, 4, 1));
    assert_eq!(process.image.to_string_lossy(), r"C:\Windows\System32\proc100.exe");
    assert_eq!(process.token.integrity_level, 0x2000);
    assert_eq!(process.token.statistics.token_id, 0x1234);
    let luids: Vec<u64> = process.token.privileges().iter().map(|p| p.luid).collect();
    assert_eq!(luids, [23, 19]);

    // Only the record's own range is touched.
    assert!(bytes[used..].iter().all(|&b| b == 0xAA));
}

#[test]
fn unused_bytes_read_back_as_zero() {
    let sensor = sensor_with_one_write();
    let mut bytes = vec![0xAAu8; size_of::<WireFileEvent>()];
    sensor.export_next(EventKind::FileSystem, &mut SliceBuffer::new(&mut bytes)).unwrap();

    let name_tail = offset_of!(WireFileEvent, name) + 4 + 2 * "b.txt".len();
    assert!(bytes[name_tail..].iter().all(|&b| b == 0));
    let header_reserved = 12..16;
    assert!(bytes[header_reserved].iter().all(|&b| b == 0));
}

#[test]
fn no_kernel_addresses_leave_the_sensor() {
    let sensor = sensor_with_one_write();
    let record = sensor.processes().lookup(100).unwrap();
    let addresses = [
        ProcessRef::as_ptr(&record) as usize,
        &sensor as *const Sensor as usize,
        sensor.processes() as *const _ as usize,
    ];

    let mut bytes = vec![0u8; size_of::<WireFileEvent>()];
    sensor.export_next(EventKind::FileSystem, &mut SliceBuffer::new(&mut bytes)).unwrap();

    for address in addresses {
        let needle = address.to_ne_bytes();
        assert!(
            !bytes.windows(needle.len()).any(|w| w == needle),
            "address {address:#x} found in exported record"
        );
    }
}

#[test]
fn short_buffer_still_consumes_the_event() {
    let sensor = sensor_with_one_write();
    let record = ProcessRef::downgrade(&sensor.processes().lookup(100).unwrap());
    assert_eq!(record.strong_count(), 2);

    let mut bytes = vec![0u8; 64];
    let err = sensor.export_next(EventKind::FileSystem, &mut SliceBuffer::new(&mut bytes)).unwrap_err();
    assert_eq!(err, ExportError::BufferTooSmall { required: size_of::<WireFileEvent>(), available: 64 });
    assert!(bytes.iter().all(|&b| b == 0));

    assert_eq!(record.strong_count(), 1);
    let mut bytes = vec![0u8; size_of::<WireFileEvent>()];
    let next = sensor.export_next(EventKind::FileSystem, &mut SliceBuffer::new(&mut bytes)).unwrap();
    assert_eq!(next, Exported::Empty);
}

#[test]
fn fault_partway_reports_and_destroys() {
    let sensor = sensor_with_one_write();
    let limit = offset_of!(WireFileEvent, path) + 8;
    let mut buffer = FaultingBuffer::new(size_of::<WireFileEvent>(), limit);

    let err = sensor.export_next(EventKind::FileSystem, &mut buffer).unwrap_err();
    // The zero fill runs in 256-byte chunks; the one covering the limit is refused.
    assert_eq!(err, ExportError::Fault { offset: limit / 256 * 256 });
    assert!(sensor.processes().lookup(100).is_some());
    assert_eq!(sensor.stats().file_system.queued, 0);
}

#[test]
fn stats_export_as_one_block() {
    let sensor = sensor_with_one_write();
    sensor.on_process_notify(&FakeProcess::new(101, 100), true);

    let mut bytes = vec![0xFFu8; size_of::<WireStats>()];
    let copied = sensor.export_stats(&mut SliceBuffer::new(&mut bytes)).unwrap();
    assert_eq!(copied, size_of::<WireStats>());

    let stats = WireStats::read_from_bytes(&bytes).unwrap();
    assert_eq!(stats, sensor.stats());
    assert_eq!(stats.tracked_processes, 2);
    assert_eq!(stats.file_system.queued, 1);
    assert_eq!(stats.process.captured, 1);
    assert_eq!(stats.registry.capacity, 4);
    assert_eq!(stats.reserved, 0);
}

#[test]
fn paged_filters_tag_their_records() {
    let mut config = SensorConfig::default();
    config.process.pool = PoolClass::Paged;
    let sensor = common::sensor(config);
    sensor.watch(&FakeProcess::new(5, 4)).unwrap();
    sensor.on_process_notify(&FakeProcess::new(6, 5), true);

    let mut bytes = vec![0u8; EventKind::Process.record_size()];
    sensor.export_next(EventKind::Process, &mut SliceBuffer::new(&mut bytes)).unwrap();
    let (record, _) = Record::decode(&bytes).unwrap();
    assert_eq!(PoolClass::from_raw(record.header().pool), Some(PoolClass::Paged));
    assert_eq!(sensor.processes().lookup(6).unwrap().pool(), PoolClass::Paged);
}
