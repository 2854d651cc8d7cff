//! # Capture Tests
//!
//! What each hook records, skips or filters, how file names are resolved, and how the queues
//! behave once they fill up.

mod common;

use common::{FakeNames, FakeProcess, sensor_with_capacity, units};
use vigil_sensor::events::{FileNames, FileOperationContext, RegistryOperationContext};
use vigil_sensor::export::SliceBuffer;
use vigil_sensor::platform::NameForm;
use vigil_sensor::{CaptureError, EventKind, Exported, ProcessRef, Recorded, Sensor};
use vigil_shared::constants::MAX_PATH;
use vigil_shared::ops::{FileOperation, RegistryOperation};
use vigil_shared::wire::Record;

fn create<'a>(pid: u32, names: &'a FakeNames, options: u32) -> FileOperationContext<'a> {
    FileOperationContext {
        requestor: pid,
        major_function: FileOperation::Create.major_function(),
        options,
        names,
    }
}

fn next(sensor: &Sensor, kind: EventKind) -> Option<Record> {
    let mut bytes = vec![0u8; kind.record_size()];
    match sensor.export_next(kind, &mut SliceBuffer::new(&mut bytes)).unwrap() {
        Exported::Copied(n) => Some(Record::decode(&bytes[..n]).unwrap().0),
        Exported::Empty => None,
    }
}

fn watched(pid: u32) -> Sensor {
    let sensor = sensor_with_capacity(8);
    sensor.watch(&FakeProcess::new(pid, 4)).unwrap();
    sensor
}

#[test]
fn untracked_requestor_is_skipped() {
    let sensor = watched(1);
    let names = FakeNames::normalized(r"C:\a.txt", "a.txt");

    assert_eq!(sensor.on_file_operation(create(2, &names, 0)), Recorded::Skipped);
    assert!(names.requested.borrow().is_empty());
    assert!(next(&sensor, EventKind::FileSystem).is_none());

    let stats = sensor.stats().file_system;
    assert_eq!((stats.captured, stats.skipped, stats.failed), (0, 1, 0));
}

#[test]
fn unselected_operations_are_filtered() {
    let sensor = watched(1);
    let names = FakeNames::normalized(r"C:\a.txt", "a.txt");
    let read = FileOperationContext {
        requestor: 1,
        major_function: FileOperation::Read.major_function(),
        options: 0,
        names: &names,
    };
    assert_eq!(sensor.on_file_operation(read), Recorded::Filtered);

    let query = RegistryOperationContext {
        requestor: 1,
        operation: RegistryOperation::PreQueryValueKey,
        key: None,
        value: None,
    };
    assert_eq!(sensor.on_registry_operation(query), Recorded::Filtered);
    assert!(!sensor.records_registry(RegistryOperation::PreQueryValueKey));
    assert!(sensor.records_registry(RegistryOperation::PreSetValueKey));
}

#[test]
fn normalized_name_is_preferred() {
    let names = FakeNames::normalized(r"\Device\HarddiskVolume3\Users\x\doc.txt", "doc.txt");
    let resolved = FileNames::resolve(&names).unwrap();

    assert_eq!(resolved.form, NameForm::Normalized);
    assert_eq!(resolved.path.to_string_lossy(), r"\Device\HarddiskVolume3\Users\x\doc.txt");
    assert_eq!(resolved.name.to_string_lossy(), "doc.txt");
    assert_eq!(*names.requested.borrow(), [NameForm::Normalized]);
}

#[test]
fn opened_name_is_used_when_normalization_fails() {
    let sensor = watched(1);
    let names = FakeNames::opened_only(r"\Users\x\DOC~1.TXT", "DOC~1.TXT");
    assert_eq!(sensor.on_file_operation(create(1, &names, 0)), Recorded::Queued);
    assert_eq!(*names.requested.borrow(), [NameForm::Normalized, NameForm::Opened]);

    let Some(Record::File(event)) = next(&sensor, EventKind::FileSystem) else {
        panic!("expected a file record");
    };
    assert_eq!(event.path.to_string_lossy(), r"\Users\x\DOC~1.TXT");
    assert_eq!(event.name.to_string_lossy(), "DOC~1.TXT");
}

#[test]
fn unresolvable_names_fail_the_capture() {
    let sensor = watched(1);
    let names = FakeNames::unresolvable();
    assert_eq!(sensor.on_file_operation(create(1, &names, 0)), Recorded::Failed);
    assert!(next(&sensor, EventKind::FileSystem).is_none());
    assert_eq!(sensor.stats().file_system.failed, 1);
}

#[test]
fn long_paths_are_truncated_and_flagged() {
    let long_path = format!(r"C:\{}\f.txt", "d".repeat(400));
    let names = FakeNames::normalized(&long_path, "f.txt");
    let resolved = FileNames::resolve(&names).unwrap();

    assert!(resolved.path.is_truncated());
    assert_eq!(resolved.path.len(), MAX_PATH);
    assert_eq!(resolved.path.as_units(), &units(&long_path)[..MAX_PATH]);
    assert!(!resolved.name.is_truncated());
}

#[test]
fn oversized_final_component_rejects_the_capture() {
    let sensor = watched(1);
    let component = "n".repeat(MAX_PATH + 1);
    let names = FakeNames::normalized(&format!(r"C:\{component}"), &component);

    assert!(matches!(FileNames::resolve(&names), Err(CaptureError::NameTooLong(_))));
    assert_eq!(*names.requested.borrow(), [NameForm::Normalized]);

    assert_eq!(sensor.on_file_operation(create(1, &names, 0)), Recorded::Failed);
    assert!(next(&sensor, EventKind::FileSystem).is_none());
    let record = sensor.processes().lookup(1).unwrap();
    assert_eq!(ProcessRef::ref_count(&record), 2);
}

#[test]
fn registry_names_are_captured() {
    let sensor = watched(1);
    let key = units(r"\REGISTRY\MACHINE\SOFTWARE\Microsoft\Windows\CurrentVersion\Run");
    let value = units("Updater");

    let set = RegistryOperationContext {
        requestor: 1,
        operation: RegistryOperation::PreSetValueKey,
        key: Some(&key),
        value: Some(&value),
    };
    assert_eq!(sensor.on_registry_operation(set), Recorded::Queued);

    let delete = RegistryOperationContext {
        requestor: 1,
        operation: RegistryOperation::PreDeleteKey,
        key: Some(&key),
        value: None,
    };
    assert_eq!(sensor.on_registry_operation(delete), Recorded::Queued);

    let Some(Record::Registry(first)) = next(&sensor, EventKind::Registry) else {
        panic!("expected a registry record");
    };
    assert_eq!(first.operation, RegistryOperation::PreSetValueKey.notify_class());
    assert_eq!(first.key.as_units(), key.as_slice());
    assert_eq!(first.value.to_string_lossy(), "Updater");

    let Some(Record::Registry(second)) = next(&sensor, EventKind::Registry) else {
        panic!("expected a registry record");
    };
    assert_eq!(second.operation, RegistryOperation::PreDeleteKey.notify_class());
    assert!(second.value.is_empty());
}

#[test]
fn full_queue_keeps_the_newest_events() {
    let sensor = watched(1);
    let names = FakeNames::normalized(r"C:\a.txt", "a.txt");
    for seq in 0..12 {
        assert_eq!(sensor.on_file_operation(create(1, &names, seq)), Recorded::Queued);
    }

    let stats = sensor.stats().file_system;
    assert_eq!((stats.queued, stats.capacity, stats.captured, stats.evicted), (8, 8, 12, 4));

    let options: Vec<u32> = std::iter::from_fn(|| match next(&sensor, EventKind::FileSystem) {
        Some(Record::File(event)) => Some(event.options),
        _ => None,
    })
    .collect();
    assert_eq!(options, (4..12).collect::<Vec<_>>());

    // Evicted events released their references as they were dropped.
    let record = sensor.processes().lookup(1).unwrap();
    assert_eq!(ProcessRef::ref_count(&record), 2);
}

#[test]
fn queues_are_independent() {
    let sensor = watched(1);
    let names = FakeNames::normalized(r"C:\a.txt", "a.txt");
    sensor.on_file_operation(create(1, &names, 0));
    sensor.on_process_notify(&FakeProcess::new(2, 1), true);

    assert!(next(&sensor, EventKind::Registry).is_none());
    assert!(matches!(next(&sensor, EventKind::Process), Some(Record::Process(_))));
    assert!(matches!(next(&sensor, EventKind::FileSystem), Some(Record::File(_))));
}
