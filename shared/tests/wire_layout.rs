//! The record layout is an ABI shared with consumers built separately from the driver, so the
//! sizes and offsets are pinned here.

use std::mem::{align_of, offset_of, size_of};

use vigil_shared::wire::{
    EventKind, WideName, WireFileEvent, WireHeader, WireProcess, WireProcessEvent,
    WireRegistryEvent, WireStats, WireTime, WireToken,
};

#[test]
fn leaf_blocks_have_fixed_sizes() {
    assert_eq!(size_of::<WideName>(), 524);
    assert_eq!(size_of::<WireHeader>(), 16);
    assert_eq!(size_of::<WireTime>(), 24);
    assert_eq!(size_of::<WireToken>(), 632);
    assert_eq!(size_of::<WireProcess>(), 1176);
    assert_eq!(size_of::<WireStats>(), 3 * 48 + 16);
}

#[test]
fn process_block_layout() {
    assert_eq!(offset_of!(WireProcess, image), 16);
    assert_eq!(offset_of!(WireProcess, token), 544);
    assert_eq!(offset_of!(WireToken, statistics), 16);
    assert_eq!(offset_of!(WireToken, privileges), 56);
}

#[test]
fn event_records_share_a_prefix() {
    assert_eq!(offset_of!(WireFileEvent, header), 0);
    assert_eq!(offset_of!(WireFileEvent, time), 16);
    assert_eq!(offset_of!(WireFileEvent, process), 40);
    assert_eq!(offset_of!(WireProcessEvent, process), 40);
    assert_eq!(offset_of!(WireRegistryEvent, process), 40);

    assert_eq!(offset_of!(WireFileEvent, path), 1224);
    assert_eq!(offset_of!(WireFileEvent, name), 1748);
    assert_eq!(offset_of!(WireRegistryEvent, key), 1224);
}

#[test]
fn record_sizes_keep_eight_byte_alignment() {
    for kind in EventKind::ALL {
        assert_eq!(kind.record_size() % align_of::<u64>(), 0, "{kind:?}");
    }
    assert_eq!(EventKind::FileSystem.record_size(), 2272);
    assert_eq!(EventKind::Process.record_size(), 1224);
    assert_eq!(EventKind::Registry.record_size(), 2272);
}
