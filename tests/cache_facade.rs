use ts_shift_cache::{CacheBuilder, CacheEvent};

const SLOT_SIZE: usize = 8;

#[test]
fn push_then_pop_round_trip_with_no_disk_configured() {
    let cache = CacheBuilder::new()
        .with_ring_slots(4)
        .with_slot_size(SLOT_SIZE)
        .build()
        .unwrap();

    cache.push(b"12345678").unwrap();
    cache.push(b"ABCDEFGH").unwrap();

    let first = cache.pop(false).unwrap().expect("data ready");
    assert_eq!(&first[..], b"12345678");
    drop(first);
    let second = cache.pop(false).unwrap().expect("data ready");
    assert_eq!(&second[..], b"ABCDEFGH");
}

#[test]
fn push_overwrites_the_oldest_slot_once_full_without_disk_overflow() {
    let cache = CacheBuilder::new()
        .with_ring_slots(4)
        .with_slot_size(SLOT_SIZE)
        .build()
        .unwrap();

    // Four 8-byte slots hold 32 bytes; the 40th byte forces the producer
    // to recycle the oldest slot rather than stall or error out.
    let written = cache.push(&[7u8; 40]).unwrap();
    assert_eq!(written, 40, "every byte should be accepted by overwriting the oldest slot");

    let (lo, _hi) = cache.buffered_range();
    assert_eq!(lo, 8, "the oldest 8-byte slot should have been evicted");
    assert!(cache.has_offset(39));
    assert!(!cache.has_offset(40));

    let event = cache.try_recv_event().expect("an overrun event should have been emitted");
    assert!(matches!(event, CacheEvent::Overrun { dropped: 8 }));
}

#[test]
fn overrun_spills_the_oldest_ring_data_to_disk() {
    let dir = tempfile::tempdir().expect("tempdir");
    let cache = CacheBuilder::new()
        .with_ring_slots(2)
        .with_slot_size(SLOT_SIZE)
        .with_disk_overflow(dir.path().join("overflow.bin"), 4)
        .build()
        .unwrap();

    // Six slots' worth of data through a two-slot ring: the first four
    // should migrate to disk as the ring fills behind the producer.
    for i in 0..6u8 {
        cache.push(&[i; SLOT_SIZE]).unwrap();
    }

    assert!(!cache.is_empty());
    let first = cache.pop(false).unwrap().expect("oldest data should have spilled to disk");
    assert_eq!(first[0], 0, "disk overflow should drain oldest-first");
}

#[test]
fn has_offset_reflects_the_retained_window() {
    let cache = CacheBuilder::new()
        .with_ring_slots(4)
        .with_slot_size(SLOT_SIZE)
        .build()
        .unwrap();

    cache.push(b"12345678").unwrap();
    assert!(cache.has_offset(0));
    assert!(!cache.has_offset(100));
}
