use std::sync::Arc;

use ts_shift_cache::{CacheBuilder, SeekTarget, SeekTranslator, TsShifter};

const SLOT_SIZE: usize = 8;

#[test]
fn byte_seek_repositions_the_read_cursor() {
    let cache = Arc::new(
        CacheBuilder::new()
            .with_ring_slots(4)
            .with_slot_size(SLOT_SIZE)
            .build()
            .unwrap(),
    );
    cache.push(b"11111111").unwrap();
    cache.push(b"22222222").unwrap();

    let shifter = Arc::new(TsShifter::new(cache));
    let seeker = SeekTranslator::new(shifter.clone());

    assert!(seeker.query_seeking(SeekTarget::Bytes(SLOT_SIZE as u64)));
    seeker.seek(SeekTarget::Bytes(SLOT_SIZE as u64), 1.0).unwrap();

    let popped = shifter.pull(false).unwrap().expect("data at the seeked position");
    assert_eq!(&popped[..], b"22222222");
}

#[test]
fn reverse_rate_is_rejected() {
    let cache = Arc::new(
        CacheBuilder::new()
            .with_ring_slots(4)
            .with_slot_size(SLOT_SIZE)
            .build()
            .unwrap(),
    );
    let shifter = Arc::new(TsShifter::new(cache));
    let seeker = SeekTranslator::new(shifter);

    let err = seeker.seek(SeekTarget::Bytes(0), -1.0).unwrap_err();
    assert!(matches!(err, ts_shift_cache::CacheError::SeekRejected(_)));
}

#[test]
fn seek_outside_the_retained_window_is_rejected() {
    let cache = Arc::new(
        CacheBuilder::new()
            .with_ring_slots(4)
            .with_slot_size(SLOT_SIZE)
            .build()
            .unwrap(),
    );
    cache.push(b"11111111").unwrap();
    let shifter = Arc::new(TsShifter::new(cache));
    let seeker = SeekTranslator::new(shifter);

    assert!(!seeker.query_seeking(SeekTarget::Bytes(1_000_000)));
    assert!(seeker.seek(SeekTarget::Bytes(1_000_000), 1.0).is_err());
}

#[test]
fn duration_reflects_retained_bytes() {
    let cache = Arc::new(
        CacheBuilder::new()
            .with_ring_slots(4)
            .with_slot_size(SLOT_SIZE)
            .build()
            .unwrap(),
    );
    cache.push(b"11111111").unwrap();
    cache.push(b"22222222").unwrap();

    let shifter = Arc::new(TsShifter::new(cache));
    let seeker = SeekTranslator::new(shifter);
    assert_eq!(seeker.query_duration_bytes(), 16);
    assert!(seeker.is_seekable());
}
