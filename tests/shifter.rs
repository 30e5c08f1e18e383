use std::sync::Arc;

use ts_shift_cache::{CacheBuilder, CacheError, Segment, TsShifter};

const SLOT_SIZE: usize = 8;

fn new_shifter() -> Arc<TsShifter> {
    let cache = Arc::new(
        CacheBuilder::new()
            .with_ring_slots(4)
            .with_slot_size(SLOT_SIZE)
            .build()
            .unwrap(),
    );
    Arc::new(TsShifter::new(cache))
}

#[test]
fn push_and_pull_round_trip() {
    let shifter = new_shifter();
    shifter.push(b"12345678").unwrap();
    let popped = shifter.pull(false).unwrap().expect("data ready");
    assert_eq!(&popped[..], b"12345678");
}

#[test]
fn pending_events_surface_stream_start_and_segment_once() {
    let shifter = new_shifter();
    shifter.note_stream_start(7);
    shifter.set_segment(Segment { start: 0, stop: None, rate: 1.0 });

    shifter.push(b"12345678").unwrap();
    let popped = shifter.pull(false).unwrap().expect("data ready");
    let offset = popped.stream_offset();
    drop(popped);

    let (stream_start, segment) = shifter.take_pending_events(offset);
    assert_eq!(stream_start.unwrap().stream_id, 7);
    assert_eq!(segment.unwrap().start, offset);

    // Both are one-shot: asking again yields nothing until re-armed.
    let (stream_start, segment) = shifter.take_pending_events(offset);
    assert!(stream_start.is_none());
    assert!(segment.is_none());
}

#[test]
fn downstream_refusal_blocks_pushes_until_a_segment_rearms_it() {
    let shifter = new_shifter();
    shifter.mark_downstream_unexpected();

    let err = shifter.push(b"12345678").unwrap_err();
    assert!(matches!(err, CacheError::NotLinked));

    shifter.set_segment(Segment { start: 0, stop: None, rate: 1.0 });
    shifter.push(b"12345678").unwrap();
}

#[test]
fn cur_bytes_tracks_bytes_handed_to_the_consumer() {
    let shifter = new_shifter();
    shifter.push(b"12345678").unwrap();
    shifter.push(b"ABCDEFGH").unwrap();

    assert_eq!(shifter.cur_bytes(), 0);
    shifter.pull(false).unwrap();
    assert_eq!(shifter.cur_bytes(), 8);
    shifter.pull(false).unwrap();
    assert_eq!(shifter.cur_bytes(), 16);
}
