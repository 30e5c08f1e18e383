use ts_shift_cache::Index::{Index, LookupMethod, ASSOC_KEY_UNIT, ASSOC_NONE};

fn sample_index() -> Index {
    let mut idx = Index::new();
    idx.add_association(100, 10, ASSOC_NONE);
    idx.add_association(200, 20, ASSOC_KEY_UNIT);
    idx.add_association(300, 30, ASSOC_NONE);
    idx
}

#[test]
fn exact_lookup_by_time() {
    let idx = sample_index();
    let a = idx.get_by_time(LookupMethod::Exact, ASSOC_NONE, 200).expect("entry at 200");
    assert_eq!(a.byte_offset, 20);
    assert!(a.is_key_unit());
    assert!(idx.get_by_time(LookupMethod::Exact, ASSOC_NONE, 150).is_none());
}

#[test]
fn before_and_after_lookup_by_time() {
    let idx = sample_index();
    assert_eq!(idx.get_by_time(LookupMethod::Before, ASSOC_NONE, 250).unwrap().time_ns, 200);
    assert_eq!(idx.get_by_time(LookupMethod::After, ASSOC_NONE, 150).unwrap().time_ns, 200);
    assert!(idx.get_by_time(LookupMethod::Before, ASSOC_NONE, 50).is_none());
    assert!(idx.get_by_time(LookupMethod::After, ASSOC_NONE, 350).is_none());
}

#[test]
fn byte_lookup_mirrors_time_lookup() {
    let idx = sample_index();
    assert_eq!(idx.get_by_byte(LookupMethod::Exact, ASSOC_NONE, 20).unwrap().time_ns, 200);
    assert_eq!(idx.get_by_byte(LookupMethod::Before, ASSOC_NONE, 25).unwrap().byte_offset, 20);
    assert_eq!(idx.get_by_byte(LookupMethod::After, ASSOC_NONE, 15).unwrap().byte_offset, 20);
}

#[test]
fn retain_from_drops_entries_below_the_low_water_mark() {
    let mut idx = sample_index();
    idx.retain_from(25);
    assert_eq!(idx.len(), 1);
    assert!(idx.get_by_time(LookupMethod::Exact, ASSOC_NONE, 100).is_none());
    assert!(idx.get_by_time(LookupMethod::Exact, ASSOC_NONE, 200).is_none());
    assert_eq!(idx.get_by_time(LookupMethod::Exact, ASSOC_NONE, 300).unwrap().byte_offset, 30);
}

#[test]
fn time_range_spans_the_oldest_and_newest_entries() {
    let idx = sample_index();
    assert_eq!(idx.time_range(), Some((100, 300)));
}

#[test]
fn flagged_lookup_scans_sideways_past_a_non_matching_nearest_hit() {
    let idx = sample_index();

    // Nearest entry at-or-before 250 is 200 (key unit), which does carry it.
    let hit = idx.get_by_time(LookupMethod::Before, ASSOC_KEY_UNIT, 250).unwrap();
    assert_eq!(hit.time_ns, 200);

    // Nearest entry at-or-before 300 is 300 itself, which has no flags, so
    // BEFORE must keep scanning older until it reaches the 200 key unit.
    let hit = idx.get_by_time(LookupMethod::Before, ASSOC_KEY_UNIT, 300).unwrap();
    assert_eq!(hit.time_ns, 200);

    // Nearest entry at-or-after 100 is 100 itself (no flags), so AFTER must
    // keep scanning newer until it reaches the 200 key unit.
    let hit = idx.get_by_time(LookupMethod::After, ASSOC_KEY_UNIT, 100).unwrap();
    assert_eq!(hit.time_ns, 200);

    // No key-unit entry exists at or after 300.
    assert!(idx.get_by_time(LookupMethod::After, ASSOC_KEY_UNIT, 300).is_none());

    // The byte axis scans the same way.
    let hit = idx.get_by_byte(LookupMethod::Before, ASSOC_KEY_UNIT, 30).unwrap();
    assert_eq!(hit.byte_offset, 20);
}
