// Shared `Debug` formatting helpers: each type's trait impl is a one-line
// call into a plain function here, so the formatting logic for "a retained
// byte range" or "a slot count" isn't duplicated across every component
// that reports one.

use std::fmt;

pub fn fmt_byte_range(f: &mut fmt::Formatter<'_>, lo: u64, hi: u64) -> fmt::Result {
    write!(f, "{}..{} ({} bytes)", lo, hi, hi.saturating_sub(lo))
}

pub fn fmt_slot_occupancy(f: &mut fmt::Formatter<'_>, full: usize, total: usize, slot_size: usize) -> fmt::Result {
    write!(f, "{full}/{total} slots full ({slot_size} bytes/slot)")
}
