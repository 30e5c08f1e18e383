// The in-memory slot ring.
//
// Position bookkeeping (head/tail/h_stream_offset/l_stream_offset/h_total/
// need_discont) lives behind a single `parking_lot::Mutex`. Per-slot state
// stays outside that lock and is only ever touched with a bare CAS, so a
// producer advancing `tail` never blocks a consumer advancing `head`.

use std::ops::Deref;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use crossbeam_utils::CachePadded;
use parking_lot::Mutex;

use super::Slot::{Slot, SlotState, INVALID_OFFSET};
use crate::Core::CacheError;

/// Outcome of a `push`.
pub enum PushOutcome {
    /// All bytes were accepted.
    Written(usize),
    /// The tail slot is FULL or POP (a consumer hasn't advanced); `written`
    /// bytes from the start of the input were accepted before the ring
    /// blocked. The caller decides whether to wait, drop with an overrun
    /// signal, or forward the remainder to disk overflow.
    Blocked { written: usize },
}

/// Bookkeeping mutated under `Ring::positions`. Single-writer per field
/// (producer advances `tail`/`h_stream_offset`, consumer advances `head`),
/// but cross-thread reads require the lock.
pub struct RingPositions {
    pub head: usize,
    pub tail: usize,
    pub h_stream_offset: u64,
    pub l_stream_offset: u64,
    pub h_total: u64,
    pub need_discont: bool,
}

impl RingPositions {
    fn new() -> Self {
        RingPositions {
            head: 0,
            tail: 0,
            h_stream_offset: 0,
            l_stream_offset: 0,
            h_total: 0,
            need_discont: true,
        }
    }
}

pub struct Ring {
    slots: Vec<Slot>,
    slot_size: usize,
    // Touched by both producer (push) and consumer (pop); padded to its own
    // cache line to avoid false sharing across those two access patterns.
    full_count: CachePadded<AtomicUsize>,
    positions: Mutex<RingPositions>,
}

impl Ring {
    pub fn new(n_slots: usize, slot_size: usize) -> Arc<Ring> {
        assert!(n_slots > 0, "ring must have at least one slot");
        let slots = (0..n_slots).map(|_| Slot::new_inline(slot_size)).collect();
        Arc::new(Ring {
            slots,
            slot_size,
            full_count: CachePadded::new(AtomicUsize::new(0)),
            positions: Mutex::new(RingPositions::new()),
        })
    }

    pub fn slot_size(&self) -> usize {
        self.slot_size
    }

    pub fn n_slots(&self) -> usize {
        self.slots.len()
    }

    pub fn capacity(&self) -> u64 {
        (self.slots.len() * self.slot_size) as u64
    }

    pub fn is_empty(&self) -> bool {
        self.full_count.load(Ordering::Acquire) == 0
    }

    fn reclaim_tail(&self, positions: &mut RingPositions, idx: usize) {
        let tail = &self.slots[idx];
        if tail.state() == SlotState::Recycle {
            if let Some((offset, size)) = tail.try_recycle_to_empty() {
                if offset != INVALID_OFFSET {
                    positions.l_stream_offset = positions.l_stream_offset.max(offset + size as u64);
                }
            }
        }
    }

    /// Append `data` at the tail. See `PushOutcome` for the blocked case.
    pub fn push(&self, data: &[u8]) -> PushOutcome {
        let mut positions = self.positions.lock();
        let mut written = 0usize;

        while written < data.len() {
            let tail_idx = positions.tail;
            self.reclaim_tail(&mut positions, tail_idx);
            let tail = &self.slots[tail_idx];

            match tail.state() {
                SlotState::Empty | SlotState::Part => {
                    let cur_size = tail.size();
                    if cur_size == 0 {
                        tail.set_stream_offset(positions.h_stream_offset);
                    }
                    let avail = self.slot_size - cur_size;
                    let chunk = avail.min(data.len() - written);

                    unsafe {
                        let buf = tail.inline_bytes_mut();
                        buf[cur_size..cur_size + chunk]
                            .copy_from_slice(&data[written..written + chunk]);
                    }
                    tail.set_size(cur_size + chunk);
                    written += chunk;

                    if cur_size + chunk == self.slot_size {
                        tail.publish_full();
                        self.full_count.fetch_add(1, Ordering::AcqRel);
                        positions.tail = (tail_idx + 1) % self.slots.len();
                        positions.h_stream_offset += self.slot_size as u64;
                    } else {
                        tail.publish_part();
                    }
                    positions.h_total += chunk as u64;
                }
                SlotState::Full | SlotState::Pop | SlotState::Recycle => {
                    return PushOutcome::Blocked { written };
                }
            }
        }
        PushOutcome::Written(written)
    }

    /// Force-close a trailing PART slot so its bytes can be drained at EOS.
    /// Returns true if the head slot transitioned (or already was FULL).
    fn drain_head(&self, positions: &mut RingPositions) {
        let head_idx = positions.head;
        let head = &self.slots[head_idx];
        if head.try_drain_to_full() {
            positions.h_stream_offset = positions.h_stream_offset.max(head.stream_offset() + head.size() as u64);
            self.full_count.fetch_add(1, Ordering::AcqRel);
        }
    }

    /// Close a trailing PART slot into FULL without popping it, so the
    /// consumer can still read it back later. Used at end-of-stream: unlike
    /// `pop(drain: true)`, this never removes data from the ring.
    pub fn finalize_partial(&self) {
        let mut positions = self.positions.lock();
        self.drain_head(&mut positions);
    }

    /// Pop the head slot. Returns `None` if the cache has nothing ready
    /// (or, with `drain`, the head slot is entirely empty).
    ///
    /// Takes `ring: &Arc<Ring>` rather than a `self: &Arc<Self>` receiver:
    /// the returned `RingPop` must outlive any borrow of `ring` itself, and
    /// `&Arc<Self>` isn't a stable arbitrary self type.
    pub fn pop(ring: &Arc<Ring>, drain: bool) -> Option<RingPop> {
        let mut positions = ring.positions.lock();
        if drain {
            ring.drain_head(&mut positions);
        }

        let head_idx = positions.head;
        let head = &ring.slots[head_idx];
        if !head.try_claim_for_pop() {
            return None;
        }
        ring.full_count.fetch_sub(1, Ordering::AcqRel);

        let discont = positions.need_discont;
        positions.need_discont = false;
        let stream_offset = head.stream_offset();
        let size = head.size();
        positions.head = (head_idx + 1) % ring.slots.len();

        Some(RingPop {
            ring: Arc::clone(ring),
            slot_index: head_idx,
            stream_offset,
            size,
            discont,
        })
    }

    /// Reconfigure `head` so the next pop resumes at `target`. Returns
    /// `false` if `target` falls outside the in-ring window (the caller
    /// should then consult disk overflow).
    pub fn seek(&self, target: u64) -> bool {
        let mut positions = self.positions.lock();
        let lo = positions.l_stream_offset;
        let hi = positions.h_stream_offset;
        let target = target.clamp(lo, hi);

        if !(target >= lo && target < hi) {
            return false;
        }

        let n = self.slots.len();
        let mut seeker = positions.head;
        let mut head = &self.slots[seeker];

        if target >= head.stream_offset() {
            if target < head.stream_offset() + head.size() as u64 {
                head.try_rollback();
            } else {
                loop {
                    head.try_rollforward();
                    seeker = (seeker + 1) % n;
                    head = &self.slots[seeker];
                    if target >= head.stream_offset()
                        && target < head.stream_offset() + head.size() as u64
                    {
                        break;
                    }
                }
                head.try_rollback();
                positions.need_discont = true;
            }
        } else {
            head.try_rollback();
            loop {
                seeker = if seeker == 0 { n - 1 } else { seeker - 1 };
                head = &self.slots[seeker];
                if !head.try_rollback() {
                    seeker = (seeker + 1) % n;
                    break;
                }
                if target >= head.stream_offset() && target < head.stream_offset() + head.size() as u64 {
                    break;
                }
            }
            positions.need_discont = true;
        }

        positions.head = seeker;
        true
    }

    pub fn has_offset(&self, x: u64) -> bool {
        let positions = self.positions.lock();
        x >= positions.l_stream_offset && x < positions.h_total
    }

    pub fn fullness(&self) -> u64 {
        if self.is_empty() {
            return 0;
        }
        let positions = self.positions.lock();
        let head = &self.slots[positions.head];
        let tail = &self.slots[positions.tail];
        tail.stream_offset()
            .saturating_sub(head.stream_offset())
            .saturating_add(head.size() as u64)
    }

    pub fn buffered_range(&self) -> (u64, u64) {
        let positions = self.positions.lock();
        (positions.l_stream_offset, positions.h_total)
    }

    pub fn high_water_offset(&self) -> u64 {
        self.positions.lock().h_stream_offset
    }

    /// Try to forward a currently-FULL tail slot's bytes to a sink before
    /// the producer overwrites it. Used by the Cache Facade to implement
    /// "forwards to disk" backpressure relief: pops the oldest data out of
    /// the way rather than dropping it.
    pub fn evict_oldest(ring: &Arc<Ring>) -> Option<RingPop> {
        Ring::pop(ring, false)
    }

    /// Forcibly discard the oldest unread slot so the producer can keep
    /// writing when there is nowhere to forward it (no disk overflow
    /// configured). The blocking tail slot and the oldest unread (head)
    /// slot always coincide once the ring is completely full, so this
    /// tombstones and immediately reclaims the tail slot in place.
    ///
    /// Returns the number of bytes discarded, or `None` if the slot is
    /// currently claimed by a reader (POP) and can't be safely overwritten.
    pub fn force_evict_oldest(&self) -> Option<usize> {
        let mut positions = self.positions.lock();
        let idx = positions.tail;
        let slot = &self.slots[idx];
        if !slot.try_rollforward() {
            return None;
        }
        // The producer is the only writer of `tail`, so the slot it just
        // tombstoned is always reclaimable immediately.
        let reclaimed = slot.try_recycle_to_empty();
        debug_assert!(reclaimed.is_some(), "tombstoned tail slot must still be reclaimable");
        let (offset, size) = reclaimed?;
        if offset != INVALID_OFFSET {
            positions.l_stream_offset = positions.l_stream_offset.max(offset + size as u64);
        }
        self.full_count.fetch_sub(1, Ordering::AcqRel);
        positions.head = (positions.head + 1) % self.slots.len();
        positions.need_discont = true;
        Some(size)
    }

    #[cfg(test)]
    pub(crate) fn debug_positions(&self) -> (usize, usize, u64, u64, u64, bool) {
        let p = self.positions.lock();
        (p.head, p.tail, p.h_stream_offset, p.l_stream_offset, p.h_total, p.need_discont)
    }
}

/// A borrowed read reference to a popped slot's bytes.
///
/// On drop, transitions the slot POP -> RECYCLE, matching the invariant
/// that a slot's bytes must remain immutable while a reference is
/// outstanding.
pub struct RingPop {
    ring: Arc<Ring>,
    slot_index: usize,
    pub stream_offset: u64,
    pub size: usize,
    pub discont: bool,
}

impl Deref for RingPop {
    type Target = [u8];
    fn deref(&self) -> &[u8] {
        self.ring.slots[self.slot_index].inline_bytes()
    }
}

impl Drop for RingPop {
    fn drop(&mut self) {
        let released = self.ring.slots[self.slot_index].release_from_pop();
        debug_assert!(released, "popped slot was not in POP state on release");
    }
}

struct RingOccupancy<'a>(&'a Ring);

impl std::fmt::Display for RingOccupancy<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        crate::Debug::fmt_slot_occupancy(f, self.0.full_count.load(Ordering::Acquire), self.0.slots.len(), self.0.slot_size)
    }
}

impl std::fmt::Debug for Ring {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Ring")
            .field("slot_size", &self.slot_size)
            .field("occupancy", &RingOccupancy(self).to_string())
            .finish()
    }
}

impl From<PushOutcome> for Result<usize, CacheError> {
    fn from(outcome: PushOutcome) -> Self {
        match outcome {
            PushOutcome::Written(n) => Ok(n),
            PushOutcome::Blocked { written } if written > 0 => Ok(written),
            PushOutcome::Blocked { .. } => Err(CacheError::NoSpace),
        }
    }
}
