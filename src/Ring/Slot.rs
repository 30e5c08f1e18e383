// Per-slot state machine: a Vyukov-style CAS discipline tracking a variable
// fill level instead of a single published sequence number.
// EMPTY -> PART -> FULL -> POP -> RECYCLE -> EMPTY, with FULL <-> RECYCLE
// shortcuts used by seeking.

use std::cell::UnsafeCell;
use std::sync::atomic::{AtomicU64, AtomicU8, Ordering};

/// Sentinel value for a slot's `stream_offset` when the slot holds no data.
pub const INVALID_OFFSET: u64 = u64::MAX;

/// Default slot size.
pub const DEFAULT_SLOT_SIZE: usize = 32 * 1024;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum SlotState {
    Empty = 0,
    Part = 1,
    Full = 2,
    Pop = 3,
    Recycle = 4,
}

impl SlotState {
    #[inline]
    fn from_raw(raw: u8) -> SlotState {
        match raw {
            0 => SlotState::Empty,
            1 => SlotState::Part,
            2 => SlotState::Full,
            3 => SlotState::Pop,
            4 => SlotState::Recycle,
            _ => unreachable!("invalid slot state byte {raw}"),
        }
    }
}

/// Where a slot's bytes physically live.
pub enum SlotStorage {
    /// Bytes live inline in process memory.
    Inline(UnsafeCell<Box<[u8]>>),
    /// Bytes live in the disk-backed overflow file at this stream offset;
    /// the Disk Overflow component resolves it to a file position.
    Disk,
}

unsafe impl Send for SlotStorage {}
unsafe impl Sync for SlotStorage {}

/// One fixed-size unit of ring storage.
///
/// Access discipline: `state` is the only field modified with a bare CAS.
/// `size` and the inline bytes are written by the producer while it holds
/// exclusive access to the slot (EMPTY/PART, not yet FULL) and published to
/// the consumer by the `Release` store that sets the state to `Full`; the
/// consumer's `Acquire` load on the `Full -> Pop` CAS makes those writes
/// visible before it reads `size` or the bytes.
pub struct Slot {
    state: AtomicU8,
    size: AtomicU64,
    stream_offset: AtomicU64,
    pub storage: SlotStorage,
}

impl Slot {
    pub fn new_inline(slot_size: usize) -> Self {
        Slot {
            state: AtomicU8::new(SlotState::Empty as u8),
            size: AtomicU64::new(0),
            stream_offset: AtomicU64::new(INVALID_OFFSET),
            storage: SlotStorage::Inline(UnsafeCell::new(vec![0u8; slot_size].into_boxed_slice())),
        }
    }

    pub fn new_disk() -> Self {
        Slot {
            state: AtomicU8::new(SlotState::Empty as u8),
            size: AtomicU64::new(0),
            stream_offset: AtomicU64::new(INVALID_OFFSET),
            storage: SlotStorage::Disk,
        }
    }

    #[inline]
    pub fn state(&self) -> SlotState {
        SlotState::from_raw(self.state.load(Ordering::Acquire))
    }

    #[inline]
    pub fn size(&self) -> usize {
        self.size.load(Ordering::Acquire) as usize
    }

    #[inline]
    pub fn set_size(&self, size: usize) {
        self.size.store(size as u64, Ordering::Release);
    }

    #[inline]
    pub fn stream_offset(&self) -> u64 {
        self.stream_offset.load(Ordering::Acquire)
    }

    #[inline]
    pub fn set_stream_offset(&self, offset: u64) {
        self.stream_offset.store(offset, Ordering::Release);
    }

    #[inline]
    pub fn covers(&self, offset: u64) -> bool {
        let start = self.stream_offset();
        if start == INVALID_OFFSET {
            return false;
        }
        offset >= start && offset < start + self.size() as u64
    }

    /// Reset to EMPTY. Only the producer, after reclaiming a RECYCLE slot,
    /// may call this.
    pub fn reset_to_empty(&self) {
        self.set_stream_offset(INVALID_OFFSET);
        self.set_size(0);
        self.state.store(SlotState::Empty as u8, Ordering::Release);
    }

    #[inline]
    fn cas(&self, from: SlotState, to: SlotState) -> bool {
        self.state
            .compare_exchange(from as u8, to as u8, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
    }

    /// CAS RECYCLE -> EMPTY: the producer reclaiming a slot whose last
    /// reader has released it. Returns the reclaimed slot's old
    /// stream_offset/size so the caller can advance `l_stream_offset`.
    pub fn try_recycle_to_empty(&self) -> Option<(u64, usize)> {
        let offset = self.stream_offset();
        let size = self.size();
        if self.cas(SlotState::Recycle, SlotState::Empty) {
            self.set_stream_offset(INVALID_OFFSET);
            self.set_size(0);
            Some((offset, size))
        } else {
            None
        }
    }

    /// CAS PART -> FULL, used to drain a trailing partial slot at EOS.
    pub fn try_drain_to_full(&self) -> bool {
        self.cas(SlotState::Part, SlotState::Full)
    }

    /// Publish a partially-filled slot. Producer-exclusive: only valid
    /// while the slot is EMPTY or PART, so this is a plain store rather
    /// than a CAS.
    #[inline]
    pub fn publish_part(&self) {
        self.state.store(SlotState::Part as u8, Ordering::Release);
    }

    /// Publish a slot as FULL once the producer has written exactly
    /// `slot_size` bytes into it. Producer-exclusive, same as
    /// `publish_part`.
    #[inline]
    pub fn publish_full(&self) {
        self.state.store(SlotState::Full as u8, Ordering::Release);
    }

    /// CAS FULL -> POP: consumer claims the slot for reading.
    pub fn try_claim_for_pop(&self) -> bool {
        self.cas(SlotState::Full, SlotState::Pop)
    }

    /// CAS POP -> RECYCLE: reader has released its borrow.
    pub fn release_from_pop(&self) -> bool {
        self.cas(SlotState::Pop, SlotState::Recycle)
    }

    /// CAS RECYCLE -> FULL ("rollback"): restore a recycled-but-not-yet-
    /// overwritten slot while seeking into the past. Also accepts a slot
    /// that is already FULL (no-op success).
    pub fn try_rollback(&self) -> bool {
        if self.cas(SlotState::Recycle, SlotState::Full) {
            return true;
        }
        self.state() == SlotState::Full
    }

    /// CAS FULL -> RECYCLE ("rollforward"): tombstone a full-but-unread
    /// slot while seeking into the future. Also accepts a slot that is
    /// already RECYCLE.
    pub fn try_rollforward(&self) -> bool {
        if self.cas(SlotState::Full, SlotState::Recycle) {
            return true;
        }
        self.state() == SlotState::Recycle
    }

    /// Exclusive write access to the inline bytes. Caller must guarantee
    /// only the producer calls this, and only while the slot is EMPTY or
    /// PART (not yet published as FULL).
    ///
    /// # Safety
    /// The caller must not alias this with a concurrent read of the same
    /// bytes; the slot state machine is the only thing enforcing that.
    #[inline]
    pub unsafe fn inline_bytes_mut(&self) -> &mut [u8] {
        match &self.storage {
            SlotStorage::Inline(cell) => &mut *cell.get(),
            SlotStorage::Disk => panic!("inline_bytes_mut called on a disk-backed slot"),
        }
    }

    /// Shared read access to the filled portion of the inline bytes. Caller
    /// must guarantee the slot is at least FULL (or POP) when this is
    /// called, per the state machine's publish/acquire discipline.
    #[inline]
    pub fn inline_bytes(&self) -> &[u8] {
        match &self.storage {
            SlotStorage::Inline(cell) => {
                let full = unsafe { &*cell.get() };
                &full[..self.size()]
            }
            SlotStorage::Disk => panic!("inline_bytes called on a disk-backed slot"),
        }
    }
}
