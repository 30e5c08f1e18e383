// Disk-backed overflow.
//
// Structurally this is the same slot ring as `Ring::Buffer`, just with the
// bytes living in a backing file instead of process memory: writes go
// through `pwrite`, reads come back as a `mmap`'d view, and the file's page
// cache is coaxed with `sync_file_range`/`posix_fadvise` rather than left to
// the kernel's default writeback heuristics.

use std::fs::{File, OpenOptions};
use std::io;
use std::ops::Deref;
use std::os::unix::io::{AsRawFd, RawFd};
use std::path::Path;
use std::ptr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;

use crate::Ring::Slot::{Slot, SlotState, INVALID_OFFSET};

/// Sync dirty pages to disk every this many newly-filled slots, so a crash
/// loses at most this many slots' worth of unflushed writes.
const PAGE_SYNC_TIME_SLOTS: usize = 20;
/// Drop a read slot's pages from cache once the reader is this many slots
/// ahead of it, so a slow-draining backlog doesn't pin the whole file in
/// memory.
const READ_KEEP_PAGE_SLOTS: usize = 10;

pub enum PushOutcome {
    Written(usize),
    Blocked { written: usize },
}

struct DiskPositions {
    head: usize,
    tail: usize,
    h_stream_offset: u64,
    l_stream_offset: u64,
    h_total: u64,
    need_discont: bool,
    /// Count of slots published FULL so far, used to find the slot written
    /// exactly `PAGE_SYNC_TIME_SLOTS` writes before the one just finished.
    full_writes_completed: u64,
}

pub struct DiskOverflow {
    file: File,
    slots: Vec<Slot>,
    slot_size: usize,
    full_count: AtomicUsize,
    positions: Mutex<DiskPositions>,
}

impl DiskOverflow {
    pub fn create(path: impl AsRef<Path>, n_slots: usize, slot_size: usize) -> io::Result<Arc<DiskOverflow>> {
        assert!(n_slots > 0, "disk overflow must have at least one slot");
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(true)
            .open(path)?;
        file.set_len((n_slots * slot_size) as u64)?;

        let slots = (0..n_slots).map(|_| Slot::new_disk()).collect();
        Ok(Arc::new(DiskOverflow {
            file,
            slots,
            slot_size,
            full_count: AtomicUsize::new(0),
            positions: Mutex::new(DiskPositions {
                head: 0,
                tail: 0,
                h_stream_offset: 0,
                l_stream_offset: 0,
                h_total: 0,
                need_discont: true,
                full_writes_completed: 0,
            }),
        }))
    }

    fn raw_fd(&self) -> RawFd {
        self.file.as_raw_fd()
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

    fn slot_file_offset(&self, idx: usize) -> i64 {
        (idx * self.slot_size) as i64
    }

    fn pwrite_slot(&self, idx: usize, within_slot: usize, data: &[u8]) -> io::Result<()> {
        let file_off = self.slot_file_offset(idx) + within_slot as i64;
        let ret = unsafe {
            libc::pwrite(
                self.raw_fd(),
                data.as_ptr() as *const libc::c_void,
                data.len(),
                file_off,
            )
        };
        if ret < 0 || ret as usize != data.len() {
            return Err(io::Error::last_os_error());
        }
        Ok(())
    }

    /// Kick off async writeback for the slot just written, without waiting
    /// for it to land.
    fn sync_slot_range_write(&self, idx: usize) {
        let off = self.slot_file_offset(idx);
        unsafe {
            libc::sync_file_range(
                self.raw_fd(),
                off,
                self.slot_size as i64,
                libc::SYNC_FILE_RANGE_WRITE,
            );
        }
    }

    /// Wait for an older slot's writeback (kicked off by a prior call to
    /// `sync_slot_range_write`) to fully complete, so it's safe to evict its
    /// pages afterward.
    fn sync_slot_range_wait(&self, idx: usize) {
        let off = self.slot_file_offset(idx);
        unsafe {
            libc::sync_file_range(
                self.raw_fd(),
                off,
                self.slot_size as i64,
                libc::SYNC_FILE_RANGE_WAIT_BEFORE | libc::SYNC_FILE_RANGE_WRITE | libc::SYNC_FILE_RANGE_WAIT_AFTER,
            );
        }
    }

    fn advise_dontneed(&self, idx: usize) {
        let off = self.slot_file_offset(idx);
        unsafe {
            libc::posix_fadvise(self.raw_fd(), off, self.slot_size as i64, libc::POSIX_FADV_DONTNEED);
        }
    }

    /// Whether slot `idx` is within the reader's keep window: at most
    /// `READ_KEEP_PAGE_SLOTS` slots behind the current read head, where a
    /// recent backward seek might still want it warm in the page cache.
    fn within_reader_keep_window(&self, idx: usize, positions: &DiskPositions) -> bool {
        let n = self.slots.len();
        let behind = (positions.head + n - idx) % n;
        behind <= READ_KEEP_PAGE_SLOTS
    }

    fn reclaim_tail(&self, positions: &mut DiskPositions, idx: usize) {
        let tail = &self.slots[idx];
        if tail.state() == SlotState::Recycle {
            if let Some((offset, size)) = tail.try_recycle_to_empty() {
                if offset != INVALID_OFFSET {
                    positions.l_stream_offset = positions.l_stream_offset.max(offset + size as u64);
                }
            }
        }
    }

    pub fn push(&self, data: &[u8]) -> io::Result<PushOutcome> {
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

                    self.pwrite_slot(tail_idx, cur_size, &data[written..written + chunk])?;
                    tail.set_size(cur_size + chunk);
                    written += chunk;
                    positions.h_total += chunk as u64;

                    if cur_size + chunk == self.slot_size {
                        tail.publish_full();
                        self.full_count.fetch_add(1, Ordering::AcqRel);
                        positions.tail = (tail_idx + 1) % self.slots.len();
                        positions.h_stream_offset += self.slot_size as u64;

                        // Kick off writeback for the slot just filled...
                        self.sync_slot_range_write(tail_idx);
                        positions.full_writes_completed += 1;

                        // ...then finish writeback for the slot filled
                        // PAGE_SYNC_TIME_SLOTS writes ago and drop its pages
                        // now that it's safely on disk, unless the reader
                        // might still want them.
                        if positions.full_writes_completed > PAGE_SYNC_TIME_SLOTS as u64 {
                            let n = self.slots.len();
                            let older_idx = (tail_idx + n - PAGE_SYNC_TIME_SLOTS % n) % n;
                            self.sync_slot_range_wait(older_idx);
                            if !self.within_reader_keep_window(older_idx, &positions) {
                                self.advise_dontneed(older_idx);
                            }
                        }
                    } else {
                        tail.publish_part();
                    }
                }
                SlotState::Full | SlotState::Pop | SlotState::Recycle => {
                    return Ok(PushOutcome::Blocked { written });
                }
            }
        }
        Ok(PushOutcome::Written(written))
    }

    fn drain_head(&self, positions: &mut DiskPositions) {
        let head_idx = positions.head;
        let head = &self.slots[head_idx];
        if head.try_drain_to_full() {
            positions.h_stream_offset = positions.h_stream_offset.max(head.stream_offset() + head.size() as u64);
            self.full_count.fetch_add(1, Ordering::AcqRel);
        }
    }

    /// Close a trailing PART slot into FULL without popping it. See
    /// `Ring::finalize_partial` for why this is distinct from `pop(true)`.
    pub fn finalize_partial(&self) {
        let mut positions = self.positions.lock();
        self.drain_head(&mut positions);
    }

    /// Takes `disk: &Arc<DiskOverflow>` rather than a `self: &Arc<Self>`
    /// receiver, for the same reason as `Ring::pop`.
    pub fn pop(disk: &Arc<DiskOverflow>, drain: bool) -> io::Result<Option<DiskPop>> {
        let mut positions = disk.positions.lock();
        if drain {
            disk.drain_head(&mut positions);
        }

        let head_idx = positions.head;
        let head = &disk.slots[head_idx];
        if !head.try_claim_for_pop() {
            return Ok(None);
        }
        disk.full_count.fetch_sub(1, Ordering::AcqRel);

        let discont = positions.need_discont;
        positions.need_discont = false;
        let stream_offset = head.stream_offset();
        let size = head.size();
        positions.head = (head_idx + 1) % disk.slots.len();

        let keep_idx = head_idx.checked_sub(READ_KEEP_PAGE_SLOTS).unwrap_or(0);
        if keep_idx != head_idx {
            disk.advise_dontneed(keep_idx);
        }

        let map = disk.mmap_slot(head_idx, size)?;
        Ok(Some(DiskPop {
            disk: Arc::clone(disk),
            slot_index: head_idx,
            map,
            map_len: size,
            stream_offset,
            size,
            discont,
        }))
    }

    fn mmap_slot(&self, idx: usize, size: usize) -> io::Result<*mut u8> {
        if size == 0 {
            return Ok(ptr::null_mut());
        }
        let off = self.slot_file_offset(idx);
        let addr = unsafe {
            libc::mmap(
                ptr::null_mut(),
                size,
                libc::PROT_READ,
                libc::MAP_PRIVATE | libc::MAP_POPULATE,
                self.raw_fd(),
                off,
            )
        };
        if addr == libc::MAP_FAILED {
            return Err(io::Error::last_os_error());
        }
        Ok(addr as *mut u8)
    }

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

    pub fn buffered_range(&self) -> (u64, u64) {
        let positions = self.positions.lock();
        (positions.l_stream_offset, positions.h_total)
    }
}

impl std::fmt::Debug for DiskOverflow {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let (lo, hi) = self.buffered_range();
        f.debug_struct("DiskOverflow")
            .field("slot_size", &self.slot_size)
            .field("n_slots", &self.slots.len())
            .field("retained", &{
                struct R(u64, u64);
                impl std::fmt::Display for R {
                    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                        crate::Debug::fmt_byte_range(f, self.0, self.1)
                    }
                }
                R(lo, hi).to_string()
            })
            .finish()
    }
}

/// A borrowed read reference to a popped disk slot's bytes, backed by a
/// private read-only mapping. Unmapped and faded from the page cache on
/// drop.
pub struct DiskPop {
    disk: Arc<DiskOverflow>,
    slot_index: usize,
    map: *mut u8,
    map_len: usize,
    pub stream_offset: u64,
    pub size: usize,
    pub discont: bool,
}

unsafe impl Send for DiskPop {}

impl Deref for DiskPop {
    type Target = [u8];
    fn deref(&self) -> &[u8] {
        if self.map.is_null() {
            &[]
        } else {
            unsafe { std::slice::from_raw_parts(self.map, self.map_len) }
        }
    }
}

impl Drop for DiskPop {
    fn drop(&mut self) {
        if !self.map.is_null() {
            unsafe {
                libc::munmap(self.map as *mut libc::c_void, self.map_len);
            }
        }
        let released = self.disk.slots[self.slot_index].release_from_pop();
        debug_assert!(released, "popped disk slot was not in POP state on release");
    }
}
