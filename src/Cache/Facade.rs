// Cache Facade. Ties the in-memory ring, the optional disk overflow, the
// PCR extractor and the time/byte index into the single read/write surface
// a shifter pipeline talks to.
//
// The facade keeps one coordination mutex for operations that must see the
// ring and disk as a single ordered stream: push migrating ring->disk on
// overrun, pop draining disk before ring, seek crossing the ring/disk
// boundary.

use std::ops::Deref;
use std::sync::mpsc::{self, Receiver, Sender};
use std::sync::Arc;

use parking_lot::Mutex;

use crate::Cache::Config::{CacheBuilder, CacheConfig};
use crate::Cache::Event::CacheEvent;
use crate::Core::{CacheError, CacheResult};
use crate::Disk::{DiskOverflow, DiskPop, DiskPushOutcome};
use crate::Index::{Association, Index, LookupMethod, ASSOC_KEY_UNIT, ASSOC_NONE};
use crate::Pcr::{pcr_to_ns, PcrExtractor};
use crate::Ring::{PushOutcome, Ring, RingPop};

struct FacadeState {
    total_pushed: u64,
}

pub struct Cache {
    ring: Arc<Ring>,
    disk: Option<Arc<DiskOverflow>>,
    index: Mutex<Index>,
    pcr: Mutex<PcrExtractor>,
    state: Mutex<FacadeState>,
    tx: Sender<CacheEvent>,
    rx: Mutex<Receiver<CacheEvent>>,
}

/// A popped chunk, from whichever of the ring or disk overflow held the
/// oldest unread data.
pub enum CachePop {
    Ring(RingPop),
    Disk(DiskPop),
}

impl CachePop {
    pub fn stream_offset(&self) -> u64 {
        match self {
            CachePop::Ring(p) => p.stream_offset,
            CachePop::Disk(p) => p.stream_offset,
        }
    }

    pub fn discont(&self) -> bool {
        match self {
            CachePop::Ring(p) => p.discont,
            CachePop::Disk(p) => p.discont,
        }
    }
}

impl Deref for CachePop {
    type Target = [u8];
    fn deref(&self) -> &[u8] {
        match self {
            CachePop::Ring(p) => p,
            CachePop::Disk(p) => p,
        }
    }
}

impl CacheBuilder {
    pub fn build(self) -> std::io::Result<Cache> {
        let config: CacheConfig = self.config();
        let ring = Ring::new(config.n_ring_slots, config.slot_size);
        let disk = match &config.disk {
            Some(d) => Some(DiskOverflow::create(&d.path, d.n_slots, config.slot_size)?),
            None => None,
        };
        let pcr = PcrExtractor::new(config.ts_packet_size, config.pcr_pid, config.pcr_delta_ms);
        let (tx, rx) = mpsc::channel();

        Ok(Cache {
            ring,
            disk,
            index: Mutex::new(Index::new()),
            pcr: Mutex::new(pcr),
            state: Mutex::new(FacadeState { total_pushed: 0 }),
            tx,
            rx: Mutex::new(rx),
        })
    }
}

impl std::fmt::Debug for Cache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let (lo, hi) = self.buffered_range();
        f.debug_struct("Cache")
            .field("ring", &self.ring)
            .field("disk", &self.disk.is_some())
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

impl Cache {
    fn emit(&self, event: CacheEvent) {
        let _ = self.tx.send(event);
    }

    /// Drain one pending lifecycle event, if any. Non-blocking.
    pub fn try_recv_event(&self) -> Option<CacheEvent> {
        self.rx.lock().try_recv().ok()
    }

    /// Append `data` at the tail of the stream. Scans it for PCR values
    /// before committing bytes, so index entries and their byte offsets
    /// never race ahead of what's actually retained.
    pub fn push(&self, data: &[u8]) -> CacheResult<usize> {
        let mut state = self.state.lock();
        let base_offset = state.total_pushed;

        let samples = self.pcr.lock().scan(data, base_offset);
        if !samples.is_empty() {
            let mut index = self.index.lock();
            for sample in &samples {
                let flags = if sample.random_access { ASSOC_KEY_UNIT } else { ASSOC_NONE };
                index.add_association(pcr_to_ns(sample.pcr_27mhz), sample.byte_offset, flags);
            }
            drop(index);
            for sample in &samples {
                if sample.discont {
                    self.emit(CacheEvent::Discont { at: sample.byte_offset });
                }
            }
        }

        let mut remaining = data;
        let mut total_written = 0usize;
        let mut overrun_bytes = 0usize;

        loop {
            match self.ring.push(remaining) {
                PushOutcome::Written(n) => {
                    total_written += n;
                    state.total_pushed += n as u64;
                    break;
                }
                PushOutcome::Blocked { written } => {
                    total_written += written;
                    state.total_pushed += written as u64;
                    remaining = &remaining[written..];
                    if remaining.is_empty() {
                        break;
                    }

                    match &self.disk {
                        Some(disk) => match Ring::evict_oldest(&self.ring) {
                            Some(evicted) => match disk.push(&evicted)? {
                                DiskPushOutcome::Written(_) => {}
                                DiskPushOutcome::Blocked { .. } => {
                                    self.emit(CacheEvent::Overrun { dropped: remaining.len() });
                                    return Err(CacheError::NoSpace);
                                }
                            },
                            None => {
                                self.emit(CacheEvent::Overrun { dropped: remaining.len() });
                                return Err(CacheError::NoSpace);
                            }
                        },
                        // No overflow destination: keep accepting the write by
                        // overwriting the oldest unread data, same as the
                        // ring does internally once its capacity is reached.
                        None => match self.ring.force_evict_oldest() {
                            Some(size) => overrun_bytes += size,
                            None => {
                                self.emit(CacheEvent::Overrun { dropped: remaining.len() });
                                return Err(CacheError::NoSpace);
                            }
                        },
                    }
                }
            }
        }

        if overrun_bytes > 0 {
            self.emit(CacheEvent::Overrun { dropped: overrun_bytes });
        }

        Ok(total_written)
    }

    /// Close any trailing partial slot into FULL without consuming it, so a
    /// final short chunk is still poppable after end-of-stream.
    pub fn finalize(&self) {
        let _state = self.state.lock();
        self.ring.finalize_partial();
        if let Some(disk) = &self.disk {
            disk.finalize_partial();
        }
    }

    /// Pop the oldest unread chunk, draining disk overflow before the ring
    /// (disk only ever holds data older than anything left in the ring).
    pub fn pop(&self, drain: bool) -> CacheResult<Option<CachePop>> {
        let _state = self.state.lock();
        if let Some(disk) = &self.disk {
            if !disk.is_empty() {
                if let Some(p) = DiskOverflow::pop(disk, drain)? {
                    return Ok(Some(CachePop::Disk(p)));
                }
            }
        }
        Ok(Ring::pop(&self.ring, drain).map(CachePop::Ring))
    }

    /// Reposition the read cursor to `target`, trying the ring window
    /// before falling back to disk overflow.
    pub fn seek(&self, target: u64) -> CacheResult<()> {
        let _state = self.state.lock();
        if self.ring.seek(target) {
            return Ok(());
        }
        if let Some(disk) = &self.disk {
            if disk.seek(target) {
                return Ok(());
            }
        }
        Err(CacheError::SeekRejected("offset outside retained window"))
    }

    pub fn has_offset(&self, x: u64) -> bool {
        let _state = self.state.lock();
        self.ring.has_offset(x) || self.disk.as_ref().is_some_and(|d| d.has_offset(x))
    }

    pub fn is_empty(&self) -> bool {
        self.ring.is_empty() && self.disk.as_ref().map_or(true, |d| d.is_empty())
    }

    pub fn buffered_range(&self) -> (u64, u64) {
        let state = self.state.lock();
        let lo = match &self.disk {
            Some(d) if !d.is_empty() => d.buffered_range().0,
            _ => self.ring.buffered_range().0,
        };
        (lo, state.total_pushed)
    }

    pub fn fullness(&self) -> u64 {
        self.ring.fullness()
    }

    pub fn lookup_by_time(&self, method: LookupMethod, flags: u32, time_ns: u64) -> Option<Association> {
        self.index.lock().get_by_time(method, flags, time_ns)
    }

    pub fn lookup_by_byte(&self, method: LookupMethod, flags: u32, byte_offset: u64) -> Option<Association> {
        self.index.lock().get_by_byte(method, flags, byte_offset)
    }

    /// Translate a stream-time seek target to a byte offset via the index,
    /// then perform the seek. Used by the Seek Translator.
    pub fn seek_to_time(&self, time_ns: u64) -> CacheResult<u64> {
        let assoc = self
            .index
            .lock()
            .get_by_time(LookupMethod::Before, ASSOC_NONE, time_ns)
            .ok_or(CacheError::SeekRejected("no index entry at or before requested time"))?;
        self.seek(assoc.byte_offset)?;
        Ok(assoc.byte_offset)
    }
}
