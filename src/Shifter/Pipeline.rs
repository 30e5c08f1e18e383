// Producer/consumer pipeline: a producer thread pushes bytes in, a consumer
// thread pulls them back out on its own schedule, and FLUSH/EOS/SEGMENT
// events move a small state machine that both sides check.
//
// Wakeup is condvar-based rather than a raw futex, since there's no
// shared-memory cross-process requirement here.

use std::sync::Arc;
use std::time::Duration;

use parking_lot::{Condvar, Mutex};

use crate::Cache::{Cache, CachePop};
use crate::Core::{CacheError, CacheResult};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShifterState {
    Stopped,
    Playing,
    Eos,
}

/// A TIME or BYTES playback segment, as set by the most recent upstream
/// SEGMENT event.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Segment {
    pub start: u64,
    pub stop: Option<u64>,
    pub rate: f64,
}

impl Default for Segment {
    fn default() -> Self {
        Segment { start: 0, stop: None, rate: 1.0 }
    }
}

/// A one-shot STREAM_START, captured from upstream and held until the
/// consumer loop re-emits it in front of the next downstream buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StreamStartEvent {
    pub stream_id: u64,
}

struct ShifterInner {
    state: ShifterState,
    flushing: bool,
    segment: Segment,
    /// Set when downstream has refused a buffer (EOS / NOT_LINKED); pushes
    /// are refused until an upstream SEGMENT clears it.
    unexpected: bool,
    /// Set whenever the active segment hasn't been announced downstream
    /// yet, so the consumer loop owes it a SEGMENT event before the next
    /// buffer.
    need_newsegment: bool,
    /// Bytes handed to the consumer so far, for POSITION queries.
    cur_bytes: u64,
    stream_start_event: Option<StreamStartEvent>,
}

pub struct Shifter {
    cache: Arc<Cache>,
    inner: Mutex<ShifterInner>,
    cond: Condvar,
}

impl Shifter {
    pub fn new(cache: Arc<Cache>) -> Self {
        Shifter {
            cache,
            inner: Mutex::new(ShifterInner {
                state: ShifterState::Stopped,
                flushing: false,
                segment: Segment::default(),
                unexpected: false,
                need_newsegment: true,
                cur_bytes: 0,
                stream_start_event: None,
            }),
            cond: Condvar::new(),
        }
    }

    pub fn cache(&self) -> &Arc<Cache> {
        &self.cache
    }

    pub fn state(&self) -> ShifterState {
        self.inner.lock().state
    }

    pub fn segment(&self) -> Segment {
        self.inner.lock().segment
    }

    /// Bytes handed to the consumer so far.
    pub fn cur_bytes(&self) -> u64 {
        self.inner.lock().cur_bytes
    }

    /// Upstream SEGMENT: installs the new segment, clears `unexpected` (the
    /// downstream-refusal state, now re-armed), and marks the segment as
    /// unannounced so the consumer loop emits it before the next buffer.
    pub fn set_segment(&self, segment: Segment) {
        let mut inner = self.inner.lock();
        inner.segment = segment;
        inner.unexpected = false;
        inner.need_newsegment = true;
        if inner.state == ShifterState::Stopped {
            inner.state = ShifterState::Playing;
        }
    }

    /// Upstream STREAM_START: captured for one-shot re-emission in front of
    /// the next buffer the consumer loop pulls.
    pub fn note_stream_start(&self, stream_id: u64) {
        self.inner.lock().stream_start_event = Some(StreamStartEvent { stream_id });
    }

    /// Consumer-side: record that downstream refused the last buffer (EOS
    /// or NOT_LINKED). Subsequent pushes are refused until a SEGMENT event
    /// re-arms the pipeline.
    pub fn mark_downstream_unexpected(&self) {
        self.inner.lock().unexpected = true;
    }

    /// The STREAM_START and/or SEGMENT events owed to downstream in front
    /// of the buffer at `buffer_offset`, consuming the one-shot stream
    /// start and clearing the pending-segment flag.
    pub fn take_pending_events(&self, buffer_offset: u64) -> (Option<StreamStartEvent>, Option<Segment>) {
        let mut inner = self.inner.lock();
        let stream_start = inner.stream_start_event.take();
        let segment = if inner.need_newsegment {
            inner.need_newsegment = false;
            let mut segment = inner.segment;
            segment.start = buffer_offset;
            Some(segment)
        } else {
            None
        };
        (stream_start, segment)
    }

    /// Producer chain entry point: push bytes and wake any blocked
    /// consumer. Refused once EOS, flushing, or downstream has gone
    /// unexpected.
    pub fn push(&self, data: &[u8]) -> CacheResult<usize> {
        {
            let inner = self.inner.lock();
            if inner.flushing {
                return Err(CacheError::Flushing);
            }
            if inner.state == ShifterState::Eos {
                return Err(CacheError::Eos);
            }
            if inner.unexpected {
                return Err(CacheError::NotLinked);
            }
        }
        let written = self.cache.push(data)?;
        self.cond.notify_all();
        Ok(written)
    }

    /// Producer signals end of stream: closes the trailing partial slot so
    /// it becomes poppable (without discarding it), then wakes everyone so
    /// they can observe EOS.
    pub fn eos(&self) {
        let mut inner = self.inner.lock();
        inner.state = ShifterState::Eos;
        drop(inner);
        self.cache.finalize();
        self.cond.notify_all();
    }

    /// Consumer loop entry point. With `block == true`, parks on the
    /// condvar until data is available, flushing starts, or EOS drains the
    /// cache dry. With `block == false`, returns `Ok(None)` immediately if
    /// nothing is ready.
    pub fn pull(&self, block: bool) -> CacheResult<Option<CachePop>> {
        let mut inner = self.inner.lock();
        loop {
            if inner.flushing {
                return Err(CacheError::Flushing);
            }

            let drain = inner.state == ShifterState::Eos;
            match self.cache.pop(drain)? {
                Some(pop) => {
                    inner.cur_bytes += pop.len() as u64;
                    return Ok(Some(pop));
                }
                None => {
                    if inner.state == ShifterState::Eos && self.cache.is_empty() {
                        return Err(CacheError::Eos);
                    }
                    if !block {
                        return Ok(None);
                    }
                    self.cond.wait_for(&mut inner, Duration::from_millis(200));
                }
            }
        }
    }

    pub fn flush_start(&self) {
        let mut inner = self.inner.lock();
        inner.flushing = true;
        drop(inner);
        self.cond.notify_all();
    }

    pub fn flush_stop(&self) {
        let mut inner = self.inner.lock();
        inner.flushing = false;
        inner.state = ShifterState::Playing;
        inner.need_newsegment = true;
        self.cond.notify_all();
    }

    pub fn is_flushing(&self) -> bool {
        self.inner.lock().flushing
    }
}
