// TIME <-> BYTES seek translation: a seek arrives as either a byte offset
// or a stream time, gets resolved through the time/byte index when needed,
// and is rejected outright for anything but forward (non-negative rate)
// playback; reverse trick-play over the cache isn't supported.

use std::sync::Arc;

use crate::Core::{CacheError, CacheResult};
use crate::Index::{LookupMethod, ASSOC_NONE};
use crate::Shifter::{Segment, Shifter};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SeekTarget {
    Bytes(u64),
    Time(u64),
}

pub struct SeekTranslator {
    shifter: Arc<Shifter>,
}

impl SeekTranslator {
    pub fn new(shifter: Arc<Shifter>) -> Self {
        SeekTranslator { shifter }
    }

    /// Perform a seek and install the resulting segment. Only `rate >= 0.0`
    /// is accepted.
    pub fn seek(&self, target: SeekTarget, rate: f64) -> CacheResult<()> {
        if rate < 0.0 {
            return Err(CacheError::SeekRejected("reverse playback is not supported"));
        }

        let cache = self.shifter.cache();
        let byte_offset = match target {
            SeekTarget::Bytes(b) => {
                cache.seek(b)?;
                b
            }
            SeekTarget::Time(t) => cache.seek_to_time(t)?,
        };

        self.shifter.set_segment(Segment {
            start: byte_offset,
            stop: None,
            rate,
        });
        Ok(())
    }

    /// Whether `target` currently falls inside the retained window and
    /// could be seeked to without error.
    pub fn query_seeking(&self, target: SeekTarget) -> bool {
        let cache = self.shifter.cache();
        match target {
            SeekTarget::Bytes(b) => cache.has_offset(b),
            SeekTarget::Time(t) => cache.lookup_by_time(LookupMethod::Before, ASSOC_NONE, t).is_some(),
        }
    }

    pub fn is_seekable(&self) -> bool {
        !self.shifter.cache().is_empty()
    }

    /// Bytes currently retained: `high - low` of the buffered range.
    pub fn query_duration_bytes(&self) -> u64 {
        let (lo, hi) = self.shifter.cache().buffered_range();
        hi.saturating_sub(lo)
    }

    /// Retained duration in nanoseconds, derived from the oldest and
    /// newest index entries. `None` if no PCR has been observed yet.
    pub fn query_duration_time_ns(&self) -> Option<u64> {
        let (lo, hi) = self.shifter.cache().buffered_range();
        let low_assoc = self.shifter.cache().lookup_by_byte(LookupMethod::After, ASSOC_NONE, lo)?;
        let high_assoc = self.shifter.cache().lookup_by_byte(LookupMethod::Before, ASSOC_NONE, hi)?;
        Some(high_assoc.time_ns.saturating_sub(low_assoc.time_ns))
    }
}
