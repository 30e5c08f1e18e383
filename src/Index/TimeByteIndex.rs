// Ordered Time <-> Byte associative index: each entry pairs a PCR-derived
// timestamp with the byte offset it was observed at, and can be looked up
// from either side with EXACT/BEFORE/AFTER semantics.

use std::collections::BTreeMap;

/// No association flags set.
pub const ASSOC_NONE: u32 = 0;
/// The byte offset lands on a random-access (key frame / PAT+PMT-aligned)
/// boundary, a legal seek target on its own.
pub const ASSOC_KEY_UNIT: u32 = 1 << 0;
/// The timestamp was derived by interpolation from a neighboring entry
/// rather than read directly off a PCR field.
pub const ASSOC_DELTA_UNIT: u32 = 1 << 1;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LookupMethod {
    Exact,
    Before,
    After,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Association {
    pub time_ns: u64,
    pub byte_offset: u64,
    pub flags: u32,
}

impl Association {
    pub fn is_key_unit(&self) -> bool {
        self.flags & ASSOC_KEY_UNIT != 0
    }
}

/// Ordered index from stream time to byte offset and back.
///
/// Both directions are kept as separate `BTreeMap`s rather than one
/// bidirectional structure: entries are added monotonically by the PCR
/// extractor, so the duplicated key space costs little and keeps BEFORE/
/// AFTER range queries a single `BTreeMap::range` call on either axis.
pub struct TimeByteIndex {
    by_time: BTreeMap<u64, Association>,
    by_byte: BTreeMap<u64, u64>,
}

impl TimeByteIndex {
    pub fn new() -> Self {
        TimeByteIndex {
            by_time: BTreeMap::new(),
            by_byte: BTreeMap::new(),
        }
    }

    pub fn len(&self) -> usize {
        self.by_time.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_time.is_empty()
    }

    pub fn add_association(&mut self, time_ns: u64, byte_offset: u64, flags: u32) {
        self.by_time.insert(
            time_ns,
            Association {
                time_ns,
                byte_offset,
                flags,
            },
        );
        self.by_byte.insert(byte_offset, time_ns);
    }

    pub fn clear(&mut self) {
        self.by_time.clear();
        self.by_byte.clear();
    }

    /// Drop every entry whose byte offset precedes `low_water`, matching
    /// the ring/disk's own retained window as it recycles slots.
    pub fn retain_from(&mut self, low_water: u64) {
        let stale: Vec<u64> = self
            .by_byte
            .range(..low_water)
            .map(|(&byte, _)| byte)
            .collect();
        for byte in stale {
            if let Some(time_ns) = self.by_byte.remove(&byte) {
                self.by_time.remove(&time_ns);
            }
        }
    }

    fn matches_flags(have: u32, want: u32) -> bool {
        want == 0 || have & want == want
    }

    /// Look up an association by time. `flags`, if non-zero, restricts the
    /// result to entries whose flags are a superset of it: BEFORE/AFTER
    /// keep scanning sideways (older/newer respectively) past the nearest
    /// raw hit until a compatible entry turns up or the range is exhausted.
    pub fn get_by_time(&self, method: LookupMethod, flags: u32, time_ns: u64) -> Option<Association> {
        match method {
            LookupMethod::Exact => self
                .by_time
                .get(&time_ns)
                .copied()
                .filter(|a| Self::matches_flags(a.flags, flags)),
            LookupMethod::Before => self
                .by_time
                .range(..=time_ns)
                .rev()
                .find(|(_, a)| Self::matches_flags(a.flags, flags))
                .map(|(_, a)| *a),
            LookupMethod::After => self
                .by_time
                .range(time_ns..)
                .find(|(_, a)| Self::matches_flags(a.flags, flags))
                .map(|(_, a)| *a),
        }
    }

    /// Same sideways-scan semantics as `get_by_time`, approached from the
    /// byte axis.
    pub fn get_by_byte(&self, method: LookupMethod, flags: u32, byte_offset: u64) -> Option<Association> {
        match method {
            LookupMethod::Exact => self
                .by_byte
                .get(&byte_offset)
                .and_then(|t| self.by_time.get(t))
                .copied()
                .filter(|a| Self::matches_flags(a.flags, flags)),
            LookupMethod::Before => self
                .by_byte
                .range(..=byte_offset)
                .rev()
                .filter_map(|(_, t)| self.by_time.get(t))
                .find(|a| Self::matches_flags(a.flags, flags))
                .copied(),
            LookupMethod::After => self
                .by_byte
                .range(byte_offset..)
                .filter_map(|(_, t)| self.by_time.get(t))
                .find(|a| Self::matches_flags(a.flags, flags))
                .copied(),
        }
    }

    pub fn time_range(&self) -> Option<(u64, u64)> {
        let lo = *self.by_time.keys().next()?;
        let hi = *self.by_time.keys().next_back()?;
        Some((lo, hi))
    }
}

impl Default for TimeByteIndex {
    fn default() -> Self {
        Self::new()
    }
}
