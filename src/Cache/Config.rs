// Cache configuration and builder: a plain config struct with sane
// defaults, and a `with_*(mut self) -> Self` builder that consumes itself
// into a `Cache` via `build`.

use std::path::PathBuf;

use crate::Pcr::{DEFAULT_DELTA_MS, LEGAL_PACKET_SIZES};
use crate::Ring::DEFAULT_SLOT_SIZE;

/// Default total ring capacity: 256 MiB, the documented default cache size.
const DEFAULT_CACHE_SIZE_BYTES: usize = 256 * 1024 * 1024;

/// Disk overflow configuration, only present when the cache is allowed to
/// spill to disk.
#[derive(Debug, Clone)]
pub struct DiskConfig {
    pub path: PathBuf,
    pub n_slots: usize,
}

#[derive(Debug, Clone)]
pub struct CacheConfig {
    pub n_ring_slots: usize,
    pub slot_size: usize,
    pub disk: Option<DiskConfig>,
    pub ts_packet_size: usize,
    pub pcr_pid: Option<u16>,
    pub pcr_delta_ms: u64,
}

impl Default for CacheConfig {
    fn default() -> Self {
        CacheConfig {
            n_ring_slots: DEFAULT_CACHE_SIZE_BYTES / DEFAULT_SLOT_SIZE,
            slot_size: DEFAULT_SLOT_SIZE,
            disk: None,
            ts_packet_size: LEGAL_PACKET_SIZES[0],
            pcr_pid: None,
            pcr_delta_ms: DEFAULT_DELTA_MS,
        }
    }
}

pub struct CacheBuilder {
    config: CacheConfig,
}

impl CacheBuilder {
    pub fn new() -> Self {
        CacheBuilder {
            config: CacheConfig::default(),
        }
    }

    pub fn with_ring_slots(mut self, n: usize) -> Self {
        self.config.n_ring_slots = n;
        self
    }

    pub fn with_slot_size(mut self, size: usize) -> Self {
        self.config.slot_size = size;
        self
    }

    pub fn with_disk_overflow(mut self, path: impl Into<PathBuf>, n_slots: usize) -> Self {
        self.config.disk = Some(DiskConfig {
            path: path.into(),
            n_slots,
        });
        self
    }

    pub fn with_ts_packet_size(mut self, size: usize) -> Self {
        self.config.ts_packet_size = size;
        self
    }

    pub fn with_pcr_pid(mut self, pid: u16) -> Self {
        self.config.pcr_pid = Some(pid);
        self
    }

    pub fn with_pcr_delta_ms(mut self, ms: u64) -> Self {
        self.config.pcr_delta_ms = ms;
        self
    }

    pub fn config(self) -> CacheConfig {
        self.config
    }
}

impl Default for CacheBuilder {
    fn default() -> Self {
        Self::new()
    }
}
