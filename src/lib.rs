// Module naming follows project convention: one PascalCase directory per
// design component (Ring, Disk, Cache, Pcr, Index, Shifter, Seek), plus
// Core for cross-cutting error/result types and Debug for shared
// formatting helpers.
#![allow(non_snake_case)]

pub mod Cache;
pub mod Core;
pub mod Debug;
pub mod Disk;
pub mod Index;
pub mod Pcr;
pub mod Ring;
pub mod Seek;
pub mod Shifter;

pub use Cache::{Cache as TsShiftCache, CacheBuilder, CacheConfig, CacheEvent, CachePop, DiskConfig};
pub use Core::{CacheError, CacheResult};
pub use Index::{Association, LookupMethod};
pub use Pcr::PcrSample;
pub use Seek::{SeekTarget, SeekTranslator};
pub use Shifter::{Segment, Shifter as TsShifter, ShifterState, StreamStartEvent};
