pub mod StructDebug;

pub use StructDebug::{fmt_byte_range, fmt_slot_occupancy};
