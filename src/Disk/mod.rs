pub mod Overflow;

pub use Overflow::{DiskOverflow, DiskPop, PushOutcome as DiskPushOutcome};
