pub mod Pipeline;

pub use Pipeline::{Segment, Shifter, ShifterState, StreamStartEvent};
