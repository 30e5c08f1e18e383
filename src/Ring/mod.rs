pub mod Buffer;
pub mod Slot;

pub use Buffer::{PushOutcome, Ring, RingPop};
pub use Slot::{Slot as RingSlot, SlotState, DEFAULT_SLOT_SIZE};
