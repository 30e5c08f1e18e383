pub mod TimeByteIndex;

pub use TimeByteIndex::{Association, LookupMethod, TimeByteIndex as Index, ASSOC_DELTA_UNIT, ASSOC_KEY_UNIT, ASSOC_NONE};
