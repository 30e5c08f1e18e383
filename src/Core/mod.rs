pub mod Error;

pub use Error::{CacheError, CacheResult};
