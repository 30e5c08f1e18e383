pub mod Config;
pub mod Event;
pub mod Facade;

pub use Config::{CacheBuilder, CacheConfig, DiskConfig};
pub use Event::CacheEvent;
pub use Facade::{Cache, CachePop};
