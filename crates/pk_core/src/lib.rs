//! Memory pools backing the compiler and the runtime.
//!
//! - `FixedMemoryPool` / `FixedPool<T>` - fixed-size blocks for short-lived nodes and frames
//! - `MultiPool` - size-classed arenas that hold heap objects for the collector
//! - `ArenaConfig` - pool geometry
mod config;
mod fixed;
mod multi;

pub use config::ArenaConfig;
pub use fixed::{FixedMemoryPool, FixedPool, PoolBox};
pub use multi::{MultiPool, PoolStats};
