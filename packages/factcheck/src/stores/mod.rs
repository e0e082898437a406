//! Verdict cache implementations.
//!
//! Available backends:
//! - `MemoryVerdictCache` - In-process storage with per-entry TTL

pub mod memory;

pub use memory::MemoryVerdictCache;
