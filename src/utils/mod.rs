//! Utility modules

pub mod memory_storage;
pub mod money;
pub mod progress;

pub use memory_storage::*;
pub use money::*;
pub use progress::*;
