//! Data preprocessing building blocks.

pub mod flip;
pub mod jitter;
pub mod loader;
pub mod pad;

pub use flip::*;
pub use jitter::*;
pub use loader::*;
pub use pad::*;
