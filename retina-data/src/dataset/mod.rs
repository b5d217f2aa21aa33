//! Building and streaming dataset partitions.

mod builder;
mod partition;
mod prefetch;

pub use builder::*;
pub use partition::*;
pub use prefetch::*;
