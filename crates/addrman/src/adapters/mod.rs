//! Concrete implementations of the port traits.

mod random;
mod time;

pub use random::{FixedRandomSource, OsRandomSource, SeededRandomSource};
pub use time::{FixedTimeSource, SystemTimeSource};
