//! Port traits for external collaborators.

mod outbound;

pub use outbound::{RandomSource, TimeSource};
