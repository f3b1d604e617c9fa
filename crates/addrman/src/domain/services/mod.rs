//! Pure address-classification services: network groups, routability and
//! the reachability ordering.

mod group;
mod reachability;

pub use group::{group, GROUP_SIZE};
pub use reachability::{is_routable, reachability};
