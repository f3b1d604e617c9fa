//! Domain layer: pure address-management logic with no I/O.
//!
//! - Endpoint types and their on-disk key
//! - Network-group classification and reachability
//! - The bucket store itself: insertion, eviction, promotion, selection,
//!   banning and local-address scoring

pub mod address_manager;
pub mod errors;
pub mod netaddr;
pub mod services;

pub use address_manager::{AddrManConfig, AddrManStats, AddressEntry, AddressManager, LocalAddress};
pub use errors::DecodeError;
pub use netaddr::{AddrKey, NetworkAddress, ADDR_KEY_SIZE, DEFAULT_SERVICES};
pub use services::{group, is_routable, reachability, GROUP_SIZE};
