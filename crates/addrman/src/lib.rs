//! # Peer Address Manager
//!
//! Remembers network peers learned from gossip, seeds and direct
//! connections, scores their reliability, selects candidates for
//! outbound dials, resists eclipse attacks via keyed bucket placement,
//! and persists the collection across restarts.
//!
//! ## Architecture
//!
//! - **Domain layer**: the bucket store and its policies, pure logic
//! - **Ports layer**: trait definitions for time and randomness
//! - **Adapters layer**: system-clock and OS-randomness implementations,
//!   plus deterministic sources for tests
//! - **Persistence**: the versioned binary dump and its revalidating
//!   loader
//!
//! The manager is a single-owner object: a multithreaded host holds an
//! exclusive lock spanning each call. Network I/O, name resolution and
//! dialing live with the host; this crate only stores, scores and picks
//! addresses.
//!
//! ## Example
//!
//! ```rust
//! use addrman::{AddrManConfig, AddressManager, NetworkAddress};
//!
//! let mut manager = AddressManager::new(AddrManConfig::default());
//!
//! // Learn an address from gossip.
//! let mut peer = NetworkAddress::v4(51, 210, 4, 7, 8333);
//! peer.services = 1;
//! assert!(manager.add(&peer, None));
//!
//! // Pick a candidate, dial it, record the completed handshake.
//! let candidate = manager.get().expect("store is not empty").addr;
//! manager.mark_attempt(&candidate);
//! manager.mark_ack(&candidate, 1);
//! assert_eq!(manager.stats().total_used, 1);
//! ```

pub mod adapters;
pub mod domain;
pub mod persistence;
pub mod ports;

// Re-export the public surface.
pub use domain::{
    AddrKey, AddrManConfig, AddrManStats, AddressEntry, AddressManager, DecodeError, LocalAddress,
    NetworkAddress,
};
pub use persistence::SER_VERSION;
pub use ports::{RandomSource, TimeSource};

pub use adapters::{
    FixedRandomSource, FixedTimeSource, OsRandomSource, SeededRandomSource, SystemTimeSource,
};
