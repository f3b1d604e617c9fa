//! Self-address table.
//!
//! Tracks the addresses this node believes it is reachable at, each with
//! a confidence score. Peers echoing an address back bump its score, so
//! the best-confirmed address wins when advertising.

use std::collections::HashMap;

use crate::domain::netaddr::{AddrKey, NetworkAddress};
use crate::domain::services::{is_routable, reachability};

/// A self-advertised address with its confidence score.
#[derive(Debug, Clone)]
pub struct LocalAddress {
    pub addr: NetworkAddress,
    /// Source category the address came from (the initial score).
    pub kind: i32,
    /// Confidence, bumped on external confirmations.
    pub score: i32,
}

#[derive(Debug, Default)]
pub(crate) struct LocalTable {
    entries: HashMap<AddrKey, LocalAddress>,
}

impl LocalTable {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn len(&self) -> usize {
        self.entries.len()
    }

    /// Record a self-address. Unroutable addresses and duplicates are
    /// rejected; `services` is stamped with the node's own service bits.
    pub(crate) fn add(&mut self, addr: &NetworkAddress, score: i32, services: u64) -> bool {
        if !is_routable(addr) {
            return false;
        }

        if self.entries.contains_key(&addr.key()) {
            return false;
        }

        let mut record = *addr;
        record.services = services;

        self.entries.insert(
            record.key(),
            LocalAddress {
                addr: record,
                kind: score,
                score,
            },
        );

        true
    }

    /// Bump the score of a known self-address.
    pub(crate) fn mark(&mut self, addr: &NetworkAddress) -> bool {
        match self.entries.get_mut(&addr.key()) {
            Some(local) => {
                local.score += 1;
                true
            }
            None => false,
        }
    }

    pub(crate) fn has(&self, addr: &NetworkAddress) -> bool {
        self.entries.contains_key(&addr.key())
    }

    /// Best self-address to advertise to `src`.
    ///
    /// Without a peer, the highest score wins. With a peer, records are
    /// ranked by reachability first and score second, and the winner's
    /// time is refreshed to `now` before advertising.
    pub(crate) fn best(
        &mut self,
        src: Option<&NetworkAddress>,
        now: i64,
    ) -> Option<&NetworkAddress> {
        let Some(src) = src else {
            return self
                .entries
                .values()
                .max_by_key(|local| local.score)
                .map(|local| &local.addr);
        };

        let mut best_key: Option<AddrKey> = None;
        let mut best_reach = -1;
        let mut best_score = -1;

        for (key, local) in &self.entries {
            let reach = reachability(src, &local.addr);

            if reach < best_reach {
                continue;
            }

            if reach > best_reach || local.score > best_score {
                best_reach = reach;
                best_score = local.score;
                best_key = Some(*key);
            }
        }

        let key = best_key?;
        let local = self.entries.get_mut(&key).expect("winner must exist");
        local.addr.time = now;
        Some(&local.addr)
    }

    pub(crate) fn clear(&mut self) {
        self.entries.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn routable(d: u8, port: u16) -> NetworkAddress {
        NetworkAddress::v4(8, 8, 8, d, port)
    }

    #[test]
    fn test_rejects_unroutable_and_duplicates() {
        let mut table = LocalTable::new();
        assert!(!table.add(&NetworkAddress::v4(127, 0, 0, 1, 8333), 1, 1));
        assert!(table.add(&routable(1, 8333), 1, 1));
        assert!(!table.add(&routable(1, 8333), 5, 1));
        assert_eq!(table.len(), 1);
    }

    #[test]
    fn test_services_are_stamped() {
        let mut table = LocalTable::new();
        let mut addr = routable(1, 8333);
        addr.services = 0xdead;
        table.add(&addr, 1, 5);
        let best = table.best(None, 0).unwrap();
        assert_eq!(best.services, 5);
    }

    #[test]
    fn test_best_without_peer_takes_highest_score() {
        let mut table = LocalTable::new();
        table.add(&routable(1, 8333), 1, 1);
        table.add(&routable(2, 8333), 3, 1);
        table.mark(&routable(1, 8333));

        // scores now 2 vs 3
        let best = *table.best(None, 0).unwrap();
        assert_eq!(best, routable(2, 8333));

        table.mark(&routable(1, 8333));
        table.mark(&routable(1, 8333));
        let best = *table.best(None, 0).unwrap();
        assert_eq!(best, routable(1, 8333));
    }

    #[test]
    fn test_best_for_peer_ranks_reachability_then_score() {
        let mut table = LocalTable::new();
        let mut v6 = [0u8; 16];
        v6[0] = 0x20;
        v6[1] = 0x01;
        v6[15] = 1;

        table.add(&NetworkAddress::v6(v6, 8333), 10, 1);
        table.add(&routable(1, 8333), 1, 1);

        // An IPv4 peer reaches our IPv4 address best, despite its lower score.
        let peer = NetworkAddress::v4(1, 2, 3, 4, 8333);
        let best = *table.best(Some(&peer), 777).unwrap();
        assert_eq!(best, routable(1, 8333));
        assert_eq!(best.time, 777, "advertised address gets a fresh time");
    }

    #[test]
    fn test_best_on_empty_table() {
        let mut table = LocalTable::new();
        assert!(table.best(None, 0).is_none());
        let peer = NetworkAddress::v4(1, 2, 3, 4, 8333);
        assert!(table.best(Some(&peer), 0).is_none());
    }
}
