//! Expiring ban table.
//!
//! Bans are keyed by IP alone (port zeroed), so banning one endpoint
//! covers every port on that host. Expiry is lazy: a lookup past the
//! deadline deletes the record and reports not-banned.

use std::collections::HashMap;

use crate::domain::netaddr::{AddrKey, NetworkAddress};

#[derive(Debug, Default)]
pub(crate) struct BanTable {
    entries: HashMap<AddrKey, NetworkAddress>,
}

impl BanTable {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn len(&self) -> usize {
        self.entries.len()
    }

    /// Record a ban starting at `now`. First writer wins: re-banning an
    /// already banned host does not extend the original deadline.
    pub(crate) fn ban(&mut self, addr: &NetworkAddress, now: i64) {
        let mut record = *addr;
        record.port = 0;
        record.time = now;
        self.entries.entry(record.key()).or_insert(record);
    }

    pub(crate) fn unban(&mut self, addr: &NetworkAddress) -> bool {
        self.entries.remove(&addr.ban_key()).is_some()
    }

    /// Whether `addr` is banned at `now`, expiring the record when the
    /// ban has run out.
    pub(crate) fn is_banned(&mut self, addr: &NetworkAddress, now: i64, ban_time: i64) -> bool {
        let key = addr.ban_key();

        let Some(record) = self.entries.get(&key) else {
            return false;
        };

        if now > record.time + ban_time {
            self.entries.remove(&key);
            return false;
        }

        true
    }

    pub(crate) fn clear(&mut self) {
        self.entries.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ban_ignores_port() {
        let mut bans = BanTable::new();
        bans.ban(&NetworkAddress::v4(9, 9, 9, 9, 1234), 1_000);
        assert!(bans.is_banned(&NetworkAddress::v4(9, 9, 9, 9, 4321), 1_000, 100));
    }

    #[test]
    fn test_ban_expires_lazily() {
        let mut bans = BanTable::new();
        let addr = NetworkAddress::v4(9, 9, 9, 9, 1234);
        bans.ban(&addr, 1_000);

        assert!(bans.is_banned(&addr, 1_000 + 100, 100));
        assert!(!bans.is_banned(&addr, 1_000 + 101, 100));
        // record was dropped by the expired lookup
        assert_eq!(bans.len(), 0);
    }

    #[test]
    fn test_first_writer_wins() {
        let mut bans = BanTable::new();
        let addr = NetworkAddress::v4(9, 9, 9, 9, 1234);
        bans.ban(&addr, 1_000);
        bans.ban(&addr, 5_000);
        // deadline still derives from the first ban
        assert!(!bans.is_banned(&addr, 1_101, 100));
    }

    #[test]
    fn test_unban() {
        let mut bans = BanTable::new();
        let addr = NetworkAddress::v4(9, 9, 9, 9, 1234);
        bans.ban(&addr, 1_000);
        assert!(bans.unban(&NetworkAddress::v4(9, 9, 9, 9, 80)));
        assert!(!bans.is_banned(&addr, 1_001, 100));
        assert!(!bans.unban(&addr));
    }
}
