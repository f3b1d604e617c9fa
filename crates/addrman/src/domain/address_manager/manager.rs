//! The address manager.
//!
//! Reference: Bitcoin Core's `addrman.h` — fresh/used segregation with
//! keyed bucket placement.
//!
//! # Anti-Eclipse Defense
//!
//! 1. Gossiped addresses land in fresh buckets keyed by source group, so
//!    one neighborhood cannot displace everyone else's entries.
//! 2. Only a completed handshake moves an entry into a used bucket.
//! 3. Re-announcing a known address gets exponentially harder per bucket
//!    it already occupies (the stochastic gate).
//!
//! The manager is a single-owner, single-threaded object: a concurrent
//! host wraps it in its own lock and serializes every call.

use std::path::PathBuf;
use std::sync::Arc;

use super::arena::EntryId;
use super::ban::BanTable;
use super::config::AddrManConfig;
use super::local::LocalTable;
use super::security::{fresh_bucket_index, used_bucket_index, BucketSecret};
use super::table::AddressTable;
use super::types::{AddrManStats, AddressEntry};
use crate::adapters::{OsRandomSource, SystemTimeSource};
use crate::domain::netaddr::NetworkAddress;
use crate::ports::{RandomSource, TimeSource};

/// Peer address store with scored selection and banning.
///
/// Entries arrive via [`add`](Self::add), get picked for dialing via
/// [`get`](Self::get), and move through the attempt lifecycle with
/// [`mark_attempt`](Self::mark_attempt) /
/// [`mark_success`](Self::mark_success) / [`mark_ack`](Self::mark_ack).
/// References returned by `get` are read-only aliases; the borrow checker
/// ends their validity at the next mutating call.
pub struct AddressManager {
    pub(crate) config: AddrManConfig,
    pub(crate) time: Arc<dyn TimeSource>,
    pub(crate) rng: Box<dyn RandomSource>,
    pub(crate) secret: BucketSecret,
    pub(crate) table: AddressTable,
    pub(crate) banned: BanTable,
    pub(crate) local: LocalTable,
    /// Our own address, used as the source for locally-inserted entries.
    pub(crate) local_addr: NetworkAddress,
    pub(crate) file: Option<PathBuf>,
    pub(crate) flags: u32,
    pub(crate) needs_flush: bool,
}

impl AddressManager {
    /// Create a manager on the system clock and OS randomness.
    pub fn new(config: AddrManConfig) -> Self {
        Self::with_sources(
            config,
            Arc::new(SystemTimeSource),
            Box::new(OsRandomSource),
        )
    }

    /// Create a manager with injected time and randomness sources.
    pub fn with_sources(
        config: AddrManConfig,
        time: Arc<dyn TimeSource>,
        mut rng: Box<dyn RandomSource>,
    ) -> Self {
        let secret = BucketSecret::generate(rng.as_mut());

        let mut local_addr = NetworkAddress::v4(127, 0, 0, 1, config.default_port);
        local_addr.services = config.services;
        local_addr.time = time.now();

        Self {
            table: AddressTable::new(config.fresh_bucket_count, config.used_bucket_count),
            banned: BanTable::new(),
            local: LocalTable::new(),
            local_addr,
            secret,
            file: None,
            flags: 0,
            needs_flush: false,
            config,
            time,
            rng,
        }
    }

    /// Active configuration.
    pub fn config(&self) -> &AddrManConfig {
        &self.config
    }

    /// Flags the store was opened with.
    pub fn flags(&self) -> u32 {
        self.flags
    }

    /// Number of known addresses, fresh and used.
    pub fn total(&self) -> usize {
        self.table.total_fresh + self.table.total_used
    }

    /// Whether the fresh side has hit its capacity.
    pub fn is_full(&self) -> bool {
        self.table.total_fresh >= self.config.fresh_bucket_count * self.config.bucket_size
    }

    /// Aggregate counters.
    pub fn stats(&self) -> AddrManStats {
        AddrManStats {
            total_fresh: self.table.total_fresh,
            total_used: self.table.total_used,
            banned: self.banned.len(),
            local: self.local.len(),
        }
    }

    /// Override the self-address advertised as the source of local inserts.
    pub fn set_external(&mut self, addr: &NetworkAddress) {
        if !addr.is_null() {
            self.local_addr = *addr;
        }
    }

    /// Change how long bans last.
    pub fn set_ban_time(&mut self, secs: i64) {
        self.config.ban_time = secs;
    }

    /// Drop every entry and regenerate the bucket secret.
    ///
    /// Bans and local addresses are runtime state and survive a reset.
    pub fn reset(&mut self) {
        tracing::debug!(target: "addrman", dropped = self.total(), "resetting address store");
        self.table.clear();
        self.secret = BucketSecret::generate(self.rng.as_mut());
    }

    /// Iterate over every known address.
    pub fn addresses(&self) -> impl Iterator<Item = &NetworkAddress> + '_ {
        let arena = &self.table.arena;
        self.table.index.values().map(move |&id| &arena.get(id).addr)
    }

    /// Insert or refresh a gossiped address. Returns whether the address
    /// gained a fresh-bucket slot.
    ///
    /// `src` is who told us about the address; `None` means we inserted
    /// it ourselves and the self-address stands in (with no merge
    /// penalty). Port 0 is a programming error and panics.
    pub fn add(&mut self, addr: &NetworkAddress, src: Option<&NetworkAddress>) -> bool {
        assert!(addr.port != 0, "refusing to track an address without a port");

        let now = self.time.now();
        let key = addr.key();

        let id = match self.table.lookup(&key) {
            Some(id) => {
                // A third party repeating old gossip earns a penalty; our
                // own inserts do not.
                let penalty: i64 = if src.is_none() { 0 } else { 2 * 60 * 60 };
                let interval: i64 = if now - addr.time < 24 * 60 * 60 {
                    60 * 60
                } else {
                    24 * 60 * 60
                };

                let entry = self.table.entry_mut(id);
                entry.addr.services |= addr.services;

                if entry.addr.time < addr.time - interval - penalty {
                    entry.addr.time = addr.time;
                    self.needs_flush = true;
                }

                // No new information.
                if entry.addr.time != 0 && addr.time <= entry.addr.time {
                    return false;
                }

                if entry.is_used() {
                    return false;
                }

                assert!(entry.ref_count > 0, "fresh entry without bucket references");

                if entry.ref_count >= self.config.max_refs {
                    return false;
                }

                // Stochastic gate: with N references, proceed with
                // probability 1/2^N.
                let gate = 1u32 << entry.ref_count;
                if self.rng.uniform(gate) != 0 {
                    return false;
                }

                id
            }
            None => {
                let src_addr = src.copied().unwrap_or(self.local_addr);
                let mut entry = AddressEntry::new(*addr, src_addr);

                // Clamp absurd timestamps to five days ago.
                if entry.addr.time <= 100_000_000 || entry.addr.time > now + 10 * 60 {
                    entry.addr.time = now - 5 * 24 * 60 * 60;
                }

                let id = self.table.arena.insert(entry);
                self.table.total_fresh += 1;
                id
            }
        };

        let bucket = self.fresh_bucket_of(id);

        if self.table.fresh[bucket].contains(&id) {
            return false;
        }

        if self.table.fresh[bucket].len() >= self.config.bucket_size {
            self.evict_fresh(bucket, now);
        }

        self.table.fresh[bucket].insert(id);
        self.table.entry_mut(id).ref_count += 1;
        self.table.index.insert(key, id);
        self.needs_flush = true;

        true
    }

    /// Forget an address entirely. Returns whether it was known.
    pub fn remove(&mut self, addr: &NetworkAddress) -> bool {
        let Some(id) = self.table.lookup(&addr.key()) else {
            return false;
        };

        match self.table.entry(id).used_bucket {
            Some(bucket) => {
                assert_eq!(
                    self.table.entry(id).ref_count,
                    0,
                    "used entry holding fresh references"
                );
                let bucket = bucket as usize;
                let pos = self.table.used[bucket]
                    .iter()
                    .position(|&other| other == id)
                    .expect("used entry must be linked in its bucket");
                self.table.used[bucket].remove(pos);
                self.table.total_used -= 1;
            }
            None => {
                for i in 0..self.table.fresh.len() {
                    if self.table.fresh[i].remove(&id) {
                        self.table.entry_mut(id).ref_count -= 1;
                    }
                }
                assert_eq!(
                    self.table.entry(id).ref_count,
                    0,
                    "fresh references outside any bucket"
                );
                self.table.total_fresh -= 1;
            }
        }

        self.table.index.remove(&addr.key());
        self.table.arena.remove(id);

        true
    }

    /// Note a dial attempt against a known address.
    pub fn mark_attempt(&mut self, addr: &NetworkAddress) {
        let now = self.time.now();
        if let Some(id) = self.table.lookup(&addr.key()) {
            let entry = self.table.entry_mut(id);
            entry.attempts += 1;
            entry.last_attempt = now;
        }
    }

    /// Refresh the recency of a connected address without promoting it.
    pub fn mark_success(&mut self, addr: &NetworkAddress) {
        let now = self.time.now();
        if let Some(id) = self.table.lookup(&addr.key()) {
            let entry = self.table.entry_mut(id);
            if now - entry.addr.time > 20 * 60 {
                entry.addr.time = now;
            }
        }
    }

    /// Record a completed handshake: reset the failure history and move
    /// the entry from its fresh buckets into a used bucket.
    ///
    /// When the target used bucket is full, its oldest resident is
    /// displaced back into a fresh bucket (falling back to the promoted
    /// entry's old bucket if the preferred one is full) and the new entry
    /// takes the victim's list position.
    pub fn mark_ack(&mut self, addr: &NetworkAddress, services: u64) {
        let Some(id) = self.table.lookup(&addr.key()) else {
            return;
        };
        let now = self.time.now();

        {
            let entry = self.table.entry_mut(id);
            entry.addr.services |= services;
            entry.last_success = now;
            entry.last_attempt = now;
            entry.attempts = 0;

            if entry.is_used() {
                return;
            }

            assert!(entry.ref_count > 0, "fresh entry without bucket references");
        }

        // Strip the entry out of every fresh bucket it occupies,
        // remembering the last one as a fallback home for a victim.
        let mut old_bucket = None;
        for i in 0..self.table.fresh.len() {
            if self.table.fresh[i].remove(&id) {
                self.table.entry_mut(id).ref_count -= 1;
                old_bucket = Some(i);
            }
        }

        let old = old_bucket.expect("fresh entry must occupy at least one bucket");
        assert_eq!(self.table.entry(id).ref_count, 0, "dangling fresh references");
        self.table.total_fresh -= 1;

        let target = self.used_bucket_of(id);

        if self.table.used[target].len() < self.config.bucket_size {
            self.table.entry_mut(id).used_bucket = Some(target as u32);
            self.table.used[target].push(id);
            self.table.total_used += 1;
            return;
        }

        // Full bucket: displace the oldest resident, first position
        // winning ties, and keep the list order by replacing in place.
        let pos = {
            let bucket = &self.table.used[target];
            let mut best = 0;
            for (i, &candidate) in bucket.iter().enumerate() {
                if self.table.entry(candidate).addr.time
                    < self.table.entry(bucket[best]).addr.time
                {
                    best = i;
                }
            }
            best
        };
        let victim = self.table.used[target][pos];

        let mut fallback = self.fresh_bucket_of(victim);
        if self.table.fresh[fallback].len() >= self.config.bucket_size {
            fallback = old;
        }

        self.table.used[target][pos] = id;
        self.table.entry_mut(id).used_bucket = Some(target as u32);

        let victim_entry = self.table.entry_mut(victim);
        victim_entry.used_bucket = None;
        assert_eq!(
            victim_entry.ref_count, 0,
            "used entry holding fresh references"
        );
        victim_entry.ref_count = 1;
        self.table.fresh[fallback].insert(victim);
        self.table.total_fresh += 1;
    }

    /// Pick a dial candidate, or `None` when the store is empty.
    ///
    /// Flips a fair coin between the fresh and used sides when both are
    /// populated, then rejection-samples: a uniformly random entry is
    /// accepted with probability `factor * chance`, and `factor` relaxes
    /// by 1.2 per rejection so the loop always terminates.
    pub fn get(&mut self) -> Option<&AddressEntry> {
        if self.table.total_fresh == 0 && self.table.total_used == 0 {
            return None;
        }

        let use_used = self.table.total_used > 0
            && (self.table.total_fresh == 0 || self.rng.uniform(2) == 0);

        let now = self.time.now();
        let mut factor = 1.0f64;

        loop {
            let id = if use_used {
                let i = self.rng.uniform(self.table.used.len() as u32) as usize;
                let bucket = &self.table.used[i];
                if bucket.is_empty() {
                    continue;
                }
                let j = self.rng.uniform(bucket.len() as u32) as usize;
                bucket[j]
            } else {
                let i = self.rng.uniform(self.table.fresh.len() as u32) as usize;
                let bucket = &self.table.fresh[i];
                if bucket.is_empty() {
                    continue;
                }
                let j = self.rng.uniform(bucket.len() as u32) as usize;
                *bucket.iter().nth(j).expect("index within bucket")
            };

            let chance = self.table.entry(id).chance(now);
            let roll = self.rng.uniform(1 << 30) as f64;

            if roll < factor * chance * f64::from(1u32 << 30) {
                return Some(self.table.entry(id));
            }

            factor *= 1.2;
        }
    }

    /// Ban the address's host. The port is ignored; the first ban sets
    /// the deadline.
    pub fn ban(&mut self, addr: &NetworkAddress) {
        let now = self.time.now();
        self.banned.ban(addr, now);
    }

    /// Lift a ban. Returns whether one existed.
    pub fn unban(&mut self, addr: &NetworkAddress) -> bool {
        self.banned.unban(addr)
    }

    /// Whether the address's host is currently banned.
    pub fn is_banned(&mut self, addr: &NetworkAddress) -> bool {
        let now = self.time.now();
        self.banned.is_banned(addr, now, self.config.ban_time)
    }

    /// Drop every ban.
    pub fn clear_banned(&mut self) {
        self.banned.clear();
    }

    /// Record an address we believe we are reachable at.
    pub fn add_local(&mut self, addr: &NetworkAddress, score: i32) -> bool {
        self.local.add(addr, score, self.config.services)
    }

    /// Bump a self-address's confidence after a peer echoed it back.
    pub fn mark_local(&mut self, addr: &NetworkAddress) -> bool {
        self.local.mark(addr)
    }

    /// Whether we track this self-address.
    pub fn has_local(&self, addr: &NetworkAddress) -> bool {
        self.local.has(addr)
    }

    /// Best self-address to advertise to `src` (highest score when no
    /// peer is given).
    pub fn get_local(&mut self, src: Option<&NetworkAddress>) -> Option<&NetworkAddress> {
        let now = self.time.now();
        self.local.best(src, now)
    }

    pub(crate) fn fresh_bucket_of(&self, id: EntryId) -> usize {
        let entry = self.table.entry(id);
        fresh_bucket_index(
            &self.secret,
            &entry.addr,
            &entry.src,
            self.config.fresh_bucket_count,
        )
    }

    pub(crate) fn used_bucket_of(&self, id: EntryId) -> usize {
        let entry = self.table.entry(id);
        used_bucket_index(&self.secret, &entry.addr, self.config.used_bucket_count)
    }

    /// Evict from a full fresh bucket: one pass drops every stale entry;
    /// only when none were stale is the oldest survivor evicted instead.
    fn evict_fresh(&mut self, bucket: usize, now: i64) {
        let ids: Vec<EntryId> = self.table.fresh[bucket].iter().copied().collect();
        let mut oldest: Option<EntryId> = None;
        let mut evicted_stale = false;

        for id in ids {
            if self.table.entry(id).is_stale(now) {
                self.unref_fresh(bucket, id);
                evicted_stale = true;
                continue;
            }

            match oldest {
                None => oldest = Some(id),
                Some(current)
                    if self.table.entry(id).addr.time
                        < self.table.entry(current).addr.time =>
                {
                    oldest = Some(id);
                }
                Some(_) => {}
            }
        }

        if evicted_stale {
            return;
        }

        if let Some(oldest) = oldest {
            self.unref_fresh(bucket, oldest);
        }
    }

    /// Remove one fresh-bucket reference; the last reference destroys
    /// the entry.
    fn unref_fresh(&mut self, bucket: usize, id: EntryId) {
        let removed = self.table.fresh[bucket].remove(&id);
        assert!(removed, "entry not present in fresh bucket");

        let entry = self.table.entry_mut(id);
        assert!(entry.ref_count > 0, "fresh entry without bucket references");
        entry.ref_count -= 1;

        if entry.ref_count == 0 {
            let key = entry.addr.key();
            self.table.index.remove(&key);
            self.table.arena.remove(id);
            self.table.total_fresh -= 1;
        }
    }
}
