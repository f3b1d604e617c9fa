//! Entry type and the recency/failure policies attached to it.

use crate::domain::netaddr::NetworkAddress;

/// Entries older than this are eviction fodder.
pub(crate) const HORIZON_DAYS: i64 = 30;
/// Never-successful entries give up after this many attempts.
pub(crate) const MAX_RETRIES: i32 = 3;
/// Grace period after the last success before failures count.
pub(crate) const MIN_FAIL_DAYS: i64 = 7;
/// Failure count that writes an entry off entirely.
pub(crate) const MAX_FAILURES: i32 = 10;

/// A stored peer address with its attempt history.
///
/// Exactly one of two placements holds at any time: a *fresh* entry
/// appears in `ref_count` fresh buckets (1..=8), a *used* entry sits in
/// exactly one used bucket and has `ref_count == 0`.
#[derive(Debug, Clone)]
pub struct AddressEntry {
    /// The peer itself.
    pub addr: NetworkAddress,
    /// Who told us about the peer (the self-address for local inserts).
    pub src: NetworkAddress,
    /// Consecutive failures since the last success.
    pub attempts: i32,
    /// Unix seconds of the last dial attempt, 0 when never.
    pub last_attempt: i64,
    /// Unix seconds of the last completed handshake, 0 when never.
    pub last_success: i64,
    /// Number of fresh buckets currently holding the entry.
    pub(crate) ref_count: u32,
    /// Owning used bucket, when promoted.
    pub(crate) used_bucket: Option<u32>,
}

impl AddressEntry {
    pub(crate) fn new(addr: NetworkAddress, src: NetworkAddress) -> Self {
        Self {
            addr,
            src,
            attempts: 0,
            last_attempt: 0,
            last_success: 0,
            ref_count: 0,
            used_bucket: None,
        }
    }

    /// Whether the entry lives in a used bucket.
    pub fn is_used(&self) -> bool {
        self.used_bucket.is_some()
    }

    /// Number of fresh buckets referencing the entry.
    pub fn ref_count(&self) -> u32 {
        self.ref_count
    }

    /// Selection weight in `(0, 1]`.
    ///
    /// Halved hard (×0.01) right after an attempt so the dialer does not
    /// hammer one peer, and decayed ×0.66 per consecutive failure with
    /// the failure count capped at 8.
    pub fn chance(&self, now: i64) -> f64 {
        let attempts = self.attempts.clamp(0, 8);
        let mut c = 1.0;

        if now - self.last_attempt < 60 * 10 {
            c *= 0.01;
        }

        c * 0.66f64.powi(attempts)
    }

    /// Whether the entry is a preferred eviction victim.
    ///
    /// An entry touched within the last minute is never stale. Otherwise
    /// staleness means: a nonsense timestamp (future or zero), silence
    /// past the horizon, or enough failures given its success history.
    pub(crate) fn is_stale(&self, now: i64) -> bool {
        if self.last_attempt != 0 && self.last_attempt >= now - 60 {
            return false;
        }

        if self.addr.time > now + 10 * 60 {
            return true;
        }

        if self.addr.time == 0 {
            return true;
        }

        if now - self.addr.time > HORIZON_DAYS * 24 * 60 * 60 {
            return true;
        }

        if self.last_success == 0 && self.attempts >= MAX_RETRIES {
            return true;
        }

        if now - self.last_success > MIN_FAIL_DAYS * 24 * 60 * 60 && self.attempts >= MAX_FAILURES {
            return true;
        }

        false
    }
}

/// Aggregate counters, primarily for logging and health checks.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct AddrManStats {
    /// Entries in fresh buckets.
    pub total_fresh: usize,
    /// Entries in used buckets.
    pub total_used: usize,
    /// Ban records, including any not yet lazily expired.
    pub banned: usize,
    /// Known self-addresses.
    pub local: usize,
}

#[cfg(test)]
mod tests {
    use super::*;

    const NOW: i64 = 1_700_000_000;

    fn entry_at(time: i64) -> AddressEntry {
        let mut addr = NetworkAddress::v4(1, 2, 3, 4, 8333);
        addr.time = time;
        AddressEntry::new(addr, NetworkAddress::v4(5, 6, 7, 8, 8333))
    }

    #[test]
    fn test_chance_decays_with_attempts() {
        let mut entry = entry_at(NOW);
        assert_eq!(entry.chance(NOW + 3600), 1.0);

        entry.attempts = 2;
        let decayed = entry.chance(NOW + 3600);
        assert!((decayed - 0.66 * 0.66).abs() < 1e-12);

        // attempt count saturates at 8
        entry.attempts = 100;
        assert!((entry.chance(NOW + 3600) - 0.66f64.powi(8)).abs() < 1e-12);
    }

    #[test]
    fn test_chance_penalizes_recent_attempt() {
        let mut entry = entry_at(NOW);
        entry.last_attempt = NOW - 30;
        assert!((entry.chance(NOW) - 0.01).abs() < 1e-12);
        entry.last_attempt = NOW - 601;
        assert_eq!(entry.chance(NOW), 1.0);
    }

    #[test]
    fn test_stale_on_bad_timestamps() {
        let mut entry = entry_at(0);
        assert!(entry.is_stale(NOW));

        entry.addr.time = NOW + 11 * 60;
        assert!(entry.is_stale(NOW));

        entry.addr.time = NOW - (HORIZON_DAYS * 24 * 60 * 60 + 1);
        assert!(entry.is_stale(NOW));

        entry.addr.time = NOW - 3600;
        assert!(!entry.is_stale(NOW));
    }

    #[test]
    fn test_stale_on_failure_history() {
        let mut entry = entry_at(NOW - 3600);
        entry.attempts = MAX_RETRIES;
        assert!(entry.is_stale(NOW), "never-successful entry with retries");

        entry.last_success = NOW - 3600;
        assert!(!entry.is_stale(NOW), "recent success forgives retries");

        entry.last_success = NOW - (MIN_FAIL_DAYS + 1) * 24 * 60 * 60;
        entry.attempts = MAX_FAILURES;
        assert!(entry.is_stale(NOW));
    }

    #[test]
    fn test_recent_attempt_shields_from_staleness() {
        let mut entry = entry_at(0);
        entry.last_attempt = NOW - 10;
        assert!(!entry.is_stale(NOW));
        entry.last_attempt = NOW - 61;
        assert!(entry.is_stale(NOW));
    }
}
