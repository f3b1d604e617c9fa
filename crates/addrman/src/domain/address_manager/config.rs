//! Address manager configuration.

use crate::domain::netaddr::DEFAULT_SERVICES;

/// Configuration for the address manager.
///
/// The bucket geometry defaults match the persisted format (1024 fresh
/// buckets, 256 used buckets, 64 entries each); a store only reloads a
/// file written with the same geometry and network magic.
#[derive(Debug, Clone)]
pub struct AddrManConfig {
    /// Network magic embedded in the persisted file header.
    pub network_magic: u32,
    /// Port used for the default self-address.
    pub default_port: u16,
    /// Service bits this node advertises on its own addresses.
    pub services: u64,
    /// Number of fresh buckets.
    pub fresh_bucket_count: usize,
    /// Number of used buckets.
    pub used_bucket_count: usize,
    /// Maximum entries per bucket, fresh or used.
    pub bucket_size: usize,
    /// Maximum number of fresh buckets a single entry may occupy.
    pub max_refs: u32,
    /// How long a ban lasts, seconds.
    pub ban_time: i64,
}

impl Default for AddrManConfig {
    fn default() -> Self {
        Self {
            network_magic: 0x4144_4452,
            default_port: 8333,
            services: DEFAULT_SERVICES,
            fresh_bucket_count: 1024,
            used_bucket_count: 256,
            bucket_size: 64,
            max_refs: 8,
            ban_time: 24 * 60 * 60,
        }
    }
}

impl AddrManConfig {
    /// Shrunken geometry for tests that need full buckets quickly.
    pub fn for_testing() -> Self {
        Self {
            fresh_bucket_count: 16,
            used_bucket_count: 8,
            bucket_size: 4,
            ..Self::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_geometry() {
        let config = AddrManConfig::default();
        assert_eq!(config.fresh_bucket_count, 1024);
        assert_eq!(config.used_bucket_count, 256);
        assert_eq!(config.bucket_size, 64);
        assert_eq!(config.max_refs, 8);
        assert_eq!(config.ban_time, 86_400);
    }
}
