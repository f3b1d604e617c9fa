//! Network-group classification.
//!
//! The group identifier is a stable prefix of an address's routing class.
//! Bucket placement hashes the group rather than the full address so that
//! a /16-like neighborhood cannot monopolize buckets.

use super::reachability::is_routable;
use crate::domain::netaddr::NetworkAddress;

/// Size of a network-group identifier.
pub const GROUP_SIZE: usize = 6;

const CLASS_UNROUTABLE: u8 = 0;
const CLASS_IPV4: u8 = 1;
const CLASS_IPV6: u8 = 2;

/// Compute the 6-byte group identifier of an address.
///
/// IPv4 addresses group on their /16 prefix, IPv6 on their /32 prefix.
/// Every unroutable address collapses into a single shared group, so
/// private and loopback sources cannot spread across source buckets.
pub fn group(addr: &NetworkAddress) -> [u8; GROUP_SIZE] {
    let mut out = [0u8; GROUP_SIZE];

    if !is_routable(addr) {
        out[0] = CLASS_UNROUTABLE;
        return out;
    }

    match addr.ipv4() {
        Some(ip) => {
            out[0] = CLASS_IPV4;
            out[1] = ip[0];
            out[2] = ip[1];
        }
        None => {
            out[0] = CLASS_IPV6;
            out[1..5].copy_from_slice(&addr.raw[..4]);
        }
    }

    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_same_slash16_shares_group() {
        let a = group(&NetworkAddress::v4(101, 2, 3, 4, 8333));
        let b = group(&NetworkAddress::v4(101, 2, 200, 1, 9999));
        let c = group(&NetworkAddress::v4(101, 3, 3, 4, 8333));
        assert_eq!(a, b);
        assert_ne!(a, c);
    }

    #[test]
    fn test_unroutable_addresses_collapse() {
        let a = group(&NetworkAddress::v4(127, 0, 0, 1, 8333));
        let b = group(&NetworkAddress::v4(10, 1, 2, 3, 8333));
        assert_eq!(a, b);
        assert_eq!(a, [0u8; GROUP_SIZE]);
    }

    #[test]
    fn test_families_never_collide() {
        let mut v6 = [0u8; 16];
        // 2001:0102::/32 shares its first four bytes with no v4 group tag
        v6[0] = 0x20;
        v6[1] = 0x01;
        v6[2] = 0x01;
        v6[3] = 0x02;
        v6[15] = 1;
        let a = group(&NetworkAddress::v4(32, 1, 1, 2, 8333));
        let b = group(&NetworkAddress::v6(v6, 8333));
        assert_ne!(a, b);
    }
}
