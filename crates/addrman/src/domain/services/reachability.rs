//! Routability checks and the reachability ordering used when choosing
//! which self-address to advertise to a given peer.

use crate::domain::netaddr::NetworkAddress;

const REACH_UNREACHABLE: i32 = 0;
const REACH_DEFAULT: i32 = 1;
const REACH_ACROSS_FAMILY: i32 = 2;
const REACH_TO_IPV4: i32 = 3;
const REACH_SAME_FAMILY: i32 = 4;

/// Whether an address is globally routable.
///
/// Rejects the null address, loopback, RFC 1918 / RFC 6598 private space,
/// link-local, documentation and reserved ranges for IPv4, and the
/// unspecified, loopback, link-local and unique-local ranges for IPv6.
pub fn is_routable(addr: &NetworkAddress) -> bool {
    if let Some(ip) = addr.ipv4() {
        match ip {
            [0, ..] => false,
            [10, ..] => false,
            [100, b, ..] if (64..128).contains(&b) => false,
            [127, ..] => false,
            [169, 254, ..] => false,
            [172, b, ..] if (16..32).contains(&b) => false,
            [192, 168, ..] => false,
            [192, 0, 2, _] | [198, 51, 100, _] | [203, 0, 113, _] => false,
            [b, ..] if b >= 240 => false,
            _ => true,
        }
    } else {
        let raw = &addr.raw;
        if *raw == [0u8; 16] {
            return false;
        }
        // ::1
        if raw[..15] == [0u8; 15] && raw[15] == 1 {
            return false;
        }
        // fe80::/10 link-local
        if raw[0] == 0xfe && (raw[1] & 0xc0) == 0x80 {
            return false;
        }
        // fc00::/7 unique-local
        if (raw[0] & 0xfe) == 0xfc {
            return false;
        }
        true
    }
}

/// Score how reachable `dst` is for a peer at `src`; higher is better.
///
/// This is a total order over routability classes: a destination in the
/// peer's own address family scores best, a cross-family destination is
/// still usable (IPv4 slightly preferred, since dual-stack hosts reach it
/// either way), and an unroutable destination is never advertised.
pub fn reachability(src: &NetworkAddress, dst: &NetworkAddress) -> i32 {
    if !is_routable(dst) {
        return REACH_UNREACHABLE;
    }

    if !is_routable(src) {
        return REACH_DEFAULT;
    }

    match (src.is_ipv4(), dst.is_ipv4()) {
        (true, true) | (false, false) => REACH_SAME_FAMILY,
        (false, true) => REACH_TO_IPV4,
        (true, false) => REACH_ACROSS_FAMILY,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_private_ranges_are_unroutable() {
        for addr in [
            NetworkAddress::v4(10, 1, 2, 3, 8333),
            NetworkAddress::v4(127, 0, 0, 1, 8333),
            NetworkAddress::v4(169, 254, 0, 1, 8333),
            NetworkAddress::v4(172, 16, 0, 1, 8333),
            NetworkAddress::v4(192, 168, 1, 1, 8333),
            NetworkAddress::v4(0, 0, 0, 0, 8333),
            NetworkAddress::v4(255, 255, 255, 255, 8333),
        ] {
            assert!(!is_routable(&addr), "{addr} should be unroutable");
        }
        assert!(is_routable(&NetworkAddress::v4(1, 2, 3, 4, 8333)));
        assert!(is_routable(&NetworkAddress::v4(172, 32, 0, 1, 8333)));
    }

    #[test]
    fn test_ipv6_special_ranges() {
        let mut loopback = [0u8; 16];
        loopback[15] = 1;
        assert!(!is_routable(&NetworkAddress::v6(loopback, 8333)));

        let mut link_local = [0u8; 16];
        link_local[0] = 0xfe;
        link_local[1] = 0x80;
        assert!(!is_routable(&NetworkAddress::v6(link_local, 8333)));

        let mut global = [0u8; 16];
        global[0] = 0x20;
        global[1] = 0x01;
        global[15] = 1;
        assert!(is_routable(&NetworkAddress::v6(global, 8333)));
    }

    #[test]
    fn test_reachability_prefers_same_family() {
        let v4_src = NetworkAddress::v4(1, 2, 3, 4, 8333);
        let v4_dst = NetworkAddress::v4(5, 6, 7, 8, 8333);
        let mut v6 = [0u8; 16];
        v6[0] = 0x20;
        v6[1] = 0x01;
        v6[15] = 7;
        let v6_dst = NetworkAddress::v6(v6, 8333);
        let private = NetworkAddress::v4(10, 0, 0, 1, 8333);

        assert!(reachability(&v4_src, &v4_dst) > reachability(&v4_src, &v6_dst));
        assert_eq!(reachability(&v4_src, &private), 0);
        assert_eq!(reachability(&private, &v4_dst), 1);
    }
}
