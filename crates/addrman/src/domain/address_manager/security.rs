//! Keyed bucket placement.
//!
//! SECURITY-CRITICAL: this is the eclipse defense. Bucket indices are
//! derived from a double-SHA256 keyed by a 32-byte secret, so remote
//! peers cannot predict where an address lands:
//!
//! - Fresh placement hashes the address group *and* the source group,
//!   with an intermediate `mod 64`: addresses gossiped by one source
//!   group reach at most 64 of the 1024 fresh buckets, bounding what
//!   source forgery can displace.
//! - Used placement hashes the full address with an intermediate
//!   `mod 8`: a single address reaches at most 8 of the 256 used buckets
//!   regardless of who announced it.

use sha2::{Digest, Sha256};

use crate::domain::netaddr::NetworkAddress;
use crate::domain::services::{group, GROUP_SIZE};
use crate::ports::RandomSource;

/// Fresh buckets reachable by entries sharing a source group.
const FRESH_BUCKETS_PER_SOURCE_GROUP: u32 = 64;
/// Used buckets reachable by a single address.
const USED_BUCKETS_PER_GROUP: u32 = 8;

/// The 32-byte secret parameterizing bucket hashes.
///
/// Generated from the CSPRNG at construction, regenerated on reset, and
/// persisted so a reloaded store reproduces its bucket layout.
#[derive(Clone, PartialEq, Eq)]
pub(crate) struct BucketSecret([u8; 32]);

impl BucketSecret {
    pub(crate) fn generate(rng: &mut dyn RandomSource) -> Self {
        let mut key = [0u8; 32];
        rng.fill_bytes(&mut key);
        Self(key)
    }

    pub(crate) fn from_bytes(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }

    pub(crate) fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }
}

impl std::fmt::Debug for BucketSecret {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        // Never log the secret itself.
        f.write_str("BucketSecret(..)")
    }
}

/// `double_SHA256(parts[0] || parts[1] || ...)`.
fn hash256(parts: &[&[u8]]) -> [u8; 32] {
    let mut hasher = Sha256::new();
    for part in parts {
        hasher.update(part);
    }
    let first = hasher.finalize();
    let second = Sha256::digest(first);
    second.into()
}

/// First four hash bytes as a little-endian integer.
fn first_u32_le(hash: &[u8; 32]) -> u32 {
    u32::from_le_bytes([hash[0], hash[1], hash[2], hash[3]])
}

/// Fresh bucket index for an entry announced by `src`.
pub(crate) fn fresh_bucket_index(
    secret: &BucketSecret,
    addr: &NetworkAddress,
    src: &NetworkAddress,
    bucket_count: usize,
) -> usize {
    let addr_group: [u8; GROUP_SIZE] = group(addr);
    let src_group: [u8; GROUP_SIZE] = group(src);

    let s1 = first_u32_le(&hash256(&[&secret.0, &addr_group, &src_group]))
        % FRESH_BUCKETS_PER_SOURCE_GROUP;

    let s2 = first_u32_le(&hash256(&[&secret.0, &src_group, &s1.to_le_bytes()]));

    s2 as usize % bucket_count
}

/// Used bucket index for an address.
pub(crate) fn used_bucket_index(
    secret: &BucketSecret,
    addr: &NetworkAddress,
    bucket_count: usize,
) -> usize {
    let addr_group: [u8; GROUP_SIZE] = group(addr);

    let s1 = first_u32_le(&hash256(&[
        &secret.0,
        &addr.raw,
        &addr.port.to_le_bytes(),
    ])) % USED_BUCKETS_PER_GROUP;

    let s2 = first_u32_le(&hash256(&[&secret.0, &addr_group, &s1.to_le_bytes()]));

    s2 as usize % bucket_count
}
