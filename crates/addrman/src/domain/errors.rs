//! Error types for the address manager.
//!
//! Policy rejections (an `add` that declines, a `mark_*` on an unknown
//! address) are not errors; they return `bool` or do nothing. The enum
//! below covers the one fallible surface with real failure modes: decoding
//! a persisted address file. Invariant violations are programming errors
//! and fail fast via `assert!`.

use thiserror::Error;

/// Reasons a persisted address file is rejected.
///
/// Any of these triggers a full reset: the caller is left with a valid,
/// empty store and should treat the file as absent.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DecodeError {
    #[error("unexpected end of input")]
    UnexpectedEof,

    #[error("unsupported version: {found} (expected {expected})")]
    BadVersion { found: u32, expected: u32 },

    #[error("network magic mismatch: {found:#010x} (expected {expected:#010x})")]
    BadMagic { found: u32, expected: u32 },

    #[error("non-canonical compact size encoding")]
    NonCanonicalSize,

    #[error("duplicate entry for {addr}")]
    DuplicateEntry { addr: String },

    #[error("bucket references unknown address {addr}")]
    DanglingKey { addr: String },

    #[error("bucket {index} exceeds capacity: {len} > {max}")]
    BucketOverflow {
        index: usize,
        len: usize,
        max: usize,
    },

    #[error("entry {addr} referenced by more than {max} fresh buckets")]
    TooManyRefs { addr: String, max: u32 },

    #[error("used bucket references {addr}, which is already placed")]
    UsedConflict { addr: String },

    #[error("{count} trailing bytes after used buckets")]
    TrailingBytes { count: usize },

    #[error("entry {addr} belongs to no bucket")]
    OrphanEntry { addr: String },
}
