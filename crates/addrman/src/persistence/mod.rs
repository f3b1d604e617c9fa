//! Versioned binary persistence for the address store.
//!
//! Layout, all little-endian:
//!
//! ```text
//! u32 version || u32 network_magic || key[32]
//! compact N   || entry[N]
//! per fresh bucket: compact L || addrkey[L]
//! per used bucket:  compact M || addrkey[M]   (list order preserved)
//! ```
//!
//! An entry record is `addrkey(addr) || services || time || addrkey(src)
//! || attempts || last_success || last_attempt`. Transient placement
//! state is not serialized; the reader rebuilds it from the bucket
//! sections and rejects any input whose cross-references do not
//! reconstruct a valid store. Any rejection leaves the store reset and
//! empty.

mod codec;

use std::io::Write;
use std::path::Path;

use tracing::{debug, info, warn};

use crate::domain::address_manager::{AddressManager, BucketSecret};
use crate::domain::errors::DecodeError;
use crate::domain::netaddr::{NetworkAddress, ADDR_KEY_SIZE, DEFAULT_SERVICES};
use crate::domain::AddressEntry;
use codec::{compact_len, put_compact, put_i32, put_i64, put_u32, put_u64, Reader};

/// Current file format version.
pub const SER_VERSION: u32 = 0;

/// Serialized entry record size.
const ENTRY_SIZE: usize = 2 * ADDR_KEY_SIZE + 36;

fn put_entry(buf: &mut Vec<u8>, entry: &AddressEntry) {
    buf.extend_from_slice(&entry.addr.key_bytes());
    put_u64(buf, entry.addr.services);
    put_i64(buf, entry.addr.time);
    buf.extend_from_slice(&entry.src.key_bytes());
    put_i32(buf, entry.attempts);
    put_i64(buf, entry.last_success);
    put_i64(buf, entry.last_attempt);
}

fn read_entry(r: &mut Reader<'_>, now: i64) -> Result<AddressEntry, DecodeError> {
    let mut addr = NetworkAddress::from_key_bytes(&r.read_array()?);
    addr.services = r.read_u64()?;
    addr.time = r.read_i64()?;

    // The source's metadata is not persisted; give it defaults.
    let mut src = NetworkAddress::from_key_bytes(&r.read_array()?);
    src.services = DEFAULT_SERVICES;
    src.time = now;

    let mut entry = AddressEntry::new(addr, src);
    entry.attempts = r.read_i32()?;
    entry.last_success = r.read_i64()?;
    entry.last_attempt = r.read_i64()?;

    Ok(entry)
}

impl AddressManager {
    /// Exact size [`export`](Self::export) will produce.
    pub fn serialized_size(&self) -> usize {
        let mut size = 4 + 4 + 32;

        size += compact_len(self.table.len() as u64);
        size += self.table.len() * ENTRY_SIZE;

        for bucket in &self.table.fresh {
            size += compact_len(bucket.len() as u64) + bucket.len() * ADDR_KEY_SIZE;
        }

        for bucket in &self.table.used {
            size += compact_len(bucket.len() as u64) + bucket.len() * ADDR_KEY_SIZE;
        }

        size
    }

    /// Serialize the whole store.
    pub fn export(&self) -> Vec<u8> {
        let size = self.serialized_size();
        let mut buf = Vec::with_capacity(size);

        put_u32(&mut buf, SER_VERSION);
        put_u32(&mut buf, self.config.network_magic);
        buf.extend_from_slice(self.secret.as_bytes());

        put_compact(&mut buf, self.table.len() as u64);
        for (_, entry) in self.table.arena.iter() {
            put_entry(&mut buf, entry);
        }

        for bucket in &self.table.fresh {
            put_compact(&mut buf, bucket.len() as u64);
            for &id in bucket {
                buf.extend_from_slice(&self.table.entry(id).addr.key_bytes());
            }
        }

        for bucket in &self.table.used {
            put_compact(&mut buf, bucket.len() as u64);
            for &id in bucket {
                buf.extend_from_slice(&self.table.entry(id).addr.key_bytes());
            }
        }

        assert_eq!(buf.len(), size, "serialized size mismatch");
        buf
    }

    /// Replace the store's contents with a serialized dump.
    ///
    /// On any decode failure the store is reset again, so the caller is
    /// always left with a valid (possibly empty) store.
    pub fn import(&mut self, data: &[u8]) -> Result<(), DecodeError> {
        self.reset();

        match self.import_inner(data) {
            Ok(()) => Ok(()),
            Err(err) => {
                self.reset();
                Err(err)
            }
        }
    }

    fn import_inner(&mut self, data: &[u8]) -> Result<(), DecodeError> {
        let now = self.time.now();
        let mut r = Reader::new(data);

        let version = r.read_u32()?;
        if version != SER_VERSION {
            return Err(DecodeError::BadVersion {
                found: version,
                expected: SER_VERSION,
            });
        }

        let magic = r.read_u32()?;
        if magic != self.config.network_magic {
            return Err(DecodeError::BadMagic {
                found: magic,
                expected: self.config.network_magic,
            });
        }

        self.secret = BucketSecret::from_bytes(r.read_array()?);

        let count = r.read_compact()? as usize;
        for _ in 0..count {
            let entry = read_entry(&mut r, now)?;
            let key = entry.addr.key();
            let display = entry.addr.to_string();
            let id = self.table.arena.insert(entry);
            if self.table.index.insert(key, id).is_some() {
                return Err(DecodeError::DuplicateEntry { addr: display });
            }
        }

        for i in 0..self.table.fresh.len() {
            let len = r.read_compact()? as usize;
            if len > self.config.bucket_size {
                return Err(DecodeError::BucketOverflow {
                    index: i,
                    len,
                    max: self.config.bucket_size,
                });
            }

            for _ in 0..len {
                let key_addr = NetworkAddress::from_key_bytes(&r.read_array()?);
                let Some(id) = self.table.lookup(&key_addr.key()) else {
                    return Err(DecodeError::DanglingKey {
                        addr: key_addr.to_string(),
                    });
                };

                let entry = self.table.entry_mut(id);
                let first_ref = entry.ref_count == 0;
                entry.ref_count += 1;
                let refs = entry.ref_count;

                if first_ref {
                    self.table.total_fresh += 1;
                }

                if refs > self.config.max_refs {
                    return Err(DecodeError::TooManyRefs {
                        addr: key_addr.to_string(),
                        max: self.config.max_refs,
                    });
                }

                if !self.table.fresh[i].insert(id) {
                    return Err(DecodeError::DuplicateEntry {
                        addr: key_addr.to_string(),
                    });
                }
            }
        }

        for i in 0..self.table.used.len() {
            let len = r.read_compact()? as usize;
            if len > self.config.bucket_size {
                return Err(DecodeError::BucketOverflow {
                    index: i,
                    len,
                    max: self.config.bucket_size,
                });
            }

            for _ in 0..len {
                let key_addr = NetworkAddress::from_key_bytes(&r.read_array()?);
                let Some(id) = self.table.lookup(&key_addr.key()) else {
                    return Err(DecodeError::DanglingKey {
                        addr: key_addr.to_string(),
                    });
                };

                let entry = self.table.entry_mut(id);
                if entry.ref_count != 0 || entry.is_used() {
                    return Err(DecodeError::UsedConflict {
                        addr: key_addr.to_string(),
                    });
                }

                entry.used_bucket = Some(i as u32);
                self.table.used[i].push(id);
                self.table.total_used += 1;
            }
        }

        if r.remaining() != 0 {
            return Err(DecodeError::TrailingBytes {
                count: r.remaining(),
            });
        }

        // Every entry must have ended up somewhere.
        for (_, entry) in self.table.arena.iter() {
            if !entry.is_used() && entry.ref_count() == 0 {
                return Err(DecodeError::OrphanEntry {
                    addr: entry.addr.to_string(),
                });
            }
        }

        Ok(())
    }

    /// Remember `file` as the backing path and try to load it.
    ///
    /// Returns whether a store was loaded; `false` (missing, unreadable
    /// or corrupt file) means the caller should fall back to seeding.
    /// A corrupt file leaves the store reset and empty.
    pub fn open(&mut self, file: Option<&Path>, flags: u32) -> bool {
        self.flags = flags;

        let Some(path) = file else {
            self.file = None;
            return false;
        };

        self.file = Some(path.to_path_buf());

        let bytes = match std::fs::read(path) {
            Ok(bytes) => bytes,
            Err(err) => {
                debug!(target: "addrman", path = %path.display(), %err, "could not read address file");
                return false;
            }
        };

        match self.import(&bytes) {
            Ok(()) => {
                info!(target: "addrman", total = self.total(), path = %path.display(), "loaded addresses");
                true
            }
            Err(err) => {
                warn!(target: "addrman", path = %path.display(), %err, "discarding corrupt address file");
                false
            }
        }
    }

    /// Write the store to its backing file when dirty.
    ///
    /// The write is atomic (temp file, fsync, rename). On failure the
    /// in-memory state, including the dirty flag, is untouched.
    pub fn flush(&mut self) -> std::io::Result<()> {
        if !self.needs_flush {
            return Ok(());
        }

        let Some(path) = self.file.clone() else {
            return Ok(());
        };

        debug!(target: "addrman", path = %path.display(), "flushing addresses");

        let data = self.export();
        let tmp = path.with_extension("tmp");

        let mut file = std::fs::File::create(&tmp)?;
        file.write_all(&data)?;
        file.sync_all()?;
        std::fs::rename(&tmp, &path)?;

        self.needs_flush = false;
        Ok(())
    }

    /// Shut down the store, dropping all entries. Call
    /// [`flush`](Self::flush) first if the contents should survive.
    pub fn close(&mut self) {
        self.reset();
    }
}
