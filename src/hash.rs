// src/hash.rs

//! Stable 64-bit identities for graph nodes.
//!
//! Every [`Hash`] is the first eight bytes of a blake3 digest. They are used
//! as keys in the [`Caravan`](crate::dag::Caravan) and must be deterministic
//! across runs, so nothing here depends on `std`'s randomly-seeded hashers.

use std::fmt;
use std::io::Read;
use std::path::Path;

use anyhow::{Context, Result};
use blake3::Hasher;

/// Opaque 64-bit identity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Hash(u64);

impl Hash {
    /// Wrap a raw value (mostly useful in tests).
    pub const fn from_raw(raw: u64) -> Self {
        Self(raw)
    }

    pub fn raw(self) -> u64 {
        self.0
    }

    pub fn of_bytes(bytes: &[u8]) -> Self {
        let mut hasher = Hasher::new();
        hasher.update(bytes);
        Self::from_hasher(&hasher)
    }

    pub fn of_str(s: &str) -> Self {
        Self::of_bytes(s.as_bytes())
    }

    /// Hash the raw bytes of a path, so non-UTF-8 names stay distinct.
    pub fn of_path(path: &Path) -> Self {
        Self::of_bytes(path.as_os_str().as_encoded_bytes())
    }

    /// Hash a tuple of strings.
    ///
    /// Each element is length-prefixed, so `["ab", "c"]` and `["a", "bc"]`
    /// produce different identities.
    pub fn of_strings<I, S>(parts: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut hasher = Hasher::new();
        for part in parts {
            let bytes = part.as_ref().as_bytes();
            hasher.update(&(bytes.len() as u64).to_le_bytes());
            hasher.update(bytes);
        }
        Self::from_hasher(&hasher)
    }

    /// Hash a byte stream without loading it into memory.
    pub fn of_reader(mut reader: impl Read) -> Result<Self> {
        let mut hasher = Hasher::new();
        let mut buf = [0u8; 8192];
        loop {
            let n = reader.read(&mut buf).context("reading stream for hashing")?;
            if n == 0 {
                break;
            }
            hasher.update(&buf[..n]);
        }
        Ok(Self::from_hasher(&hasher))
    }

    /// Order-sensitive combination: `a.combine(b) != b.combine(a)` in general.
    pub fn combine(self, other: Hash) -> Hash {
        let mut hasher = Hasher::new();
        hasher.update(&self.0.to_le_bytes());
        hasher.update(&other.0.to_le_bytes());
        Self::from_hasher(&hasher)
    }

    fn from_hasher(hasher: &Hasher) -> Self {
        let digest = hasher.finalize();
        let mut head = [0u8; 8];
        head.copy_from_slice(&digest.as_bytes()[..8]);
        Self(u64::from_le_bytes(head))
    }
}

impl fmt::Display for Hash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:016x}", self.0)
    }
}
