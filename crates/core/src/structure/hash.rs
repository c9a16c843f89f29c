//! Content hashing for structure nodes.
//!
//! Every field is written length-prefixed so that two different sequences of
//! writes can never produce the same byte stream.

use sha2::{Digest, Sha256};

use super::Flags;

/// Incremental SHA-256 hasher used to content-address structure nodes.
#[derive(Debug, Clone)]
pub(crate) struct ContentHasher {
    inner: Sha256,
}

impl ContentHasher {
    /// Start a hash for a node of the given kind.
    pub(crate) fn new(kind: &str) -> Self {
        let mut hasher = Self {
            inner: Sha256::new(),
        };
        hasher.write(kind.as_bytes());
        hasher
    }

    fn write(&mut self, bytes: &[u8]) {
        self.inner.update((bytes.len() as u64).to_le_bytes());
        self.inner.update(bytes);
    }

    pub(crate) fn str(mut self, value: &str) -> Self {
        self.write(value.as_bytes());
        self
    }

    pub(crate) fn opt_str(self, value: Option<&str>) -> Self {
        match value {
            Some(value) => self.str("some").str(value),
            None => self.str("none"),
        }
    }

    pub(crate) fn flags(self, flags: Flags) -> Self {
        let encoded = match (flags.can_be_null, flags.can_be_optional) {
            (false, false) => "--",
            (true, false) => "n-",
            (false, true) => "-o",
            (true, true) => "no",
        };
        self.str(encoded)
    }

    /// Hash a list of child hashes as a set: order does not matter.
    pub(crate) fn unordered<'a>(mut self, hashes: impl Iterator<Item = &'a str>) -> Self {
        let mut sorted: Vec<&str> = hashes.collect();
        sorted.sort_unstable();
        sorted.dedup();
        self.write(&(sorted.len() as u64).to_le_bytes());
        for hash in sorted {
            self.write(hash.as_bytes());
        }
        self
    }

    pub(crate) fn finish(self) -> String {
        hex::encode(self.inner.finalize())
    }
}

/// Hash of a lazy node, derived from its identifier only.
pub(crate) fn lazy_hash(id: &str) -> String {
    ContentHasher::new("lazy").str(id).finish()
}
