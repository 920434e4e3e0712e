//! Faster (but not DoS-resistant) hashmap for the frequency tables
use farmhash;
use std::collections::HashMap;
use std::hash::{BuildHasherDefault, Hash, Hasher};

/// Chain farmhash over every write
///
/// farmhash isn't a streaming hash, so each chunk is hashed with the running
/// state as its seed. Strings hash as several writes (bytes, then a
/// terminator) so every chunk has to count.
pub struct FarmHasher(u64);

impl Default for FarmHasher {
    #[inline]
    fn default() -> FarmHasher { FarmHasher(0) }
}

impl Hasher for FarmHasher {
    #[inline]
    fn finish(&self) -> u64 {
        self.0
    }
    #[inline]
    fn write(&mut self, bytes: &[u8]) {
        self.0 = farmhash::hash64_with_seed(bytes, self.0);
    }
}

pub type Farm = BuildHasherDefault<FarmHasher>;
pub type FarmMap<X, Y> = HashMap<X, Y, Farm>;

pub fn new_farm<X: Hash + Eq, Y>() -> FarmMap<X, Y> {
    Default::default()
}

/// Stable hex digest of some text, for naming things on disk
pub fn digest(text: &str) -> String {
    format!("{:016x}", farmhash::fingerprint64(text.as_bytes()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::hash::BuildHasher;

    fn hash_of<T: Hash>(t: &T) -> u64 {
        let mut h = Farm::default().build_hasher();
        t.hash(&mut h);
        h.finish()
    }

    #[test]
    fn every_write_contributes() {
        // Both fields end in the same terminator byte, so a hasher that only
        // kept the last write would collide here.
        assert_ne!(hash_of(&("red", "ADJ")), hash_of(&("blue", "ADJ")));
        assert_ne!(hash_of(&("red", "ADJ")), hash_of(&("red", "NOUN")));
        assert_eq!(hash_of(&("red", "ADJ")), hash_of(&("red", "ADJ")));
    }

    #[test]
    fn digest_is_stable() {
        assert_eq!(digest("a b"), digest("a b"));
        assert_ne!(digest("a b"), digest("a c"));
        assert_eq!(digest("x").len(), 16);
    }
}
