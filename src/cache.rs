//! Direct-mapped computed table for BDD operations.
//!
//! Each slot holds at most one `(key, value)` entry; a colliding insert simply
//! overwrites the previous one. Keys are stored in full, so a lookup never
//! returns a result computed for a different operation.

use std::cell::Cell;

use crate::reference::Ref;

/// Szudzik pairing of two values.
///
/// ```text
/// (a, b) -> if (a<b) then (b^2 + a) else (a^2 + a + b)
/// ```
pub fn pairing2(a: u64, b: u64) -> u64 {
    if a < b {
        b.wrapping_mul(b).wrapping_add(a)
    } else {
        a.wrapping_mul(a).wrapping_add(a).wrapping_add(b)
    }
}

pub fn pairing3(a: u64, b: u64, c: u64) -> u64 {
    pairing2(pairing2(a, b), c)
}

pub trait CacheKey: Copy + Eq {
    fn hash(&self) -> u64;
}

/// Key of a memoized BDD operation.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum OpKey {
    Ite(Ref, Ref, Ref),
}

impl CacheKey for OpKey {
    fn hash(&self) -> u64 {
        match *self {
            OpKey::Ite(f, g, h) => pairing3(f.raw() as u64, g.raw() as u64, h.raw() as u64),
        }
    }
}

impl CacheKey for Ref {
    fn hash(&self) -> u64 {
        // Spread consecutive indices over the table.
        (self.raw() as u64).wrapping_mul(0x9E37_79B9_7F4A_7C15) >> 16
    }
}

pub struct Cache<K, V> {
    data: Vec<Option<(K, V)>>,
    bitmask: u64,
    hits: Cell<usize>,
    misses: Cell<usize>,
}

impl<K, V> Cache<K, V>
where
    K: CacheKey,
    V: Copy,
{
    /// Create a new cache with `2^bits` slots.
    pub fn new(bits: usize) -> Self {
        assert!(bits <= 31, "Cache bits should be in the range 0..=31");

        let size = 1usize << bits;
        Self {
            data: vec![None; size],
            bitmask: (size - 1) as u64,
            hits: Cell::new(0),
            misses: Cell::new(0),
        }
    }

    pub fn hits(&self) -> usize {
        self.hits.get()
    }
    pub fn misses(&self) -> usize {
        self.misses.get()
    }

    fn slot(&self, key: &K) -> usize {
        (key.hash() & self.bitmask) as usize
    }

    pub fn get(&self, key: &K) -> Option<V> {
        match self.data[self.slot(key)] {
            Some((k, v)) if k == *key => {
                self.hits.set(self.hits.get() + 1);
                Some(v)
            }
            _ => {
                self.misses.set(self.misses.get() + 1);
                None
            }
        }
    }

    pub fn insert(&mut self, key: K, value: V) {
        let slot = self.slot(&key);
        self.data[slot] = Some((key, value));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_szudzik() {
        assert_eq!(pairing2(0, 0), 0);
        assert_eq!(pairing2(0, 1), 1);
        assert_eq!(pairing2(1, 0), 2);
        assert_eq!(pairing2(2, 1), 7);
        assert_eq!(pairing2(4, 4), 24);
    }

    #[test]
    fn test_cache_roundtrip() {
        let mut cache = Cache::<OpKey, Ref>::new(4);
        let key = OpKey::Ite(Ref::positive(2), Ref::positive(3), Ref::ZERO);

        assert_eq!(cache.get(&key), None);
        cache.insert(key, Ref::positive(9));
        assert_eq!(cache.get(&key), Some(Ref::positive(9)));
        assert_eq!(cache.hits(), 1);
        assert_eq!(cache.misses(), 1);
    }

    #[test]
    fn test_collision_does_not_alias() {
        // With a single slot every key collides.
        let mut cache = Cache::<OpKey, Ref>::new(0);
        let a = OpKey::Ite(Ref::positive(1), Ref::ONE, Ref::ZERO);
        let b = OpKey::Ite(Ref::positive(2), Ref::ONE, Ref::ZERO);

        cache.insert(a, Ref::positive(1));
        cache.insert(b, Ref::positive(2));
        assert_eq!(cache.get(&a), None);
        assert_eq!(cache.get(&b), Some(Ref::positive(2)));
    }
}
