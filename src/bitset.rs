//! Fixed-capacity bit set used by the explicit relation engine.
//!
//! Every relation over the same support has the same capacity, so bulk
//! operations work word by word and equality is plain word comparison.

#[derive(Debug, Clone, Eq, PartialEq)]
pub struct BitSet {
    /// Storage: each u64 holds 64 bits
    words: Vec<u64>,
    /// Number of addressable bits.
    capacity: usize,
    /// Number of set bits (cached for O(1) len())
    count: usize,
}

impl BitSet {
    const BITS_PER_WORD: usize = 64;

    /// Creates an empty bit set able to hold `capacity` bits.
    pub fn new(capacity: usize) -> Self {
        Self {
            words: vec![0; capacity.div_ceil(Self::BITS_PER_WORD)],
            capacity,
            count: 0,
        }
    }

    /// Creates a bit set with all `capacity` bits set.
    pub fn full(capacity: usize) -> Self {
        let mut set = Self {
            words: vec![u64::MAX; capacity.div_ceil(Self::BITS_PER_WORD)],
            capacity,
            count: capacity,
        };
        set.clear_tail();
        set
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.count
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.count == 0
    }

    #[inline]
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    #[inline]
    fn word_and_bit(index: usize) -> (usize, usize) {
        (index / Self::BITS_PER_WORD, index % Self::BITS_PER_WORD)
    }

    #[inline]
    pub fn contains(&self, index: usize) -> bool {
        if index >= self.capacity {
            return false;
        }
        let (word, bit) = Self::word_and_bit(index);
        self.words[word] & (1u64 << bit) != 0
    }

    /// Sets the bit at the given index. Returns true if the bit was not previously set.
    #[inline]
    pub fn insert(&mut self, index: usize) -> bool {
        assert!(index < self.capacity, "Bit {} out of capacity {}", index, self.capacity);
        let (word, bit) = Self::word_and_bit(index);
        let mask = 1u64 << bit;
        let was_clear = self.words[word] & mask == 0;
        if was_clear {
            self.words[word] |= mask;
            self.count += 1;
        }
        was_clear
    }

    /// Clears the bit at the given index. Returns true if the bit was previously set.
    #[inline]
    pub fn remove(&mut self, index: usize) -> bool {
        if index >= self.capacity {
            return false;
        }
        let (word, bit) = Self::word_and_bit(index);
        let mask = 1u64 << bit;
        let was_set = self.words[word] & mask != 0;
        if was_set {
            self.words[word] &= !mask;
            self.count -= 1;
        }
        was_set
    }

    pub fn union_with(&mut self, other: &BitSet) {
        self.zip_with(other, |a, b| a | b);
    }

    pub fn intersect_with(&mut self, other: &BitSet) {
        self.zip_with(other, |a, b| a & b);
    }

    pub fn difference_with(&mut self, other: &BitSet) {
        self.zip_with(other, |a, b| a & !b);
    }

    fn zip_with(&mut self, other: &BitSet, op: impl Fn(u64, u64) -> u64) {
        assert_eq!(self.capacity, other.capacity, "Capacity mismatch");
        for (a, &b) in self.words.iter_mut().zip(&other.words) {
            *a = op(*a, b);
        }
        self.clear_tail();
    }

    fn clear_tail(&mut self) {
        let rem = self.capacity % Self::BITS_PER_WORD;
        if rem != 0 {
            if let Some(last) = self.words.last_mut() {
                *last &= (1u64 << rem) - 1;
            }
        }
        self.count = self.words.iter().map(|w| w.count_ones() as usize).sum();
    }

    /// Returns an iterator over all set bit indices, in ascending order.
    pub fn iter(&self) -> BitSetIter<'_> {
        BitSetIter {
            bitset: self,
            word_idx: 0,
            current_word: self.words.first().copied().unwrap_or(0),
        }
    }
}

/// Iterator over set bits in a BitSet.
pub struct BitSetIter<'a> {
    bitset: &'a BitSet,
    word_idx: usize,
    current_word: u64,
}

impl Iterator for BitSetIter<'_> {
    type Item = usize;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            if self.current_word != 0 {
                let bit = self.current_word.trailing_zeros() as usize;
                self.current_word &= self.current_word - 1; // Clear lowest set bit
                return Some(self.word_idx * BitSet::BITS_PER_WORD + bit);
            }

            self.word_idx += 1;
            if self.word_idx >= self.bitset.words.len() {
                return None;
            }
            self.current_word = self.bitset.words[self.word_idx];
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_insert_remove() {
        let mut bs = BitSet::new(100);
        assert!(bs.is_empty());
        assert!(bs.insert(42));
        assert!(!bs.insert(42));
        assert!(bs.contains(42));
        assert_eq!(bs.len(), 1);
        assert!(bs.remove(42));
        assert!(!bs.remove(42));
        assert!(!bs.contains(1000));
        assert!(bs.is_empty());
    }

    #[test]
    fn test_full_respects_capacity() {
        let bs = BitSet::full(70);
        assert_eq!(bs.len(), 70);
        assert!(bs.contains(69));
        assert!(!bs.contains(70));
        assert_eq!(bs.iter().count(), 70);
    }

    #[test]
    fn test_bulk_ops() {
        let mut a = BitSet::new(130);
        let mut b = BitSet::new(130);
        for i in [1, 5, 64, 129] {
            a.insert(i);
        }
        for i in [5, 64, 100] {
            b.insert(i);
        }

        let mut u = a.clone();
        u.union_with(&b);
        assert_eq!(u.iter().collect::<Vec<_>>(), vec![1, 5, 64, 100, 129]);
        assert_eq!(u.len(), 5);

        let mut i = a.clone();
        i.intersect_with(&b);
        assert_eq!(i.iter().collect::<Vec<_>>(), vec![5, 64]);

        let mut d = a.clone();
        d.difference_with(&b);
        assert_eq!(d.iter().collect::<Vec<_>>(), vec![1, 129]);
        assert_eq!(d.len(), 2);
    }

    #[test]
    fn test_equality_ignores_history() {
        let mut a = BitSet::new(10);
        a.insert(3);
        a.insert(4);
        a.remove(4);
        let mut b = BitSet::new(10);
        b.insert(3);
        assert_eq!(a, b);
    }
}
