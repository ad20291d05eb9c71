//! Growable bitset over 32-bit words.

/// A simple bitset wrapped around a `Vec<u32>`.
///
/// Grows on [`insert`](Self::insert); every other operation treats bits past
/// the end as clear.
#[derive(Debug, Default, Clone)]
pub struct FlatBitSet {
    words: Vec<u32>,
}

impl FlatBitSet {
    /// Bits per word.
    pub const WORD_BITS: usize = u32::BITS as usize;

    /// Creates a new, empty bitset.
    #[must_use]
    pub const fn new() -> Self {
        Self { words: Vec::new() }
    }

    /// Creates a bitset with room for `bits` bits before it must grow.
    #[must_use]
    pub fn with_capacity(bits: usize) -> Self {
        Self {
            words: vec![0; bits.div_ceil(Self::WORD_BITS)],
        }
    }

    /// Sets a bit. Returns `true` if it was previously clear.
    pub fn insert(&mut self, bit: usize) -> bool {
        let (word, mask) = Self::locate(bit);
        if word >= self.words.len() {
            self.words.resize(word + 1, 0);
        }

        let was_clear = self.words[word] & mask == 0;
        self.words[word] |= mask;
        was_clear
    }

    /// Clears a bit. Returns `true` if it was previously set.
    pub fn remove(&mut self, bit: usize) -> bool {
        let (word, mask) = Self::locate(bit);
        match self.words.get_mut(word) {
            Some(slot) if *slot & mask != 0 => {
                *slot &= !mask;
                true
            }
            _ => false,
        }
    }

    /// Returns true if the bit is set.
    #[must_use]
    pub fn contains(&self, bit: usize) -> bool {
        let (word, mask) = Self::locate(bit);
        self.words.get(word).is_some_and(|w| w & mask != 0)
    }

    /// Number of set bits.
    #[must_use]
    pub fn count(&self) -> usize {
        self.words.iter().map(|w| w.count_ones() as usize).sum()
    }

    #[inline]
    const fn locate(bit: usize) -> (usize, u32) {
        (bit / Self::WORD_BITS, 1 << (bit % Self::WORD_BITS))
    }
}
