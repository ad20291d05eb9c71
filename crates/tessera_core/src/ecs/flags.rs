//! # Entity Flag Buffer
//!
//! Every entity owns `mask_length` consecutive 32-bit words in one flat
//! buffer, so a membership test is a handful of loads from the same cache
//! line.
//!
//! ```text
//! words:  | e0 w0 | e0 w1 | e1 w0 | e1 w1 | e2 w0 | ...
//!           ^ row 0 unused (ids start at 1)
//! w0 bit 0:  entity is alive
//! other bits: one per registered component type
//! ```

/// Mask bit marking an entity as alive (word 0).
pub(crate) const ALIVE: u32 = 1;

/// Flat, entity-major buffer of mask words.
#[derive(Debug)]
pub(crate) struct EntityFlags {
    words: Vec<u32>,
    mask_length: usize,
    growth_chunk: usize,
}

impl EntityFlags {
    /// Creates a buffer with `rows` zeroed rows of one word each.
    pub fn new(rows: usize, growth_chunk: usize) -> Self {
        Self {
            words: vec![0; rows],
            mask_length: 1,
            growth_chunk: growth_chunk.max(1),
        }
    }

    /// Words per entity row.
    #[inline]
    pub const fn mask_length(&self) -> usize {
        self.mask_length
    }

    /// Number of entity rows currently allocated.
    #[inline]
    pub fn rows(&self) -> usize {
        self.words.len() / self.mask_length
    }

    /// All words of a row, or `None` outside the buffer.
    #[inline]
    pub fn row(&self, row: usize) -> Option<&[u32]> {
        let start = row * self.mask_length;
        self.words.get(start..start + self.mask_length)
    }

    /// Grows the buffer in whole chunks of rows until `row` fits.
    pub fn ensure_row(&mut self, row: usize) {
        let rows = self.rows();
        if row < rows {
            return;
        }

        let missing = row + 1 - rows;
        let chunks = missing.div_ceil(self.growth_chunk);
        let new_rows = rows + chunks * self.growth_chunk;
        self.words.resize(new_rows * self.mask_length, 0);
        tracing::trace!(rows = new_rows, "entity flag buffer grown");
    }

    /// Reshapes every row to `mask_length` words.
    ///
    /// Existing words keep their position within their row; the new high words
    /// start zeroed. Never shrinks.
    pub fn widen(&mut self, mask_length: usize) {
        let old_length = self.mask_length;
        if mask_length <= old_length {
            return;
        }

        let rows = self.rows();
        let mut words = vec![0; rows * mask_length];
        for (old_row, new_row) in self
            .words
            .chunks_exact(old_length)
            .zip(words.chunks_exact_mut(mask_length))
        {
            new_row[..old_length].copy_from_slice(old_row);
        }

        self.words = words;
        self.mask_length = mask_length;
        tracing::debug!(
            from = old_length,
            to = mask_length,
            rows,
            "entity mask widened"
        );
    }

    /// Returns one word of a row, or 0 outside the buffer.
    #[inline]
    pub fn word(&self, row: usize, word: usize) -> u32 {
        self.words
            .get(row * self.mask_length + word)
            .copied()
            .unwrap_or(0)
    }

    /// Tests that every bit of `mask` is set in the given word.
    #[inline]
    pub fn contains(&self, row: usize, word: usize, mask: u32) -> bool {
        self.word(row, word) & mask == mask
    }

    /// Sets bits in a row word. The row must exist.
    #[inline]
    pub fn insert(&mut self, row: usize, word: usize, mask: u32) {
        self.words[row * self.mask_length + word] |= mask;
    }

    /// Clears bits in a row word. Rows outside the buffer are already clear.
    #[inline]
    pub fn remove(&mut self, row: usize, word: usize, mask: u32) {
        if let Some(slot) = self.words.get_mut(row * self.mask_length + word) {
            *slot &= !mask;
        }
    }

    /// Zeroes every word of a row, liveness included.
    pub fn clear_row(&mut self, row: usize) {
        let start = row * self.mask_length;
        if let Some(slice) = self.words.get_mut(start..start + self.mask_length) {
            slice.fill(0);
        }
    }

    /// Tests a row against a query mask.
    ///
    /// The query mask may be shorter than the row when component types were
    /// registered after the query was built; missing words require nothing.
    #[inline]
    pub fn matches(&self, row: usize, query_mask: &[u32]) -> bool {
        let Some(slice) = self.row(row) else {
            return false;
        };

        slice
            .iter()
            .zip(query_mask)
            .all(|(&word, &mask)| word & mask == mask)
    }
}
