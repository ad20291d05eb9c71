//! # Entity Management
//!
//! Entities are plain 1-based integer handles. Freed ids go back to a pool and
//! are handed out again before the counter advances.

use std::fmt;
use std::num::NonZeroU32;

/// Unique identifier for an entity.
///
/// Ids start at 1; 0 is reserved and cannot be represented.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[repr(transparent)]
pub struct EntityId(NonZeroU32);

impl EntityId {
    /// Creates an entity ID from its raw value.
    ///
    /// Returns `None` for 0.
    #[inline]
    #[must_use]
    pub const fn new(raw: u32) -> Option<Self> {
        match NonZeroU32::new(raw) {
            Some(raw) => Some(Self(raw)),
            None => None,
        }
    }

    /// Returns the raw id.
    #[inline]
    #[must_use]
    pub const fn get(self) -> u32 {
        self.0.get()
    }

    /// Returns the id as an index into per-entity arrays.
    #[inline]
    #[must_use]
    pub const fn index(self) -> usize {
        self.0.get() as usize
    }
}

impl fmt::Display for EntityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Issues entity ids and recycles freed ones.
///
/// The allocator only knows about ids; liveness lives in the world's flag
/// buffer.
#[derive(Debug, Default)]
pub(crate) struct EntityAllocator {
    /// Freed ids, reused last-in first-out.
    free: Vec<EntityId>,
    /// Highest id ever issued.
    high_water: u32,
}

impl EntityAllocator {
    /// Pops a freed id, or issues the next fresh one.
    ///
    /// # Panics
    ///
    /// Panics if all `u32::MAX` ids are in use.
    pub fn allocate(&mut self) -> EntityId {
        if let Some(id) = self.free.pop() {
            return id;
        }

        self.high_water = self
            .high_water
            .checked_add(1)
            .unwrap_or_else(|| panic!("entity id space exhausted"));
        Self::fresh(self.high_water)
    }

    /// Returns an id to the pool.
    pub fn release(&mut self, id: EntityId) {
        debug_assert!(id.get() <= self.high_water, "releasing an id never issued");
        self.free.push(id);
    }

    /// Highest id ever issued; query scans stop here.
    #[inline]
    pub const fn high_water(&self) -> u32 {
        self.high_water
    }

    /// Number of ids waiting for reuse.
    #[inline]
    pub fn free_count(&self) -> usize {
        self.free.len()
    }

    #[inline]
    fn fresh(raw: u32) -> EntityId {
        match EntityId::new(raw) {
            Some(id) => id,
            None => unreachable!("fresh ids start at 1"),
        }
    }
}
