//! # Component Storage
//!
//! Pluggable strategies mapping an entity to the component value of one type.
//! Membership is decided by the world's flag buffer; a storage only has to
//! answer for the values it holds.
//!
//! | Strategy | Backing | Good for |
//! |---|---|---|
//! | [`MapStorage`] | `HashMap` | sparse, rarely iterated types (default) |
//! | [`SparseArrayStorage`] | `Vec<Option<C>>` indexed by id | near-universal types |
//! | [`FlagStorage`] | bitset, no values | tag types |

use std::any::Any;
use std::cell::{Ref, RefCell, RefMut};
use std::collections::hash_map::Entry;
use std::collections::HashMap;
use std::fmt;
use std::marker::PhantomData;

use super::bitset::FlatBitSet;
use super::component::Component;
use super::entity::EntityId;

/// Storage strategy for a single component type.
///
/// Contract:
/// - `set` after `remove` behaves as a fresh insert.
/// - `remove` on an absent entity returns `false` and changes nothing.
/// - `set` never fails because an id is "too large".
pub trait ComponentStorage<C>: 'static {
    /// Returns the component stored for `entity`.
    fn get(&self, entity: EntityId) -> Option<&C>;

    /// Returns the component stored for `entity`, mutably.
    fn get_mut(&mut self, entity: EntityId) -> Option<&mut C>;

    /// Stores `component` for `entity`, replacing any previous value.
    ///
    /// # Returns
    ///
    /// The stored value, or `None` for strategies that keep no values.
    fn set(&mut self, entity: EntityId, component: C) -> Option<&C>;

    /// Removes the component for `entity`.
    ///
    /// # Returns
    ///
    /// `true` iff something was present.
    fn remove(&mut self, entity: EntityId) -> bool;

    /// Returns true if `entity` has a component in this storage.
    fn has(&self, entity: EntityId) -> bool {
        self.get(entity).is_some()
    }

    /// Number of entities with a component in this storage.
    fn len(&self) -> usize;

    /// Returns true if no entity has a component in this storage.
    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

// =============================================================================
// Map storage
// =============================================================================

/// Hash map backed storage. The default strategy.
pub struct MapStorage<C> {
    components: HashMap<EntityId, C>,
}

impl<C> MapStorage<C> {
    /// Creates an empty storage.
    #[must_use]
    pub fn new() -> Self {
        Self {
            components: HashMap::new(),
        }
    }
}

impl<C> Default for MapStorage<C> {
    fn default() -> Self {
        Self::new()
    }
}

impl<C> fmt::Debug for MapStorage<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MapStorage")
            .field("len", &self.components.len())
            .finish()
    }
}

impl<C: 'static> ComponentStorage<C> for MapStorage<C> {
    fn get(&self, entity: EntityId) -> Option<&C> {
        self.components.get(&entity)
    }

    fn get_mut(&mut self, entity: EntityId) -> Option<&mut C> {
        self.components.get_mut(&entity)
    }

    fn set(&mut self, entity: EntityId, component: C) -> Option<&C> {
        match self.components.entry(entity) {
            Entry::Occupied(mut slot) => {
                slot.insert(component);
                Some(&*slot.into_mut())
            }
            Entry::Vacant(slot) => Some(&*slot.insert(component)),
        }
    }

    fn remove(&mut self, entity: EntityId) -> bool {
        self.components.remove(&entity).is_some()
    }

    fn has(&self, entity: EntityId) -> bool {
        self.components.contains_key(&entity)
    }

    fn len(&self) -> usize {
        self.components.len()
    }
}

// =============================================================================
// Sparse array storage
// =============================================================================

/// Dense array indexed directly by entity id, with holes for absent entities.
///
/// Grows on demand to cover any id passed to `set`.
pub struct SparseArrayStorage<C> {
    components: Vec<Option<C>>,
    len: usize,
}

impl<C> SparseArrayStorage<C> {
    /// Creates an empty storage.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            components: Vec::new(),
            len: 0,
        }
    }

    /// Creates a storage with slots preallocated for ids below `capacity`.
    #[must_use]
    pub fn with_capacity(capacity: usize) -> Self {
        let mut components = Vec::with_capacity(capacity);
        components.resize_with(capacity, || None);
        Self {
            components,
            len: 0,
        }
    }

    /// Number of slots, occupied or not.
    #[inline]
    #[must_use]
    pub fn slots(&self) -> usize {
        self.components.len()
    }
}

impl<C> Default for SparseArrayStorage<C> {
    fn default() -> Self {
        Self::new()
    }
}

impl<C> fmt::Debug for SparseArrayStorage<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SparseArrayStorage")
            .field("len", &self.len)
            .field("slots", &self.components.len())
            .finish()
    }
}

impl<C: 'static> ComponentStorage<C> for SparseArrayStorage<C> {
    fn get(&self, entity: EntityId) -> Option<&C> {
        self.components.get(entity.index())?.as_ref()
    }

    fn get_mut(&mut self, entity: EntityId) -> Option<&mut C> {
        self.components.get_mut(entity.index())?.as_mut()
    }

    fn set(&mut self, entity: EntityId, component: C) -> Option<&C> {
        let index = entity.index();
        if index >= self.components.len() {
            self.components.resize_with(index + 1, || None);
        }

        let slot = &mut self.components[index];
        if slot.is_none() {
            self.len += 1;
        }
        Some(&*slot.insert(component))
    }

    fn remove(&mut self, entity: EntityId) -> bool {
        let removed = self
            .components
            .get_mut(entity.index())
            .and_then(Option::take)
            .is_some();
        if removed {
            self.len -= 1;
        }
        removed
    }

    fn len(&self) -> usize {
        self.len
    }
}

// =============================================================================
// Flag storage
// =============================================================================

/// Storage for tag components: remembers membership, keeps no values.
///
/// `get` always returns `None`, so tags never allocate per entity.
pub struct FlagStorage<C> {
    present: FlatBitSet,
    _marker: PhantomData<fn() -> C>,
}

impl<C> FlagStorage<C> {
    /// Creates an empty storage.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            present: FlatBitSet::new(),
            _marker: PhantomData,
        }
    }
}

impl<C> Default for FlagStorage<C> {
    fn default() -> Self {
        Self::new()
    }
}

impl<C> fmt::Debug for FlagStorage<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FlagStorage")
            .field("len", &self.present.count())
            .finish()
    }
}

impl<C: 'static> ComponentStorage<C> for FlagStorage<C> {
    fn get(&self, _entity: EntityId) -> Option<&C> {
        None
    }

    fn get_mut(&mut self, _entity: EntityId) -> Option<&mut C> {
        None
    }

    fn set(&mut self, entity: EntityId, _component: C) -> Option<&C> {
        self.present.insert(entity.index());
        None
    }

    fn remove(&mut self, entity: EntityId) -> bool {
        self.present.remove(entity.index())
    }

    fn has(&self, entity: EntityId) -> bool {
        self.present.contains(entity.index())
    }

    fn len(&self) -> usize {
        self.present.count()
    }
}

// =============================================================================
// World-side storage cell
// =============================================================================

/// A registered storage behind a `RefCell`, so rows can hand out component
/// borrows of different types at the same time.
pub(crate) struct StorageCell<C> {
    inner: RefCell<Box<dyn ComponentStorage<C>>>,
}

impl<C: Component> StorageCell<C> {
    pub fn new(storage: Box<dyn ComponentStorage<C>>) -> Self {
        Self {
            inner: RefCell::new(storage),
        }
    }

    /// Borrows the component of `entity`.
    ///
    /// # Panics
    ///
    /// Panics if the storage is mutably borrowed.
    pub fn get(&self, entity: EntityId) -> Option<Ref<'_, C>> {
        Ref::filter_map(self.inner.borrow(), |storage| storage.get(entity)).ok()
    }

    /// Mutably borrows the component of `entity`.
    ///
    /// # Panics
    ///
    /// Panics if the storage is already borrowed.
    pub fn get_mut(&self, entity: EntityId) -> Option<RefMut<'_, C>> {
        RefMut::filter_map(self.inner.borrow_mut(), |storage| storage.get_mut(entity)).ok()
    }

    /// Stores a component and borrows the stored value back.
    pub fn set(&self, entity: EntityId, component: C) -> Option<Ref<'_, C>> {
        self.inner.borrow_mut().set(entity, component);
        self.get(entity)
    }

    pub fn len(&self) -> usize {
        self.inner.borrow().len()
    }
}

/// Type-erased view of a [`StorageCell`], for operations that run over every
/// registered type.
pub(crate) trait ErasedStorage {
    /// Removes the component of `entity`, if any.
    fn remove(&self, entity: EntityId) -> bool;

    fn as_any(&self) -> &dyn Any;
}

impl<C: Component> ErasedStorage for StorageCell<C> {
    fn remove(&self, entity: EntityId) -> bool {
        self.inner.borrow_mut().remove(entity)
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}
