//! # Component Registry
//!
//! Components are plain data attached to entities. Each registered type gets a
//! [`ComponentType`] descriptor once, at registration, and keeps it for the
//! lifetime of the world.
//!
//! Bit layout: ordinal 0 is the liveness bit, the `n`-th registered type
//! (0-based id) takes ordinal `n + 1`.
//!
//! ```text
//! ordinal:  0      1      2     ...  31     32     33
//! word:     0      0      0          0      1      1
//! meaning:  alive  id 0   id 1       id 30  id 31  id 32
//! ```

use std::any::{type_name, TypeId};
use std::collections::HashMap;

use super::storage::{ComponentStorage, ErasedStorage, StorageCell};
use crate::error::{EcsError, EcsResult};

/// Marker trait for ECS components.
///
/// Any `'static` type can be a component once it implements this trait and is
/// registered with a [`World`](crate::World).
///
/// # Example
///
/// ```rust
/// use tessera_core::Component;
///
/// struct Position {
///     x: f32,
/// }
///
/// impl Component for Position {}
/// ```
pub trait Component: 'static {}

/// Descriptor assigned to a component type at registration.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct ComponentType {
    id: u32,
    mask_index: u32,
    mask: u32,
}

impl ComponentType {
    /// Builds the descriptor for the component with the given 0-based id.
    #[inline]
    #[must_use]
    pub const fn from_id(id: u32) -> Self {
        let ordinal = id + 1;
        Self {
            id,
            mask_index: ordinal / u32::BITS,
            mask: 1 << (ordinal % u32::BITS),
        }
    }

    /// Index into the world's storage table.
    #[inline]
    #[must_use]
    pub const fn id(self) -> u32 {
        self.id
    }

    /// Word of the entity mask holding this type's bit.
    #[inline]
    #[must_use]
    pub const fn mask_index(self) -> u32 {
        self.mask_index
    }

    /// The single bit set for this type within its word.
    #[inline]
    #[must_use]
    pub const fn mask(self) -> u32 {
        self.mask
    }

    #[inline]
    pub(crate) const fn word(self) -> usize {
        self.mask_index as usize
    }
}

/// One registered type: descriptor, name and storage.
pub(crate) struct ComponentEntry {
    pub ty: ComponentType,
    pub name: &'static str,
    pub storage: Box<dyn ErasedStorage>,
}

/// Table of registered component types, indexed by component id.
#[derive(Default)]
pub(crate) struct ComponentRegistry {
    by_type: HashMap<TypeId, u32>,
    entries: Vec<ComponentEntry>,
}

impl ComponentRegistry {
    /// Registers `C` with the given storage and assigns it the next id.
    ///
    /// # Errors
    ///
    /// Returns [`EcsError::AlreadyRegistered`] if `C` was registered before.
    pub fn register<C: Component>(
        &mut self,
        storage: Box<dyn ComponentStorage<C>>,
    ) -> EcsResult<ComponentType> {
        let type_id = TypeId::of::<C>();
        if self.by_type.contains_key(&type_id) {
            return Err(EcsError::AlreadyRegistered {
                component: type_name::<C>(),
            });
        }

        let id = u32::try_from(self.entries.len())
            .unwrap_or_else(|_| panic!("component id space exhausted"));
        let ty = ComponentType::from_id(id);

        self.by_type.insert(type_id, id);
        self.entries.push(ComponentEntry {
            ty,
            name: type_name::<C>(),
            storage: Box::new(StorageCell::new(storage)),
        });

        Ok(ty)
    }

    /// Descriptor of `C`, if registered.
    #[inline]
    pub fn lookup<C: Component>(&self) -> Option<ComponentType> {
        self.lookup_id(TypeId::of::<C>())
    }

    /// Descriptor of the type behind `type_id`, if registered.
    #[inline]
    pub fn lookup_id(&self, type_id: TypeId) -> Option<ComponentType> {
        let id = *self.by_type.get(&type_id)?;
        Some(self.entries[id as usize].ty)
    }

    /// Typed storage of `C`, if registered.
    pub fn storage<C: Component>(&self) -> Option<&StorageCell<C>> {
        let id = *self.by_type.get(&TypeId::of::<C>())?;
        self.entries[id as usize]
            .storage
            .as_any()
            .downcast_ref::<StorageCell<C>>()
    }

    /// Number of registered types.
    #[inline]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Mask words needed for the liveness bit plus one bit per registered type.
    #[inline]
    pub fn mask_length(&self) -> usize {
        self.entries.len() / u32::BITS as usize + 1
    }

    /// Every registered type, in id order.
    pub fn entries(&self) -> impl Iterator<Item = &ComponentEntry> {
        self.entries.iter()
    }
}
