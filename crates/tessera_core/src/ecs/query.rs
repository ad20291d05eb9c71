//! # Queries
//!
//! A query is a component mask plus the shape of the rows it yields. Matching
//! is a per-word AND-equality test against the entity's flag row, so a query
//! costs `mask_length` loads per entity and never touches storages until a row
//! is read.
//!
//! Iteration is a lending cursor: each [`QueryRow`] borrows the world until it
//! is dropped, and the world may be mutated freely between steps.
//!
//! ```rust
//! use tessera_core::{Component, QueryParam, World};
//!
//! struct Position { x: f32 }
//! impl Component for Position {}
//!
//! let mut world = World::new();
//! world.register_component::<Position>().unwrap();
//! let entity = world.create_entity();
//! assert!(world.add_component(entity, Position { x: 0.0 }).is_ok());
//!
//! let query = world.create_query(&[QueryParam::write::<Position>()]).unwrap();
//! let mut cursor = query.cursor();
//! while let Some(row) = cursor.next(&mut world) {
//!     if let Some(mut position) = row.write::<Position>() {
//!         position.x += 1.0;
//!     }
//! }
//! ```

use std::any::{type_name, TypeId};
use std::cell::{Ref, RefMut};
use std::fmt;

use super::component::{Component, ComponentRegistry, ComponentType};
use super::entity::EntityId;
use super::event::ComponentEvent;
use super::flags::ALIVE;
use super::world::World;
use crate::error::{EcsError, EcsResult};

/// Maximum number of parameters a single query accepts.
pub const MAX_QUERY_PARAMETERS: usize = 6;

/// How a query parameter accesses its component.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Access {
    /// Read-only.
    Read,
    /// Mutable; every visited row emits [`ComponentEvent::Changed`].
    Write,
}

/// One requested column of a query.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum QueryParam {
    /// The entity id itself. Adds no constraint.
    Entity,
    /// A component the entity must hold.
    Component {
        /// Type of the component.
        type_id: TypeId,
        /// Type name, for diagnostics.
        name: &'static str,
        /// Requested access.
        access: Access,
    },
}

impl QueryParam {
    /// Requires `C` and allows reading it.
    #[must_use]
    pub fn read<C: Component>() -> Self {
        Self::component::<C>(Access::Read)
    }

    /// Requires `C` and allows writing it.
    #[must_use]
    pub fn write<C: Component>() -> Self {
        Self::component::<C>(Access::Write)
    }

    fn component<C: Component>(access: Access) -> Self {
        Self::Component {
            type_id: TypeId::of::<C>(),
            name: type_name::<C>(),
            access,
        }
    }
}

/// A component parameter resolved against the registry.
#[derive(Clone, Copy, Debug)]
struct BoundParam {
    ty: ComponentType,
    type_id: TypeId,
    access: Access,
}

/// A reusable component-membership predicate.
///
/// Created by [`World::create_query`] and released with
/// [`destroy`](Self::destroy).
pub struct Query {
    mask: Vec<u32>,
    params: Vec<QueryParam>,
    bound: Vec<BoundParam>,
}

impl Query {
    /// Resolves `params` and builds the query mask.
    pub(crate) fn build(registry: &ComponentRegistry, params: &[QueryParam]) -> EcsResult<Self> {
        if params.is_empty() || params.len() > MAX_QUERY_PARAMETERS {
            return Err(EcsError::InvalidQueryParameterCount {
                given: params.len(),
                max: MAX_QUERY_PARAMETERS,
            });
        }

        let mut mask = vec![0; registry.mask_length()];
        mask[0] = ALIVE;

        let mut bound = Vec::with_capacity(params.len());
        for param in params {
            let QueryParam::Component {
                type_id,
                name,
                access,
            } = *param
            else {
                continue;
            };

            let ty = registry
                .lookup_id(type_id)
                .ok_or(EcsError::NotRegistered { component: name })?;
            mask[ty.word()] |= ty.mask();
            bound.push(BoundParam {
                ty,
                type_id,
                access,
            });
        }

        Ok(Self {
            mask,
            params: params.to_vec(),
            bound,
        })
    }

    /// Starts a scan from the lowest entity id.
    #[must_use]
    pub fn cursor(&self) -> QueryCursor<'_> {
        QueryCursor {
            query: self,
            next_row: 1,
        }
    }

    /// Returns the first matching row, emitting events like a cursor step.
    pub fn first<'w, 'q>(&'q self, world: &'w mut World) -> Option<QueryRow<'w, 'q>> {
        self.cursor().next(world)
    }

    /// Returns true if no live entity matches. Emits no events.
    #[must_use]
    pub fn is_empty(&self, world: &World) -> bool {
        self.entities(world).next().is_none()
    }

    /// Matching entity ids in ascending order, without resolving components
    /// or emitting events.
    pub fn entities<'a>(&'a self, world: &'a World) -> impl Iterator<Item = EntityId> + 'a {
        (1..=world.high_water_mark())
            .filter_map(EntityId::new)
            .filter(move |entity| world.row_matches(entity.index(), &self.mask))
    }

    /// The membership mask, one word per mask word of the world at creation.
    #[inline]
    #[must_use]
    pub fn mask(&self) -> &[u32] {
        &self.mask
    }

    /// Parameters as given at creation.
    #[inline]
    #[must_use]
    pub fn params(&self) -> &[QueryParam] {
        &self.params
    }

    /// Releases the query.
    pub fn destroy(self, world: &mut World) {
        world.release_query();
    }

    /// Strongest access requested for the type. A type listed more than once
    /// is writable if any of its parameters asks for write access.
    fn access(&self, type_id: TypeId) -> Option<Access> {
        self.bound
            .iter()
            .filter(|param| param.type_id == type_id)
            .map(|param| param.access)
            .reduce(|held, access| if access == Access::Write { access } else { held })
    }
}

impl fmt::Debug for Query {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Query")
            .field("mask", &self.mask)
            .field("params", &self.params)
            .finish()
    }
}

/// A resumable scan over a query's matches.
#[derive(Debug)]
pub struct QueryCursor<'q> {
    query: &'q Query,
    next_row: usize,
}

impl<'q> QueryCursor<'q> {
    /// Advances to the next matching entity.
    ///
    /// Entities are visited in ascending id order up to the world's high-water
    /// mark as it is when each step runs. Every write parameter emits
    /// [`ComponentEvent::Changed`] for the row as the cursor steps onto it.
    pub fn next<'w>(&mut self, world: &'w mut World) -> Option<QueryRow<'w, 'q>> {
        let world: &'w World = world;
        let end = world.high_water_mark() as usize;

        while self.next_row <= end {
            let row = self.next_row;
            self.next_row += 1;

            if !world.row_matches(row, &self.query.mask) {
                continue;
            }

            let entity = EntityId::new(u32::try_from(row).ok()?)?;
            for param in &self.query.bound {
                if param.access == Access::Write {
                    world.emit(param.ty, ComponentEvent::Changed, entity);
                }
            }

            return Some(QueryRow {
                world,
                query: self.query,
                entity,
            });
        }

        None
    }

    /// Rewinds the cursor to the lowest entity id.
    pub fn restart(&mut self) {
        self.next_row = 1;
    }
}

/// One matching entity, borrowed from the world.
pub struct QueryRow<'w, 'q> {
    world: &'w World,
    query: &'q Query,
    entity: EntityId,
}

impl<'w> QueryRow<'w, '_> {
    /// The matched entity.
    #[inline]
    #[must_use]
    pub fn entity(&self) -> EntityId {
        self.entity
    }

    /// Borrows a component of the row.
    ///
    /// # Panics
    ///
    /// In development mode, panics if the query did not request `C`. Panics if
    /// `C` is not registered or its storage is mutably borrowed.
    #[must_use]
    pub fn read<C: Component>(&self) -> Option<Ref<'w, C>> {
        if self.world.config().development && self.query.access(TypeId::of::<C>()).is_none() {
            undeclared::<C>(Access::Read);
        }
        self.world.storage::<C>().get(self.entity)
    }

    /// Mutably borrows a component of the row.
    ///
    /// # Panics
    ///
    /// In development mode, panics if the query did not request `C` with write
    /// access. Panics if `C` is not registered or its storage is already
    /// borrowed.
    #[must_use]
    pub fn write<C: Component>(&self) -> Option<RefMut<'w, C>> {
        if self.world.config().development
            && self.query.access(TypeId::of::<C>()) != Some(Access::Write)
        {
            undeclared::<C>(Access::Write);
        }
        self.world.storage::<C>().get_mut(self.entity)
    }
}

impl fmt::Debug for QueryRow<'_, '_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("QueryRow")
            .field("entity", &self.entity)
            .finish_non_exhaustive()
    }
}

#[cold]
#[track_caller]
fn undeclared<C>(access: Access) -> ! {
    let (verb, param) = match access {
        Access::Read => ("read", "read"),
        Access::Write => ("wrote", "write"),
    };
    panic!(
        "query row {verb} component `{}` without requesting it; use QueryParam::{param}",
        type_name::<C>(),
    )
}
