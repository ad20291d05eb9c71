//! # ECS World
//!
//! The central container: entity lifecycle, the flag buffer, registered
//! storages, event subscribers and the system list.
//!
//! Membership lives in the flag buffer and values live in storages. Every
//! operation that changes one keeps the other in step and then fans the
//! matching [`ComponentEvent`] out to subscribed channels.

use std::any::type_name;
use std::cell::{Ref, RefMut};
use std::fmt;

use super::component::{Component, ComponentRegistry, ComponentType};
use super::entity::{EntityAllocator, EntityId};
use super::event::{ComponentEvent, EventChannel, EventRegistry};
use super::flags::{EntityFlags, ALIVE};
use super::query::{Query, QueryParam};
use super::storage::{ComponentStorage, ErasedStorage, MapStorage, StorageCell};
use super::system::{System, SystemId, SystemState};
use crate::config::WorldConfig;
use crate::error::{EcsError, EcsResult};

struct SystemSlot {
    id: SystemId,
    system: Box<dyn System>,
    state: SystemState,
}

/// The ECS world.
///
/// Single-threaded: storages sit behind `RefCell`s and event queues are
/// shared through `Rc`, so a world is neither `Send` nor `Sync`.
///
/// # Example
///
/// ```rust
/// use tessera_core::{Component, ComponentEvent, World};
///
/// struct Health(u32);
/// impl Component for Health {}
///
/// let mut world = World::new();
/// world.register_component::<Health>().unwrap();
/// let added = world.create_event_channel::<Health>(ComponentEvent::Added).unwrap();
///
/// let entity = world.create_entity();
/// assert!(world.add_component(entity, Health(10)).is_ok());
/// assert!(world.has_component::<Health>(entity));
/// assert_eq!(added.pop(), Some(entity));
/// ```
pub struct World {
    config: WorldConfig,
    allocator: EntityAllocator,
    flags: EntityFlags,
    registry: ComponentRegistry,
    events: EventRegistry,
    systems: Vec<SystemSlot>,
    next_system: u32,
    live_queries: usize,
}

impl World {
    /// Creates a world with the default configuration.
    #[must_use]
    pub fn new() -> Self {
        Self::build(WorldConfig::default())
    }

    /// Creates a world with the given configuration.
    ///
    /// # Errors
    ///
    /// Returns [`EcsError::InvalidConfig`] if the configuration fails
    /// validation.
    pub fn with_config(config: WorldConfig) -> EcsResult<Self> {
        config.validate()?;
        Ok(Self::build(config))
    }

    fn build(config: WorldConfig) -> Self {
        tracing::debug!(
            development = config.development,
            initial_capacity = config.initial_capacity,
            "world created"
        );
        Self {
            flags: EntityFlags::new(config.initial_capacity, config.growth_chunk),
            config,
            allocator: EntityAllocator::default(),
            registry: ComponentRegistry::default(),
            events: EventRegistry::default(),
            systems: Vec::new(),
            next_system: 0,
            live_queries: 0,
        }
    }

    /// The configuration the world was built with.
    #[inline]
    #[must_use]
    pub fn config(&self) -> &WorldConfig {
        &self.config
    }

    // =========================================================================
    // Entities
    // =========================================================================

    /// Creates a live entity, reusing the most recently freed id if any.
    pub fn create_entity(&mut self) -> EntityId {
        let entity = self.allocator.allocate();
        let row = entity.index();
        self.flags.ensure_row(row);
        self.flags.insert(row, 0, ALIVE);
        tracing::trace!(%entity, "entity created");
        entity
    }

    /// Destroys an entity: clears its mask, removes every component it holds
    /// (emitting [`ComponentEvent::Removed`] for each) and frees its id.
    ///
    /// Destroying an entity that is not alive frees nothing, so an id is never
    /// pooled twice.
    pub fn destroy_entity(&mut self, entity: EntityId) {
        let alive = self.is_alive(entity);
        self.flags.clear_row(entity.index());

        for entry in self.registry.entries() {
            if entry.storage.remove(entity) {
                self.events.push(entry.ty, ComponentEvent::Removed, entity);
                tracing::trace!(%entity, component = entry.name, "component removed");
            }
        }

        if alive {
            self.allocator.release(entity);
            tracing::trace!(%entity, "entity destroyed");
        } else {
            tracing::warn!(%entity, "destroyed an entity that is not alive");
        }
    }

    /// Returns true if the entity is alive.
    #[inline]
    #[must_use]
    pub fn is_alive(&self, entity: EntityId) -> bool {
        self.flags.contains(entity.index(), 0, ALIVE)
    }

    /// Number of live entities.
    #[must_use]
    pub fn alive_count(&self) -> usize {
        self.allocator.high_water() as usize - self.allocator.free_count()
    }

    /// Highest entity id ever issued. Query scans stop here.
    #[inline]
    #[must_use]
    pub fn high_water_mark(&self) -> u32 {
        self.allocator.high_water()
    }

    /// The mask words of an entity: liveness bit first, then one bit per
    /// registered component type.
    #[must_use]
    pub fn entity_mask(&self, entity: EntityId) -> Option<&[u32]> {
        self.flags.row(entity.index())
    }

    // =========================================================================
    // Components
    // =========================================================================

    /// Registers `C` with the default map storage.
    ///
    /// # Errors
    ///
    /// Returns [`EcsError::AlreadyRegistered`] if `C` was registered before.
    pub fn register_component<C: Component>(&mut self) -> EcsResult<ComponentType> {
        self.register_component_with::<C, _>(MapStorage::<C>::new())
    }

    /// Registers `C` with the given storage strategy.
    ///
    /// Widens every entity's mask when the new type's bit falls past the
    /// current mask length.
    ///
    /// # Errors
    ///
    /// Returns [`EcsError::AlreadyRegistered`] if `C` was registered before.
    pub fn register_component_with<C, S>(&mut self, storage: S) -> EcsResult<ComponentType>
    where
        C: Component,
        S: ComponentStorage<C>,
    {
        let ty = self.registry.register::<C>(Box::new(storage))?;
        self.events.add_component();
        self.flags.widen(self.registry.mask_length());

        tracing::debug!(
            component = type_name::<C>(),
            id = ty.id(),
            mask_index = ty.mask_index(),
            "component registered"
        );
        Ok(ty)
    }

    /// Descriptor of `C`, if registered.
    #[must_use]
    pub fn component_type<C: Component>(&self) -> Option<ComponentType> {
        self.registry.lookup::<C>()
    }

    /// Number of registered component types.
    #[must_use]
    pub fn component_count(&self) -> usize {
        self.registry.len()
    }

    /// Words per entity mask.
    #[must_use]
    pub fn mask_length(&self) -> usize {
        self.flags.mask_length()
    }

    /// Number of entities holding `C` according to its storage.
    ///
    /// # Panics
    ///
    /// Panics if `C` is not registered.
    #[must_use]
    pub fn storage_len<C: Component>(&self) -> usize {
        self.storage::<C>().len()
    }

    /// Returns true if the entity holds `C`.
    ///
    /// # Panics
    ///
    /// Panics if `C` is not registered.
    #[must_use]
    pub fn has_component<C: Component>(&self, entity: EntityId) -> bool {
        let ty = self.expect_type::<C>();
        self.flags.contains(entity.index(), ty.word(), ty.mask())
    }

    /// Borrows the entity's `C` read-only.
    ///
    /// # Panics
    ///
    /// Panics if `C` is not registered or its storage is mutably borrowed.
    #[must_use]
    pub fn get_immutable_component<C: Component>(&self, entity: EntityId) -> Option<Ref<'_, C>> {
        self.storage::<C>().get(entity)
    }

    /// Borrows the entity's `C` mutably.
    ///
    /// Always emits [`ComponentEvent::Changed`], whether or not the value is
    /// then modified.
    ///
    /// # Panics
    ///
    /// Panics if `C` is not registered or its storage is already borrowed.
    pub fn get_mutable_component<C: Component>(&mut self, entity: EntityId) -> Option<RefMut<'_, C>> {
        let ty = self.expect_type::<C>();
        self.events.push(ty, ComponentEvent::Changed, entity);
        storage_of::<C>(&self.registry).get_mut(entity)
    }

    /// Attaches `component` to the entity and emits [`ComponentEvent::Added`].
    ///
    /// # Returns
    ///
    /// - `Ok(Some(value))` - the stored value
    /// - `Ok(None)` - stored by a strategy that keeps no values
    /// - `Err(component)` - the entity already holds `C` or is not alive;
    ///   nothing changed
    ///
    /// # Panics
    ///
    /// Panics if `C` is not registered, or in development mode if the entity
    /// is not alive.
    pub fn add_component<C: Component>(
        &mut self,
        entity: EntityId,
        component: C,
    ) -> Result<Option<Ref<'_, C>>, C> {
        let ty = self.expect_type::<C>();
        if !self.is_alive(entity) {
            if self.config.development {
                panic!(
                    "added component `{}` to entity {entity}, which is not alive",
                    type_name::<C>()
                );
            }
            tracing::warn!(%entity, component = type_name::<C>(), "add to dead entity rejected");
            return Err(component);
        }

        let row = entity.index();
        if self.flags.contains(row, ty.word(), ty.mask()) {
            return Err(component);
        }

        self.flags.ensure_row(row);
        self.flags.insert(row, ty.word(), ty.mask());
        let stored = storage_of::<C>(&self.registry).set(entity, component);
        self.events.push(ty, ComponentEvent::Added, entity);
        Ok(stored)
    }

    /// Detaches `C` from the entity and emits [`ComponentEvent::Removed`].
    ///
    /// Returns `false` if the entity did not hold `C`.
    ///
    /// # Panics
    ///
    /// Panics if `C` is not registered.
    pub fn remove_component<C: Component>(&mut self, entity: EntityId) -> bool {
        let ty = self.expect_type::<C>();
        if !storage_of::<C>(&self.registry).remove(entity) {
            return false;
        }

        self.flags.remove(entity.index(), ty.word(), ty.mask());
        self.events.push(ty, ComponentEvent::Removed, entity);
        true
    }

    // =========================================================================
    // Queries and events
    // =========================================================================

    /// Builds a query over 1 to [`MAX_QUERY_PARAMETERS`](crate::MAX_QUERY_PARAMETERS)
    /// parameters.
    ///
    /// # Errors
    ///
    /// Returns [`EcsError::InvalidQueryParameterCount`] for an empty or
    /// oversized parameter list and [`EcsError::NotRegistered`] if a parameter
    /// names an unregistered type.
    pub fn create_query(&mut self, params: &[QueryParam]) -> EcsResult<Query> {
        let query = Query::build(&self.registry, params)?;
        self.live_queries += 1;
        tracing::trace!(mask = ?query.mask(), "query created");
        Ok(query)
    }

    /// Number of queries created and not yet destroyed.
    #[must_use]
    pub fn live_query_count(&self) -> usize {
        self.live_queries
    }

    /// Subscribes a fresh, empty channel to `kind` events of `C`.
    ///
    /// # Errors
    ///
    /// Returns [`EcsError::NotRegistered`] if `C` is not registered.
    pub fn create_event_channel<C: Component>(
        &mut self,
        kind: ComponentEvent,
    ) -> EcsResult<EventChannel<C>> {
        let ty = self.registry.lookup::<C>().ok_or(EcsError::NotRegistered {
            component: type_name::<C>(),
        })?;
        let (subscriber, queue) = self.events.subscribe(ty, kind);
        tracing::trace!(component = type_name::<C>(), ?kind, subscriber, "event channel created");
        Ok(EventChannel::new(ty, kind, subscriber, queue))
    }

    /// Number of live channels receiving `kind` events of `C`.
    ///
    /// # Panics
    ///
    /// Panics if `C` is not registered.
    #[must_use]
    pub fn channel_count<C: Component>(&self, kind: ComponentEvent) -> usize {
        self.events.subscriber_count(self.expect_type::<C>(), kind)
    }

    // =========================================================================
    // Systems
    // =========================================================================

    /// Runs the system's `init` and appends it to the update order.
    ///
    /// The system is appended only once `init` succeeds, so
    /// [`system_count`](Self::system_count) does not include it while `init`
    /// runs.
    ///
    /// # Errors
    ///
    /// Returns whatever `init` returned; the system is then dropped.
    pub fn register_system<S: System>(&mut self, system: S) -> EcsResult<SystemId> {
        let mut system: Box<dyn System> = Box::new(system);
        if let Err(error) = system.init(self) {
            tracing::warn!(system = type_name::<S>(), %error, "system init failed");
            return Err(error);
        }

        let id = SystemId(self.next_system);
        self.next_system += 1;
        self.systems.push(SystemSlot {
            id,
            system,
            state: SystemState::Active,
        });

        tracing::debug!(%id, system = type_name::<S>(), "system registered");
        Ok(id)
    }

    /// Removes a system, runs its `destroy` if it is still active and hands
    /// it back.
    ///
    /// Systems cannot be unregistered while [`update`](Self::update) runs.
    ///
    /// # Errors
    ///
    /// Returns [`EcsError::SystemNotRegistered`] for an unknown id.
    pub fn unregister_system(&mut self, id: SystemId) -> EcsResult<Box<dyn System>> {
        let Some(index) = self.systems.iter().position(|slot| slot.id == id) else {
            tracing::warn!(%id, "unregistering unknown system");
            return Err(EcsError::SystemNotRegistered(id.get()));
        };

        let mut slot = self.systems.remove(index);
        if slot.state == SystemState::Active {
            slot.system.destroy(self);
        }

        tracing::debug!(%id, "system unregistered");
        Ok(slot.system)
    }

    /// Runs every active system once, in registration order.
    ///
    /// Systems registered during the update first run on the next one.
    pub fn update(&mut self) {
        let mut systems = std::mem::take(&mut self.systems);
        for slot in &mut systems {
            if slot.state == SystemState::Active {
                slot.system.update(self);
            }
        }
        self.restore_systems(systems);
    }

    /// Destroys every active system. Systems stay registered in the
    /// `Destroyed` state and are skipped by later updates.
    pub fn destroy(&mut self) {
        let mut systems = std::mem::take(&mut self.systems);
        let mut destroyed = 0usize;
        for slot in &mut systems {
            if slot.state == SystemState::Active {
                slot.system.destroy(self);
                slot.state = SystemState::Destroyed;
                destroyed += 1;
            }
        }
        self.restore_systems(systems);
        tracing::debug!(systems = destroyed, "world destroyed");
    }

    /// Number of registered systems, destroyed ones included.
    #[must_use]
    pub fn system_count(&self) -> usize {
        self.systems.len()
    }

    /// Lifecycle state of a registered system.
    #[must_use]
    pub fn system_state(&self, id: SystemId) -> Option<SystemState> {
        self.systems
            .iter()
            .find(|slot| slot.id == id)
            .map(|slot| slot.state)
    }

    /// Puts the taken system list back in front of anything registered
    /// meanwhile.
    fn restore_systems(&mut self, mut systems: Vec<SystemSlot>) {
        systems.append(&mut self.systems);
        self.systems = systems;
    }

    // =========================================================================
    // Crate internals
    // =========================================================================

    pub(crate) fn storage<C: Component>(&self) -> &StorageCell<C> {
        storage_of::<C>(&self.registry)
    }

    #[inline]
    pub(crate) fn row_matches(&self, row: usize, query_mask: &[u32]) -> bool {
        self.flags.matches(row, query_mask)
    }

    #[inline]
    pub(crate) fn emit(&self, ty: ComponentType, kind: ComponentEvent, entity: EntityId) {
        self.events.push(ty, kind, entity);
    }

    pub(crate) fn release_query(&mut self) {
        self.live_queries = self.live_queries.saturating_sub(1);
        tracing::trace!(live = self.live_queries, "query destroyed");
    }

    pub(crate) fn unsubscribe(&mut self, ty: ComponentType, kind: ComponentEvent, subscriber: u64) {
        if self.events.unsubscribe(ty, kind, subscriber) {
            tracing::trace!(component = ty.id(), ?kind, subscriber, "event channel destroyed");
        }
    }

    #[track_caller]
    fn expect_type<C: Component>(&self) -> ComponentType {
        match self.registry.lookup::<C>() {
            Some(ty) => ty,
            None => not_registered::<C>(),
        }
    }
}

impl Default for World {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for World {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("World")
            .field("alive", &self.alive_count())
            .field("components", &self.registry.len())
            .field("mask_length", &self.flags.mask_length())
            .field("systems", &self.systems.len())
            .finish_non_exhaustive()
    }
}

#[track_caller]
fn storage_of<C: Component>(registry: &ComponentRegistry) -> &StorageCell<C> {
    match registry.storage::<C>() {
        Some(storage) => storage,
        None => not_registered::<C>(),
    }
}

#[cold]
#[track_caller]
fn not_registered<C>() -> ! {
    panic!(
        "component `{}` is not registered; call World::register_component first",
        type_name::<C>()
    )
}
