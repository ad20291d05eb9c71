//! # Systems
//!
//! A system is per-update logic with a fixed context. The world drives the
//! lifecycle:
//!
//! ```text
//! Uninitialized --init--> Active --destroy--> Destroyed
//!                           |  ^
//!                           update
//! ```
//!
//! Two ways to write one:
//!
//! - implement [`System`] directly and keep queries/channels in fields;
//! - implement [`ContextSystem`] and wrap it in [`Managed`], which builds a
//!   named [`SystemContext`] once and tears it down on destroy.

use std::any::Any;
use std::fmt;

use super::component::Component;
use super::event::EventChannel;
use super::query::Query;
use super::world::World;
use crate::error::EcsResult;

/// Per-update logic driven by [`World::update`].
pub trait System: 'static {
    /// Builds whatever the system needs from the world. Called once by
    /// [`World::register_system`]; an error aborts the registration.
    ///
    /// # Errors
    ///
    /// Any setup error, typically from query or channel creation.
    fn init(&mut self, _world: &mut World) -> EcsResult<()> {
        Ok(())
    }

    /// Runs once per world update.
    fn update(&mut self, world: &mut World);

    /// Releases what `init` built. Called once, on unregistration or world
    /// destroy.
    fn destroy(&mut self, _world: &mut World) {}
}

/// Handle of a registered system.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct SystemId(pub(crate) u32);

impl SystemId {
    /// Returns the raw id.
    #[inline]
    #[must_use]
    pub const fn get(self) -> u32 {
        self.0
    }
}

impl fmt::Display for SystemId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "system#{}", self.0)
    }
}

/// Lifecycle state of a system.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum SystemState {
    /// Constructed, `init` not yet run.
    Uninitialized,
    /// Initialized and updated every frame.
    Active,
    /// Context released; never updated again.
    Destroyed,
}

// =============================================================================
// Context
// =============================================================================

/// Type-erased event channel, so a context can hold channels of any type.
trait ErasedChannel {
    fn as_any(&self) -> &dyn Any;

    fn destroy(self: Box<Self>, world: &mut World);
}

impl<C: Component> ErasedChannel for EventChannel<C> {
    fn as_any(&self) -> &dyn Any {
        self
    }

    fn destroy(self: Box<Self>, world: &mut World) {
        EventChannel::destroy(*self, world);
    }
}

enum ContextEntry {
    Query(Query),
    Channel(Box<dyn ErasedChannel>),
}

/// Named queries and event channels built once for a system.
#[derive(Default)]
pub struct SystemContext {
    entries: Vec<(&'static str, ContextEntry)>,
}

impl SystemContext {
    /// Creates an empty context.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a query under `name`.
    #[must_use]
    pub fn with_query(mut self, name: &'static str, query: Query) -> Self {
        self.entries.push((name, ContextEntry::Query(query)));
        self
    }

    /// Adds an event channel under `name`.
    #[must_use]
    pub fn with_channel<C: Component>(mut self, name: &'static str, channel: EventChannel<C>) -> Self {
        self.entries
            .push((name, ContextEntry::Channel(Box::new(channel))));
        self
    }

    /// The query stored under `name`.
    #[must_use]
    pub fn query(&self, name: &str) -> Option<&Query> {
        self.entry(name).and_then(|entry| match entry {
            ContextEntry::Query(query) => Some(query),
            ContextEntry::Channel(_) => None,
        })
    }

    /// The channel stored under `name`, if it watches `C`.
    #[must_use]
    pub fn channel<C: Component>(&self, name: &str) -> Option<&EventChannel<C>> {
        self.entry(name).and_then(|entry| match entry {
            ContextEntry::Channel(channel) => channel.as_any().downcast_ref(),
            ContextEntry::Query(_) => None,
        })
    }

    /// Number of entries.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns true if the context holds nothing.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Destroys every query and channel in the context.
    pub fn destroy(self, world: &mut World) {
        for (_, entry) in self.entries {
            match entry {
                ContextEntry::Query(query) => query.destroy(world),
                ContextEntry::Channel(channel) => channel.destroy(world),
            }
        }
    }

    fn entry(&self, name: &str) -> Option<&ContextEntry> {
        self.entries
            .iter()
            .find(|(entry_name, _)| *entry_name == name)
            .map(|(_, entry)| entry)
    }
}

impl fmt::Debug for SystemContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list()
            .entries(self.entries.iter().map(|(name, _)| name))
            .finish()
    }
}

// =============================================================================
// Managed systems
// =============================================================================

/// A system whose queries and channels live in a [`SystemContext`].
pub trait ContextSystem: 'static {
    /// Builds the context. Called once, at registration.
    ///
    /// # Errors
    ///
    /// Any setup error, typically from query or channel creation.
    fn setup(&mut self, world: &mut World) -> EcsResult<SystemContext>;

    /// Runs once per world update with the context built by `setup`.
    fn update(&mut self, context: &SystemContext, world: &mut World);
}

/// Adapts a [`ContextSystem`] into a [`System`], owning its context.
pub struct Managed<S> {
    system: S,
    context: Option<SystemContext>,
    state: SystemState,
}

impl<S: ContextSystem> Managed<S> {
    /// Wraps `system`; its context is built when the world registers it.
    #[must_use]
    pub fn new(system: S) -> Self {
        Self {
            system,
            context: None,
            state: SystemState::Uninitialized,
        }
    }

    /// Lifecycle state of the wrapped system.
    #[inline]
    #[must_use]
    pub fn state(&self) -> SystemState {
        self.state
    }

    /// The wrapped system.
    #[inline]
    #[must_use]
    pub fn inner(&self) -> &S {
        &self.system
    }
}

impl<S: ContextSystem> System for Managed<S> {
    fn init(&mut self, world: &mut World) -> EcsResult<()> {
        self.context = Some(self.system.setup(world)?);
        self.state = SystemState::Active;
        Ok(())
    }

    fn update(&mut self, world: &mut World) {
        if let Some(context) = &self.context {
            self.system.update(context, world);
        }
    }

    fn destroy(&mut self, world: &mut World) {
        if let Some(context) = self.context.take() {
            context.destroy(world);
        }
        self.state = SystemState::Destroyed;
    }
}

impl<S: fmt::Debug> fmt::Debug for Managed<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Managed")
            .field("system", &self.system)
            .field("context", &self.context)
            .field("state", &self.state)
            .finish()
    }
}
