//! # Component Events
//!
//! Systems observe component changes through event channels instead of
//! polling. Each channel owns its own queue; one push fans out to every channel
//! subscribed to the same `(component, kind)` pair, so consumers never steal
//! entries from each other.
//!
//! Queues drain in stack order: the most recently pushed entity comes out
//! first.

use std::cell::{Ref, RefCell};
use std::fmt;
use std::marker::PhantomData;
use std::rc::Rc;

use super::component::{Component, ComponentType};
use super::entity::EntityId;
use super::world::World;

/// What happened to a component.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ComponentEvent {
    /// The component was attached to an entity.
    Added,
    /// The component was detached from an entity (or the entity destroyed).
    Removed,
    /// The component was accessed mutably.
    Changed,
}

impl ComponentEvent {
    #[inline]
    const fn slot(self) -> usize {
        match self {
            Self::Added => 0,
            Self::Removed => 1,
            Self::Changed => 2,
        }
    }
}

type Queue = Rc<RefCell<Vec<EntityId>>>;

struct Subscriber {
    id: u64,
    queue: Queue,
}

/// Subscriber queues keyed by component id and event kind.
#[derive(Default)]
pub(crate) struct EventRegistry {
    /// Indexed by component id, then by [`ComponentEvent::slot`].
    subscribers: Vec<[Vec<Subscriber>; 3]>,
    next_subscriber: u64,
}

impl EventRegistry {
    /// Makes room for a newly registered component type.
    pub fn add_component(&mut self) {
        self.subscribers.push(Default::default());
    }

    /// Registers a fresh, empty queue.
    pub fn subscribe(&mut self, component: ComponentType, kind: ComponentEvent) -> (u64, Queue) {
        let id = self.next_subscriber;
        self.next_subscriber += 1;

        let queue = Queue::default();
        self.subscribers[component.id() as usize][kind.slot()].push(Subscriber {
            id,
            queue: Rc::clone(&queue),
        });
        (id, queue)
    }

    /// Removes a queue so future pushes stop reaching it.
    pub fn unsubscribe(&mut self, component: ComponentType, kind: ComponentEvent, id: u64) -> bool {
        let Some(slots) = self.subscribers.get_mut(component.id() as usize) else {
            return false;
        };
        let queues = &mut slots[kind.slot()];
        let before = queues.len();
        queues.retain(|subscriber| subscriber.id != id);
        queues.len() != before
    }

    /// Appends `entity` to every queue subscribed to `(component, kind)`.
    pub fn push(&self, component: ComponentType, kind: ComponentEvent, entity: EntityId) {
        if let Some(slots) = self.subscribers.get(component.id() as usize) {
            for subscriber in &slots[kind.slot()] {
                subscriber.queue.borrow_mut().push(entity);
            }
        }
    }

    /// Number of live channels for `(component, kind)`.
    pub fn subscriber_count(&self, component: ComponentType, kind: ComponentEvent) -> usize {
        self.subscribers
            .get(component.id() as usize)
            .map_or(0, |slots| slots[kind.slot()].len())
    }
}

/// A consumer's queue of entities for one component type and event kind.
///
/// Created by [`World::create_event_channel`]; lives until
/// [`destroy`](Self::destroy) is called. Dropping a channel without destroying
/// it keeps its queue subscribed (and growing) for the life of the world.
pub struct EventChannel<C> {
    component: ComponentType,
    kind: ComponentEvent,
    subscriber: u64,
    queue: Queue,
    _marker: PhantomData<fn() -> C>,
}

impl<C: Component> EventChannel<C> {
    pub(crate) fn new(component: ComponentType, kind: ComponentEvent, subscriber: u64, queue: Queue) -> Self {
        Self {
            component,
            kind,
            subscriber,
            queue,
            _marker: PhantomData,
        }
    }

    /// The event kind this channel receives.
    #[inline]
    #[must_use]
    pub fn kind(&self) -> ComponentEvent {
        self.kind
    }

    /// The component type this channel watches.
    #[inline]
    #[must_use]
    pub fn component(&self) -> ComponentType {
        self.component
    }

    /// Returns true if no events are queued.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.queue.borrow().is_empty()
    }

    /// Number of queued events.
    #[must_use]
    pub fn len(&self) -> usize {
        self.queue.borrow().len()
    }

    /// Pops the most recently queued entity.
    pub fn pop(&self) -> Option<EntityId> {
        self.queue.borrow_mut().pop()
    }

    /// Pops the most recently queued entity and looks up its component.
    ///
    /// The component is read at drain time: if it was removed after the event
    /// was queued, the pair carries `None`.
    ///
    /// # Panics
    ///
    /// Panics if the component storage is mutably borrowed.
    pub fn next<'w>(&self, world: &'w World) -> Option<(EntityId, Option<Ref<'w, C>>)> {
        let entity = self.pop()?;
        Some((entity, world.get_immutable_component::<C>(entity)))
    }

    /// Same as a single [`next`](Self::next): consumes the entry it returns.
    pub fn first<'w>(&self, world: &'w World) -> Option<(EntityId, Option<Ref<'w, C>>)> {
        self.next(world)
    }

    /// Pops every queued entity, most recent first.
    pub fn drain(&self) -> impl Iterator<Item = EntityId> + '_ {
        std::iter::from_fn(move || self.pop())
    }

    /// Unsubscribes the channel; pending events are dropped.
    pub fn destroy(self, world: &mut World) {
        world.unsubscribe(self.component, self.kind, self.subscriber);
    }
}

impl<C> fmt::Debug for EventChannel<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventChannel")
            .field("component", &self.component)
            .field("kind", &self.kind)
            .field("queued", &self.queue.borrow().len())
            .finish()
    }
}
