//! # World Scenarios
//!
//! End-to-end behavior of the public API: entity recycling, component
//! membership, query scans, event fan-out and the system lifecycle.

use std::cell::RefCell;
use std::rc::Rc;

use tessera_core::{
    Component, ComponentEvent, ComponentStorage, ContextSystem, EcsResult, EntityId, FlagStorage,
    Managed, MapStorage, Query, QueryParam, SparseArrayStorage, System, SystemContext,
    SystemState, World, WorldConfig,
};

#[derive(Debug, Clone, Copy, PartialEq)]
struct Position {
    x: i32,
    y: i32,
}
impl Component for Position {}

#[derive(Debug, Clone, Copy, PartialEq)]
struct Velocity {
    x: i32,
    y: i32,
}
impl Component for Velocity {}

#[derive(Debug, Clone, Copy, PartialEq)]
struct Frozen;
impl Component for Frozen {}

fn world() -> World {
    let mut world = World::with_config(WorldConfig::development()).unwrap();
    world.register_component::<Position>().unwrap();
    world
        .register_component_with::<Velocity, _>(SparseArrayStorage::<Velocity>::new())
        .unwrap();
    world
        .register_component_with::<Frozen, _>(FlagStorage::<Frozen>::new())
        .unwrap();
    world
}

fn at(x: i32) -> Position {
    Position { x, y: 0 }
}

fn matching(query: &Query, world: &World) -> Vec<EntityId> {
    query.entities(world).collect()
}

// =============================================================================
// Entities and components
// =============================================================================

#[test]
fn test_alive_until_destroyed() {
    let mut world = world();
    let entities: Vec<_> = (0..100).map(|_| world.create_entity()).collect();
    assert!(entities.iter().all(|&e| world.is_alive(e)));

    for &entity in entities.iter().step_by(2) {
        world.destroy_entity(entity);
    }
    for (i, &entity) in entities.iter().enumerate() {
        assert_eq!(world.is_alive(entity), i % 2 == 1);
    }
    assert_eq!(world.alive_count(), 50);
}

#[test]
fn test_recycled_ids_have_no_leftover_components() {
    let mut world = world();
    let entity = world.create_entity();
    assert!(world.add_component(entity, at(5)).is_ok());
    assert!(world.add_component(entity, Velocity { x: 1, y: 1 }).is_ok());
    assert!(world.add_component(entity, Frozen).is_ok());

    world.destroy_entity(entity);
    let recycled = world.create_entity();
    assert_eq!(recycled, entity);
    assert!(world.is_alive(recycled));
    assert!(!world.has_component::<Position>(recycled));
    assert!(!world.has_component::<Velocity>(recycled));
    assert!(!world.has_component::<Frozen>(recycled));
    assert!(world.get_immutable_component::<Position>(recycled).is_none());
}

#[test]
fn test_duplicate_add_is_rejected_and_first_value_kept() {
    let mut world = world();
    let entity = world.create_entity();

    assert!(world.add_component(entity, at(1)).is_ok());
    assert!(world.has_component::<Position>(entity));

    match world.add_component(entity, at(2)) {
        Err(rejected) => assert_eq!(rejected, at(2)),
        Ok(_) => panic!("second add must be rejected"),
    }
    assert_eq!(
        world.get_immutable_component::<Position>(entity).map(|p| *p),
        Some(at(1))
    );
}

#[test]
fn test_remove_twice() {
    let mut world = world();
    let entity = world.create_entity();
    assert!(world.add_component(entity, Velocity { x: 0, y: 0 }).is_ok());

    assert!(world.remove_component::<Velocity>(entity));
    assert!(!world.has_component::<Velocity>(entity));
    assert!(!world.remove_component::<Velocity>(entity));
}

/// Same checks through the public trait for every strategy.
fn exercise_storage(storage: &mut dyn ComponentStorage<Position>) {
    let ids: Vec<EntityId> = (1..=1_000u32)
        .map(|i| EntityId::new(i * 31 + (i % 7) * 997).unwrap())
        .collect();

    for (i, &id) in ids.iter().enumerate() {
        storage.set(id, at(i as i32));
    }
    for (i, &id) in ids.iter().enumerate() {
        assert_eq!(storage.get(id), Some(&at(i as i32)));
    }
    for &id in &ids {
        assert!(storage.remove(id));
        assert_eq!(storage.get(id), None);
    }
    assert!(storage.is_empty());
}

#[test]
fn test_every_storage_strategy_round_trips_sparse_ids() {
    exercise_storage(&mut MapStorage::<Position>::new());
    exercise_storage(&mut SparseArrayStorage::<Position>::new());
}

#[test]
fn test_flag_storage_answers_membership() {
    let mut world = world();
    let entity = world.create_entity();

    assert!(matches!(world.add_component(entity, Frozen), Ok(None)));
    assert!(world.has_component::<Frozen>(entity));
    assert!(world.get_immutable_component::<Frozen>(entity).is_none());
    assert_eq!(world.storage_len::<Frozen>(), 1);
}

// =============================================================================
// Queries
// =============================================================================

#[test]
fn test_query_yields_entities_with_all_components_in_order() {
    let mut world = world();
    let mut both = Vec::new();
    for i in 0..20 {
        let entity = world.create_entity();
        if i % 2 == 0 {
            assert!(world.add_component(entity, at(i)).is_ok());
        }
        if i % 3 == 0 {
            assert!(world.add_component(entity, Velocity { x: i, y: i }).is_ok());
        }
        if i % 6 == 0 {
            both.push(entity);
        }
    }

    let query = world
        .create_query(&[QueryParam::read::<Position>(), QueryParam::read::<Velocity>()])
        .unwrap();
    assert_eq!(matching(&query, &world), both);

    // Membership follows adds, removals and destruction between scans.
    let first = both[0];
    assert!(world.remove_component::<Velocity>(first));
    world.destroy_entity(both[1]);
    let newcomer = world.create_entity();
    assert!(world.add_component(newcomer, at(0)).is_ok());
    assert!(world.add_component(newcomer, Velocity { x: 0, y: 0 }).is_ok());

    let mut expected: Vec<_> = both[2..].to_vec();
    expected.push(newcomer);
    expected.sort();
    assert_eq!(matching(&query, &world), expected);
}

#[test]
fn test_query_over_entity_only_sees_live_entities() {
    let mut world = world();
    let a = world.create_entity();
    let b = world.create_entity();
    let c = world.create_entity();
    world.destroy_entity(b);

    let query = world.create_query(&[QueryParam::Entity]).unwrap();
    assert_eq!(matching(&query, &world), vec![a, c]);
}

// =============================================================================
// Events
// =============================================================================

#[test]
fn test_added_channel_counts_successful_adds_only() {
    let mut world = world();
    let added = world
        .create_event_channel::<Position>(ComponentEvent::Added)
        .unwrap();

    let a = world.create_entity();
    let b = world.create_entity();
    assert!(world.add_component(a, at(1)).is_ok());
    assert!(world.add_component(a, at(2)).is_err());
    assert!(world.add_component(b, at(3)).is_ok());

    assert_eq!(added.len(), 2);
    assert_eq!(added.drain().collect::<Vec<_>>(), vec![b, a]);
    assert!(added.is_empty());

    let c = world.create_entity();
    assert!(world.add_component(c, at(4)).is_ok());
    assert_eq!(added.pop(), Some(c));
}

#[test]
fn test_events_drain_most_recent_first() {
    let mut world = world();
    let removed = world
        .create_event_channel::<Velocity>(ComponentEvent::Removed)
        .unwrap();

    let entities: Vec<_> = (0..4).map(|_| world.create_entity()).collect();
    for &entity in &entities {
        assert!(world.add_component(entity, Velocity { x: 1, y: 2 }).is_ok());
    }
    for &entity in &entities {
        assert!(world.remove_component::<Velocity>(entity));
    }

    let drained: Vec<_> = std::iter::from_fn(|| removed.pop()).collect();
    let mut reversed = entities.clone();
    reversed.reverse();
    assert_eq!(drained, reversed);
}

#[test]
fn test_next_resolves_component_at_drain_time() {
    let mut world = world();
    let added = world
        .create_event_channel::<Position>(ComponentEvent::Added)
        .unwrap();

    let kept = world.create_entity();
    let gone = world.create_entity();
    assert!(world.add_component(kept, at(1)).is_ok());
    assert!(world.add_component(gone, at(2)).is_ok());
    assert!(world.remove_component::<Position>(gone));

    let (entity, value) = added.next(&world).unwrap();
    assert_eq!(entity, gone);
    assert!(value.is_none());

    let (entity, value) = added.first(&world).unwrap();
    assert_eq!(entity, kept);
    assert_eq!(value.map(|p| *p), Some(at(1)));

    assert!(added.next(&world).is_none());
}

#[test]
fn test_changed_channel_counts_every_mutable_access() {
    let mut world = world();
    let changed = world
        .create_event_channel::<Position>(ComponentEvent::Changed)
        .unwrap();
    let entity = world.create_entity();
    assert!(world.add_component(entity, at(0)).is_ok());

    // No value change still counts.
    drop(world.get_mutable_component::<Position>(entity));
    if let Some(mut position) = world.get_mutable_component::<Position>(entity) {
        position.y = 9;
    }

    let query = world.create_query(&[QueryParam::write::<Position>()]).unwrap();
    let mut cursor = query.cursor();
    while cursor.next(&mut world).is_some() {}

    assert_eq!(changed.len(), 3);
}

#[test]
fn test_channels_on_same_event_are_independent() {
    let mut world = world();
    let first = world
        .create_event_channel::<Position>(ComponentEvent::Added)
        .unwrap();
    let second = world
        .create_event_channel::<Position>(ComponentEvent::Added)
        .unwrap();

    let a = world.create_entity();
    assert!(world.add_component(a, at(0)).is_ok());
    assert_eq!(first.drain().collect::<Vec<_>>(), vec![a]);

    let b = world.create_entity();
    assert!(world.add_component(b, at(0)).is_ok());
    assert_eq!(first.drain().collect::<Vec<_>>(), vec![b]);
    assert_eq!(second.drain().collect::<Vec<_>>(), vec![b, a]);
}

#[test]
fn test_destroyed_channel_stops_receiving() {
    let mut world = world();
    let added = world
        .create_event_channel::<Position>(ComponentEvent::Added)
        .unwrap();
    assert_eq!(world.channel_count::<Position>(ComponentEvent::Added), 1);

    added.destroy(&mut world);
    assert_eq!(world.channel_count::<Position>(ComponentEvent::Added), 0);

    let entity = world.create_entity();
    assert!(world.add_component(entity, at(0)).is_ok());
}

// =============================================================================
// Systems
// =============================================================================

/// Moves every position one step along x per update.
struct Walker {
    query: Option<Query>,
}

impl System for Walker {
    fn init(&mut self, world: &mut World) -> EcsResult<()> {
        self.query = Some(world.create_query(&[QueryParam::write::<Position>()])?);
        Ok(())
    }

    fn update(&mut self, world: &mut World) {
        let Some(query) = &self.query else {
            return;
        };
        let mut cursor = query.cursor();
        while let Some(row) = cursor.next(world) {
            if let Some(mut position) = row.write::<Position>() {
                position.x += 1;
            }
        }
    }

    fn destroy(&mut self, world: &mut World) {
        if let Some(query) = self.query.take() {
            query.destroy(world);
        }
    }
}

#[test]
fn test_position_system_runs_three_updates() {
    let mut world = world();
    let entity = world.create_entity();
    assert!(world.add_component(entity, at(0)).is_ok());
    let changed = world
        .create_event_channel::<Position>(ComponentEvent::Changed)
        .unwrap();

    world.register_system(Walker { query: None }).unwrap();
    for _ in 0..3 {
        world.update();
    }

    assert_eq!(
        world.get_immutable_component::<Position>(entity).map(|p| p.x),
        Some(3)
    );
    assert_eq!(changed.len(), 3);
}

/// Integrates velocities into positions and counts fresh velocities.
#[derive(Default)]
struct Physics {
    velocities_seen: Rc<RefCell<Vec<EntityId>>>,
}

impl ContextSystem for Physics {
    fn setup(&mut self, world: &mut World) -> EcsResult<SystemContext> {
        let movers = world.create_query(&[
            QueryParam::Entity,
            QueryParam::write::<Position>(),
            QueryParam::read::<Velocity>(),
        ])?;
        let added = world.create_event_channel::<Velocity>(ComponentEvent::Added)?;
        Ok(SystemContext::new()
            .with_query("movers", movers)
            .with_channel("velocity_added", added))
    }

    fn update(&mut self, context: &SystemContext, world: &mut World) {
        if let Some(added) = context.channel::<Velocity>("velocity_added") {
            self.velocities_seen.borrow_mut().extend(added.drain());
        }

        let Some(movers) = context.query("movers") else {
            return;
        };
        let mut cursor = movers.cursor();
        while let Some(row) = cursor.next(world) {
            let Some(velocity) = row.read::<Velocity>().map(|v| *v) else {
                continue;
            };
            if let Some(mut position) = row.write::<Position>() {
                position.x += velocity.x;
                position.y += velocity.y;
            }
        }
    }
}

#[test]
fn test_context_system_lifecycle() {
    let mut world = world();
    let seen = Rc::new(RefCell::new(Vec::new()));

    let mover = world.create_entity();
    assert!(world.add_component(mover, at(0)).is_ok());
    assert!(world.add_component(mover, Velocity { x: 2, y: -1 }).is_ok());
    let idle = world.create_entity();
    assert!(world.add_component(idle, at(10)).is_ok());

    // Adds before registration are not replayed.
    let id = world
        .register_system(Managed::new(Physics {
            velocities_seen: Rc::clone(&seen),
        }))
        .unwrap();
    assert_eq!(world.system_state(id), Some(SystemState::Active));
    assert_eq!(world.live_query_count(), 1);

    let late = world.create_entity();
    assert!(world.add_component(late, at(0)).is_ok());
    assert!(world.add_component(late, Velocity { x: 1, y: 1 }).is_ok());

    world.update();
    world.update();

    assert_eq!(*seen.borrow(), vec![late]);
    assert_eq!(
        world.get_immutable_component::<Position>(mover).map(|p| *p),
        Some(Position { x: 4, y: -2 })
    );
    assert_eq!(
        world.get_immutable_component::<Position>(late).map(|p| *p),
        Some(Position { x: 2, y: 2 })
    );
    assert_eq!(
        world.get_immutable_component::<Position>(idle).map(|p| p.x),
        Some(10)
    );

    // Unregistering tears the context down.
    assert!(world.unregister_system(id).is_ok());
    assert_eq!(world.live_query_count(), 0);
    assert_eq!(world.channel_count::<Velocity>(ComponentEvent::Added), 0);
    assert_eq!(world.system_count(), 0);
}

#[test]
fn test_world_destroy_releases_contexts() {
    let mut world = world();
    let id = world
        .register_system(Managed::new(Physics::default()))
        .unwrap();

    world.destroy();
    assert_eq!(world.system_state(id), Some(SystemState::Destroyed));
    assert_eq!(world.live_query_count(), 0);
    assert_eq!(world.channel_count::<Velocity>(ComponentEvent::Added), 0);

    // Destroyed systems are skipped.
    let entity = world.create_entity();
    assert!(world.add_component(entity, at(0)).is_ok());
    assert!(world.add_component(entity, Velocity { x: 1, y: 0 }).is_ok());
    world.update();
    assert_eq!(
        world.get_immutable_component::<Position>(entity).map(|p| p.x),
        Some(0)
    );
}

// =============================================================================
// Mask growth
// =============================================================================

struct Slot<const N: usize>;
impl<const N: usize> Component for Slot<N> {}

macro_rules! register_slots {
    ($world:expr; $($n:literal)*) => {
        $( $world.register_component::<Slot<$n>>().unwrap(); )*
    };
}

#[test]
fn test_mask_widens_past_32_components_without_losing_bits() {
    let mut world = World::with_config(WorldConfig::development()).unwrap();
    world.register_component::<Slot<0>>().unwrap();

    let early = world.create_entity();
    assert!(world.add_component(early, Slot::<0>).is_ok());
    assert_eq!(world.mask_length(), 1);

    register_slots!(world;
        1 2 3 4 5 6 7 8 9 10 11 12 13 14 15 16
        17 18 19 20 21 22 23 24 25 26 27 28 29 30);
    assert_eq!(world.mask_length(), 1);

    // Id 31 is ordinal 32: the first bit of the second word.
    register_slots!(world; 31 32);
    assert_eq!(world.mask_length(), 2);
    assert_eq!(world.component_count(), 33);

    assert!(world.is_alive(early));
    assert!(world.has_component::<Slot<0>>(early));
    assert!(world.add_component(early, Slot::<32>).is_ok());
    assert_eq!(world.entity_mask(early), Some(&[0b11, 0b10][..]));

    let slot32 = world.component_type::<Slot<32>>().unwrap();
    assert_eq!((slot32.id(), slot32.mask_index(), slot32.mask()), (32, 1, 0b10));

    let query = world
        .create_query(&[QueryParam::read::<Slot<0>>(), QueryParam::read::<Slot<32>>()])
        .unwrap();
    assert_eq!(query.mask(), &[0b11, 0b10]);
    assert_eq!(matching(&query, &world), vec![early]);
}
