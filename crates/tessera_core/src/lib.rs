//! # Tessera Core
//!
//! Entity Component System runtime built around one flat flag buffer:
//! - Component membership is a bitmask per entity, tested word by word
//! - Storage strategy is chosen per component type
//! - Systems observe changes through event channels instead of polling
//!
//! ## Architecture Rules
//!
//! 1. **Single-threaded** - systems run in registration order, synchronously
//! 2. **Masks only grow** - registering a type never reassigns existing bits
//! 3. **Setup fails loudly, access does not** - registration, query and
//!    channel creation return [`EcsError`]; per-entity access returns
//!    `Option`/`bool`
//!
//! ## Example
//!
//! ```rust
//! use tessera_core::{Component, QueryParam, World};
//!
//! struct Position { x: f32 }
//! impl Component for Position {}
//!
//! struct Velocity { x: f32 }
//! impl Component for Velocity {}
//!
//! let mut world = World::new();
//! world.register_component::<Position>().unwrap();
//! world.register_component::<Velocity>().unwrap();
//!
//! let entity = world.create_entity();
//! assert!(world.add_component(entity, Position { x: 0.0 }).is_ok());
//! assert!(world.add_component(entity, Velocity { x: 2.0 }).is_ok());
//!
//! let movers = world
//!     .create_query(&[QueryParam::write::<Position>(), QueryParam::read::<Velocity>()])
//!     .unwrap();
//! let mut cursor = movers.cursor();
//! while let Some(row) = cursor.next(&mut world) {
//!     let dx = row.read::<Velocity>().map_or(0.0, |v| v.x);
//!     if let Some(mut position) = row.write::<Position>() {
//!         position.x += dx;
//!     }
//! }
//!
//! let x = world.get_immutable_component::<Position>(entity).map(|p| p.x);
//! assert_eq!(x, Some(2.0));
//! ```

#![deny(missing_docs)]
#![deny(unsafe_code)]
#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![deny(clippy::perf)]

pub mod config;
pub mod ecs;
pub mod error;

pub use config::WorldConfig;
pub use ecs::{
    Access, Component, ComponentEvent, ComponentStorage, ComponentType, ContextSystem, EntityId,
    EventChannel, FlagStorage, FlatBitSet, Managed, MapStorage, Query, QueryCursor, QueryParam,
    QueryRow, SparseArrayStorage, System, SystemContext, SystemId, SystemState, World,
    MAX_QUERY_PARAMETERS,
};
pub use error::{EcsError, EcsResult};
