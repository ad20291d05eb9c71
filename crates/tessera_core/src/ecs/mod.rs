//! # Entity Component System
//!
//! A bitmask-per-entity ECS.
//!
//! ## Design
//!
//! - Entities are 1-based ids with a row of mask words in one flat buffer
//! - Bit 0 of word 0 marks an entity alive; every registered component type
//!   owns one further bit
//! - Values live in pluggable per-type storages, membership in the mask
//! - Queries are mask tests; storages are only touched for rows being read
//! - Component adds, removals and mutable accesses fan out to event channels

mod bitset;
mod component;
mod entity;
mod event;
mod flags;
mod query;
mod storage;
mod system;
mod world;

pub use bitset::FlatBitSet;
pub use component::{Component, ComponentType};
pub use entity::EntityId;
pub use event::{ComponentEvent, EventChannel};
pub use query::{Access, Query, QueryCursor, QueryParam, QueryRow, MAX_QUERY_PARAMETERS};
pub use storage::{ComponentStorage, FlagStorage, MapStorage, SparseArrayStorage};
pub use system::{ContextSystem, Managed, System, SystemContext, SystemId, SystemState};
pub use world::World;
