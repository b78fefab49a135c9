//! Chronicle ECS -- type-erased, insertion-ordered Entity Component System.
//!
//! Entities are bare, monotonically increasing [`ids::EntityId`] values;
//! components live in one [`component::ComponentStore`] per concrete type,
//! addressed through a [`component::ComponentRegistry`]. There is no
//! archetype layout and no `unsafe` anywhere in this crate.
//!
//! # Quick start
//!
//! ```
//! use chronicle_ecs::prelude::*;
//!
//! #[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
//! struct Position { x: f32, y: f32 }
//!
//! let mut world = World::new();
//! world.register_component::<Position>("position");
//! let e = world.create_entity();
//! world.add_component(e, Position { x: 0.0, y: 0.0 }).unwrap();
//! assert_eq!(world.get_component::<Position>(e), Some(&Position { x: 0.0, y: 0.0 }));
//! ```

#![deny(unsafe_code)]

pub mod component;
pub mod ids;
pub mod query;
pub mod world;

use crate::ids::EntityId;

/// Errors produced by ECS operations.
#[derive(Debug, thiserror::Error)]
pub enum EcsError {
    /// A component type was referenced that has not been registered.
    #[error("component type '{name}' not registered. Registered components: [{registered}]")]
    StoreUnregistered { name: String, registered: String },

    /// `add_component` was called against an entity that is not alive.
    #[error("entity {0} is dead; cannot add a component to it")]
    EntityDead(EntityId),

    /// Deserialization of a component value failed.
    #[error("failed to deserialize component '{component}': {details}")]
    ComponentDeserializationError { component: String, details: String },
}

/// Convenience re-exports for common usage.
pub mod prelude {
    pub use crate::component::{Component, ComponentRegistry, ComponentStore, ComponentTypeId};
    pub use crate::ids::{
        to_arc_id, to_character_id, to_entity_id, to_event_id, to_faction_id, to_site_id, Allocators, ArcId,
        BranchId, CharacterId, EntityId, EventId, FactionId, SaveId, SiteId, SnapshotId,
    };
    pub use crate::query::QueryIter;
    pub use crate::world::World;
    pub use crate::EcsError;
}

#[cfg(test)]
mod tests {
    use crate::prelude::*;

    #[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
    struct Position {
        x: f32,
        y: f32,
    }

    #[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
    struct Velocity {
        dx: f32,
        dy: f32,
    }

    fn setup_world() -> World {
        let mut world = World::new();
        world.register_component::<Position>("position");
        world.register_component::<Velocity>("velocity");
        world
    }

    #[test]
    fn spawn_entities_with_components_and_query_back() {
        let mut world = setup_world();
        let e = world.create_entity();
        world.add_component(e, Position { x: 1.0, y: 2.0 }).unwrap();
        world.add_component(e, Velocity { dx: 3.0, dy: 4.0 }).unwrap();

        assert_eq!(world.get_component::<Position>(e), Some(&Position { x: 1.0, y: 2.0 }));
        assert_eq!(world.get_component::<Velocity>(e), Some(&Velocity { dx: 3.0, dy: 4.0 }));
    }

    #[test]
    fn destroy_entity_verify_gone() {
        let mut world = setup_world();
        let e = world.create_entity();
        world.add_component(e, Position { x: 0.0, y: 0.0 }).unwrap();
        world.destroy_entity(e);
        assert!(!world.is_alive(e));
        assert_eq!(world.get_component::<Position>(e), None);
        assert_eq!(world.entity_count(), 0);
    }

    #[test]
    fn overwrite_component_in_place() {
        let mut world = setup_world();
        let e = world.create_entity();
        world.add_component(e, Position { x: 1.0, y: 2.0 }).unwrap();
        world.add_component(e, Position { x: 99.0, y: 100.0 }).unwrap();
        assert_eq!(world.get_component::<Position>(e), Some(&Position { x: 99.0, y: 100.0 }));
    }

    #[test]
    fn remove_component_leaves_entity_alive() {
        let mut world = setup_world();
        let e = world.create_entity();
        world.add_component(e, Position { x: 1.0, y: 2.0 }).unwrap();
        world.add_component(e, Velocity { dx: 3.0, dy: 4.0 }).unwrap();
        world.remove_component::<Velocity>(e);
        assert!(world.is_alive(e));
        assert!(!world.has_component::<Velocity>(e));
        assert_eq!(world.get_component::<Position>(e), Some(&Position { x: 1.0, y: 2.0 }));
    }

    #[test]
    fn query_matching_entities_only() {
        let mut world = setup_world();
        let e1 = world.create_entity();
        world.add_component(e1, Position { x: 1.0, y: 2.0 }).unwrap();
        world.add_component(e1, Velocity { dx: 3.0, dy: 4.0 }).unwrap();

        let e2 = world.create_entity();
        world.add_component(e2, Position { x: 10.0, y: 20.0 }).unwrap();

        let results: Vec<_> = world.query::<Velocity>().collect();
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].0, e1);
    }

    #[test]
    fn scale_10k_entities() {
        let mut world = setup_world();
        let mut entities = Vec::with_capacity(10_000);
        for i in 0..10_000u32 {
            let e = world.create_entity();
            world
                .add_component(e, Position { x: i as f32, y: i as f32 * 2.0 })
                .unwrap();
            world.add_component(e, Velocity { dx: 1.0, dy: -1.0 }).unwrap();
            entities.push(e);
        }

        assert_eq!(world.query::<Velocity>().count(), 10_000);

        for e in entities.iter().take(5_000) {
            world.destroy_entity(*e);
        }

        assert_eq!(world.query::<Velocity>().count(), 5_000);
        assert_eq!(world.entity_count(), 5_000);
    }

    #[test]
    fn entity_ids_are_monotonic_across_world_lifetime() {
        let mut world = setup_world();
        let e0 = world.create_entity();
        world.destroy_entity(e0);
        let e1 = world.create_entity();
        assert!(e1.to_raw() > e0.to_raw());
    }
}
