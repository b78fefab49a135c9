//! The `World`: entity lifecycle plus one [`ComponentStore`] per registered
//! component type, addressed through [`ComponentTypeId`].
//!
//! There is no archetype graph here and no component-set migration on
//! add/remove -- each component type lives in its own store, so attaching or
//! detaching a component is a single map operation rather than a copy into a
//! differently-shaped table.

use std::collections::HashMap;

use tracing::trace;

use crate::component::{new_store, Component, ComponentRegistry, ComponentStore, ComponentTypeId, ErasedStore};
use crate::ids::{Allocators, EntityId};
use crate::query::QueryIter;
use crate::EcsError;

pub struct World {
    allocators: Allocators,
    registry: ComponentRegistry,
    stores: HashMap<ComponentTypeId, Box<dyn ErasedStore>>,
    alive: indexmap::IndexSet<EntityId>,
}

impl World {
    pub fn new() -> Self {
        Self {
            allocators: Allocators::new(),
            registry: ComponentRegistry::new(),
            stores: HashMap::new(),
            alive: indexmap::IndexSet::new(),
        }
    }

    pub fn registry(&self) -> &ComponentRegistry {
        &self.registry
    }

    pub fn allocators(&self) -> &Allocators {
        &self.allocators
    }

    pub fn allocators_mut(&mut self) -> &mut Allocators {
        &mut self.allocators
    }

    /// Register a component type under `name`, creating its backing store if
    /// this is the first time `T` has been seen. Safe to call repeatedly.
    pub fn register_component<T: Component>(&mut self, name: &str) -> ComponentTypeId {
        let id = self.registry.register::<T>(name);
        self.stores.entry(id).or_insert_with(new_store::<T>);
        id
    }

    fn store<T: Component>(&self) -> Result<&ComponentStore<T>, EcsError> {
        let id = self.registry.lookup::<T>().ok_or_else(|| EcsError::StoreUnregistered {
            name: std::any::type_name::<T>().to_owned(),
            registered: self.registry.registered_names().join(", "),
        })?;
        let store = self.stores.get(&id).expect("registered type must have a store");
        Ok(store
            .as_any()
            .downcast_ref::<ComponentStore<T>>()
            .expect("type id to concrete store mapping must be consistent"))
    }

    fn store_mut<T: Component>(&mut self) -> Result<&mut ComponentStore<T>, EcsError> {
        let registered = self.registry.registered_names().join(", ");
        let id = self.registry.lookup::<T>().ok_or_else(|| EcsError::StoreUnregistered {
            name: std::any::type_name::<T>().to_owned(),
            registered,
        })?;
        let store = self.stores.get_mut(&id).expect("registered type must have a store");
        Ok(store
            .as_any_mut()
            .downcast_mut::<ComponentStore<T>>()
            .expect("type id to concrete store mapping must be consistent"))
    }

    /// Allocate a fresh, never-before-used [`EntityId`] and mark it alive.
    pub fn create_entity(&mut self) -> EntityId {
        let id = self.allocators.next_entity_id();
        self.alive.insert(id);
        trace!(entity = ?id, "entity created");
        id
    }

    /// Remove an entity and every component attached to it. Returns whether
    /// the entity was alive beforehand; destroying a dead or unknown entity
    /// is a no-op, not an error, matching the data model's "commands on dead
    /// entities are ignored" contract.
    pub fn destroy_entity(&mut self, entity: EntityId) -> bool {
        if !self.alive.shift_remove(&entity) {
            return false;
        }
        for store in self.stores.values_mut() {
            store.remove_erased(entity);
        }
        trace!(entity = ?entity, "entity destroyed");
        true
    }

    pub fn is_alive(&self, entity: EntityId) -> bool {
        self.alive.contains(&entity)
    }

    pub fn entity_count(&self) -> usize {
        self.alive.len()
    }

    /// All currently alive entities, in creation order.
    pub fn get_all_entities(&self) -> Vec<EntityId> {
        self.alive.iter().copied().collect()
    }

    /// Attach or overwrite `component` on `entity`. Fails with
    /// `EntityDead` rather than silently dropping the write if `entity` is
    /// not alive -- callers must be able to tell a no-op from a mutation.
    pub fn add_component<T: Component>(&mut self, entity: EntityId, component: T) -> Result<(), EcsError> {
        if !self.alive.contains(&entity) {
            return Err(EcsError::EntityDead(entity));
        }
        self.store_mut::<T>()?.insert(entity, component);
        Ok(())
    }

    pub fn get_component<T: Component>(&self, entity: EntityId) -> Option<&T> {
        self.store::<T>().ok()?.get(entity)
    }

    pub fn get_component_mut<T: Component>(&mut self, entity: EntityId) -> Option<&mut T> {
        self.store_mut::<T>().ok()?.get_mut(entity)
    }

    pub fn has_component<T: Component>(&self, entity: EntityId) -> bool {
        self.store::<T>().map(|s| s.contains(entity)).unwrap_or(false)
    }

    pub fn remove_component<T: Component>(&mut self, entity: EntityId) -> Option<T> {
        self.store_mut::<T>().ok()?.remove(entity)
    }

    /// Iterate the ids of all alive entities carrying component `T`, in the
    /// order they were added to `T`'s store.
    pub fn query<T: Component>(&self) -> QueryIter<'_, T> {
        match self.store::<T>() {
            Ok(store) => QueryIter::new(store),
            Err(_) => QueryIter::empty(),
        }
    }

    // -- name-addressed access, for serialization and save/load -------------

    pub fn registered_type_names(&self) -> Vec<&str> {
        self.registry.registered_names()
    }

    /// Serialize every (entity, component) pair in the store registered under
    /// `name`, as raw JSON values -- used by the save subsystem, which must
    /// be able to walk every component type without knowing its concrete Rust
    /// type at compile time.
    pub fn serialize_store_by_name(&self, name: &str) -> Result<Vec<(EntityId, serde_json::Value)>, EcsError> {
        let id = self.registry.lookup_by_name(name).ok_or_else(|| EcsError::StoreUnregistered {
            name: name.to_owned(),
            registered: self.registry.registered_names().join(", "),
        })?;
        let store = self.stores.get(&id).expect("registered type must have a store");
        Ok(store.serialize_entries())
    }

    /// Insert a component from its JSON representation into the store
    /// registered under `name`. Used to reconstruct a world from a save file,
    /// where the concrete component type is known only by name.
    pub fn add_component_by_name(
        &mut self,
        name: &str,
        entity: EntityId,
        value: &serde_json::Value,
    ) -> Result<(), EcsError> {
        let id = self.registry.lookup_by_name(name).ok_or_else(|| EcsError::StoreUnregistered {
            name: name.to_owned(),
            registered: self.registry.registered_names().join(", "),
        })?;
        let store = self.stores.get_mut(&id).expect("registered type must have a store");
        store.insert_from_json(entity, value).map_err(|details| EcsError::ComponentDeserializationError {
            component: name.to_owned(),
            details,
        })
    }
}

impl Default for World {
    fn default() -> Self {
        Self::new()
    }
}
