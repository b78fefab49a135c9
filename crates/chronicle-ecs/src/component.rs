//! Component registration and type-erased, insertion-ordered storage.
//!
//! Unlike an archetype-based ECS, there is no per-entity component-set
//! migration here: each concrete component type owns a single
//! [`ComponentStore`] keyed by [`EntityId`], and a `World` holds one store
//! per registered type in a `HashMap<ComponentTypeId, _>`. This keeps the
//! whole crate free of `unsafe` -- there is no raw byte buffer to manage,
//! because each store is monomorphic over its concrete `T`.

use std::any::{Any, TypeId};
use std::collections::HashMap;

use indexmap::IndexMap;
use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::ids::EntityId;

/// A component is any plain-data type that can be named, serialized, and
/// deserialized. The "opaque payload" escape hatch from the data model
/// (subsystem-specific data the kernel never interprets) is just another
/// `Component` -- typically a newtype around `serde_json::Value` -- rather
/// than a structurally distinct mechanism.
pub trait Component: Any + std::fmt::Debug + Serialize + DeserializeOwned + Send + Sync + 'static {}

impl<T> Component for T where T: Any + std::fmt::Debug + Serialize + DeserializeOwned + Send + Sync + 'static {}

/// Opaque handle identifying a registered component type within one
/// [`ComponentRegistry`]. Not stable across processes; never serialized.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ComponentTypeId(u32);

/// Maps concrete Rust types to stable names and back, deduping by `TypeId`
/// and indexing by name -- minus the size/align/vtable bookkeeping an
/// archetype layout needs, since this crate never packs components into
/// raw byte columns.
#[derive(Debug, Default)]
pub struct ComponentRegistry {
    by_type: HashMap<TypeId, ComponentTypeId>,
    by_name: HashMap<String, ComponentTypeId>,
    names: Vec<String>,
}

impl ComponentRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `T` under `name`. Idempotent: re-registering the same
    /// concrete type returns its existing id and does not touch `name`.
    pub fn register<T: Component>(&mut self, name: &str) -> ComponentTypeId {
        if let Some(&id) = self.by_type.get(&TypeId::of::<T>()) {
            return id;
        }
        let id = ComponentTypeId(self.names.len() as u32);
        self.by_type.insert(TypeId::of::<T>(), id);
        self.by_name.insert(name.to_owned(), id);
        self.names.push(name.to_owned());
        id
    }

    pub fn lookup<T: Component>(&self) -> Option<ComponentTypeId> {
        self.by_type.get(&TypeId::of::<T>()).copied()
    }

    pub fn lookup_by_name(&self, name: &str) -> Option<ComponentTypeId> {
        self.by_name.get(name).copied()
    }

    pub fn name_of(&self, id: ComponentTypeId) -> Option<&str> {
        self.names.get(id.0 as usize).map(String::as_str)
    }

    /// Registered type names, sorted for deterministic serialization order.
    pub fn registered_names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.names.iter().map(String::as_str).collect();
        names.sort_unstable();
        names
    }
}

// ---------------------------------------------------------------------------
// Type-erased store access
// ---------------------------------------------------------------------------

/// Object-safe facade over a concrete [`ComponentStore<T>`], letting `World`
/// hold heterogeneous stores behind one `HashMap`.
pub(crate) trait ErasedStore: Send + Sync {
    fn remove_erased(&mut self, entity: EntityId) -> bool;
    fn serialize_entries(&self) -> Vec<(EntityId, serde_json::Value)>;
    fn insert_from_json(&mut self, entity: EntityId, value: &serde_json::Value) -> Result<(), String>;
    fn as_any(&self) -> &dyn Any;
    fn as_any_mut(&mut self) -> &mut dyn Any;
}

/// Insertion-ordered mapping from [`EntityId`] to a single component type.
///
/// Backed by an `IndexMap` so that overwriting an existing entity's
/// component (per the `addComponent` "overwrites in place" contract) does
/// not change its position, while removal (`shift_remove`) preserves the
/// relative order of the remaining entries -- this is what makes `query`
/// iteration order match true insertion order rather than an
/// implementation artifact of hashing.
pub struct ComponentStore<T: Component> {
    data: IndexMap<EntityId, T>,
}

impl<T: Component> ComponentStore<T> {
    fn new() -> Self {
        Self {
            data: IndexMap::new(),
        }
    }

    pub fn insert(&mut self, entity: EntityId, component: T) {
        self.data.insert(entity, component);
    }

    pub fn get(&self, entity: EntityId) -> Option<&T> {
        self.data.get(&entity)
    }

    pub fn get_mut(&mut self, entity: EntityId) -> Option<&mut T> {
        self.data.get_mut(&entity)
    }

    pub fn remove(&mut self, entity: EntityId) -> Option<T> {
        self.data.shift_remove(&entity)
    }

    pub fn contains(&self, entity: EntityId) -> bool {
        self.data.contains_key(&entity)
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Entity ids present in this store, in insertion order.
    pub fn iter_ids(&self) -> impl Iterator<Item = EntityId> + '_ {
        self.data.keys().copied()
    }
}

impl<T: Component> Default for ComponentStore<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: Component> ErasedStore for ComponentStore<T> {
    fn remove_erased(&mut self, entity: EntityId) -> bool {
        self.data.shift_remove(&entity).is_some()
    }

    fn serialize_entries(&self) -> Vec<(EntityId, serde_json::Value)> {
        self.data
            .iter()
            .map(|(id, component)| {
                let value = serde_json::to_value(component)
                    .expect("component types must always be JSON-serializable");
                (*id, value)
            })
            .collect()
    }

    fn insert_from_json(&mut self, entity: EntityId, value: &serde_json::Value) -> Result<(), String> {
        let component: T = serde_json::from_value(value.clone()).map_err(|e| e.to_string())?;
        self.data.insert(entity, component);
        Ok(())
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}

pub(crate) fn new_store<T: Component>() -> Box<dyn ErasedStore> {
    Box::new(ComponentStore::<T>::new())
}
