//! Single-type queries over a [`ComponentStore`].
//!
//! The data model only ever asks "which entities carry component X", so
//! there is no multi-component join machinery here -- callers that need an
//! intersection of two component types query the smaller store and filter
//! with `world.has_component::<Other>(id)`.

use crate::component::{Component, ComponentStore};
use crate::ids::EntityId;

/// Iterator over `(EntityId, &T)` pairs, in the insertion order of `T`'s
/// backing store.
pub struct QueryIter<'a, T: Component> {
    store: Option<&'a ComponentStore<T>>,
    ids: std::vec::IntoIter<EntityId>,
}

impl<'a, T: Component> QueryIter<'a, T> {
    pub(crate) fn new(store: &'a ComponentStore<T>) -> Self {
        let ids: Vec<EntityId> = store.iter_ids().collect();
        Self {
            store: Some(store),
            ids: ids.into_iter(),
        }
    }

    pub(crate) fn empty() -> Self {
        Self {
            store: None,
            ids: Vec::new().into_iter(),
        }
    }
}

impl<'a, T: Component> Iterator for QueryIter<'a, T> {
    type Item = (EntityId, &'a T);

    fn next(&mut self) -> Option<Self::Item> {
        let store = self.store?;
        let id = self.ids.next()?;
        let component = store.get(id).expect("ids came from this store's own index");
        Some((id, component))
    }
}
