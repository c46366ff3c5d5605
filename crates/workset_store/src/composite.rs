//! A store that routes each entity type to its own backend.

use std::collections::HashMap;
use std::sync::Arc;

use tracing::trace;

use workset_core::{AnyHandle, PersistenceResult, Store};

/// Routes store operations by entity type name.
///
/// Per-object operations go to the backend registered for the object's
/// type, falling back to the default backend. Transaction operations fan
/// out to every distinct backend in registration order, default first;
/// there is no two-phase coordination across backends, the first failure
/// stops the fan-out.
pub struct CompositeStore {
    default: Arc<dyn Store>,
    routes: Vec<(String, Arc<dyn Store>)>,
    by_type: HashMap<String, usize>,
}

impl CompositeStore {
    /// Creates a composite over a default backend.
    #[must_use]
    pub fn new(default: Arc<dyn Store>) -> Self {
        Self {
            default,
            routes: Vec::new(),
            by_type: HashMap::new(),
        }
    }

    /// Routes a type name to a backend. A later route for the same type
    /// wins.
    #[must_use]
    pub fn with_route(mut self, type_name: impl Into<String>, store: Arc<dyn Store>) -> Self {
        let type_name = type_name.into();
        self.routes.push((type_name.clone(), Arc::clone(&store)));
        self.by_type.insert(type_name, self.routes.len() - 1);
        self
    }

    fn store_for(&self, type_name: &str) -> &Arc<dyn Store> {
        match self.by_type.get(type_name) {
            Some(&index) => &self.routes[index].1,
            None => &self.default,
        }
    }

    fn store_of(&self, handle: &AnyHandle) -> &Arc<dyn Store> {
        let type_name = handle.read().type_name();
        trace!(type_name, "routing store operation");
        self.store_for(type_name)
    }

    /// Every distinct backend, default first.
    fn backends(&self) -> Vec<&Arc<dyn Store>> {
        let mut seen: Vec<&Arc<dyn Store>> = vec![&self.default];
        for (_, store) in &self.routes {
            if !seen.iter().any(|s| Arc::ptr_eq(s, store)) {
                seen.push(store);
            }
        }
        seen
    }
}

impl Store for CompositeStore {
    fn save(&self, handle: &AnyHandle) -> PersistenceResult<()> {
        self.store_of(handle).save(handle)
    }

    fn update(&self, handle: &AnyHandle) -> PersistenceResult<()> {
        self.store_of(handle).update(handle)
    }

    fn delete(&self, handle: &AnyHandle) -> PersistenceResult<()> {
        self.store_of(handle).delete(handle)
    }

    fn refresh(&self, handle: &AnyHandle) -> PersistenceResult<()> {
        self.store_of(handle).refresh(handle)
    }

    fn attach(&self, handle: &AnyHandle) -> PersistenceResult<()> {
        self.store_of(handle).attach(handle)
    }

    fn detach(&self) -> PersistenceResult<()> {
        for store in self.backends() {
            store.detach()?;
        }
        Ok(())
    }

    fn begin_transaction(&self) -> PersistenceResult<()> {
        for store in self.backends() {
            store.begin_transaction()?;
        }
        Ok(())
    }

    fn commit_transaction(&self) -> PersistenceResult<()> {
        for store in self.backends() {
            store.commit_transaction()?;
        }
        Ok(())
    }

    fn rollback_transaction(&self) -> PersistenceResult<()> {
        for store in self.backends() {
            store.rollback_transaction()?;
        }
        Ok(())
    }

    fn close(&self) -> PersistenceResult<()> {
        for store in self.backends() {
            store.close()?;
        }
        Ok(())
    }

    fn property_length(&self, type_name: &str, property: &str) -> Option<i32> {
        self.store_for(type_name).property_length(type_name, property)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testent::Item;
    use crate::MemoryStore;
    use workset_core::Handle;

    #[test]
    fn routes_by_type_name_with_default_fallback() {
        let items = Arc::new(MemoryStore::new());
        let fallback = Arc::new(MemoryStore::new());
        let composite = CompositeStore::new(Arc::clone(&fallback) as Arc<dyn Store>)
            .with_route("Item", Arc::clone(&items) as Arc<dyn Store>);

        let handle = Handle::new(Item::new("bolt", 4)).erased();
        composite.save(&handle).unwrap();
        composite.commit_transaction().unwrap();

        assert_eq!(items.row_count(), 1);
        assert_eq!(fallback.row_count(), 0);
    }

    #[test]
    fn property_lengths_follow_the_route() {
        let items = Arc::new(MemoryStore::new());
        items.set_property_length("Item", "name", 8);
        let fallback = Arc::new(MemoryStore::new());
        let composite = CompositeStore::new(Arc::clone(&fallback) as Arc<dyn Store>)
            .with_route("Item", Arc::clone(&items) as Arc<dyn Store>);

        assert_eq!(composite.property_length("Item", "name"), Some(8));
        assert_eq!(composite.property_length("Other", "name"), None);
    }

    #[test]
    fn transactions_fan_out_once_per_backend() {
        let shared = Arc::new(MemoryStore::new());
        let composite = CompositeStore::new(Arc::clone(&shared) as Arc<dyn Store>)
            .with_route("Item", Arc::clone(&shared) as Arc<dyn Store>);
        composite.close().unwrap();
        // A second close through the other route would also be fine, but
        // the fan-out must have reached the backend.
        let handle = Handle::new(Item::new("bolt", 4)).erased();
        assert!(shared.save(&handle).is_err());
    }
}
