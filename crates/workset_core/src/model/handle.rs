//! Shared handles to tracked objects.
//!
//! A [`Handle`] is the typed owner view of an entity behind an
//! `Arc<RwLock<_>>`. [`AnyHandle`] erases the entity type so the dirty
//! set, the relationship engine and stores can treat every object
//! uniformly, while [`WeakHandle`] backs the objects-in-use registry
//! without extending object lifetimes.
//!
//! Handles cache the object's identity fingerprint at construction so
//! identity checks and hashing never take the object lock.

use std::any::Any;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::{Arc, Weak};

use parking_lot::{
    MappedRwLockReadGuard, MappedRwLockWriteGuard, RwLock, RwLockReadGuard, RwLockWriteGuard,
};

use crate::model::persistable::Persistable;
use crate::types::ObjectUid;

/// Typed shared handle to a tracked entity.
pub struct Handle<T: Persistable> {
    uid: ObjectUid,
    cell: Arc<RwLock<T>>,
}

impl<T: Persistable> Handle<T> {
    /// Wraps an entity into a shared handle.
    #[must_use]
    pub fn new(object: T) -> Self {
        let uid = object.meta().uid();
        Self {
            uid,
            cell: Arc::new(RwLock::new(object)),
        }
    }

    /// Identity fingerprint, readable without taking the object lock.
    #[must_use]
    pub fn uid(&self) -> ObjectUid {
        self.uid
    }

    /// Locks the entity for shared reading.
    pub fn read(&self) -> RwLockReadGuard<'_, T> {
        self.cell.read()
    }

    /// Locks the entity for exclusive writing.
    pub fn write(&self) -> RwLockWriteGuard<'_, T> {
        self.cell.write()
    }

    /// Erases the entity type.
    #[must_use]
    pub fn erased(&self) -> AnyHandle {
        AnyHandle {
            inner: Arc::new(self.clone()),
        }
    }
}

impl<T: Persistable> Clone for Handle<T> {
    fn clone(&self) -> Self {
        Self {
            uid: self.uid,
            cell: Arc::clone(&self.cell),
        }
    }
}

impl<T: Persistable> PartialEq for Handle<T> {
    fn eq(&self, other: &Self) -> bool {
        self.uid == other.uid
    }
}

impl<T: Persistable> Eq for Handle<T> {}

impl<T: Persistable> fmt::Debug for Handle<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Handle<{}>({})", std::any::type_name::<T>(), self.uid)
    }
}

/// Cell access with the entity type erased. Object-safe seam between
/// typed handles and the untyped coordination machinery.
trait ErasedCell: Send + Sync {
    fn uid(&self) -> ObjectUid;
    fn read_dyn(&self) -> MappedRwLockReadGuard<'_, dyn Persistable>;
    fn write_dyn(&self) -> MappedRwLockWriteGuard<'_, dyn Persistable>;
    fn as_any(&self) -> &dyn Any;
    fn weak(&self) -> Arc<dyn ErasedWeak>;
}

impl<T: Persistable> ErasedCell for Handle<T> {
    fn uid(&self) -> ObjectUid {
        self.uid
    }

    fn read_dyn(&self) -> MappedRwLockReadGuard<'_, dyn Persistable> {
        RwLockReadGuard::map(self.cell.read(), |t| t as &dyn Persistable)
    }

    fn write_dyn(&self) -> MappedRwLockWriteGuard<'_, dyn Persistable> {
        RwLockWriteGuard::map(self.cell.write(), |t| t as &mut dyn Persistable)
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn weak(&self) -> Arc<dyn ErasedWeak> {
        Arc::new(WeakCell {
            uid: self.uid,
            weak: Arc::downgrade(&self.cell),
        })
    }
}

/// Type-erased shared handle.
///
/// Equality requires both the same identity fingerprint and the same
/// underlying entity type; hashing uses the fingerprint only. Neither
/// takes the object lock.
#[derive(Clone)]
pub struct AnyHandle {
    inner: Arc<dyn ErasedCell>,
}

impl AnyHandle {
    /// Erases a typed handle.
    #[must_use]
    pub fn new<T: Persistable>(handle: Handle<T>) -> Self {
        Self {
            inner: Arc::new(handle),
        }
    }

    /// Identity fingerprint, readable without taking the object lock.
    #[must_use]
    pub fn uid(&self) -> ObjectUid {
        self.inner.uid()
    }

    /// Locks the entity for shared reading.
    pub fn read(&self) -> MappedRwLockReadGuard<'_, dyn Persistable> {
        self.inner.read_dyn()
    }

    /// Locks the entity for exclusive writing.
    pub fn write(&self) -> MappedRwLockWriteGuard<'_, dyn Persistable> {
        self.inner.write_dyn()
    }

    /// Recovers the typed handle, if the entity type matches.
    #[must_use]
    pub fn downcast<T: Persistable>(&self) -> Option<Handle<T>> {
        self.inner.as_any().downcast_ref::<Handle<T>>().cloned()
    }

    /// Creates a weak reference that does not keep the entity alive.
    #[must_use]
    pub fn downgrade(&self) -> WeakHandle {
        WeakHandle {
            inner: self.inner.weak(),
        }
    }
}

impl<T: Persistable> From<Handle<T>> for AnyHandle {
    fn from(handle: Handle<T>) -> Self {
        Self::new(handle)
    }
}

impl PartialEq for AnyHandle {
    fn eq(&self, other: &Self) -> bool {
        self.inner.uid() == other.inner.uid()
            && self.inner.as_any().type_id() == other.inner.as_any().type_id()
    }
}

impl Eq for AnyHandle {}

impl Hash for AnyHandle {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.inner.uid().hash(state);
    }
}

impl fmt::Debug for AnyHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "AnyHandle({})", self.inner.uid())
    }
}

trait ErasedWeak: Send + Sync {
    fn uid(&self) -> ObjectUid;
    fn upgrade_any(&self) -> Option<AnyHandle>;
}

struct WeakCell<T: Persistable> {
    uid: ObjectUid,
    weak: Weak<RwLock<T>>,
}

impl<T: Persistable> ErasedWeak for WeakCell<T> {
    fn uid(&self) -> ObjectUid {
        self.uid
    }

    fn upgrade_any(&self) -> Option<AnyHandle> {
        let cell = self.weak.upgrade()?;
        Some(AnyHandle {
            inner: Arc::new(Handle {
                uid: self.uid,
                cell,
            }),
        })
    }
}

/// Weak counterpart of [`AnyHandle`] for the objects-in-use registry.
#[derive(Clone)]
pub struct WeakHandle {
    inner: Arc<dyn ErasedWeak>,
}

impl WeakHandle {
    /// Identity fingerprint of the referenced object.
    #[must_use]
    pub fn uid(&self) -> ObjectUid {
        self.inner.uid()
    }

    /// Returns a strong handle if the object is still alive.
    #[must_use]
    pub fn upgrade(&self) -> Option<AnyHandle> {
        self.inner.upgrade_any()
    }
}

impl fmt::Debug for WeakHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "WeakHandle({})", self.inner.uid())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testutil::Widget;

    #[test]
    fn downcast_recovers_the_typed_handle() {
        let handle = Handle::new(Widget::named("gear"));
        let any = handle.erased();
        let back = any.downcast::<Widget>().unwrap();
        assert_eq!(back.uid(), handle.uid());
        assert_eq!(back.read().name, "gear");
    }

    #[test]
    fn erased_views_share_the_object() {
        let handle = Handle::new(Widget::named("gear"));
        let any = handle.erased();
        {
            let mut w = handle.write();
            w.name = "sprocket".into();
        }
        assert_eq!(any.read().uid(), handle.uid());
        let recovered = any.downcast::<Widget>().unwrap();
        assert_eq!(recovered.read().name, "sprocket");
    }

    #[test]
    fn equality_is_identity_not_state() {
        let a = Handle::new(Widget::named("a")).erased();
        let b = Handle::new(Widget::named("a")).erased();
        assert_ne!(a, b);
        assert_eq!(a, a.clone());
    }

    #[test]
    fn weak_handles_do_not_keep_objects_alive() {
        let handle = Handle::new(Widget::named("gear"));
        let weak = handle.erased().downgrade();
        assert!(weak.upgrade().is_some());
        drop(handle);
        assert!(weak.upgrade().is_none());
    }
}
