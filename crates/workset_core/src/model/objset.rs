//! Ordered set of handles, used for the to-many side of relationships.

use std::fmt;

use crate::model::handle::Handle;
use crate::model::persistable::Persistable;
use crate::types::ObjectUid;

/// An insertion-ordered set of [`Handle`]s, deduplicated by identity
/// fingerprint.
///
/// Entities use this for collection-valued relationship fields. Membership
/// checks never take object locks; each entry carries its fingerprint.
pub struct ObjSet<T: Persistable> {
    entries: Vec<Handle<T>>,
}

impl<T: Persistable> ObjSet<T> {
    /// Creates an empty set.
    #[must_use]
    pub fn new() -> Self {
        Self {
            entries: Vec::new(),
        }
    }

    /// Adds a handle. Returns `false` if an entry with the same identity
    /// was already present.
    pub fn insert(&mut self, handle: Handle<T>) -> bool {
        if self.contains(handle.uid()) {
            return false;
        }
        self.entries.push(handle);
        true
    }

    /// Removes the entry with the given identity. Returns `true` if one
    /// was present.
    pub fn remove(&mut self, uid: ObjectUid) -> bool {
        let before = self.entries.len();
        self.entries.retain(|h| h.uid() != uid);
        self.entries.len() != before
    }

    /// Returns `true` if an entry with the given identity is present.
    #[must_use]
    pub fn contains(&self, uid: ObjectUid) -> bool {
        self.entries.iter().any(|h| h.uid() == uid)
    }

    /// Number of entries.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns `true` if the set holds no entries.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Iterates entries in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = &Handle<T>> {
        self.entries.iter()
    }

    /// Removes all entries.
    pub fn clear(&mut self) {
        self.entries.clear();
    }
}

impl<T: Persistable> Default for ObjSet<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: Persistable> Clone for ObjSet<T> {
    fn clone(&self) -> Self {
        Self {
            entries: self.entries.clone(),
        }
    }
}

impl<T: Persistable> fmt::Debug for ObjSet<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.entries.iter()).finish()
    }
}

impl<'a, T: Persistable> IntoIterator for &'a ObjSet<T> {
    type Item = &'a Handle<T>;
    type IntoIter = std::slice::Iter<'a, Handle<T>>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries.iter()
    }
}
