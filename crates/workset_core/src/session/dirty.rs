//! The session's dirty set.

use std::collections::HashSet;
use std::fmt;

use crate::model::AnyHandle;
use crate::types::ObjectUid;

/// Tracked objects awaiting commit, in first-marked order.
///
/// Lives in two forms at once: a fingerprint set for membership checks and
/// an ordered sequence driving commit dispatch. An object appears at most
/// once; re-marking it never changes its position.
pub struct DirtySet {
    ids: HashSet<ObjectUid>,
    ordered: Vec<AnyHandle>,
}

impl DirtySet {
    /// Creates an empty dirty set.
    #[must_use]
    pub fn new() -> Self {
        Self {
            ids: HashSet::new(),
            ordered: Vec::new(),
        }
    }

    /// Adds a handle. Returns `false` if the object was already tracked;
    /// its position is untouched in that case.
    pub fn insert(&mut self, handle: AnyHandle) -> bool {
        if !self.ids.insert(handle.uid()) {
            return false;
        }
        self.ordered.push(handle);
        true
    }

    /// Drops the entry with the given fingerprint. Returns `true` if one
    /// was present.
    pub fn remove(&mut self, uid: ObjectUid) -> bool {
        if !self.ids.remove(&uid) {
            return false;
        }
        self.ordered.retain(|h| h.uid() != uid);
        true
    }

    /// Returns `true` if the object is tracked.
    #[must_use]
    pub fn contains(&self, uid: ObjectUid) -> bool {
        self.ids.contains(&uid)
    }

    /// Number of tracked objects.
    #[must_use]
    pub fn len(&self) -> usize {
        self.ordered.len()
    }

    /// Returns `true` if nothing awaits commit.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.ordered.is_empty()
    }

    /// Clones the tracked handles in first-marked order.
    #[must_use]
    pub fn snapshot(&self) -> Vec<AnyHandle> {
        self.ordered.clone()
    }

    /// Drops every entry.
    pub fn clear(&mut self) {
        self.ids.clear();
        self.ordered.clear();
    }
}

impl Default for DirtySet {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for DirtySet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.ordered.iter()).finish()
    }
}
