//! Core identifier types.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Process-wide unique object fingerprint.
///
/// Fingerprints are 64-bit, collision-resistant, assigned at construction
/// and never reused. They serve as the natural key for equality, hashing
/// and logging before an object has ever been saved.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ObjectUid(pub u64);

impl ObjectUid {
    /// Creates a fingerprint from a raw value.
    #[must_use]
    pub const fn new(uid: u64) -> Self {
        Self(uid)
    }

    /// Returns the raw fingerprint value.
    #[must_use]
    pub const fn as_u64(self) -> u64 {
        self.0
    }
}

impl fmt::Display for ObjectUid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "uid:{}", self.0)
    }
}

/// Store-assigned object identifier.
///
/// The store assigns identifiers on first save; until then an object
/// carries [`StoreId::UNASSIGNED`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct StoreId(pub u64);

impl StoreId {
    /// The identifier of an object that has never been saved.
    pub const UNASSIGNED: StoreId = StoreId(0);

    /// Creates a store identifier from a raw value.
    #[must_use]
    pub const fn new(id: u64) -> Self {
        Self(id)
    }

    /// Returns the raw identifier value.
    #[must_use]
    pub const fn as_u64(self) -> u64 {
        self.0
    }

    /// Returns `true` once the store has assigned an identifier.
    #[must_use]
    pub const fn is_assigned(self) -> bool {
        self.0 != 0
    }
}

impl Default for StoreId {
    fn default() -> Self {
        Self::UNASSIGNED
    }
}

impl fmt::Display for StoreId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "oid:{}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unassigned_store_id() {
        let id = StoreId::default();
        assert!(!id.is_assigned());
        assert_eq!(id, StoreId::UNASSIGNED);
    }

    #[test]
    fn assigned_store_id() {
        let id = StoreId::new(7);
        assert!(id.is_assigned());
        assert_eq!(id.as_u64(), 7);
    }

    #[test]
    fn uid_display() {
        let uid = ObjectUid::new(42);
        assert_eq!(format!("{uid}"), "uid:42");
    }

    #[test]
    fn store_id_ordering() {
        assert!(StoreId::new(1) < StoreId::new(2));
    }
}
