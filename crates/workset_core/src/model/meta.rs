//! Per-object bookkeeping carried by every persistent entity.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::types::{ObjectUid, StoreId};
use crate::uid;

/// Modification state of a tracked object.
///
/// The state machine is deliberately small: `New` and `Deleted` are
/// terminal until commit or rollback resets them, and `Changed` is only
/// entered from `Unmodified`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Modification {
    /// In sync with the store (or never persisted and not yet registered).
    #[default]
    Unmodified,
    /// Created in this session, no persisted row yet.
    New,
    /// A persisted row exists and in-memory state diverged from it.
    Changed,
    /// Scheduled for removal from the store at the next commit.
    Deleted,
}

fn fresh_uid() -> ObjectUid {
    uid::next_uid()
}

/// Metadata embedded in every persistent entity.
///
/// The identity fingerprint, modification state and change log are
/// session-local and never part of the encoded state image; store
/// identity, version and audit fields round-trip through the payload.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ObjectMeta {
    #[serde(skip, default = "fresh_uid")]
    uid: ObjectUid,
    store_id: StoreId,
    version: u64,
    created_at: Option<DateTime<Utc>>,
    created_by: Option<String>,
    modified_at: Option<DateTime<Utc>>,
    modified_by: Option<String>,
    #[serde(skip)]
    modification: Modification,
    #[serde(skip)]
    change_log: Vec<String>,
}

impl ObjectMeta {
    /// Creates metadata for a fresh in-memory object.
    ///
    /// The object gets a process-unique fingerprint immediately; the store
    /// identifier stays unassigned until the first successful commit.
    #[must_use]
    pub fn new() -> Self {
        Self {
            uid: uid::next_uid(),
            store_id: StoreId::UNASSIGNED,
            version: 0,
            created_at: None,
            created_by: None,
            modified_at: None,
            modified_by: None,
            modification: Modification::Unmodified,
            change_log: Vec::new(),
        }
    }

    /// Returns the session-lifetime identity fingerprint.
    #[must_use]
    pub fn uid(&self) -> ObjectUid {
        self.uid
    }

    /// Returns the store-assigned identifier.
    #[must_use]
    pub fn store_id(&self) -> StoreId {
        self.store_id
    }

    /// Sets the store-assigned identifier. Called by stores on first save.
    pub fn set_store_id(&mut self, id: StoreId) {
        self.store_id = id;
    }

    /// Returns the persisted version counter this object was loaded at.
    #[must_use]
    pub fn version(&self) -> u64 {
        self.version
    }

    /// Sets the version counter. Called by stores after commit or refresh.
    pub fn set_version(&mut self, version: u64) {
        self.version = version;
    }

    /// Returns the current modification state.
    #[must_use]
    pub fn modification(&self) -> Modification {
        self.modification
    }

    /// Marks this object as newly created. Always wins over the current
    /// state; registering an object twice is harmless.
    pub fn mark_new(&mut self) {
        self.modification = Modification::New;
    }

    /// Marks this object as changed.
    ///
    /// Only transitions from `Unmodified`; a `New` object is already fully
    /// written at commit and a `Deleted` one must stay deleted. Returns
    /// `true` if the state actually moved.
    pub fn mark_changed(&mut self) -> bool {
        if self.modification == Modification::Unmodified {
            self.modification = Modification::Changed;
            true
        } else {
            false
        }
    }

    /// Marks this object as deleted. Returns `true` if the state moved.
    pub fn mark_deleted(&mut self) -> bool {
        if self.modification == Modification::Deleted {
            false
        } else {
            self.modification = Modification::Deleted;
            true
        }
    }

    /// Resets the modification state and drops the accumulated change log.
    pub fn reset(&mut self) {
        self.modification = Modification::Unmodified;
        self.change_log.clear();
    }

    /// Stamps creation audit fields. Called once, during commit of a `New`
    /// object.
    pub fn stamp_created(&mut self, actor: &str) {
        self.created_at = Some(Utc::now());
        self.created_by = Some(actor.to_string());
    }

    /// Stamps modification audit fields. Called during commit of a
    /// `Changed` object.
    pub fn stamp_modified(&mut self, actor: &str) {
        self.modified_at = Some(Utc::now());
        self.modified_by = Some(actor.to_string());
    }

    /// Returns who created the persisted row, if it was committed.
    #[must_use]
    pub fn created_by(&self) -> Option<&str> {
        self.created_by.as_deref()
    }

    /// Returns who last committed a change to the persisted row.
    #[must_use]
    pub fn modified_by(&self) -> Option<&str> {
        self.modified_by.as_deref()
    }

    /// Returns when the persisted row was created.
    #[must_use]
    pub fn created_at(&self) -> Option<DateTime<Utc>> {
        self.created_at
    }

    /// Returns when the persisted row was last modified.
    #[must_use]
    pub fn modified_at(&self) -> Option<DateTime<Utc>> {
        self.modified_at
    }

    /// Appends an entry to the pending change log.
    pub fn log_change(&mut self, entry: String) {
        self.change_log.push(entry);
    }

    /// Returns the pending change log entries.
    #[must_use]
    pub fn change_log(&self) -> &[String] {
        &self.change_log
    }

    /// Restores the persisted fields from a decoded state image while
    /// keeping identity and session-local tracking state untouched.
    pub fn restore_persisted(&mut self, image: ObjectMeta) {
        self.store_id = image.store_id;
        self.version = image.version;
        self.created_at = image.created_at;
        self.created_by = image.created_by;
        self.modified_at = image.modified_at;
        self.modified_by = image.modified_by;
    }
}

impl Default for ObjectMeta {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fresh_meta_is_untracked() {
        let meta = ObjectMeta::new();
        assert_eq!(meta.modification(), Modification::Unmodified);
        assert!(!meta.store_id().is_assigned());
        assert_ne!(meta.uid().as_u64(), 0);
    }

    #[test]
    fn changed_only_from_unmodified() {
        let mut meta = ObjectMeta::new();
        assert!(meta.mark_changed());
        assert!(!meta.mark_changed());

        let mut meta = ObjectMeta::new();
        meta.mark_new();
        assert!(!meta.mark_changed());
        assert_eq!(meta.modification(), Modification::New);

        let mut meta = ObjectMeta::new();
        meta.mark_deleted();
        assert!(!meta.mark_changed());
        assert_eq!(meta.modification(), Modification::Deleted);
    }

    #[test]
    fn deleted_wins_over_changed() {
        let mut meta = ObjectMeta::new();
        meta.mark_changed();
        assert!(meta.mark_deleted());
        assert!(!meta.mark_deleted());
        assert_eq!(meta.modification(), Modification::Deleted);
    }

    #[test]
    fn reset_clears_state_and_log() {
        let mut meta = ObjectMeta::new();
        meta.mark_changed();
        meta.log_change("set_name( Berlin )".into());
        meta.reset();
        assert_eq!(meta.modification(), Modification::Unmodified);
        assert!(meta.change_log().is_empty());
    }
}
