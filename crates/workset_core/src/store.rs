//! The store seam between sessions and a concrete persistence backend.

use crate::error::PersistenceResult;
use crate::model::AnyHandle;

/// A persistence backend driven by a [`Session`](crate::session::Session).
///
/// Save/update/delete are staging operations inside the current
/// transaction; nothing becomes visible to other sessions before
/// [`commit_transaction`](Store::commit_transaction). The store validates
/// version counters at commit and reports a
/// [`Conflict`](crate::PersistenceError::Conflict) when a row moved
/// underneath a staged write.
///
/// Implementations lock the objects behind the handles themselves; the
/// session never holds an object lock across a store call.
pub trait Store: Send + Sync {
    /// Stages the first save of a new object and assigns its store
    /// identifier.
    fn save(&self, handle: &AnyHandle) -> PersistenceResult<()>;

    /// Stages an update of an already persisted object.
    fn update(&self, handle: &AnyHandle) -> PersistenceResult<()>;

    /// Stages the removal of a persisted object.
    fn delete(&self, handle: &AnyHandle) -> PersistenceResult<()>;

    /// Overwrites the object's in-memory state from its committed row.
    fn refresh(&self, handle: &AnyHandle) -> PersistenceResult<()>;

    /// Re-associates an object with the backend connection so later
    /// staged writes can resolve it. Attaching an object that is already
    /// associated is a no-op.
    fn attach(&self, handle: &AnyHandle) -> PersistenceResult<()>;

    /// Re-associates a batch of objects.
    fn attach_all(&self, handles: &[AnyHandle]) -> PersistenceResult<()> {
        for handle in handles {
            self.attach(handle)?;
        }
        Ok(())
    }

    /// Drops per-object association state until the next attach.
    fn detach(&self) -> PersistenceResult<()>;

    /// Opens a transaction. Opening while one is active is a no-op.
    fn begin_transaction(&self) -> PersistenceResult<()>;

    /// Validates and applies all staged operations atomically.
    fn commit_transaction(&self) -> PersistenceResult<()>;

    /// Discards all staged operations.
    fn rollback_transaction(&self) -> PersistenceResult<()>;

    /// Releases the backend connection. Idempotent.
    fn close(&self) -> PersistenceResult<()>;

    /// Declared length limit for `type_name.property`, if the backend
    /// schema carries one.
    fn property_length(&self, type_name: &str, property: &str) -> Option<i32>;
}
