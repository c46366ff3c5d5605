//! The commit/rollback protocol.
//!
//! Commit dispatches the dirty set in first-marked order inside one store
//! transaction. Any failure triggers the recovery cascade: roll back; if
//! rollback itself fails, close the session. The session never stays in a
//! half-committed state.

use chrono::{SecondsFormat, Utc};
use tracing::{debug, error, info, warn};

use crate::error::{PersistenceError, PersistenceResult};
use crate::model::{AnyHandle, Modification};
use crate::session::Session;

impl Session {
    /// Commits all pending changes under the session's current actor.
    pub fn commit(&self) -> PersistenceResult<()> {
        let actor = self.actor();
        self.commit_with(&actor)
    }

    /// Commits all pending changes, stamping the given actor instead of
    /// the session's.
    pub fn commit_as(&self, actor: &str) -> PersistenceResult<()> {
        self.commit_with(actor)
    }

    fn commit_with(&self, actor: &str) -> PersistenceResult<()> {
        self.ensure_open()?;
        let snapshot = self.dirty.lock().snapshot();
        if snapshot.is_empty() {
            return Ok(());
        }
        match self.dispatch(&snapshot, actor) {
            Ok(()) => {
                for handle in &snapshot {
                    handle.write().meta_mut().reset();
                }
                self.dirty.lock().clear();
                info!(objects = snapshot.len(), actor, "commit finished");
                Ok(())
            }
            Err(err) => self.recover(err),
        }
    }

    /// Walks the snapshot in order and stages every pending change in one
    /// store transaction.
    fn dispatch(&self, snapshot: &[AnyHandle], actor: &str) -> PersistenceResult<()> {
        self.store.begin_transaction()?;
        for handle in snapshot {
            let modification = handle.read().modification();
            match modification {
                Modification::New => {
                    handle.write().meta_mut().stamp_created(actor);
                    self.emit_change_log(handle, "CREATED");
                    self.store.save(handle)?;
                }
                Modification::Changed => {
                    handle.write().meta_mut().stamp_modified(actor);
                    self.emit_change_log(handle, "CHANGED");
                    self.store.update(handle)?;
                }
                Modification::Deleted => {
                    // Deleting an object that never reached the store is
                    // purely an in-memory affair.
                    self.emit_change_log(handle, "DELETED");
                    let assigned = handle.read().store_id().is_assigned();
                    if assigned {
                        self.store.delete(handle)?;
                    }
                    // A dispatched delete leaves the cycle for good: a
                    // later rollback must not revive the object.
                    self.in_use.lock().remove(&handle.uid());
                    self.dirty.lock().remove(handle.uid());
                }
                Modification::Unmodified => {}
            }
        }
        self.store.commit_transaction()
    }

    fn emit_change_log(&self, handle: &AnyHandle, state: &str) {
        let obj = handle.read();
        let at = Utc::now().to_rfc3339_opts(SecondsFormat::Secs, true);
        info!(object = %obj.describe(), state, %at, "commit entry");
        for entry in obj.meta().change_log() {
            info!(object = %obj.describe(), entry, "change");
        }
    }

    /// The recovery cascade for a failed commit. The original error wins
    /// unless closing fails too.
    fn recover(&self, err: PersistenceError) -> PersistenceResult<()> {
        warn!(error = %err, "commit failed, rolling back");
        match self.rollback() {
            Ok(()) => Err(err),
            Err(_) => {
                // rollback already escalated to close; the session is
                // unusable either way.
                if self.is_closed() {
                    Err(err)
                } else {
                    match self.close() {
                        Ok(()) => Err(err),
                        Err(close_err) => Err(close_err),
                    }
                }
            }
        }
    }

    /// Discards all pending changes and restores tracked objects from
    /// their persisted rows.
    ///
    /// If restoration fails the session closes itself; a close failure
    /// takes precedence over the restoration error.
    pub fn rollback(&self) -> PersistenceResult<()> {
        self.ensure_open()?;
        let snapshot = self.dirty.lock().snapshot();
        match self.restore(&snapshot) {
            Ok(()) => {
                self.dirty.lock().clear();
                self.store.rollback_transaction()?;
                debug!(objects = snapshot.len(), "rolled back");
                Ok(())
            }
            Err(err) => {
                warn!(error = %err, "rollback failed, closing session");
                // The store could not restore the objects, but the
                // cycle's in-memory tracking still resets.
                for handle in &snapshot {
                    handle.write().meta_mut().reset();
                }
                match self.close() {
                    Ok(()) => Err(err),
                    Err(close_err) => Err(close_err),
                }
            }
        }
    }

    fn restore(&self, snapshot: &[AnyHandle]) -> PersistenceResult<()> {
        for handle in snapshot {
            let (modification, assigned) = {
                let obj = handle.read();
                (obj.modification(), obj.store_id().is_assigned())
            };
            match modification {
                // Never persisted: forget it ever existed.
                Modification::New => {
                    self.in_use.lock().remove(&handle.uid());
                    handle.write().meta_mut().reset();
                }
                Modification::Deleted if !assigned => {
                    self.in_use.lock().remove(&handle.uid());
                    handle.write().meta_mut().reset();
                }
                Modification::Changed => {
                    self.store.refresh(handle)?;
                    handle.write().meta_mut().reset();
                }
                Modification::Deleted => {
                    self.store.refresh(handle)?;
                    handle.write().meta_mut().reset();
                    self.track_in_use(handle);
                }
                Modification::Unmodified => {}
            }
        }
        Ok(())
    }

    /// Closes the session: tracking state is dropped and the store
    /// connection released. Idempotent; a closed session rejects all
    /// further work.
    pub fn close(&self) -> PersistenceResult<()> {
        if self
            .closed
            .swap(true, std::sync::atomic::Ordering::AcqRel)
        {
            return Ok(());
        }
        let pending = self.dirty.lock().snapshot();
        if !pending.is_empty() {
            let objects: Vec<String> =
                pending.iter().map(|h| h.read().describe()).collect();
            warn!(
                count = objects.len(),
                objects = objects.join(", "),
                "closing with uncommitted changes"
            );
        }
        self.dirty.lock().clear();
        self.in_use.lock().clear();
        debug!("session closed");
        if let Err(err) = self.store.close() {
            error!(error = %err, "store close failed");
            return Err(err);
        }
        Ok(())
    }
}
