//! The session: object registry, mutation interception, and the
//! commit/rollback protocol.

mod commit;
mod dirty;
mod intercept;

pub use dirty::DirtySet;
pub use intercept::PropertyValue;

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;
use tracing::{debug, warn};

use crate::config::SessionConfig;
use crate::error::{PersistenceError, PersistenceResult};
use crate::model::{AnyHandle, Handle, Modification, Persistable, WeakHandle};
use crate::store::Store;
use crate::types::ObjectUid;

/// Counters describing what a session currently tracks.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionStats {
    /// Actor stamped on objects at commit.
    pub actor: String,
    /// Objects awaiting commit.
    pub dirty: usize,
    /// Live objects in the in-use registry.
    pub in_use: usize,
    /// Whether the session is associated with its store connection.
    pub attached: bool,
}

impl std::fmt::Display for SessionStats {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "actor={} dirty={} in_use={} attached={}",
            self.actor, self.dirty, self.in_use, self.attached
        )
    }
}

/// A unit of work above one store.
///
/// The session owns the dirty set and the objects-in-use registry, routes
/// every entity mutation through its interceptor methods, and drives the
/// all-or-nothing commit protocol. All methods take `&self`; internal
/// state is lock-protected so a session can be shared across threads.
///
/// The in-use registry holds weak references only. An object nobody else
/// references is dropped; the registry never extends lifetimes.
pub struct Session {
    store: Arc<dyn Store>,
    config: SessionConfig,
    actor: Mutex<String>,
    dirty: Mutex<DirtySet>,
    in_use: Mutex<HashMap<ObjectUid, WeakHandle>>,
    attached: AtomicBool,
    closed: AtomicBool,
}

impl Session {
    /// Opens a session over a store with default configuration.
    #[must_use]
    pub fn new(store: Arc<dyn Store>) -> Self {
        Self::with_config(store, SessionConfig::new())
    }

    /// Opens a session over a store with the given configuration.
    #[must_use]
    pub fn with_config(store: Arc<dyn Store>, config: SessionConfig) -> Self {
        let actor = config.default_actor().to_string();
        Self {
            store,
            config,
            actor: Mutex::new(actor),
            dirty: Mutex::new(DirtySet::new()),
            in_use: Mutex::new(HashMap::new()),
            attached: AtomicBool::new(true),
            closed: AtomicBool::new(false),
        }
    }

    /// The session configuration.
    #[must_use]
    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    /// The underlying store.
    #[must_use]
    pub fn store(&self) -> &Arc<dyn Store> {
        &self.store
    }

    /// Sets the actor stamped on objects at commit.
    pub fn set_actor(&self, actor: impl Into<String>) {
        *self.actor.lock() = actor.into();
    }

    /// The actor currently stamped on objects at commit.
    #[must_use]
    pub fn actor(&self) -> String {
        self.actor.lock().clone()
    }

    /// Returns `true` once the session has been closed.
    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }

    /// Registers a freshly created entity.
    ///
    /// The object is marked new, enters the dirty set and the in-use
    /// registry, and will be saved at the next commit.
    pub fn register<T: Persistable>(&self, object: T) -> PersistenceResult<Handle<T>> {
        self.ensure_open()?;
        let handle = Handle::new(object);
        let any = handle.erased();
        any.write().meta_mut().mark_new();
        self.track_dirty(any.clone());
        self.track_in_use(&any);
        debug!(uid = %any.uid(), "registered new object");
        Ok(handle)
    }

    /// Attaches an entity materialized from a persisted row.
    ///
    /// The object is re-associated with the store connection and enters
    /// the in-use registry unmodified; it joins the dirty set only when a
    /// mutation arrives.
    pub fn attach<T: Persistable>(&self, object: T) -> PersistenceResult<Handle<T>> {
        self.ensure_open()?;
        let handle = Handle::new(object);
        let any = handle.erased();
        self.store.attach(&any)?;
        self.track_in_use(&any);
        Ok(handle)
    }

    /// Re-associates every live tracked object with the store connection.
    pub fn attach_all(&self) -> PersistenceResult<()> {
        self.ensure_open()?;
        let live = self.live_in_use();
        self.store.attach_all(&live)?;
        self.attached.store(true, Ordering::Release);
        debug!(objects = live.len(), "re-attached working set");
        Ok(())
    }

    /// Releases the store association. Tracked objects stay in memory and
    /// can be re-associated with [`attach_all`](Session::attach_all).
    pub fn detach(&self) -> PersistenceResult<()> {
        self.ensure_open()?;
        self.store.detach()?;
        self.attached.store(false, Ordering::Release);
        Ok(())
    }

    /// Returns `true` while the session is associated with its store
    /// connection.
    #[must_use]
    pub fn is_attached(&self) -> bool {
        self.attached.load(Ordering::Acquire)
    }

    /// Schedules an object for removal from the store at the next commit.
    ///
    /// An object that reports itself non-deletable is refused. Deleting
    /// twice is harmless. A deleted object stays deleted; later mutations
    /// no longer move its state.
    pub fn delete(&self, handle: &AnyHandle) -> PersistenceResult<()> {
        self.ensure_open()?;
        let (deletable, description) = {
            let obj = handle.read();
            (obj.deletable(), obj.describe())
        };
        if !deletable {
            warn!(object = %description, "deletion refused");
            return Err(PersistenceError::invalid_operation(format!(
                "{description} is not deletable"
            )));
        }
        let moved = handle.write().meta_mut().mark_deleted();
        if moved {
            self.track_dirty(handle.clone());
            debug!(uid = %handle.uid(), "scheduled for deletion");
        }
        Ok(())
    }

    /// Marks an object as diverged from its persisted row.
    ///
    /// Idempotent; a new or deleted object keeps its stronger state but is
    /// still guaranteed a place in the dirty set.
    pub fn mark_dirty(&self, handle: &AnyHandle) -> PersistenceResult<()> {
        self.ensure_open()?;
        let modification = {
            let mut obj = handle.write();
            obj.meta_mut().mark_changed();
            obj.modification()
        };
        if modification != Modification::Unmodified {
            self.track_dirty(handle.clone());
        }
        Ok(())
    }

    /// Returns `true` if the object awaits commit.
    #[must_use]
    pub fn is_dirty(&self, uid: ObjectUid) -> bool {
        self.dirty.lock().contains(uid)
    }

    /// Number of objects awaiting commit.
    #[must_use]
    pub fn dirty_count(&self) -> usize {
        self.dirty.lock().len()
    }

    /// Returns `true` if the object is alive in the in-use registry.
    #[must_use]
    pub fn is_in_use(&self, uid: ObjectUid) -> bool {
        self.in_use
            .lock()
            .get(&uid)
            .is_some_and(|w| w.upgrade().is_some())
    }

    /// Evicts an object from the in-use registry without touching its
    /// modification state or the dirty set.
    pub fn evict(&self, uid: ObjectUid) -> bool {
        self.in_use.lock().remove(&uid).is_some()
    }

    /// Counters describing what this session currently tracks. Prunes
    /// dead registry entries as a side effect.
    #[must_use]
    pub fn stats(&self) -> SessionStats {
        SessionStats {
            actor: self.actor(),
            dirty: self.dirty.lock().len(),
            in_use: self.live_in_use().len(),
            attached: self.is_attached(),
        }
    }

    /// Reloads one object's persisted state, discarding in-memory changes.
    pub fn refresh(&self, handle: &AnyHandle) -> PersistenceResult<()> {
        self.ensure_open()?;
        self.store.refresh(handle)?;
        handle.write().meta_mut().reset();
        self.dirty.lock().remove(handle.uid());
        Ok(())
    }

    /// Reloads every live tracked object from its persisted row and drops
    /// all pending changes. Objects without a persisted row fall out of
    /// tracking entirely.
    pub fn refresh_all(&self) -> PersistenceResult<()> {
        self.ensure_open()?;
        for any in self.live_in_use() {
            let has_row = any.read().store_id().is_assigned();
            if has_row {
                self.store.refresh(&any)?;
                any.write().meta_mut().reset();
            } else {
                self.in_use.lock().remove(&any.uid());
            }
        }
        self.dirty.lock().clear();
        Ok(())
    }

    /// Opens a store transaction explicitly. Commit opens one on demand,
    /// so this is only needed to widen a transaction around reads.
    pub fn begin_transaction(&self) -> PersistenceResult<()> {
        self.ensure_open()?;
        self.store.begin_transaction()
    }

    pub(crate) fn ensure_open(&self) -> PersistenceResult<()> {
        if self.is_closed() {
            return Err(PersistenceError::invalid_operation("session is closed"));
        }
        Ok(())
    }

    pub(crate) fn track_dirty(&self, handle: AnyHandle) {
        self.dirty.lock().insert(handle);
    }

    pub(crate) fn track_in_use(&self, handle: &AnyHandle) {
        self.in_use
            .lock()
            .insert(handle.uid(), handle.downgrade());
    }

    /// Upgrades the whole registry, pruning entries whose object died.
    pub(crate) fn live_in_use(&self) -> Vec<AnyHandle> {
        let mut registry = self.in_use.lock();
        let mut live = Vec::with_capacity(registry.len());
        registry.retain(|_, weak| match weak.upgrade() {
            Some(handle) => {
                live.push(handle);
                true
            }
            None => false,
        });
        live
    }
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("dirty", &self.dirty.lock().len())
            .field("closed", &self.is_closed())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testutil::{StubStore, Widget};

    fn session() -> Session {
        Session::new(Arc::new(StubStore::new()))
    }

    #[test]
    fn register_marks_new_and_tracks() {
        let session = session();
        let widget = session.register(Widget::named("gear")).unwrap();
        assert_eq!(widget.read().modification(), Modification::New);
        assert!(session.is_dirty(widget.uid()));
        assert!(session.is_in_use(widget.uid()));
    }

    #[test]
    fn attach_does_not_dirty() {
        let session = session();
        let widget = session.attach(Widget::named("gear")).unwrap();
        assert_eq!(widget.read().modification(), Modification::Unmodified);
        assert!(!session.is_dirty(widget.uid()));
        assert!(session.is_in_use(widget.uid()));
    }

    #[test]
    fn registry_does_not_keep_objects_alive() {
        let session = session();
        let uid = {
            let widget = session.attach(Widget::named("gear")).unwrap();
            widget.uid()
        };
        assert!(!session.is_in_use(uid));
        assert_eq!(session.stats().in_use, 0);
    }

    #[test]
    fn evict_only_touches_the_registry() {
        let session = session();
        let widget = session.register(Widget::named("gear")).unwrap();
        assert!(session.evict(widget.uid()));
        assert!(!session.is_in_use(widget.uid()));
        assert!(session.is_dirty(widget.uid()));
        assert!(!session.evict(widget.uid()));
    }

    #[test]
    fn mark_dirty_is_idempotent_and_keeps_order() {
        let session = session();
        let a = session.attach(Widget::named("a")).unwrap().erased();
        let b = session.attach(Widget::named("b")).unwrap().erased();
        session.mark_dirty(&a).unwrap();
        session.mark_dirty(&b).unwrap();
        session.mark_dirty(&a).unwrap();
        assert_eq!(session.dirty_count(), 2);
        assert_eq!(a.read().modification(), Modification::Changed);
    }

    #[test]
    fn delete_wins_over_changed() {
        let session = session();
        let widget = session.attach(Widget::named("gear")).unwrap().erased();
        session.mark_dirty(&widget).unwrap();
        session.delete(&widget).unwrap();
        session.mark_dirty(&widget).unwrap();
        assert_eq!(widget.read().modification(), Modification::Deleted);
        assert_eq!(session.dirty_count(), 1);
    }

    #[test]
    fn non_deletable_objects_refuse_deletion() {
        let session = session();
        let mut anchor = Widget::named("anchor");
        anchor.fixed = true;
        let widget = session.attach(anchor).unwrap();
        let err = session.delete(&widget.erased()).unwrap_err();
        assert!(matches!(err, PersistenceError::InvalidOperation { .. }));
        assert_eq!(widget.read().modification(), Modification::Unmodified);
        assert!(!session.is_dirty(widget.uid()));
    }

    #[test]
    fn detach_and_attach_all_drive_the_store_and_the_flag() {
        let store = Arc::new(StubStore::new());
        let session = Session::new(Arc::clone(&store) as Arc<dyn Store>);
        let widget = session.attach(Widget::named("gear")).unwrap();
        assert!(session.is_attached());

        session.detach().unwrap();
        assert!(!session.is_attached());
        assert!(store.calls().contains(&"detach".to_string()));

        session.attach_all().unwrap();
        assert!(session.is_attached());
        let attaches = store
            .calls()
            .iter()
            .filter(|c| **c == format!("attach {}", widget.uid()))
            .count();
        // Once while attaching the object, once through attach_all.
        assert_eq!(attaches, 2);
    }

    #[test]
    fn stats_render_for_logging() {
        let session = session();
        session.set_actor("operator-7");
        let widget = session.register(Widget::named("gear")).unwrap();
        let stats = session.stats();
        assert_eq!(
            stats.to_string(),
            "actor=operator-7 dirty=1 in_use=1 attached=true"
        );
        drop(widget);
    }

    #[test]
    fn closed_session_rejects_mutations() {
        let session = session();
        session.close().unwrap();
        let err = session.register(Widget::named("gear")).unwrap_err();
        assert!(matches!(err, PersistenceError::InvalidOperation { .. }));
    }
}
