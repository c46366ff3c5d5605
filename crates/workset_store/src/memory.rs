//! Transactional in-memory store.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::atomic::{AtomicBool, Ordering};

use parking_lot::Mutex;
use tracing::{debug, trace};

use workset_core::{AnyHandle, ObjectUid, PersistenceError, PersistenceResult, Store, StoreId};

/// One committed row.
struct Row {
    uid: ObjectUid,
    version: u64,
    payload: Vec<u8>,
}

enum StagedOp {
    Insert,
    Update,
    Delete,
}

/// A staged write, validated against the committed row's version when the
/// transaction commits. The handle is kept so the new version can be
/// written back into the object's metadata.
struct Staged {
    op: StagedOp,
    kind: &'static str,
    id: StoreId,
    expected_version: u64,
    payload: Vec<u8>,
    handle: AnyHandle,
}

#[derive(Default)]
struct Inner {
    rows: BTreeMap<(String, StoreId), Row>,
    staged: Vec<Staged>,
    staged_saves: HashSet<ObjectUid>,
    lengths: HashMap<String, i32>,
    journal: Vec<String>,
    next_id: u64,
}

/// An in-memory [`Store`] with optimistic version validation.
///
/// Save/update/delete stage writes; nothing touches the committed rows
/// before [`commit_transaction`](Store::commit_transaction), which
/// validates every staged write against the row versions first and only
/// then applies the batch. A row whose version moved since the object was
/// loaded fails the whole batch with a conflict.
///
/// Rows are keyed by `(type name, store id)`; payloads are the entities'
/// opaque state images. The store holds one staging area, so sessions
/// sharing it must serialize their transactions.
pub struct MemoryStore {
    inner: Mutex<Inner>,
    closed: AtomicBool,
}

impl MemoryStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(Inner {
                next_id: 1,
                ..Inner::default()
            }),
            closed: AtomicBool::new(false),
        }
    }

    /// Declares a length limit for `type_name.property`, as a relational
    /// schema would.
    pub fn set_property_length(&self, type_name: &str, property: &str, length: i32) {
        self.inner
            .lock()
            .lengths
            .insert(format!("{type_name}.{property}"), length);
    }

    /// Bumps a committed row's version without going through a session,
    /// standing in for a concurrent writer.
    ///
    /// Returns `false` if no such row exists.
    pub fn tamper(&self, type_name: &str, id: StoreId) -> bool {
        let mut inner = self.inner.lock();
        match inner.rows.get_mut(&(type_name.to_string(), id)) {
            Some(row) => {
                row.version += 1;
                true
            }
            None => false,
        }
    }

    /// Store identifiers of all committed rows of a type, in id order.
    #[must_use]
    pub fn all_of_kind(&self, type_name: &str) -> Vec<StoreId> {
        self.inner
            .lock()
            .rows
            .keys()
            .filter(|(kind, _)| kind == type_name)
            .map(|(_, id)| *id)
            .collect()
    }

    /// Identity fingerprint recorded for a committed row, if it exists.
    #[must_use]
    pub fn row_uid(&self, type_name: &str, id: StoreId) -> Option<ObjectUid> {
        self.inner
            .lock()
            .rows
            .get(&(type_name.to_string(), id))
            .map(|row| row.uid)
    }

    /// Version of a committed row, if it exists.
    #[must_use]
    pub fn row_version(&self, type_name: &str, id: StoreId) -> Option<u64> {
        self.inner
            .lock()
            .rows
            .get(&(type_name.to_string(), id))
            .map(|row| row.version)
    }

    /// Number of committed rows across all types.
    #[must_use]
    pub fn row_count(&self) -> usize {
        self.inner.lock().rows.len()
    }

    /// The committed operations in apply order, e.g. `insert Widget oid:1`.
    #[must_use]
    pub fn journal(&self) -> Vec<String> {
        self.inner.lock().journal.clone()
    }

    fn ensure_open(&self) -> PersistenceResult<()> {
        if self.closed.load(Ordering::Acquire) {
            return Err(PersistenceError::invalid_operation("store is closed"));
        }
        Ok(())
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl Store for MemoryStore {
    fn save(&self, handle: &AnyHandle) -> PersistenceResult<()> {
        self.ensure_open()?;
        let mut inner = self.inner.lock();
        if !inner.staged_saves.insert(handle.uid()) {
            return Err(PersistenceError::invalid_operation(format!(
                "{} already staged for save",
                handle.uid()
            )));
        }
        let id = StoreId::new(inner.next_id);
        inner.next_id += 1;
        let (kind, payload) = {
            let mut obj = handle.write();
            obj.meta_mut().set_store_id(id);
            (obj.type_name(), obj.encode_state()?)
        };
        trace!(kind, %id, "staged insert");
        inner.staged.push(Staged {
            op: StagedOp::Insert,
            kind,
            id,
            expected_version: 0,
            payload,
            handle: handle.clone(),
        });
        Ok(())
    }

    fn update(&self, handle: &AnyHandle) -> PersistenceResult<()> {
        self.ensure_open()?;
        let mut inner = self.inner.lock();
        let (kind, id, expected_version, payload) = {
            let obj = handle.read();
            (
                obj.type_name(),
                obj.store_id(),
                obj.meta().version(),
                obj.encode_state()?,
            )
        };
        if !id.is_assigned() {
            return Err(PersistenceError::invalid_operation(format!(
                "cannot update {kind} without a store id"
            )));
        }
        trace!(kind, %id, "staged update");
        inner.staged.push(Staged {
            op: StagedOp::Update,
            kind,
            id,
            expected_version,
            payload,
            handle: handle.clone(),
        });
        Ok(())
    }

    fn delete(&self, handle: &AnyHandle) -> PersistenceResult<()> {
        self.ensure_open()?;
        let mut inner = self.inner.lock();
        let (kind, id, expected_version) = {
            let obj = handle.read();
            (obj.type_name(), obj.store_id(), obj.meta().version())
        };
        if !id.is_assigned() {
            return Err(PersistenceError::invalid_operation(format!(
                "cannot delete {kind} without a store id"
            )));
        }
        trace!(kind, %id, "staged delete");
        inner.staged.push(Staged {
            op: StagedOp::Delete,
            kind,
            id,
            expected_version,
            payload: Vec::new(),
            handle: handle.clone(),
        });
        Ok(())
    }

    fn refresh(&self, handle: &AnyHandle) -> PersistenceResult<()> {
        self.ensure_open()?;
        let inner = self.inner.lock();
        let (kind, id) = {
            let obj = handle.read();
            (obj.type_name(), obj.store_id())
        };
        let row = inner
            .rows
            .get(&(kind.to_string(), id))
            .ok_or_else(|| PersistenceError::store(format!("no committed row for {kind} {id}")))?;
        let mut obj = handle.write();
        obj.decode_state(&row.payload)?;
        obj.meta_mut().set_store_id(id);
        obj.meta_mut().set_version(row.version);
        Ok(())
    }

    fn attach(&self, handle: &AnyHandle) -> PersistenceResult<()> {
        // Association is implicit; the store keeps no per-connection
        // state to rebuild.
        self.ensure_open()?;
        trace!(uid = %handle.uid(), "attached");
        Ok(())
    }

    fn detach(&self) -> PersistenceResult<()> {
        self.ensure_open()
    }

    fn begin_transaction(&self) -> PersistenceResult<()> {
        self.ensure_open()
    }

    fn commit_transaction(&self) -> PersistenceResult<()> {
        self.ensure_open()?;
        let mut inner = self.inner.lock();

        // Validate the whole batch before applying any of it.
        for staged in &inner.staged {
            let key = (staged.kind.to_string(), staged.id);
            match staged.op {
                StagedOp::Insert => {
                    if inner.rows.contains_key(&key) {
                        return Err(PersistenceError::store(format!(
                            "duplicate row {} {}",
                            staged.kind, staged.id
                        )));
                    }
                }
                StagedOp::Update | StagedOp::Delete => match inner.rows.get(&key) {
                    None => {
                        return Err(PersistenceError::conflict(
                            staged.kind,
                            staged.id,
                            "row deleted by another session",
                        ));
                    }
                    Some(row) if row.version != staged.expected_version => {
                        return Err(PersistenceError::conflict(
                            staged.kind,
                            staged.id,
                            format!(
                                "version moved from {} to {}",
                                staged.expected_version, row.version
                            ),
                        ));
                    }
                    Some(_) => {}
                },
            }
        }

        let staged = std::mem::take(&mut inner.staged);
        inner.staged_saves.clear();
        for entry in staged {
            let key = (entry.kind.to_string(), entry.id);
            match entry.op {
                StagedOp::Insert => {
                    inner.rows.insert(
                        key,
                        Row {
                            uid: entry.handle.uid(),
                            version: 1,
                            payload: entry.payload,
                        },
                    );
                    entry.handle.write().meta_mut().set_version(1);
                    inner
                        .journal
                        .push(format!("insert {} {}", entry.kind, entry.id));
                }
                StagedOp::Update => {
                    let version = entry.expected_version + 1;
                    inner.rows.insert(
                        key,
                        Row {
                            uid: entry.handle.uid(),
                            version,
                            payload: entry.payload,
                        },
                    );
                    entry.handle.write().meta_mut().set_version(version);
                    inner
                        .journal
                        .push(format!("update {} {}", entry.kind, entry.id));
                }
                StagedOp::Delete => {
                    inner.rows.remove(&key);
                    inner
                        .journal
                        .push(format!("delete {} {}", entry.kind, entry.id));
                }
            }
        }
        debug!(rows = inner.rows.len(), "transaction committed");
        Ok(())
    }

    fn rollback_transaction(&self) -> PersistenceResult<()> {
        self.ensure_open()?;
        let mut inner = self.inner.lock();
        let discarded = inner.staged.len();
        inner.staged.clear();
        inner.staged_saves.clear();
        debug!(discarded, "transaction rolled back");
        Ok(())
    }

    fn close(&self) -> PersistenceResult<()> {
        self.closed.store(true, Ordering::Release);
        Ok(())
    }

    fn property_length(&self, type_name: &str, property: &str) -> Option<i32> {
        self.inner
            .lock()
            .lengths
            .get(&format!("{type_name}.{property}"))
            .copied()
    }
}
