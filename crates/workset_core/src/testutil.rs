//! Shared fixtures for the crate's unit tests: two small entity types and
//! a store stub that records every call.

use std::any::Any;
use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::LazyLock;

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};

use crate::codec;
use crate::error::{PersistenceError, PersistenceResult};
use crate::model::{AnyHandle, EntityDescriptor, Handle, ObjSet, ObjectMeta, Persistable};
use crate::relation::{RelationLink, SetAccess, SingleAccess};
use crate::store::Store;
use crate::types::StoreId;

#[derive(Serialize, Deserialize)]
pub(crate) struct Widget {
    meta: ObjectMeta,
    pub name: String,
    pub count: i32,
    pub labels: BTreeMap<String, String>,
    #[serde(skip)]
    pub note: String,
    #[serde(skip)]
    pub fixed: bool,
    #[serde(skip)]
    pub rack: Option<Handle<Rack>>,
    #[serde(skip)]
    pub twin: Option<Handle<Widget>>,
}

impl Widget {
    pub fn named(name: &str) -> Self {
        Self {
            meta: ObjectMeta::new(),
            name: name.to_string(),
            count: 0,
            labels: BTreeMap::new(),
            note: String::new(),
            fixed: false,
            rack: None,
            twin: None,
        }
    }
}

static WIDGET_DESCRIPTOR: LazyLock<EntityDescriptor> = LazyLock::new(|| {
    EntityDescriptor::new("Widget")
        .with_relation(RelationLink::many_to_one(
            "rack",
            "widgets",
            true,
            SingleAccess::of::<Widget, Rack>(|w| &w.rack, |w, v| w.rack = v),
            SetAccess::of::<Rack, Widget>(|r| &mut r.widgets, |r| &r.widgets),
        ))
        .with_relation(RelationLink::one_to_one(
            "twin",
            "twin",
            true,
            SingleAccess::of::<Widget, Widget>(|w| &w.twin, |w, v| w.twin = v),
            SingleAccess::of::<Widget, Widget>(|w| &w.twin, |w, v| w.twin = v),
        ))
        .with_transient("note")
});

impl Persistable for Widget {
    fn descriptor(&self) -> &'static EntityDescriptor {
        &WIDGET_DESCRIPTOR
    }

    fn meta(&self) -> &ObjectMeta {
        &self.meta
    }

    fn meta_mut(&mut self) -> &mut ObjectMeta {
        &mut self.meta
    }

    fn encode_state(&self) -> PersistenceResult<Vec<u8>> {
        codec::encode(self)
    }

    fn decode_state(&mut self, bytes: &[u8]) -> PersistenceResult<()> {
        let image: Widget = codec::decode(bytes)?;
        self.name = image.name;
        self.count = image.count;
        self.labels = image.labels;
        self.meta.restore_persisted(image.meta);
        Ok(())
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }

    fn deletable(&self) -> bool {
        !self.fixed
    }

    fn log_key(&self) -> String {
        self.name.clone()
    }
}

#[derive(Serialize, Deserialize)]
pub(crate) struct Rack {
    meta: ObjectMeta,
    pub name: String,
    #[serde(skip)]
    pub widgets: ObjSet<Widget>,
}

impl Rack {
    pub fn named(name: &str) -> Self {
        Self {
            meta: ObjectMeta::new(),
            name: name.to_string(),
            widgets: ObjSet::new(),
        }
    }
}

static RACK_DESCRIPTOR: LazyLock<EntityDescriptor> = LazyLock::new(|| {
    EntityDescriptor::new("Rack").with_relation(RelationLink::one_to_many(
        "widgets",
        "rack",
        false,
        SetAccess::of::<Rack, Widget>(|r| &mut r.widgets, |r| &r.widgets),
        SingleAccess::of::<Widget, Rack>(|w| &w.rack, |w, v| w.rack = v),
    ))
});

impl Persistable for Rack {
    fn descriptor(&self) -> &'static EntityDescriptor {
        &RACK_DESCRIPTOR
    }

    fn meta(&self) -> &ObjectMeta {
        &self.meta
    }

    fn meta_mut(&mut self) -> &mut ObjectMeta {
        &mut self.meta
    }

    fn encode_state(&self) -> PersistenceResult<Vec<u8>> {
        codec::encode(self)
    }

    fn decode_state(&mut self, bytes: &[u8]) -> PersistenceResult<()> {
        let image: Rack = codec::decode(bytes)?;
        self.name = image.name;
        self.meta.restore_persisted(image.meta);
        Ok(())
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }

    fn log_key(&self) -> String {
        self.name.clone()
    }
}

/// Store stub recording every call; behavior is configurable per test.
pub(crate) struct StubStore {
    calls: Mutex<Vec<String>>,
    lengths: Mutex<HashMap<String, i32>>,
    next_id: AtomicU64,
    fail_commit: AtomicBool,
    conflict_commit: AtomicBool,
    fail_refresh: AtomicBool,
}

impl StubStore {
    pub fn new() -> Self {
        Self {
            calls: Mutex::new(Vec::new()),
            lengths: Mutex::new(HashMap::new()),
            next_id: AtomicU64::new(1),
            fail_commit: AtomicBool::new(false),
            conflict_commit: AtomicBool::new(false),
            fail_refresh: AtomicBool::new(false),
        }
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().clone()
    }

    pub fn set_property_length(&self, type_name: &str, property: &str, length: i32) {
        self.lengths
            .lock()
            .insert(format!("{type_name}.{property}"), length);
    }

    pub fn fail_commit_transaction(&self) {
        self.fail_commit.store(true, Ordering::Release);
    }

    pub fn fail_commit_with_conflict(&self) {
        self.conflict_commit.store(true, Ordering::Release);
    }

    pub fn fail_refresh(&self) {
        self.fail_refresh.store(true, Ordering::Release);
    }

    fn record(&self, call: String) {
        self.calls.lock().push(call);
    }
}

impl Store for StubStore {
    fn save(&self, handle: &AnyHandle) -> PersistenceResult<()> {
        self.record(format!("save {}", handle.uid()));
        let id = StoreId::new(self.next_id.fetch_add(1, Ordering::Relaxed));
        let mut obj = handle.write();
        obj.meta_mut().set_store_id(id);
        obj.meta_mut().set_version(1);
        Ok(())
    }

    fn update(&self, handle: &AnyHandle) -> PersistenceResult<()> {
        self.record(format!("update {}", handle.uid()));
        Ok(())
    }

    fn delete(&self, handle: &AnyHandle) -> PersistenceResult<()> {
        self.record(format!("delete {}", handle.uid()));
        Ok(())
    }

    fn refresh(&self, handle: &AnyHandle) -> PersistenceResult<()> {
        self.record(format!("refresh {}", handle.uid()));
        if self.fail_refresh.load(Ordering::Acquire) {
            return Err(PersistenceError::store("refresh failed"));
        }
        Ok(())
    }

    fn attach(&self, handle: &AnyHandle) -> PersistenceResult<()> {
        self.record(format!("attach {}", handle.uid()));
        Ok(())
    }

    fn detach(&self) -> PersistenceResult<()> {
        self.record("detach".to_string());
        Ok(())
    }

    fn begin_transaction(&self) -> PersistenceResult<()> {
        self.record("begin".to_string());
        Ok(())
    }

    fn commit_transaction(&self) -> PersistenceResult<()> {
        self.record("commit".to_string());
        if self.conflict_commit.load(Ordering::Acquire) {
            return Err(PersistenceError::conflict(
                "Widget",
                StoreId::new(1),
                "version moved",
            ));
        }
        if self.fail_commit.load(Ordering::Acquire) {
            return Err(PersistenceError::store("commit failed"));
        }
        Ok(())
    }

    fn rollback_transaction(&self) -> PersistenceResult<()> {
        self.record("rollback".to_string());
        Ok(())
    }

    fn close(&self) -> PersistenceResult<()> {
        self.record("close".to_string());
        Ok(())
    }

    fn property_length(&self, type_name: &str, property: &str) -> Option<i32> {
        self.lengths
            .lock()
            .get(&format!("{type_name}.{property}"))
            .copied()
    }
}
