//! The fixture entity model and session builders.

use std::any::Any;
use std::collections::BTreeMap;
use std::sync::{Arc, LazyLock};

use serde::{Deserialize, Serialize};

use workset_core::{
    codec, EntityDescriptor, Handle, ObjSet, ObjectMeta, Persistable, PersistenceResult,
    RelationLink, Session, SetAccess, SingleAccess, Store, StoreId,
};
use workset_store::MemoryStore;

/// A site: the hub of the fixture model.
///
/// Carries every relationship shape: a self-referential
/// parent/children pair, a one-to-one `probe`, a one-to-many `tanks`
/// collection, a many-to-many `feeds` collection, plus a keyed
/// `properties` collection and a transient `scratch` field that never
/// reaches the store.
#[derive(Serialize, Deserialize)]
pub struct Site {
    meta: ObjectMeta,
    /// Display name.
    pub name: String,
    /// Keyed string properties.
    pub properties: BTreeMap<String, String>,
    /// Scratch pad, intentionally not persisted.
    #[serde(skip)]
    pub scratch: String,
    /// Owning side of the self-referential hierarchy.
    #[serde(skip)]
    pub parent: Option<Handle<Site>>,
    /// Non-owning collection side of the hierarchy.
    #[serde(skip)]
    pub children: ObjSet<Site>,
    /// Owning side of the one-to-one probe pairing.
    #[serde(skip)]
    pub probe: Option<Handle<Probe>>,
    /// Non-owning collection side of the tank relation.
    #[serde(skip)]
    pub tanks: ObjSet<Tank>,
    /// Owning side of the many-to-many feed relation.
    #[serde(skip)]
    pub feeds: ObjSet<Tank>,
}

static SITE_DESCRIPTOR: LazyLock<EntityDescriptor> = LazyLock::new(|| {
    EntityDescriptor::new("Site")
        .with_relation(RelationLink::many_to_one(
            "parent",
            "children",
            true,
            SingleAccess::of::<Site, Site>(|s| &s.parent, |s, v| s.parent = v),
            SetAccess::of::<Site, Site>(|s| &mut s.children, |s| &s.children),
        ))
        .with_relation(RelationLink::one_to_many(
            "children",
            "parent",
            false,
            SetAccess::of::<Site, Site>(|s| &mut s.children, |s| &s.children),
            SingleAccess::of::<Site, Site>(|s| &s.parent, |s, v| s.parent = v),
        ))
        .with_relation(RelationLink::one_to_one(
            "probe",
            "site",
            true,
            SingleAccess::of::<Site, Probe>(|s| &s.probe, |s, v| s.probe = v),
            SingleAccess::of::<Probe, Site>(|p| &p.site, |p, v| p.site = v),
        ))
        .with_relation(RelationLink::one_to_many(
            "tanks",
            "site",
            false,
            SetAccess::of::<Site, Tank>(|s| &mut s.tanks, |s| &s.tanks),
            SingleAccess::of::<Tank, Site>(|t| &t.site, |t, v| t.site = v),
        ))
        .with_relation(RelationLink::many_to_many(
            "feeds",
            "fed_by",
            true,
            SetAccess::of::<Site, Tank>(|s| &mut s.feeds, |s| &s.feeds),
            SetAccess::of::<Tank, Site>(|t| &mut t.fed_by, |t| &t.fed_by),
        ))
        .with_transient("scratch")
});

impl Site {
    /// Creates an unregistered site.
    #[must_use]
    pub fn new(name: &str) -> Self {
        Self {
            meta: ObjectMeta::new(),
            name: name.to_string(),
            properties: BTreeMap::new(),
            scratch: String::new(),
            parent: None,
            children: ObjSet::new(),
            probe: None,
            tanks: ObjSet::new(),
            feeds: ObjSet::new(),
        }
    }

    /// Materializes a persisted site into the session.
    pub fn load(session: &Session, id: StoreId) -> PersistenceResult<Handle<Site>> {
        let handle = session.attach(Site::new(""))?;
        handle.write().meta_mut().set_store_id(id);
        session.refresh(&handle.erased())?;
        Ok(handle)
    }

    /// Facade mutator for `name`.
    pub fn set_name(session: &Session, handle: &Handle<Site>, name: &str) -> PersistenceResult<()> {
        session.set_property(handle, "name", name.to_string(), |s, v| s.name = v)
    }

    /// Facade mutator for the transient `scratch` pad.
    pub fn set_scratch(
        session: &Session,
        handle: &Handle<Site>,
        value: &str,
    ) -> PersistenceResult<()> {
        session.set_property(handle, "scratch", value.to_string(), |s, v| s.scratch = v)
    }

    /// Facade mutator for one keyed property.
    pub fn put_property(
        session: &Session,
        handle: &Handle<Site>,
        key: &str,
        value: &str,
    ) -> PersistenceResult<()> {
        session.set_keyed(
            handle,
            "properties",
            key.to_string(),
            value.to_string(),
            |s, k, v| {
                s.properties.insert(k, v);
            },
        )
    }

    /// Facade mutator for `parent`.
    pub fn set_parent(
        session: &Session,
        handle: &Handle<Site>,
        parent: Option<&Handle<Site>>,
    ) -> PersistenceResult<()> {
        let parent = parent.map(Handle::erased);
        session.set_related(&handle.erased(), "parent", parent.as_ref())
    }

    /// Facade mutator adding to `children`.
    pub fn add_child(
        session: &Session,
        handle: &Handle<Site>,
        child: &Handle<Site>,
    ) -> PersistenceResult<()> {
        session.add_related(&handle.erased(), "children", &child.erased())
    }

    /// Facade mutator removing from `children`.
    pub fn remove_child(
        session: &Session,
        handle: &Handle<Site>,
        child: &Handle<Site>,
    ) -> PersistenceResult<()> {
        session.remove_related(&handle.erased(), "children", &child.erased())
    }

    /// Facade mutator for `probe`.
    pub fn set_probe(
        session: &Session,
        handle: &Handle<Site>,
        probe: Option<&Handle<Probe>>,
    ) -> PersistenceResult<()> {
        let probe = probe.map(Handle::erased);
        session.set_related(&handle.erased(), "probe", probe.as_ref())
    }

    /// Facade mutator adding to `tanks`.
    pub fn add_tank(
        session: &Session,
        handle: &Handle<Site>,
        tank: &Handle<Tank>,
    ) -> PersistenceResult<()> {
        session.add_related(&handle.erased(), "tanks", &tank.erased())
    }

    /// Facade mutator removing from `tanks`.
    pub fn remove_tank(
        session: &Session,
        handle: &Handle<Site>,
        tank: &Handle<Tank>,
    ) -> PersistenceResult<()> {
        session.remove_related(&handle.erased(), "tanks", &tank.erased())
    }

    /// Facade mutator adding to `feeds`.
    pub fn add_feed(
        session: &Session,
        handle: &Handle<Site>,
        tank: &Handle<Tank>,
    ) -> PersistenceResult<()> {
        session.add_related(&handle.erased(), "feeds", &tank.erased())
    }

    /// Facade mutator removing from `feeds`.
    pub fn remove_feed(
        session: &Session,
        handle: &Handle<Site>,
        tank: &Handle<Tank>,
    ) -> PersistenceResult<()> {
        session.remove_related(&handle.erased(), "feeds", &tank.erased())
    }
}

impl Persistable for Site {
    fn descriptor(&self) -> &'static EntityDescriptor {
        &SITE_DESCRIPTOR
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
        let image: Site = codec::decode(bytes)?;
        self.name = image.name;
        self.properties = image.properties;
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

/// A tank, attached to at most one site and fed by many.
#[derive(Serialize, Deserialize)]
pub struct Tank {
    meta: ObjectMeta,
    /// Display name.
    pub name: String,
    /// Capacity in liters.
    pub volume: i64,
    /// Owning single-valued side of the tank relation.
    #[serde(skip)]
    pub site: Option<Handle<Site>>,
    /// Non-owning side of the feed relation.
    #[serde(skip)]
    pub fed_by: ObjSet<Site>,
}

static TANK_DESCRIPTOR: LazyLock<EntityDescriptor> = LazyLock::new(|| {
    EntityDescriptor::new("Tank")
        .with_relation(RelationLink::many_to_one(
            "site",
            "tanks",
            true,
            SingleAccess::of::<Tank, Site>(|t| &t.site, |t, v| t.site = v),
            SetAccess::of::<Site, Tank>(|s| &mut s.tanks, |s| &s.tanks),
        ))
        .with_relation(RelationLink::many_to_many(
            "fed_by",
            "feeds",
            false,
            SetAccess::of::<Tank, Site>(|t| &mut t.fed_by, |t| &t.fed_by),
            SetAccess::of::<Site, Tank>(|s| &mut s.feeds, |s| &s.feeds),
        ))
});

impl Tank {
    /// Creates an unregistered tank.
    #[must_use]
    pub fn new(name: &str, volume: i64) -> Self {
        Self {
            meta: ObjectMeta::new(),
            name: name.to_string(),
            volume,
            site: None,
            fed_by: ObjSet::new(),
        }
    }

    /// Materializes a persisted tank into the session.
    pub fn load(session: &Session, id: StoreId) -> PersistenceResult<Handle<Tank>> {
        let handle = session.attach(Tank::new("", 0))?;
        handle.write().meta_mut().set_store_id(id);
        session.refresh(&handle.erased())?;
        Ok(handle)
    }

    /// Facade mutator for `name`.
    pub fn set_name(session: &Session, handle: &Handle<Tank>, name: &str) -> PersistenceResult<()> {
        session.set_property(handle, "name", name.to_string(), |t, v| t.name = v)
    }

    /// Facade mutator for `volume`.
    pub fn set_volume(
        session: &Session,
        handle: &Handle<Tank>,
        volume: i64,
    ) -> PersistenceResult<()> {
        session.set_property(handle, "volume", volume, |t, v| t.volume = v)
    }

    /// Facade mutator for `site`.
    pub fn set_site(
        session: &Session,
        handle: &Handle<Tank>,
        site: Option<&Handle<Site>>,
    ) -> PersistenceResult<()> {
        let site = site.map(Handle::erased);
        session.set_related(&handle.erased(), "site", site.as_ref())
    }
}

impl Persistable for Tank {
    fn descriptor(&self) -> &'static EntityDescriptor {
        &TANK_DESCRIPTOR
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
        let image: Tank = codec::decode(bytes)?;
        self.name = image.name;
        self.volume = image.volume;
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

/// A probe, paired one-to-one with a site.
#[derive(Serialize, Deserialize)]
pub struct Probe {
    meta: ObjectMeta,
    /// Display name.
    pub name: String,
    /// Non-owning side of the probe pairing.
    #[serde(skip)]
    pub site: Option<Handle<Site>>,
}

static PROBE_DESCRIPTOR: LazyLock<EntityDescriptor> = LazyLock::new(|| {
    EntityDescriptor::new("Probe").with_relation(RelationLink::one_to_one(
        "site",
        "probe",
        false,
        SingleAccess::of::<Probe, Site>(|p| &p.site, |p, v| p.site = v),
        SingleAccess::of::<Site, Probe>(|s| &s.probe, |s, v| s.probe = v),
    ))
});

impl Probe {
    /// Creates an unregistered probe.
    #[must_use]
    pub fn new(name: &str) -> Self {
        Self {
            meta: ObjectMeta::new(),
            name: name.to_string(),
            site: None,
        }
    }
}

impl Persistable for Probe {
    fn descriptor(&self) -> &'static EntityDescriptor {
        &PROBE_DESCRIPTOR
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
        let image: Probe = codec::decode(bytes)?;
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

/// Creates an empty in-memory store.
#[must_use]
pub fn test_store() -> Arc<MemoryStore> {
    Arc::new(MemoryStore::new())
}

/// Opens a session over the given store.
#[must_use]
pub fn test_session(store: &Arc<MemoryStore>) -> Session {
    Session::new(Arc::clone(store) as Arc<dyn Store>)
}
