//! Minimal entity used by this crate's unit tests.

use std::any::Any;
use std::sync::LazyLock;

use serde::{Deserialize, Serialize};

use workset_core::{codec, EntityDescriptor, ObjectMeta, Persistable, PersistenceResult};

#[derive(Serialize, Deserialize)]
pub(crate) struct Item {
    meta: ObjectMeta,
    pub name: String,
    pub qty: i32,
}

impl Item {
    pub fn new(name: &str, qty: i32) -> Self {
        Self {
            meta: ObjectMeta::new(),
            name: name.to_string(),
            qty,
        }
    }
}

static ITEM_DESCRIPTOR: LazyLock<EntityDescriptor> =
    LazyLock::new(|| EntityDescriptor::new("Item"));

impl Persistable for Item {
    fn descriptor(&self) -> &'static EntityDescriptor {
        &ITEM_DESCRIPTOR
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
        let image: Item = codec::decode(bytes)?;
        self.name = image.name;
        self.qty = image.qty;
        self.meta.restore_persisted(image.meta);
        Ok(())
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}
