//! The trait every persistent entity implements.

use std::any::Any;

use crate::error::PersistenceResult;
use crate::model::descriptor::EntityDescriptor;
use crate::model::meta::{Modification, ObjectMeta};
use crate::types::{ObjectUid, StoreId};

/// A persistent entity tracked by a [`Session`](crate::session::Session).
///
/// Implementors embed an [`ObjectMeta`] and expose it through
/// [`meta`](Persistable::meta) / [`meta_mut`](Persistable::meta_mut);
/// everything else defaults off that. State encoding goes through
/// [`crate::codec`] so every store sees the same byte image:
///
/// ```ignore
/// fn encode_state(&self) -> PersistenceResult<Vec<u8>> {
///     codec::encode(self)
/// }
/// ```
///
/// `decode_state` must restore exactly the encoded fields and leave
/// in-memory relationship references alone; the store rewrites version and
/// identity afterwards.
pub trait Persistable: Send + Sync + 'static {
    /// Static description of this entity type and its relationships.
    fn descriptor(&self) -> &'static EntityDescriptor;

    /// Read access to the embedded metadata.
    fn meta(&self) -> &ObjectMeta;

    /// Write access to the embedded metadata.
    fn meta_mut(&mut self) -> &mut ObjectMeta;

    /// Encodes the persisted fields into an opaque state image.
    fn encode_state(&self) -> PersistenceResult<Vec<u8>>;

    /// Restores the persisted fields from a state image produced by
    /// [`encode_state`](Persistable::encode_state).
    fn decode_state(&mut self, bytes: &[u8]) -> PersistenceResult<()>;

    /// Upcast for typed downcasting through erased handles.
    fn as_any(&self) -> &dyn Any;

    /// Mutable upcast for typed downcasting through erased handles.
    fn as_any_mut(&mut self) -> &mut dyn Any;

    /// Entity type name, as keyed in the store.
    fn type_name(&self) -> &'static str {
        self.descriptor().type_name()
    }

    /// Session-lifetime identity fingerprint.
    fn uid(&self) -> ObjectUid {
        self.meta().uid()
    }

    /// Store-assigned identifier, unassigned until first commit.
    fn store_id(&self) -> StoreId {
        self.meta().store_id()
    }

    /// Current modification state.
    fn modification(&self) -> Modification {
        self.meta().modification()
    }

    /// Whether the object may be scheduled for deletion. Reference data
    /// overrides this to refuse.
    fn deletable(&self) -> bool {
        true
    }

    /// Business key rendered into change-log output. Defaults to the
    /// session-lifetime fingerprint.
    fn log_key(&self) -> String {
        self.uid().to_string()
    }

    /// Log rendering of the object, `Type{ key }`.
    fn describe(&self) -> String {
        format!("{}{{ {} }}", self.type_name(), self.log_key())
    }
}
