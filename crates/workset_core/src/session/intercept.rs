//! Mutation interception: attribute writes, keyed-collection writes, and
//! relationship mutations all enter the session here.

use tracing::{trace, warn};

use crate::error::{PersistenceError, PersistenceResult};
use crate::model::{AnyHandle, Handle, Modification, Persistable};
use crate::relation::engine::{self, LinkOp};
use crate::relation::{Mode, RelationLink};
use crate::session::Session;

/// A value writable through [`Session::set_property`].
///
/// `truncated` trims the value to the store-declared column length before
/// it reaches the entity; only character data actually shrinks. `render`
/// produces the change-log representation.
pub trait PropertyValue: Sized {
    /// Trims the value to at most `max` units, when that is meaningful
    /// for the type.
    #[must_use]
    fn truncated(self, max: i32) -> Self {
        let _ = max;
        self
    }

    /// Change-log representation of the value.
    fn render(&self) -> String;
}

impl PropertyValue for String {
    fn truncated(self, max: i32) -> Self {
        let max = usize::try_from(max).unwrap_or(0);
        if self.chars().count() > max {
            self.chars().take(max).collect()
        } else {
            self
        }
    }

    fn render(&self) -> String {
        self.clone()
    }
}

impl PropertyValue for Option<String> {
    fn truncated(self, max: i32) -> Self {
        self.map(|s| s.truncated(max))
    }

    fn render(&self) -> String {
        match self {
            Some(s) => s.clone(),
            None => "null".to_string(),
        }
    }
}

macro_rules! passthrough_property_value {
    ($($ty:ty),*) => {
        $(impl PropertyValue for $ty {
            fn render(&self) -> String {
                self.to_string()
            }
        })*
    };
}

passthrough_property_value!(bool, i32, i64, u32, u64, f64);

impl Session {
    /// Writes an attribute through the interceptor.
    ///
    /// The value is truncated to the store-declared length for
    /// `Type.property` (if any), the write is applied under the object
    /// lock, a change-log entry is recorded, and the object joins the
    /// dirty set. A property the descriptor declares transient is applied
    /// verbatim with no tracking at all.
    pub fn set_property<T, V>(
        &self,
        handle: &Handle<T>,
        property: &str,
        value: V,
        write: impl FnOnce(&mut T, V),
    ) -> PersistenceResult<()>
    where
        T: Persistable,
        V: PropertyValue,
    {
        self.ensure_open()?;
        let (type_name, transient) = {
            let obj = handle.read();
            (obj.type_name(), obj.descriptor().is_transient(property))
        };
        if transient {
            write(&mut handle.write(), value);
            trace!(uid = %handle.uid(), property, "transient write applied");
            return Ok(());
        }
        let value = match self.store().property_length(type_name, property) {
            Some(max) if max > 0 => value.truncated(max),
            _ => value,
        };
        let entry = format!("set_{property}( {} )", value.render());
        {
            let mut obj = handle.write();
            write(&mut obj, value);
            obj.meta_mut().log_change(entry);
            obj.meta_mut().mark_changed();
        }
        trace!(uid = %handle.uid(), property, "attribute written");
        self.track_dirty_if_modified(&handle.erased());
        Ok(())
    }

    /// Writes one entry of a keyed collection through the interceptor.
    ///
    /// Key and element are truncated against the derived lookup names
    /// (see [`SessionConfig`](crate::SessionConfig)); keyed writes do not
    /// produce change-log entries. Transient properties are applied
    /// verbatim.
    pub fn set_keyed<T, K, V>(
        &self,
        handle: &Handle<T>,
        property: &str,
        key: K,
        value: V,
        write: impl FnOnce(&mut T, K, V),
    ) -> PersistenceResult<()>
    where
        T: Persistable,
        K: PropertyValue,
        V: PropertyValue,
    {
        self.ensure_open()?;
        let (type_name, transient) = {
            let obj = handle.read();
            (obj.type_name(), obj.descriptor().is_transient(property))
        };
        if transient {
            write(&mut handle.write(), key, value);
            trace!(uid = %handle.uid(), property, "transient write applied");
            return Ok(());
        }
        let key_lookup = self.config().key_length_property(property);
        let element_lookup = self.config().element_length_property(property);
        let key = match self.store().property_length(type_name, &key_lookup) {
            Some(max) if max > 0 => key.truncated(max),
            _ => key,
        };
        let value = match self.store().property_length(type_name, &element_lookup) {
            Some(max) if max > 0 => value.truncated(max),
            _ => value,
        };
        {
            let mut obj = handle.write();
            write(&mut obj, key, value);
            obj.meta_mut().mark_changed();
        }
        trace!(uid = %handle.uid(), property, "keyed entry written");
        self.track_dirty_if_modified(&handle.erased());
        Ok(())
    }

    /// Replaces a single-valued relationship field, maintaining the
    /// paired reference on the partner type.
    pub fn set_related(
        &self,
        handle: &AnyHandle,
        property: &str,
        partner: Option<&AnyHandle>,
    ) -> PersistenceResult<()> {
        self.relate(handle, property, partner, LinkOp::Set)
    }

    /// Adds to a collection-valued relationship field, maintaining the
    /// paired reference on the partner type.
    pub fn add_related(
        &self,
        handle: &AnyHandle,
        property: &str,
        partner: &AnyHandle,
    ) -> PersistenceResult<()> {
        self.relate(handle, property, Some(partner), LinkOp::Add)
    }

    /// Removes from a collection-valued relationship field, maintaining
    /// the paired reference on the partner type.
    pub fn remove_related(
        &self,
        handle: &AnyHandle,
        property: &str,
        partner: &AnyHandle,
    ) -> PersistenceResult<()> {
        self.relate(handle, property, Some(partner), LinkOp::Remove)
    }

    fn relate(
        &self,
        handle: &AnyHandle,
        property: &str,
        partner: Option<&AnyHandle>,
        op: LinkOp,
    ) -> PersistenceResult<()> {
        self.ensure_open()?;
        let link = {
            let obj = handle.read();
            let descriptor = obj.descriptor();
            descriptor.relation(property).ok_or_else(|| {
                PersistenceError::config(format!(
                    "{} declares no relation '{property}'",
                    descriptor.type_name()
                ))
            })?
        };

        // The incoming partner joins the working set before any side is
        // touched; a failed store attach skips re-association only.
        if let Some(partner) = partner {
            if let Err(err) = self.store().attach(partner) {
                warn!(uid = %partner.uid(), error = %err, "partner attach skipped");
            }
            self.track_in_use(partner);
        }

        let manual =
            self.config().relation_mode() == Mode::Manual || link.mode() == Mode::Manual;
        if manual {
            self.relate_manual(handle, link, partner, op)?;
            self.log_relation(handle, property, partner, op);
            self.mark_changed_tracked(handle);
            return Ok(());
        }

        let to_mark = engine::apply(handle, link, partner, op)?;
        for other in &to_mark {
            self.track_in_use(other);
            self.mark_changed_tracked(other);
        }
        self.log_relation(handle, property, partner, op);
        if link.owning() {
            self.mark_changed_tracked(handle);
        }
        trace!(uid = %handle.uid(), property, repaired = to_mark.len(), "relation updated");
        Ok(())
    }

    /// Mutates the declaring side only; both sides are the caller's
    /// responsibility in manual mode.
    fn relate_manual(
        &self,
        handle: &AnyHandle,
        link: &RelationLink,
        partner: Option<&AnyHandle>,
        op: LinkOp,
    ) -> PersistenceResult<()> {
        match op {
            LinkOp::Set => link
                .this_side()
                .single()?
                .set(&mut *handle.write(), partner.cloned()),
            LinkOp::Add => {
                let partner = partner.ok_or_else(|| {
                    PersistenceError::config(format!(
                        "add/remove on '{}' requires a partner",
                        link.property()
                    ))
                })?;
                link.this_side().set()?.insert(&mut *handle.write(), partner)?;
                Ok(())
            }
            LinkOp::Remove => {
                let partner = partner.ok_or_else(|| {
                    PersistenceError::config(format!(
                        "add/remove on '{}' requires a partner",
                        link.property()
                    ))
                })?;
                link.this_side()
                    .set()?
                    .remove(&mut *handle.write(), partner.uid())?;
                Ok(())
            }
        }
    }

    fn log_relation(
        &self,
        handle: &AnyHandle,
        property: &str,
        partner: Option<&AnyHandle>,
        op: LinkOp,
    ) {
        let target = match partner {
            Some(p) => p.read().describe(),
            None => "null".to_string(),
        };
        let entry = match op {
            LinkOp::Set => format!("set_{property}( {target} )"),
            LinkOp::Add => format!("add_{property}( {target} )"),
            LinkOp::Remove => format!("remove_{property}( {target} )"),
        };
        handle.write().meta_mut().log_change(entry);
    }

    fn mark_changed_tracked(&self, handle: &AnyHandle) {
        handle.write().meta_mut().mark_changed();
        self.track_dirty_if_modified(handle);
    }

    fn track_dirty_if_modified(&self, handle: &AnyHandle) {
        let modification = handle.read().modification();
        if modification != Modification::Unmodified {
            self.track_dirty(handle.clone());
        }
    }
}
