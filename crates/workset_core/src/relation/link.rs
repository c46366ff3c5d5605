//! Relationship declarations and erased field accessors.

use std::fmt;

use crate::error::{PersistenceError, PersistenceResult};
use crate::model::{AnyHandle, Handle, ObjSet, Persistable};
use crate::types::ObjectUid;

/// Whether the engine maintains the partner side of a relationship
/// automatically.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Mode {
    /// The engine updates the paired reference on every change.
    #[default]
    Auto,
    /// Both sides are maintained by application code.
    Manual,
}

/// Shape of a relationship, seen from the declaring side.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Multiplicity {
    /// Single reference on both sides.
    OneToOne,
    /// Single reference here, collection on the partner.
    ManyToOne,
    /// Collection here, single reference on the partner.
    OneToMany,
    /// Collection on both sides.
    ManyToMany,
}

fn accessor_mismatch<T>(actual: &str) -> PersistenceError {
    PersistenceError::config(format!(
        "relation accessor for {} applied to a {actual}",
        std::any::type_name::<T>()
    ))
}

fn partner_mismatch<P>() -> PersistenceError {
    PersistenceError::config(format!(
        "relation partner is not a {}",
        std::any::type_name::<P>()
    ))
}

type SingleGet =
    Box<dyn Fn(&dyn Persistable) -> PersistenceResult<Option<AnyHandle>> + Send + Sync>;
type SingleSet =
    Box<dyn Fn(&mut dyn Persistable, Option<AnyHandle>) -> PersistenceResult<()> + Send + Sync>;

/// Erased accessor pair for a single-valued relationship field.
pub struct SingleAccess {
    get: SingleGet,
    set: SingleSet,
}

impl SingleAccess {
    /// Builds an accessor for field `Option<Handle<P>>` on entity type `T`.
    #[must_use]
    pub fn of<T: Persistable, P: Persistable>(
        get: fn(&T) -> &Option<Handle<P>>,
        set: fn(&mut T, Option<Handle<P>>),
    ) -> Self {
        Self {
            get: Box::new(move |obj| {
                let typed = obj
                    .as_any()
                    .downcast_ref::<T>()
                    .ok_or_else(|| accessor_mismatch::<T>(obj.type_name()))?;
                Ok(get(typed).as_ref().map(Handle::erased))
            }),
            set: Box::new(move |obj, value| {
                let actual = obj.type_name();
                let typed = obj
                    .as_any_mut()
                    .downcast_mut::<T>()
                    .ok_or_else(|| accessor_mismatch::<T>(actual))?;
                let value = match value {
                    None => None,
                    Some(any) => Some(any.downcast::<P>().ok_or_else(partner_mismatch::<P>)?),
                };
                set(typed, value);
                Ok(())
            }),
        }
    }

    pub(crate) fn get(&self, obj: &dyn Persistable) -> PersistenceResult<Option<AnyHandle>> {
        (self.get)(obj)
    }

    pub(crate) fn set(
        &self,
        obj: &mut dyn Persistable,
        value: Option<AnyHandle>,
    ) -> PersistenceResult<()> {
        (self.set)(obj, value)
    }
}

impl fmt::Debug for SingleAccess {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("SingleAccess")
    }
}

type SetInsert = Box<dyn Fn(&mut dyn Persistable, &AnyHandle) -> PersistenceResult<bool> + Send + Sync>;
type SetRemove = Box<dyn Fn(&mut dyn Persistable, ObjectUid) -> PersistenceResult<bool> + Send + Sync>;
type SetContains = Box<dyn Fn(&dyn Persistable, ObjectUid) -> PersistenceResult<bool> + Send + Sync>;

/// Erased accessor triple for a collection-valued relationship field.
pub struct SetAccess {
    insert: SetInsert,
    remove: SetRemove,
    contains: SetContains,
}

impl SetAccess {
    /// Builds an accessor for field `ObjSet<P>` on entity type `T`.
    #[must_use]
    pub fn of<T: Persistable, P: Persistable>(
        access: fn(&mut T) -> &mut ObjSet<P>,
        view: fn(&T) -> &ObjSet<P>,
    ) -> Self {
        Self {
            insert: Box::new(move |obj, handle| {
                let actual = obj.type_name();
                let typed = obj
                    .as_any_mut()
                    .downcast_mut::<T>()
                    .ok_or_else(|| accessor_mismatch::<T>(actual))?;
                let handle = handle.downcast::<P>().ok_or_else(partner_mismatch::<P>)?;
                Ok(access(typed).insert(handle))
            }),
            remove: Box::new(move |obj, uid| {
                let actual = obj.type_name();
                let typed = obj
                    .as_any_mut()
                    .downcast_mut::<T>()
                    .ok_or_else(|| accessor_mismatch::<T>(actual))?;
                Ok(access(typed).remove(uid))
            }),
            contains: Box::new(move |obj, uid| {
                let typed = obj
                    .as_any()
                    .downcast_ref::<T>()
                    .ok_or_else(|| accessor_mismatch::<T>(obj.type_name()))?;
                Ok(view(typed).contains(uid))
            }),
        }
    }

    pub(crate) fn insert(
        &self,
        obj: &mut dyn Persistable,
        handle: &AnyHandle,
    ) -> PersistenceResult<bool> {
        (self.insert)(obj, handle)
    }

    pub(crate) fn remove(
        &self,
        obj: &mut dyn Persistable,
        uid: ObjectUid,
    ) -> PersistenceResult<bool> {
        (self.remove)(obj, uid)
    }

    pub(crate) fn contains(
        &self,
        obj: &dyn Persistable,
        uid: ObjectUid,
    ) -> PersistenceResult<bool> {
        (self.contains)(obj, uid)
    }
}

impl fmt::Debug for SetAccess {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("SetAccess")
    }
}

/// A relationship field accessor of either shape.
#[derive(Debug)]
pub(crate) enum Access {
    Single(SingleAccess),
    Set(SetAccess),
}

impl Access {
    pub(crate) fn single(&self) -> PersistenceResult<&SingleAccess> {
        match self {
            Access::Single(a) => Ok(a),
            Access::Set(_) => Err(PersistenceError::config(
                "expected a single-valued relation accessor",
            )),
        }
    }

    pub(crate) fn set(&self) -> PersistenceResult<&SetAccess> {
        match self {
            Access::Set(a) => Ok(a),
            Access::Single(_) => Err(PersistenceError::config(
                "expected a collection-valued relation accessor",
            )),
        }
    }
}

/// Declaration of one bidirectional relationship, rooted at the declaring
/// entity type.
///
/// `owning` names the side whose persisted row carries the link (the
/// foreign-key holder in relational terms); only changes to the owning
/// side dirty-mark an object.
#[derive(Debug)]
pub struct RelationLink {
    property: &'static str,
    partner_property: &'static str,
    multiplicity: Multiplicity,
    mode: Mode,
    owning: bool,
    this_side: Access,
    partner_side: Access,
}

impl RelationLink {
    /// Declares a one-to-one relationship.
    #[must_use]
    pub fn one_to_one(
        property: &'static str,
        partner_property: &'static str,
        owning: bool,
        this_side: SingleAccess,
        partner_side: SingleAccess,
    ) -> Self {
        Self {
            property,
            partner_property,
            multiplicity: Multiplicity::OneToOne,
            mode: Mode::Auto,
            owning,
            this_side: Access::Single(this_side),
            partner_side: Access::Single(partner_side),
        }
    }

    /// Declares a many-to-one relationship (single reference here,
    /// collection on the partner).
    #[must_use]
    pub fn many_to_one(
        property: &'static str,
        partner_property: &'static str,
        owning: bool,
        this_side: SingleAccess,
        partner_side: SetAccess,
    ) -> Self {
        Self {
            property,
            partner_property,
            multiplicity: Multiplicity::ManyToOne,
            mode: Mode::Auto,
            owning,
            this_side: Access::Single(this_side),
            partner_side: Access::Set(partner_side),
        }
    }

    /// Declares a one-to-many relationship (collection here, single
    /// reference on the partner).
    #[must_use]
    pub fn one_to_many(
        property: &'static str,
        partner_property: &'static str,
        owning: bool,
        this_side: SetAccess,
        partner_side: SingleAccess,
    ) -> Self {
        Self {
            property,
            partner_property,
            multiplicity: Multiplicity::OneToMany,
            mode: Mode::Auto,
            owning,
            this_side: Access::Set(this_side),
            partner_side: Access::Single(partner_side),
        }
    }

    /// Declares a many-to-many relationship.
    #[must_use]
    pub fn many_to_many(
        property: &'static str,
        partner_property: &'static str,
        owning: bool,
        this_side: SetAccess,
        partner_side: SetAccess,
    ) -> Self {
        Self {
            property,
            partner_property,
            multiplicity: Multiplicity::ManyToMany,
            mode: Mode::Auto,
            owning,
            this_side: Access::Set(this_side),
            partner_side: Access::Set(partner_side),
        }
    }

    /// Overrides the management mode for this link.
    #[must_use]
    pub fn with_mode(mut self, mode: Mode) -> Self {
        self.mode = mode;
        self
    }

    /// Property name on the declaring side.
    #[must_use]
    pub fn property(&self) -> &'static str {
        self.property
    }

    /// Property name of the paired field on the partner type.
    #[must_use]
    pub fn partner_property(&self) -> &'static str {
        self.partner_property
    }

    /// Relationship shape.
    #[must_use]
    pub fn multiplicity(&self) -> Multiplicity {
        self.multiplicity
    }

    /// Management mode declared for this link.
    #[must_use]
    pub fn mode(&self) -> Mode {
        self.mode
    }

    /// Returns `true` if the declaring side owns the persisted link.
    #[must_use]
    pub fn owning(&self) -> bool {
        self.owning
    }

    pub(crate) fn this_side(&self) -> &Access {
        &self.this_side
    }

    pub(crate) fn partner_side(&self) -> &Access {
        &self.partner_side
    }
}
