//! The relationship consistency algorithm.
//!
//! Every function here follows one locking rule: at most one object lock
//! is held at any time. Reads snapshot a handle, drop the lock, and the
//! follow-up mutation re-locks the object it targets. Sessions serialize
//! relationship mutations, so the gap between snapshot and write is safe.

use crate::error::{PersistenceError, PersistenceResult};
use crate::model::AnyHandle;
use crate::relation::{Multiplicity, RelationLink};

/// How a relationship mutation arrived at the engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum LinkOp {
    /// Replace a single-valued field.
    Set,
    /// Add to a collection-valued field.
    Add,
    /// Remove from a collection-valued field.
    Remove,
}

/// Applies a relationship mutation on `this` and maintains the paired
/// reference on every affected object.
///
/// Returns the objects, other than `this`, whose owning-side field
/// changed; those are the ones the session must dirty-mark. Objects whose
/// non-owning field changed are repaired silently.
pub(crate) fn apply(
    this: &AnyHandle,
    link: &RelationLink,
    partner: Option<&AnyHandle>,
    op: LinkOp,
) -> PersistenceResult<Vec<AnyHandle>> {
    match (op, link.multiplicity()) {
        (LinkOp::Set, Multiplicity::OneToOne | Multiplicity::ManyToOne) => {
            apply_set(this, link, partner)
        }
        (LinkOp::Add | LinkOp::Remove, Multiplicity::OneToMany | Multiplicity::ManyToMany) => {
            let partner = partner.ok_or_else(|| {
                PersistenceError::config(format!(
                    "add/remove on '{}' requires a partner",
                    link.property()
                ))
            })?;
            apply_collection(this, link, partner, op)
        }
        (LinkOp::Set, _) => Err(PersistenceError::config(format!(
            "'{}' is collection-valued; use add/remove",
            link.property()
        ))),
        (_, _) => Err(PersistenceError::config(format!(
            "'{}' is single-valued; use set",
            link.property()
        ))),
    }
}

/// Replaces the single-valued side of a one-to-one or many-to-one link.
fn apply_set(
    this: &AnyHandle,
    link: &RelationLink,
    partner: Option<&AnyHandle>,
) -> PersistenceResult<Vec<AnyHandle>> {
    let this_field = link.this_side().single()?;
    let old = this_field.get(&*this.read())?;

    if old.as_ref().map(AnyHandle::uid) == partner.map(AnyHandle::uid) {
        return Ok(Vec::new());
    }

    // The declaring side's field and the partner side's field sit on
    // different rows; only changes to owning-side fields need a commit.
    let declaring_owns = link.owning();
    let partner_owns = !declaring_owns;
    let mut to_mark = Vec::new();

    // Detach the paired reference on the partner being replaced.
    if let Some(old) = old {
        match link.multiplicity() {
            Multiplicity::OneToOne => {
                link.partner_side().single()?.set(&mut *old.write(), None)?;
            }
            Multiplicity::ManyToOne => {
                link.partner_side()
                    .set()?
                    .remove(&mut *old.write(), this.uid())?;
            }
            _ => unreachable!("apply_set only handles single-valued links"),
        }
        if partner_owns {
            to_mark.push(old);
        }
    }

    if let Some(new) = partner {
        // A one-to-one partner may still point at somebody else; that
        // somebody loses its declaring-side reference first.
        if link.multiplicity() == Multiplicity::OneToOne {
            let partner_field = link.partner_side().single()?;
            let displaced = partner_field.get(&*new.read())?;
            if let Some(displaced) = displaced {
                if displaced.uid() != this.uid() {
                    this_field.set(&mut *displaced.write(), None)?;
                    if declaring_owns {
                        to_mark.push(displaced);
                    }
                }
            }
        }

        match link.multiplicity() {
            Multiplicity::OneToOne => {
                link.partner_side()
                    .single()?
                    .set(&mut *new.write(), Some(this.clone()))?;
            }
            Multiplicity::ManyToOne => {
                link.partner_side().set()?.insert(&mut *new.write(), this)?;
            }
            _ => unreachable!("apply_set only handles single-valued links"),
        }
        if partner_owns {
            to_mark.push(new.clone());
        }
    }

    this_field.set(&mut *this.write(), partner.cloned())?;
    Ok(to_mark)
}

/// Adds to or removes from the collection-valued side of a one-to-many or
/// many-to-many link.
fn apply_collection(
    this: &AnyHandle,
    link: &RelationLink,
    partner: &AnyHandle,
    op: LinkOp,
) -> PersistenceResult<Vec<AnyHandle>> {
    let this_field = link.this_side().set()?;
    let declaring_owns = link.owning();
    let partner_owns = !declaring_owns;
    let mut to_mark = Vec::new();

    match (op, link.multiplicity()) {
        (LinkOp::Add, Multiplicity::OneToMany) => {
            if this_field.contains(&*this.read(), partner.uid())? {
                return Ok(Vec::new());
            }
            // The partner may still belong to another collection owner.
            let partner_field = link.partner_side().single()?;
            let prev = partner_field.get(&*partner.read())?;
            if let Some(prev) = prev {
                if prev.uid() != this.uid() {
                    this_field.remove(&mut *prev.write(), partner.uid())?;
                    if declaring_owns {
                        to_mark.push(prev);
                    }
                }
            }
            partner_field.set(&mut *partner.write(), Some(this.clone()))?;
            if partner_owns {
                to_mark.push(partner.clone());
            }
            this_field.insert(&mut *this.write(), partner)?;
        }
        (LinkOp::Remove, Multiplicity::OneToMany) => {
            if !this_field.contains(&*this.read(), partner.uid())? {
                return Ok(Vec::new());
            }
            link.partner_side()
                .single()?
                .set(&mut *partner.write(), None)?;
            if partner_owns {
                to_mark.push(partner.clone());
            }
            this_field.remove(&mut *this.write(), partner.uid())?;
        }
        (LinkOp::Add, Multiplicity::ManyToMany) => {
            if this_field.contains(&*this.read(), partner.uid())? {
                return Ok(Vec::new());
            }
            link.partner_side()
                .set()?
                .insert(&mut *partner.write(), this)?;
            if partner_owns {
                to_mark.push(partner.clone());
            }
            this_field.insert(&mut *this.write(), partner)?;
        }
        (LinkOp::Remove, Multiplicity::ManyToMany) => {
            if !this_field.contains(&*this.read(), partner.uid())? {
                return Ok(Vec::new());
            }
            link.partner_side()
                .set()?
                .remove(&mut *partner.write(), this.uid())?;
            if partner_owns {
                to_mark.push(partner.clone());
            }
            this_field.remove(&mut *this.write(), partner.uid())?;
        }
        _ => unreachable!("apply_collection only handles collection-valued links"),
    }

    Ok(to_mark)
}
