//! Bidirectional relationship declarations and the consistency engine.
//!
//! Relationships are declared once, on the side that initiates changes,
//! as a [`RelationLink`] inside the entity's
//! [`EntityDescriptor`](crate::model::EntityDescriptor). The engine in
//! [`engine`] keeps the paired reference on the partner type consistent
//! whenever a session routes a relationship mutation through it.

pub(crate) mod engine;
mod link;

pub use link::{Mode, Multiplicity, RelationLink, SetAccess, SingleAccess};
