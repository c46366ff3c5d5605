//! # Workset Core
//!
//! Session-scoped object persistence coordinator sitting above a relational
//! mapping layer (the "store").
//!
//! This crate provides:
//! - Persistent-object identity and modification-state tracking
//! - Mutation interception (attach, truncate, change log, dirty mark)
//! - Bidirectional relationship consistency management
//! - A session-owned dirty set in membership and commit-order form
//! - An all-or-nothing commit/rollback protocol with conflict recovery
//!
//! ## Architecture
//!
//! Every entity mutator is an explicit facade that routes through the
//! [`Session`] interceptor methods. The interceptor feeds the dirty set,
//! the dirty set drives the commit protocol, and the relationship engine
//! keeps paired object references consistent regardless of which side of a
//! relationship initiated a change.
//!
//! ## Key invariants
//!
//! - An object appears at most once in the dirty set, in first-marked order
//! - Commit dispatches in that order and never reorders
//! - Non-owning relationship sides never dirty-mark themselves
//! - A failed commit always leaves the store transaction rolled back or the
//!   connection closed, and always resets in-memory tracking state

#![deny(unsafe_code)]
#![warn(missing_docs)]

pub mod codec;
mod config;
mod error;
pub mod model;
pub mod relation;
pub mod session;
mod store;
mod types;
mod uid;

pub use config::SessionConfig;
pub use error::{PersistenceError, PersistenceResult};
pub use model::{
    AnyHandle, EntityDescriptor, Handle, Modification, ObjSet, ObjectMeta, Persistable, WeakHandle,
};
pub use relation::{Mode, Multiplicity, RelationLink, SetAccess, SingleAccess};
pub use session::{DirtySet, PropertyValue, Session, SessionStats};
pub use store::Store;
pub use types::{ObjectUid, StoreId};

#[cfg(test)]
pub(crate) mod testutil;
