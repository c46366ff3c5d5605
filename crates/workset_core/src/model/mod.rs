//! Persistent object model: metadata, the `Persistable` trait, shared
//! handles, and entity descriptors.

mod descriptor;
mod handle;
mod meta;
mod objset;
mod persistable;

pub use descriptor::EntityDescriptor;
pub use handle::{AnyHandle, Handle, WeakHandle};
pub use meta::{Modification, ObjectMeta};
pub use objset::ObjSet;
pub use persistable::Persistable;
