//! # Workset Store
//!
//! Store backends for the `workset_core` persistence coordinator.
//!
//! - [`MemoryStore`]: a transactional in-memory backend with version
//!   validation at commit, for tests and single-process embedding
//! - [`CompositeStore`]: routes each entity type to its own backend while
//!   presenting one store to the session

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod composite;
mod memory;

pub use composite::CompositeStore;
pub use memory::MemoryStore;

#[cfg(test)]
pub(crate) mod testent;
